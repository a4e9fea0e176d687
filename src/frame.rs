// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io::Cursor;
use std::str;

use bytes::Bytes;
use strum::Display;
use thiserror::Error as ThisError;

use crate::error::unexpected;
use crate::{Error, Result};

pub(crate) static CRLF: &[u8; 2] = b"\r\n";

/// Longest status, error or header line accepted before its terminator.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Default upper bound for bulk lengths and array counts.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

// Arrays announce their length up front; never trust it for more than this many slots.
pub(crate) const PREALLOC_LIMIT: usize = 1024;

/// Deepest array nesting accepted in a reply.
pub const MAX_DEPTH: usize = 512;

// Offending bytes quoted in framing errors are cut to this length.
const SNIPPET_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum FrameError {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid reply type byte {byte:#04x} in line \"{line}\"")]
    InvalidDataType { byte: u8, line: String },
    #[error("reply line is empty")]
    EmptyLine,
    #[error("invalid integer in line \"{0}\"")]
    InvalidInteger(String),
    #[error("invalid length in line \"{0}\"")]
    InvalidLength(String),
    #[error("length {len} exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },
    #[error("bulk value is not followed by CRLF")]
    MissingTerminator,
    #[error("arrays nested deeper than {max} levels")]
    TooDeep { max: usize },
}

/// One decoded reply.
///
/// A missing bulk value (`$-1`) and a missing array (`*-1`) are kept apart from empty ones, they
/// are the protocol's nil markers.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Error(String),
    Status(String),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Option<Vec<Reply>>),
}

/// The five reply shapes, keyed by the first byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReplyKind {
    Error,   // '-'
    Status,  // '+'
    Integer, // ':'
    Bulk,    // '$'
    Array,   // '*'
}

impl Reply {
    /// Parses one complete reply using the default frame size limit.
    pub fn parse(src: &mut Cursor<&[u8]>) -> std::result::Result<Reply, FrameError> {
        Self::parse_bounded(src, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Parses one complete reply from `src`, advancing the cursor past it.
    ///
    /// Returns [`FrameError::Incomplete`] when `src` ends before the reply does; the cursor
    /// position is meaningless in that case and the caller is expected to retry from the start
    /// once more data is buffered. Arrays nested deeper than [`MAX_DEPTH`] are rejected with
    /// [`FrameError::TooDeep`].
    pub fn parse_bounded(
        src: &mut Cursor<&[u8]>,
        max_frame_size: usize,
    ) -> std::result::Result<Reply, FrameError> {
        parse_nested(src, max_frame_size, 0)
    }

    /// Parses only an array header line, leaving the elements in `src`.
    ///
    /// `Ok(None)` is the nil array.
    pub fn parse_array_header(
        src: &mut Cursor<&[u8]>,
        max_frame_size: usize,
    ) -> std::result::Result<Option<usize>, FrameError> {
        let line = get_line(src)?;
        match line_kind(line)? {
            ReplyKind::Array => parse_length(line, max_frame_size),
            _ => Err(FrameError::InvalidDataType {
                byte: line[0],
                line: snippet(line),
            }),
        }
    }

    pub fn kind(&self) -> ReplyKind {
        match self {
            Reply::Error(_) => ReplyKind::Error,
            Reply::Status(_) => ReplyKind::Status,
            Reply::Integer(_) => ReplyKind::Integer,
            Reply::Bulk(_) => ReplyKind::Bulk,
            Reply::Array(_) => ReplyKind::Array,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Bulk(None) | Reply::Array(None))
    }

    /// Turns server errors and nil markers into the matching [`Error`], passing everything else
    /// through untouched.
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Reply::Error(message) => Err(Error::Server(message)),
            Reply::Bulk(None) | Reply::Array(None) => Err(Error::Nil),
            reply => Ok(reply),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Bytes of a bulk or status reply.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::Bulk(Some(bytes)) => Some(bytes),
            Reply::Status(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|bytes| str::from_utf8(bytes).ok())
    }

    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(items) => items,
            _ => None,
        }
    }

    // Typed conversions of a whole reply. Server errors and nil markers come out as the
    // matching [`Error`] first, then the shape is checked.

    pub fn into_integer(self) -> Result<i64> {
        match self.into_result()? {
            Reply::Integer(i) => Ok(i),
            reply => Err(unexpected(ReplyKind::Integer, reply.kind())),
        }
    }

    /// A status reply, or a bulk reply as text.
    pub fn into_status(self) -> Result<String> {
        match self.into_result()? {
            Reply::Status(status) => Ok(status),
            Reply::Bulk(Some(bytes)) => String::from_utf8(bytes.to_vec())
                .map_err(|err| Error::InvalidValue(err.to_string())),
            reply => Err(unexpected(ReplyKind::Status, reply.kind())),
        }
    }

    pub fn into_bytes(self) -> Result<Bytes> {
        match self.into_result()? {
            Reply::Bulk(Some(bytes)) => Ok(bytes),
            reply => Err(unexpected(ReplyKind::Bulk, reply.kind())),
        }
    }

    /// Like [`Reply::into_bytes`], with the nil bulk as `None`.
    pub fn into_optional_bytes(self) -> Result<Option<Bytes>> {
        match self {
            Reply::Bulk(None) => Ok(None),
            reply => reply.into_bytes().map(Some),
        }
    }

    /// A bulk or status reply holding a float, `inf` and `-inf` included.
    pub fn into_float(self) -> Result<f64> {
        let reply = self.into_result()?;
        let bytes = reply
            .as_bytes()
            .ok_or_else(|| unexpected(ReplyKind::Bulk, reply.kind()))?;

        str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                Error::InvalidValue(format!("{:?} is not a float", bytes.escape_ascii().to_string()))
            })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, bytes: &mut Vec<u8>) {
        bytes.push(u8::from(self.kind()));
        match self {
            Reply::Status(s) | Reply::Error(s) => bytes.extend_from_slice(s.as_bytes()),
            Reply::Integer(i) => bytes.extend_from_slice(i.to_string().as_bytes()),
            Reply::Bulk(None) | Reply::Array(None) => bytes.extend_from_slice(b"-1"),
            Reply::Bulk(Some(data)) => {
                bytes.extend_from_slice(data.len().to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes.extend_from_slice(data);
            }
            Reply::Array(Some(items)) => {
                bytes.extend_from_slice(items.len().to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
                for item in items {
                    item.write_to(bytes);
                }
                return;
            }
        }
        bytes.extend_from_slice(CRLF);
    }
}

impl From<Reply> for Vec<u8> {
    fn from(reply: Reply) -> Self {
        reply.serialize()
    }
}

// Rendered the way redis-cli prints replies.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(i) => write!(f, "(integer) {}", i),
            Reply::Bulk(None) | Reply::Array(None) => write!(f, "(nil)"),
            Reply::Bulk(Some(bytes)) => write!(f, "\"{}\"", bytes.escape_ascii()),
            Reply::Array(Some(items)) if items.is_empty() => write!(f, "(empty array)"),
            Reply::Array(Some(items)) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", index + 1, item)?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<u8> for ReplyKind {
    type Error = u8;

    fn try_from(byte: u8) -> std::result::Result<Self, u8> {
        match byte {
            b'-' => Ok(ReplyKind::Error),
            b'+' => Ok(ReplyKind::Status),
            b':' => Ok(ReplyKind::Integer),
            b'$' => Ok(ReplyKind::Bulk),
            b'*' => Ok(ReplyKind::Array),
            byte => Err(byte),
        }
    }
}

impl From<ReplyKind> for u8 {
    fn from(kind: ReplyKind) -> Self {
        match kind {
            ReplyKind::Error => b'-',
            ReplyKind::Status => b'+',
            ReplyKind::Integer => b':',
            ReplyKind::Bulk => b'$',
            ReplyKind::Array => b'*',
        }
    }
}

/// Parses a signed decimal straight from the wire bytes.
pub(crate) fn parse_integer(bytes: &[u8]) -> Option<i64> {
    str::from_utf8(bytes).ok()?.parse().ok()
}

// Each array level recurses once; `depth` counts the enclosing arrays.
fn parse_nested(
    src: &mut Cursor<&[u8]>,
    max_frame_size: usize,
    depth: usize,
) -> std::result::Result<Reply, FrameError> {
    let line = get_line(src)?;
    let kind = line_kind(line)?;

    match kind {
        ReplyKind::Error => Ok(Reply::Error(lossy(&line[1..]))),
        ReplyKind::Status => Ok(Reply::Status(lossy(&line[1..]))),
        ReplyKind::Integer => parse_integer(&line[1..])
            .map(Reply::Integer)
            .ok_or_else(|| FrameError::InvalidInteger(snippet(line))),
        // $<length>\r\n<data>\r\n
        ReplyKind::Bulk => match parse_length(line, max_frame_size)? {
            None => Ok(Reply::Bulk(None)),
            Some(len) => {
                let data = get_bulk(src, len)?;
                Ok(Reply::Bulk(Some(Bytes::copy_from_slice(data))))
            }
        },
        // *<number-of-elements>\r\n<element-1>...<element-n>
        ReplyKind::Array => match parse_length(line, max_frame_size)? {
            None => Ok(Reply::Array(None)),
            Some(_) if depth >= MAX_DEPTH => Err(FrameError::TooDeep { max: MAX_DEPTH }),
            Some(len) => {
                let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    items.push(parse_nested(src, max_frame_size, depth + 1)?);
                }
                Ok(Reply::Array(Some(items)))
            }
        },
    }
}

fn line_kind(line: &[u8]) -> std::result::Result<ReplyKind, FrameError> {
    let first_byte = *line.first().ok_or(FrameError::EmptyLine)?;
    ReplyKind::try_from(first_byte).map_err(|byte| FrameError::InvalidDataType {
        byte,
        line: snippet(line),
    })
}

// `-1` is the only nil length; any other negative value is a framing error.
fn parse_length(
    line: &[u8],
    max_frame_size: usize,
) -> std::result::Result<Option<usize>, FrameError> {
    let length = parse_integer(&line[1..]).ok_or_else(|| FrameError::InvalidLength(snippet(line)))?;

    match length {
        -1 => Ok(None),
        length if length < 0 => Err(FrameError::InvalidLength(snippet(line))),
        length => {
            let len = usize::try_from(length).map_err(|_| FrameError::InvalidLength(snippet(line)))?;
            if len > max_frame_size {
                return Err(FrameError::FrameTooLarge {
                    len,
                    max: max_frame_size,
                });
            }
            Ok(Some(len))
        }
    }
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> std::result::Result<&'a [u8], FrameError> {
    let buf: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;
    let remaining = buf.get(start..).ok_or(FrameError::Incomplete)?;

    match remaining.windows(2).position(|window| window == CRLF) {
        Some(end) if end > MAX_LINE_LEN => Err(FrameError::LineTooLong { max: MAX_LINE_LEN }),
        Some(end) => {
            src.set_position((start + end + CRLF.len()) as u64);
            Ok(&remaining[..end])
        }
        None if remaining.len() > MAX_LINE_LEN => {
            Err(FrameError::LineTooLong { max: MAX_LINE_LEN })
        }
        None => Err(FrameError::Incomplete),
    }
}

fn get_bulk<'a>(src: &mut Cursor<&'a [u8]>, len: usize) -> std::result::Result<&'a [u8], FrameError> {
    let buf: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;
    let end = start + len;

    if buf.len() < end + CRLF.len() {
        return Err(FrameError::Incomplete);
    }
    if &buf[end..end + CRLF.len()] != CRLF {
        return Err(FrameError::MissingTerminator);
    }

    src.set_position((end + CRLF.len()) as u64);
    Ok(&buf[start..end])
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn snippet(line: &[u8]) -> String {
    line[..line.len().min(SNIPPET_LEN)].escape_ascii().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> std::result::Result<Reply, FrameError> {
        let mut cursor = Cursor::new(data);
        Reply::parse(&mut cursor)
    }

    #[test]
    fn parse_status_reply() {
        assert_eq!(parse(b"+OK\r\n"), Ok(Reply::Status("OK".to_string())));
    }

    #[test]
    fn parse_error_reply() {
        let reply = parse(b"-ERR wrong number of arguments\r\n");

        assert_eq!(
            reply,
            Ok(Reply::Error("ERR wrong number of arguments".to_string()))
        );
    }

    fn parse_integer_reply(data: &[u8], expected: i64) {
        assert_eq!(parse(data), Ok(Reply::Integer(expected)));
    }

    #[test]
    fn parse_integer_reply_positive() {
        parse_integer_reply(b":1000\r\n", 1000);
    }

    #[test]
    fn parse_integer_reply_negative() {
        parse_integer_reply(b":-1000\r\n", -1000);
    }

    #[test]
    fn parse_integer_reply_zero() {
        parse_integer_reply(b":0\r\n", 0);
    }

    #[test]
    fn parse_integer_reply_positive_signed() {
        parse_integer_reply(b":+1000\r\n", 1000);
    }

    #[test]
    fn parse_integer_reply_not_a_number() {
        assert!(matches!(
            parse(b":12a\r\n"),
            Err(FrameError::InvalidInteger(ref line)) if line == ":12a"
        ));
    }

    #[test]
    fn parse_bulk_reply() {
        assert_eq!(
            parse(b"$6\r\nfoobar\r\n"),
            Ok(Reply::Bulk(Some(Bytes::from("foobar"))))
        );
    }

    #[test]
    fn parse_bulk_reply_binary() {
        assert_eq!(
            parse(b"$4\r\n\r\n\0\xff\r\n"),
            Ok(Reply::Bulk(Some(Bytes::from_static(b"\r\n\0\xff"))))
        );
    }

    #[test]
    fn empty_bulk_is_not_nil() {
        let empty = parse(b"$0\r\n\r\n").unwrap();
        let nil = parse(b"$-1\r\n").unwrap();

        assert_eq!(empty, Reply::Bulk(Some(Bytes::new())));
        assert_eq!(nil, Reply::Bulk(None));
        assert!(!empty.is_nil());
        assert!(nil.is_nil());
    }

    #[test]
    fn empty_array_is_not_nil() {
        let empty = parse(b"*0\r\n").unwrap();
        let nil = parse(b"*-1\r\n").unwrap();

        assert_eq!(empty, Reply::Array(Some(vec![])));
        assert_eq!(nil, Reply::Array(None));
        assert!(matches!(nil.into_result(), Err(Error::Nil)));
        assert!(matches!(empty.into_result(), Ok(Reply::Array(Some(_)))));
    }

    #[test]
    fn parse_array_reply() {
        assert_eq!(
            parse(b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n"),
            Ok(Reply::Array(Some(vec![
                Reply::Bulk(Some(Bytes::from("hello"))),
                Reply::Bulk(Some(Bytes::from("world"))),
            ])))
        );
    }

    #[test]
    fn parse_array_reply_nested() {
        assert_eq!(
            parse(b"*2\r\n$1\r\na\r\n*1\r\n$1\r\nb\r\n"),
            Ok(Reply::Array(Some(vec![
                Reply::Bulk(Some(Bytes::from("a"))),
                Reply::Array(Some(vec![Reply::Bulk(Some(Bytes::from("b")))])),
            ])))
        );

        assert_eq!(
            parse(b"*2\r\n*3\r\n:1\r\n:2\r\n:3\r\n*2\r\n+Hello\r\n-World\r\n"),
            Ok(Reply::Array(Some(vec![
                Reply::Array(Some(vec![
                    Reply::Integer(1),
                    Reply::Integer(2),
                    Reply::Integer(3)
                ])),
                Reply::Array(Some(vec![
                    Reply::Status("Hello".to_string()),
                    Reply::Error("World".to_string())
                ])),
            ])))
        );
    }

    #[test]
    fn parse_array_reply_nil_in_the_middle() {
        assert_eq!(
            parse(b"*3\r\n$5\r\nhello\r\n$-1\r\n$5\r\nworld\r\n"),
            Ok(Reply::Array(Some(vec![
                Reply::Bulk(Some(Bytes::from("hello"))),
                Reply::Bulk(None),
                Reply::Bulk(Some(Bytes::from("world"))),
            ])))
        );
    }

    #[test]
    fn parse_advances_past_exactly_one_reply() {
        let data = b"$3\r\nfoo\r\n:7\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(
            Reply::parse(&mut cursor),
            Ok(Reply::Bulk(Some(Bytes::from("foo"))))
        );
        assert_eq!(cursor.position(), 9);
        assert_eq!(Reply::parse(&mut cursor), Ok(Reply::Integer(7)));
    }

    #[test]
    fn truncated_replies_never_parse() {
        let fragments: [&[u8]; 6] = [
            b"-ERR bad\r\n",
            b"+OK\r\n",
            b":42\r\n",
            b"$5\r\nhello\r\n",
            b"$-1\r\n",
            b"*2\r\n$1\r\na\r\n*1\r\n$1\r\nb\r\n",
        ];

        for fragment in fragments {
            assert!(parse(fragment).is_ok());
            for cut in 0..fragment.len() {
                assert_eq!(
                    parse(&fragment[..cut]),
                    Err(FrameError::Incomplete),
                    "fragment {:?} cut at {}",
                    fragment.escape_ascii().to_string(),
                    cut
                );
            }
        }
    }

    #[test]
    fn unknown_type_byte_is_a_framing_error() {
        assert_eq!(
            parse(b"%1\r\n"),
            Err(FrameError::InvalidDataType {
                byte: b'%',
                line: "%1".to_string()
            })
        );
    }

    #[test]
    fn empty_line_is_a_framing_error() {
        assert_eq!(parse(b"\r\n"), Err(FrameError::EmptyLine));
    }

    #[test]
    fn negative_lengths_other_than_nil_are_framing_errors() {
        assert!(matches!(
            parse(b"$-2\r\n"),
            Err(FrameError::InvalidLength(_))
        ));
        assert!(matches!(
            parse(b"*-5\r\n"),
            Err(FrameError::InvalidLength(_))
        ));
        assert!(matches!(
            parse(b"$abc\r\n"),
            Err(FrameError::InvalidLength(_))
        ));
    }

    #[test]
    fn bulk_without_terminator_is_a_framing_error() {
        assert_eq!(
            parse(b"$3\r\nfooXY"),
            Err(FrameError::MissingTerminator)
        );
    }

    #[test]
    fn oversized_lengths_are_rejected() {
        let data = b"$1000\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(
            Reply::parse_bounded(&mut cursor, 16),
            Err(FrameError::FrameTooLarge { len: 1000, max: 16 })
        );
    }

    #[test]
    fn overlong_lines_are_rejected() {
        let mut data = vec![b'+'];
        data.resize(MAX_LINE_LEN + 8, b'a');

        assert_eq!(
            parse(&data),
            Err(FrameError::LineTooLong { max: MAX_LINE_LEN })
        );
    }

    #[test]
    fn framing_errors_truncate_the_offending_line() {
        let mut data = vec![b'?'];
        data.resize(500, b'x');
        data.extend_from_slice(CRLF);

        match parse(&data) {
            Err(FrameError::InvalidDataType { line, .. }) => assert_eq!(line.len(), SNIPPET_LEN),
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn parse_array_header_leaves_elements() {
        let data = b"*2\r\n$1\r\na\r\n$1\r\nb\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(
            Reply::parse_array_header(&mut cursor, DEFAULT_MAX_FRAME_SIZE),
            Ok(Some(2))
        );
        assert_eq!(
            Reply::parse(&mut cursor),
            Ok(Reply::Bulk(Some(Bytes::from("a"))))
        );
    }

    #[test]
    fn serialize_matches_wire_format() {
        let reply = Reply::Array(Some(vec![
            Reply::Status("OK".to_string()),
            Reply::Error("ERR no".to_string()),
            Reply::Integer(-3),
            Reply::Bulk(Some(Bytes::from("hi"))),
            Reply::Bulk(None),
            Reply::Array(None),
        ]));

        assert_eq!(
            reply.serialize(),
            b"*6\r\n+OK\r\n-ERR no\r\n:-3\r\n$2\r\nhi\r\n$-1\r\n*-1\r\n".to_vec()
        );
        assert_eq!(parse(&reply.serialize()), Ok(reply));
    }

    #[test]
    fn display_like_redis_cli() {
        let reply = Reply::Array(Some(vec![
            Reply::Bulk(Some(Bytes::from("a"))),
            Reply::Integer(2),
            Reply::Bulk(None),
        ]));

        assert_eq!(reply.to_string(), "1) \"a\"\n2) (integer) 2\n3) (nil)");
        assert_eq!(Reply::Array(Some(vec![])).to_string(), "(empty array)");
        assert_eq!(Reply::Error("ERR x".into()).to_string(), "(error) ERR x");
    }

    #[test]
    fn deep_nesting_is_a_framing_error() {
        let mut data = b"*1\r\n".repeat(200_000);
        data.extend_from_slice(b":1\r\n");

        assert_eq!(parse(&data), Err(FrameError::TooDeep { max: MAX_DEPTH }));
    }

    #[test]
    fn nesting_up_to_the_limit_parses() {
        let mut data = b"*1\r\n".repeat(MAX_DEPTH);
        data.extend_from_slice(b":1\r\n");

        let mut reply = parse(&data).unwrap();
        for _ in 0..MAX_DEPTH {
            reply = reply.into_array().unwrap().remove(0);
        }
        assert_eq!(reply, Reply::Integer(1));
    }

    #[test]
    fn typed_conversions() {
        assert_eq!(Reply::Integer(3).into_integer().unwrap(), 3);
        assert_eq!(Reply::Status("OK".into()).into_status().unwrap(), "OK");
        assert_eq!(
            Reply::Bulk(Some(Bytes::from("-inf"))).into_float().unwrap(),
            f64::NEG_INFINITY
        );
        assert_eq!(Reply::Bulk(None).into_optional_bytes().unwrap(), None);

        assert!(Reply::Bulk(None).into_bytes().unwrap_err().is_nil());
        assert!(matches!(
            Reply::Error("ERR x".into()).into_optional_bytes(),
            Err(Error::Server(_))
        ));
        assert!(matches!(
            Reply::Integer(1).into_bytes(),
            Err(Error::UnexpectedReply {
                expected: ReplyKind::Bulk,
                actual: ReplyKind::Integer
            })
        ));
        assert!(matches!(
            Reply::Bulk(Some(Bytes::from("abc"))).into_float(),
            Err(Error::InvalidValue(_))
        ));
        assert_eq!(
            Reply::Status("OK".into()).into_integer().unwrap_err().to_string(),
            "unexpected reply; expected integer, got status"
        );
    }
}
