use bytes::{Buf, BufMut, BytesMut};
use std::env;
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{FrameError, Reply, ReplyKind, CRLF, DEFAULT_MAX_FRAME_SIZE};
use crate::request::Request;
use crate::Error;

/// Outcome of looking for an array header at the front of the read buffer.
#[derive(Debug, PartialEq)]
pub enum ArrayHeader {
    /// `*<count>`; `None` is the nil array. The header line has been consumed.
    Count(Option<usize>),
    /// The next reply is not an array. Nothing has been consumed.
    Other,
}

/// Encodes requests and decodes replies for one connection.
#[derive(Debug, Clone)]
pub struct RespCodec {
    max_frame_size: usize,
}

impl RespCodec {
    pub fn new(max_frame_size: usize) -> RespCodec {
        RespCodec { max_frame_size }
    }

    /// Frame limit taken from `MAX_FRAME_SIZE`, falling back to 512 MiB.
    pub fn max_frame_size_from_env() -> usize {
        env::var("MAX_FRAME_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Consumes an array header, and only the header, when the buffered reply is an array.
    pub fn decode_array_header(&mut self, src: &mut BytesMut) -> Result<Option<ArrayHeader>, Error> {
        match src.first() {
            None => return Ok(None),
            Some(&byte) if byte != u8::from(ReplyKind::Array) => return Ok(Some(ArrayHeader::Other)),
            Some(_) => {}
        }

        let mut cursor = Cursor::new(&src[..]);
        let count = match Reply::parse_array_header(&mut cursor, self.max_frame_size) {
            Ok(count) => count,
            Err(FrameError::Incomplete) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let position = cursor.position() as usize;
        src.advance(position);

        Ok(Some(ArrayHeader::Count(count)))
    }
}

impl Default for RespCodec {
    fn default() -> Self {
        RespCodec::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for RespCodec {
    type Item = Reply;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut cursor = Cursor::new(&src[..]);
        let reply = match Reply::parse_bounded(&mut cursor, self.max_frame_size) {
            Ok(reply) => reply,
            Err(FrameError::Incomplete) => return Ok(None), // Not enough data to parse a reply.
            Err(err) => return Err(err.into()),
        };

        // The cursor never moves past the end of `src`, so the cast is lossless.
        let position = cursor.position() as usize;

        // Remove the parsed reply from the buffer.
        src.advance(position);

        Ok(Some(reply))
    }
}

// *<argc>\r\n ( $<len>\r\n<arg>\r\n ) x argc
impl Encoder<&Request> for RespCodec {
    type Error = Error;

    fn encode(&mut self, request: &Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_header(dst, ReplyKind::Array, request.len());
        for arg in request.as_slice() {
            let rendered = arg.render();
            put_header(dst, ReplyKind::Bulk, rendered.len());
            dst.put_slice(&rendered);
            dst.put_slice(CRLF);
        }
        Ok(())
    }
}

fn put_header(dst: &mut BytesMut, kind: ReplyKind, len: usize) {
    dst.put_u8(u8::from(kind));
    dst.put_slice(len.to_string().as_bytes());
    dst.put_slice(CRLF);
}
