use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use itertools::Itertools;

/// A single command argument.
///
/// Every variant goes out as a length-prefixed bulk string; only the rendered bytes reach the
/// wire, the variant itself is not preserved.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Text(String),
    Bytes(Bytes),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    /// Sent as an empty bulk string. Requests never carry the `$-1` nil marker.
    Nil,
}

impl Arg {
    /// The exact bytes this argument occupies on the wire.
    pub fn render(&self) -> Cow<'_, [u8]> {
        match self {
            Arg::Text(s) => Cow::Borrowed(s.as_bytes()),
            Arg::Bytes(bytes) => Cow::Borrowed(&bytes[..]),
            Arg::Integer(i) => Cow::Owned(i.to_string().into_bytes()),
            Arg::Unsigned(u) => Cow::Owned(u.to_string().into_bytes()),
            // `Display` for floats is the shortest decimal that round-trips.
            Arg::Float(f) => Cow::Owned(f.to_string().into_bytes()),
            Arg::Bool(true) => Cow::Borrowed(b"1"),
            Arg::Bool(false) => Cow::Borrowed(b"0"),
            Arg::Nil => Cow::Borrowed(b""),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.render()))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Text(s.clone())
    }
}

impl From<&[u8]> for Arg {
    fn from(bytes: &[u8]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl<const N: usize> From<&[u8; N]> for Arg {
    fn from(bytes: &[u8; N]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for Arg {
    fn from(bytes: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for Arg {
    fn from(bytes: Bytes) -> Self {
        Arg::Bytes(bytes)
    }
}

impl From<&Bytes> for Arg {
    fn from(bytes: &Bytes) -> Self {
        Arg::Bytes(bytes.clone())
    }
}

macro_rules! integer_arg {
    ($variant:ident: $target:ty => $($source:ty),+) => {
        $(
            impl From<$source> for Arg {
                fn from(value: $source) -> Self {
                    Arg::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

integer_arg!(Integer: i64 => i8, i16, i32, i64);
integer_arg!(Unsigned: u64 => u8, u16, u32, u64);

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::Unsigned(value as u64)
    }
}

impl From<isize> for Arg {
    fn from(value: isize) -> Self {
        Arg::Integer(value as i64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Arg::Float(f64::from(value))
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Nil, Into::into)
    }
}

/// An ordered argument list, fixed once it is handed to the executor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    args: Vec<Arg>,
}

/// Starts a request with the command name as its first argument.
pub fn cmd(name: impl Into<Arg>) -> Request {
    Request::new().arg(name)
}

impl Request {
    pub fn new() -> Request {
        Request { args: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Request {
        Request {
            args: Vec::with_capacity(capacity),
        }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.args.push(arg.into());
    }

    pub fn as_slice(&self) -> &[Arg] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Lowercased command name, used to label spans.
    pub fn name(&self) -> String {
        self.args
            .first()
            .map(|arg| arg.to_string().to_lowercase())
            .unwrap_or_default()
    }
}

impl<A: Into<Arg>> FromIterator<A> for Request {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Request::new().args(iter)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.iter().join(" "))
    }
}
