use std::io;

use thiserror::Error as ThisError;

use crate::frame::{FrameError, ReplyKind};

/// Everything a call can fail with.
///
/// [`Error::Nil`] is not a failure: the server answered with its nil marker, meaning the
/// value asked for does not exist. Test for it with [`Error::is_nil`] or by matching the
/// variant.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("nil reply")]
    Nil,
    /// The server rejected the command and said why.
    #[error("{0}")]
    Server(String),
    #[error("i/o error; {0}")]
    Io(#[from] io::Error),
    #[error("protocol error; {0}")]
    Frame(#[from] FrameError),
    /// A complete reply of the wrong shape; the reply itself was fully consumed.
    #[error("unexpected reply; expected {expected}, got {actual}")]
    UnexpectedReply {
        expected: ReplyKind,
        actual: ReplyKind,
    },
    /// A complete reply whose payload does not convert to the requested type.
    #[error("invalid reply value; {0}")]
    InvalidValue(String),
    #[error("invalid argument; {0}")]
    InvalidArgument(String),
    #[error("pool error; {0}")]
    Pool(#[from] PoolError),
    /// The invocation context was cancelled while the request was in flight.
    #[error("request canceled")]
    Canceled,
}

/// Failures to obtain a connection, kept apart from failures on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum PoolError {
    #[error("timed out waiting for a free connection")]
    Timeout,
    #[error("canceled while waiting for a free connection")]
    Canceled,
    #[error("connection pool is closed")]
    Closed,
}

impl Error {
    pub fn is_nil(&self) -> bool {
        matches!(self, Error::Nil)
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Pool(PoolError::Timeout) => true,
            Error::Io(err) => err.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Whether the connection that produced this error has to be thrown away.
    ///
    /// Transport and framing failures leave the read position in the byte stream unknown, and a
    /// cancelled request may have stopped halfway through a reply. Server errors, nil replies
    /// and shape mismatches all arrive as complete frames, so the connection stays usable.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            Error::Io(_) | Error::Frame(_) | Error::Canceled => true,
            Error::Nil
            | Error::Server(_)
            | Error::UnexpectedReply { .. }
            | Error::InvalidValue(_)
            | Error::InvalidArgument(_)
            | Error::Pool(_) => false,
        }
    }
}

pub(crate) fn unexpected(expected: ReplyKind, actual: ReplyKind) -> Error {
    Error::UnexpectedReply { expected, actual }
}
