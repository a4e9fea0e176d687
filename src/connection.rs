use std::future::Future;
use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

use crate::codec::{ArrayHeader, RespCodec};
use crate::error::unexpected;
use crate::frame::{Reply, ReplyKind, DEFAULT_MAX_FRAME_SIZE, PREALLOC_LIMIT};
use crate::request::Request;
use crate::{Error, Result};

/// One transport plus the buffers and codec that frame it.
///
/// Exactly one request/reply cycle runs on a connection at a time: write with [`encode`], send
/// with [`flush`], then read the reply with one of the `read_*` methods.
///
/// [`encode`]: Connection::encode
/// [`flush`]: Connection::flush
pub struct Connection<T = TcpStream> {
    pub id: Uuid,
    stream: T,
    // Data is read from the socket into the read buffer. When a reply is parsed, the
    // corresponding data is removed from the buffer.
    read_buf: BytesMut,
    // Encoded requests wait here until flushed.
    write_buf: BytesMut,
    codec: RespCodec,
    // Applies to every read and write until rebound.
    deadline: Option<Instant>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: T) -> Connection<T> {
        Self::with_max_frame_size(stream, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(stream: T, max_frame_size: usize) -> Connection<T> {
        Connection {
            id: Uuid::new_v4(),
            stream,
            // Allocate the buffers with 4kb of capacity.
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            codec: RespCodec::new(max_frame_size),
            deadline: None,
        }
    }

    /// Binds the deadline for all following reads and writes. `None` removes it.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Buffers the request; nothing is sent until [`Connection::flush`].
    pub fn encode(&mut self, request: &Request) -> Result<()> {
        self.codec.encode(request, &mut self.write_buf)
    }

    /// Writes every buffered request to the transport.
    pub async fn flush(&mut self) -> Result<()> {
        let deadline = self.deadline;
        let result = with_deadline(deadline, async {
            self.stream.write_all(&self.write_buf).await?;
            self.stream.flush().await
        })
        .await;

        self.write_buf.clear();
        result.map_err(Error::from)
    }

    /// Encodes and flushes in one go.
    pub async fn send(&mut self, request: &Request) -> Result<()> {
        self.encode(request)?;
        self.flush().await
    }

    /// Reads one complete reply, keeping nil markers and server errors as values.
    ///
    /// Each read that leaves the reply incomplete reparses it from its first byte, so a large
    /// array arriving in many chunks costs time quadratic in the chunk count. Stream those with
    /// [`Connection::read_array`] instead.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        loop {
            if let Some(reply) = self.codec.decode(&mut self.read_buf)? {
                return Ok(reply);
            }
            self.fill_read_buf().await?;
        }
    }

    /// Reads any reply, raising server errors and a top level nil as errors.
    pub async fn read_value(&mut self) -> Result<Reply> {
        self.read_reply().await?.into_result()
    }

    pub async fn read_int(&mut self) -> Result<i64> {
        self.read_reply().await?.into_integer()
    }

    /// Reads a status reply, or a bulk reply as text.
    pub async fn read_status(&mut self) -> Result<String> {
        self.read_reply().await?.into_status()
    }

    pub async fn read_bytes(&mut self) -> Result<Bytes> {
        self.read_reply().await?.into_bytes()
    }

    /// Reads a bulk or status reply holding a float, parsing the raw bytes in place.
    pub async fn read_float(&mut self) -> Result<f64> {
        self.read_reply().await?.into_float()
    }

    /// Reads a bulk reply holding a decimal integer.
    pub async fn read_int_bytes(&mut self) -> Result<i64> {
        let bytes = self.read_bytes().await?;
        crate::frame::parse_integer(&bytes).ok_or_else(|| {
            Error::InvalidValue(format!("{:?} is not an integer", bytes.escape_ascii().to_string()))
        })
    }

    /// Reads only the header of an array reply and returns its length.
    ///
    /// The elements stay on the wire; the caller reads exactly that many replies next. A reply
    /// that is not an array is read in full before the error is returned.
    pub async fn read_array_len(&mut self) -> Result<usize> {
        loop {
            match self.codec.decode_array_header(&mut self.read_buf)? {
                Some(ArrayHeader::Count(Some(len))) => return Ok(len),
                Some(ArrayHeader::Count(None)) => return Err(Error::Nil),
                Some(ArrayHeader::Other) => {
                    let reply = self.read_value().await?;
                    return Err(unexpected(ReplyKind::Array, reply.kind()));
                }
                None => self.fill_read_buf().await?,
            }
        }
    }

    /// Reads a bulk reply, mapping the nil marker to `None`.
    pub async fn read_optional_bytes(&mut self) -> Result<Option<Bytes>> {
        self.read_reply().await?.into_optional_bytes()
    }

    /// Streams an array reply, converting each element with `convert`.
    ///
    /// Every element is read off the wire even when one fails to convert; the first conversion
    /// error is returned once the whole array is consumed, so the connection stays aligned.
    pub async fn read_array<R, F>(&mut self, mut convert: F) -> Result<Vec<R>>
    where
        F: FnMut(Reply) -> Result<R>,
    {
        let len = self.read_array_len().await?;
        let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));

        self.read_elements(len, |reply| {
            items.push(convert(reply)?);
            Ok(())
        })
        .await?;

        Ok(items)
    }

    /// Streams an array reply of alternating elements, such as field/value or member/score
    /// lists. An odd element count is an [`Error::InvalidValue`], raised after the whole array
    /// is consumed.
    pub async fn read_pairs<A, B, F, G>(&mut self, mut first: F, mut second: G) -> Result<Vec<(A, B)>>
    where
        F: FnMut(Reply) -> Result<A>,
        G: FnMut(Reply) -> Result<B>,
    {
        let len = self.read_array_len().await?;
        let mut pairs = Vec::with_capacity((len / 2).min(PREALLOC_LIMIT));
        let mut pending = None;

        self.read_elements(len, |reply| {
            match pending.take() {
                None => pending = Some(first(reply)?),
                Some(a) => pairs.push((a, second(reply)?)),
            }
            Ok(())
        })
        .await?;

        if pending.is_some() {
            return Err(Error::InvalidValue(format!(
                "expected pairs, got {} elements",
                len
            )));
        }
        Ok(pairs)
    }

    // Reads exactly `len` replies. After the first error from `each` the remaining replies are
    // still read and dropped; only a transport or framing failure stops early, and those are
    // connection fatal.
    async fn read_elements<F>(&mut self, len: usize, mut each: F) -> Result<()>
    where
        F: FnMut(Reply) -> Result<()>,
    {
        let mut failed = None;
        for _ in 0..len {
            let reply = self.read_reply().await?;
            if failed.is_none() {
                failed = each(reply).err();
            }
        }

        match failed {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(Error::from)
    }

    async fn fill_read_buf(&mut self) -> Result<()> {
        let deadline = self.deadline;
        let read = with_deadline(deadline, self.stream.read_buf(&mut self.read_buf)).await?;

        // The peer closed the stream halfway through a reply.
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the reply was complete",
            )
            .into());
        }
        Ok(())
    }
}

async fn with_deadline<F, O>(deadline: Option<Instant>, io: F) -> io::Result<O>
where
    F: Future<Output = io::Result<O>>,
{
    match deadline {
        Some(deadline) => match timeout_at(deadline, io).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "i/o deadline exceeded",
            )),
        },
        None => io.await,
    }
}
