use std::time::Duration;

use bytes::Bytes;

use crate::client::Client;
use crate::context::Context;
use crate::pool::Dial;
use crate::request::cmd;
use crate::{Error, Result};

/// Remaining time to live of an existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key exists but never expires.
    NoExpiry,
    Expires(Duration),
}

impl<D: Dial> Client<D> {
    /// Returns how many of `keys` existed.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/del/>
    pub async fn del(&self, ctx: &Context, keys: &[&str]) -> Result<i64> {
        self.call_int(ctx, cmd("del").args(keys.iter().copied())).await
    }

    /// Serialized value of `key`, suitable for [`Client::restore`].
    pub async fn dump(&self, ctx: &Context, key: &str) -> Result<Bytes> {
        self.call_bytes(ctx, cmd("dump").arg(key)).await
    }

    pub async fn exists(&self, ctx: &Context, key: &str) -> Result<bool> {
        self.call_bool(ctx, cmd("exists").arg(key)).await
    }

    /// `false` when the key does not exist. The timeout is sent in whole seconds.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/expire/>
    pub async fn expire(&self, ctx: &Context, key: &str, timeout: Duration) -> Result<bool> {
        self.call_bool(ctx, cmd("expire").arg(key).arg(timeout.as_secs()))
            .await
    }

    /// Recreates a key from a [`Client::dump`] payload, without expiry.
    pub async fn restore(&self, ctx: &Context, key: &str, payload: Bytes) -> Result<()> {
        self.restore_ex(ctx, key, Duration::ZERO, payload).await
    }

    /// Recreates a key from a [`Client::dump`] payload. A zero `ttl` means no expiry.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/restore/>
    pub async fn restore_ex(
        &self,
        ctx: &Context,
        key: &str,
        ttl: Duration,
        payload: Bytes,
    ) -> Result<()> {
        let millis = u64::try_from(ttl.as_millis())
            .map_err(|_| Error::InvalidArgument(format!("ttl {:?} is too large", ttl)))?;

        self.call_status(ctx, cmd("restore").arg(key).arg(millis).arg(payload))
            .await?;
        Ok(())
    }

    /// Returns [`Error::Nil`] when the key does not exist.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/ttl/>
    pub async fn ttl(&self, ctx: &Context, key: &str) -> Result<Ttl> {
        match self.call_int(ctx, cmd("ttl").arg(key)).await? {
            -2 => Err(Error::Nil),
            -1 => Ok(Ttl::NoExpiry),
            secs if secs >= 0 => Ok(Ttl::Expires(Duration::from_secs(secs as u64))),
            other => Err(Error::InvalidValue(format!("negative ttl {}", other))),
        }
    }
}
