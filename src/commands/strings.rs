use std::time::Duration;

use bytes::Bytes;

use crate::client::Client;
use crate::context::Context;
use crate::frame::Reply;
use crate::pool::Dial;
use crate::request::{cmd, Arg, Request};
use crate::{Error, Result};

/// When a write is allowed to happen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetCondition {
    #[default]
    Always,
    /// Only when the key (or member) does not exist yet, `NX`.
    IfAbsent,
    /// Only when the key (or member) already exists, `XX`.
    IfPresent,
}

impl SetCondition {
    pub(crate) fn flag(self) -> Option<&'static str> {
        match self {
            SetCondition::Always => None,
            SetCondition::IfAbsent => Some("NX"),
            SetCondition::IfPresent => Some("XX"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Sent as `EX` seconds when whole, `PX` milliseconds otherwise. Zero means no expiry.
    pub ttl: Option<Duration>,
    pub condition: SetCondition,
}

impl<D: Dial> Client<D> {
    /// Ref: <https://redis.io/docs/latest/commands/append/>
    pub async fn append(&self, ctx: &Context, key: &str, value: impl Into<Arg>) -> Result<i64> {
        self.call_int(ctx, cmd("append").arg(key).arg(value)).await
    }

    /// Counts set bits in the whole value, or between a start and an end byte index. Both
    /// indexes or neither must be given.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/bitcount/>
    pub async fn bit_count(&self, ctx: &Context, key: &str, range: &[i64]) -> Result<i64> {
        if !matches!(range.len(), 0 | 2) {
            return Err(Error::InvalidArgument(
                "bitcount takes both a start and an end index, or neither".to_string(),
            ));
        }
        self.call_int(ctx, cmd("bitcount").arg(key).args(range.iter().copied()))
            .await
    }

    pub async fn decr(&self, ctx: &Context, key: &str) -> Result<i64> {
        self.decr_by(ctx, key, 1).await
    }

    /// Sent as `INCRBY` with the negated amount.
    pub async fn decr_by(&self, ctx: &Context, key: &str, by: i64) -> Result<i64> {
        let by = by
            .checked_neg()
            .ok_or_else(|| Error::InvalidArgument(format!("cannot decrement by {}", by)))?;
        self.incr_by(ctx, key, by).await
    }

    /// Returns [`Error::Nil`] when the key does not exist.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/get/>
    pub async fn get(&self, ctx: &Context, key: &str) -> Result<Bytes> {
        self.call_bytes(ctx, cmd("get").arg(key)).await
    }

    /// Like [`Client::get`], parsing the value as a decimal integer.
    pub async fn get_int(&self, ctx: &Context, key: &str) -> Result<i64> {
        self.execute(ctx, cmd("get").arg(key), |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_int_bytes().await
            })
        })
        .await
    }

    /// Ref: <https://redis.io/docs/latest/commands/getrange/>
    pub async fn get_range(&self, ctx: &Context, key: &str, start: i64, end: i64) -> Result<Bytes> {
        self.call_bytes(ctx, cmd("getrange").arg(key).arg(start).arg(end))
            .await
    }

    /// Sets a new value and returns the old one, `None` if there was none.
    pub async fn get_set(
        &self,
        ctx: &Context,
        key: &str,
        value: impl Into<Arg>,
    ) -> Result<Option<Bytes>> {
        self.execute(ctx, cmd("getset").arg(key).arg(value), |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_optional_bytes().await
            })
        })
        .await
    }

    pub async fn incr(&self, ctx: &Context, key: &str) -> Result<i64> {
        self.incr_by(ctx, key, 1).await
    }

    /// Ref: <https://redis.io/docs/latest/commands/incrby/>
    pub async fn incr_by(&self, ctx: &Context, key: &str, by: i64) -> Result<i64> {
        self.call_int(ctx, cmd("incrby").arg(key).arg(by)).await
    }

    pub async fn incr_by_float(&self, ctx: &Context, key: &str, by: f64) -> Result<f64> {
        self.call_float(ctx, cmd("incrbyfloat").arg(key).arg(by))
            .await
    }

    /// Values come back in key order; keys that do not exist are `None`.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/mget/>
    pub async fn mget(&self, ctx: &Context, keys: &[&str]) -> Result<Vec<Option<Bytes>>> {
        let request = cmd("mget").args(keys.iter().copied());

        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_array(Reply::into_optional_bytes).await
            })
        })
        .await
    }

    /// Ref: <https://redis.io/docs/latest/commands/mset/>
    pub async fn mset<V: Into<Arg>>(&self, ctx: &Context, items: Vec<(&str, V)>) -> Result<()> {
        self.call_status(ctx, pairs("mset", items)).await?;
        Ok(())
    }

    /// Sets every key or none of them; `false` when any key already existed.
    pub async fn mset_nx<V: Into<Arg>>(
        &self,
        ctx: &Context,
        items: Vec<(&str, V)>,
    ) -> Result<bool> {
        self.call_bool(ctx, pairs("msetnx", items)).await
    }

    pub async fn set(&self, ctx: &Context, key: &str, value: impl Into<Arg>) -> Result<()> {
        self.set_with(ctx, key, value, SetOptions::default()).await
    }

    /// Returns [`Error::Nil`] when `options.condition` was not met and nothing was written.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/set/>
    pub async fn set_with(
        &self,
        ctx: &Context,
        key: &str,
        value: impl Into<Arg>,
        options: SetOptions,
    ) -> Result<()> {
        let mut request = cmd("set").arg(key).arg(value);

        match options.ttl {
            Some(ttl) if ttl.is_zero() => {}
            Some(ttl) if ttl.subsec_nanos() == 0 => {
                request.push("EX");
                request.push(ttl.as_secs());
            }
            Some(ttl) => {
                request.push("PX");
                request.push(ttl.as_millis().max(1) as u64);
            }
            None => {}
        }
        if let Some(flag) = options.condition.flag() {
            request.push(flag);
        }

        self.call_status(ctx, request).await?;
        Ok(())
    }

    /// Returns the length of the value after the write.
    pub async fn set_range(
        &self,
        ctx: &Context,
        key: &str,
        offset: u64,
        value: impl Into<Arg>,
    ) -> Result<i64> {
        self.call_int(ctx, cmd("setrange").arg(key).arg(offset).arg(value))
            .await
    }

    pub async fn str_len(&self, ctx: &Context, key: &str) -> Result<i64> {
        self.call_int(ctx, cmd("strlen").arg(key)).await
    }
}

fn pairs<V: Into<Arg>>(name: &str, items: Vec<(&str, V)>) -> Request {
    let mut request = Request::with_capacity(1 + items.len() * 2).arg(name);
    for (key, value) in items {
        request.push(key);
        request.push(value);
    }
    request
}
