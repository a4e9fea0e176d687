use std::collections::HashMap;

use bytes::Bytes;

use crate::client::Client;
use crate::context::Context;
use crate::frame::Reply;
use crate::pool::Dial;
use crate::request::{cmd, Arg};
use crate::Result;

impl<D: Dial> Client<D> {
    /// Returns `true` when the field is new.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/hset/>
    pub async fn hset(
        &self,
        ctx: &Context,
        key: &str,
        field: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<bool> {
        self.call_bool(ctx, cmd("hset").arg(key).arg(field).arg(value))
            .await
    }

    /// Returns [`crate::Error::Nil`] when the key or the field does not exist.
    pub async fn hget(&self, ctx: &Context, key: &str, field: impl Into<Arg>) -> Result<Bytes> {
        self.call_bytes(ctx, cmd("hget").arg(key).arg(field)).await
    }

    /// Every field and value of the hash; empty when the key does not exist.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/hgetall/>
    pub async fn hgetall(&self, ctx: &Context, key: &str) -> Result<HashMap<Bytes, Bytes>> {
        self.execute(ctx, cmd("hgetall").arg(key), |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;

                let pairs = conn.read_pairs(Reply::into_bytes, Reply::into_bytes).await?;
                Ok(pairs.into_iter().collect())
            })
        })
        .await
    }
}
