use bytes::Bytes;

use crate::client::Client;
use crate::context::Context;
use crate::pool::Dial;
use crate::request::{cmd, Arg};
use crate::Result;

impl<D: Dial> Client<D> {
    /// Returns how many members were new.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/sadd/>
    pub async fn sadd<M: Into<Arg>>(&self, ctx: &Context, key: &str, members: Vec<M>) -> Result<i64> {
        self.call_int(ctx, cmd("sadd").arg(key).args(members)).await
    }

    pub async fn scard(&self, ctx: &Context, key: &str) -> Result<i64> {
        self.call_int(ctx, cmd("scard").arg(key)).await
    }

    pub async fn sismember(&self, ctx: &Context, key: &str, member: impl Into<Arg>) -> Result<bool> {
        self.call_bool(ctx, cmd("sismember").arg(key).arg(member))
            .await
    }

    /// Ref: <https://redis.io/docs/latest/commands/smembers/>
    pub async fn smembers(&self, ctx: &Context, key: &str) -> Result<Vec<Bytes>> {
        self.call_bytes_array(ctx, cmd("smembers").arg(key)).await
    }

    /// Removes and returns up to `count` random members.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/spop/>
    pub async fn spop(&self, ctx: &Context, key: &str, count: u64) -> Result<Vec<Bytes>> {
        self.call_bytes_array(ctx, cmd("spop").arg(key).arg(count))
            .await
    }

    /// Returns how many members were removed.
    pub async fn srem<M: Into<Arg>>(&self, ctx: &Context, key: &str, members: Vec<M>) -> Result<i64> {
        self.call_int(ctx, cmd("srem").arg(key).args(members)).await
    }
}
