use crate::client::Client;
use crate::context::Context;
use crate::pool::Dial;
use crate::request::cmd;
use crate::Result;

impl<D: Dial> Client<D> {
    /// Returns the server's answer, normally `PONG`.
    pub async fn ping(&self, ctx: &Context) -> Result<String> {
        self.call_status(ctx, cmd("ping")).await
    }

    /// Deletes every key of every database.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/flushall/>
    pub async fn flush_all(&self, ctx: &Context) -> Result<()> {
        self.call_status(ctx, cmd("flushall")).await?;
        Ok(())
    }
}
