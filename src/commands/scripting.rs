use crate::client::Client;
use crate::context::Context;
use crate::frame::Reply;
use crate::pool::Dial;
use crate::request::{Arg, Request};
use crate::Result;

impl<D: Dial> Client<D> {
    /// Runs a Lua script and returns its reply as is. A script error comes back as a server
    /// error, a nil result as [`crate::Error::Nil`].
    ///
    /// Ref: <https://redis.io/docs/latest/commands/eval/>
    pub async fn eval<A: Into<Arg>>(
        &self,
        ctx: &Context,
        script: &str,
        keys: &[&str],
        args: Vec<A>,
    ) -> Result<Reply> {
        let request = Request::with_capacity(3 + keys.len() + args.len())
            .arg("eval")
            .arg(script)
            .arg(keys.len())
            .args(keys.iter().copied())
            .args(args);

        self.call_value(ctx, request).await
    }
}
