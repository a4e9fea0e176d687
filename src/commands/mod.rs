//! Typed wrappers for the commands this client knows the reply shape of.
//!
//! Every wrapper builds a [`Request`], runs it through [`Client::execute`] and reads the reply
//! with the matching typed reader, so errors come back exactly as the executor classified them.

pub mod hashes;
pub mod keys;
pub mod scripting;
pub mod server;
pub mod sets;
pub mod sorted_sets;
pub mod strings;

use bytes::Bytes;

use crate::client::Client;
use crate::context::Context;
use crate::frame::Reply;
use crate::pool::Dial;
use crate::request::Request;
use crate::Result;

pub use keys::Ttl;
pub use sorted_sets::{ZAddFlags, ZSetValue};
pub use strings::{SetCondition, SetOptions};

// One helper per reply shape; each sends the request and reads exactly one reply.
impl<D: Dial> Client<D> {
    pub(crate) async fn call_int(&self, ctx: &Context, request: Request) -> Result<i64> {
        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_int().await
            })
        })
        .await
    }

    // Integer replies that are really flags: 1 is true, anything else false.
    pub(crate) async fn call_bool(&self, ctx: &Context, request: Request) -> Result<bool> {
        Ok(self.call_int(ctx, request).await? == 1)
    }

    pub(crate) async fn call_status(&self, ctx: &Context, request: Request) -> Result<String> {
        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_status().await
            })
        })
        .await
    }

    pub(crate) async fn call_bytes(&self, ctx: &Context, request: Request) -> Result<Bytes> {
        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_bytes().await
            })
        })
        .await
    }

    pub(crate) async fn call_float(&self, ctx: &Context, request: Request) -> Result<f64> {
        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_float().await
            })
        })
        .await
    }

    pub(crate) async fn call_value(&self, ctx: &Context, request: Request) -> Result<Reply> {
        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_value().await
            })
        })
        .await
    }

    // Arrays of bulk strings, read element by element.
    pub(crate) async fn call_bytes_array(
        &self,
        ctx: &Context,
        request: Request,
    ) -> Result<Vec<Bytes>> {
        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_array(Reply::into_bytes).await
            })
        })
        .await
    }
}
