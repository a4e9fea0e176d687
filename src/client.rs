use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, field, instrument, warn, Span};

use crate::codec::RespCodec;
use crate::connection::Connection;
use crate::context::Context;
use crate::frame::Reply;
use crate::pool::{Dial, Pool, PoolConfig, PoolStats, TcpDialer};
use crate::request::Request;
use crate::{Error, Result};

/// Runs before a command is sent. The returned context replaces the caller's for the rest of
/// the call, which lets the hook attach a span or tighten the deadline.
pub type PreCmdHook = Arc<dyn Fn(Context, &Request) -> Context + Send + Sync>;

/// Runs after every call with the context the call ran under and the error it failed with.
pub type PostCmdHook = Arc<dyn Fn(&Context, Option<&Error>) + Send + Sync>;

#[derive(Clone)]
pub struct Options {
    /// `host:port` of the server.
    pub address: String,
    pub pool_size: usize,
    pub min_idle_conns: usize,
    pub max_conn_age: Option<Duration>,
    pub pool_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub idle_check_frequency: Option<Duration>,
    /// Largest bulk value or array accepted from the server.
    pub max_frame_size: usize,
    pub on_pre_cmd: Option<PreCmdHook>,
    pub on_post_cmd: Option<PostCmdHook>,
}

impl Options {
    pub fn new(address: impl Into<String>) -> Options {
        Options {
            address: address.into(),
            ..Options::default()
        }
    }

    fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            pool_size: self.pool_size,
            min_idle_conns: self.min_idle_conns,
            max_conn_age: self.max_conn_age,
            pool_timeout: self.pool_timeout,
            idle_timeout: self.idle_timeout,
            idle_check_frequency: self.idle_check_frequency,
            max_frame_size: self.max_frame_size,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        let pool = PoolConfig::default();

        Options {
            address: "127.0.0.1:6379".to_string(),
            pool_size: pool.pool_size,
            min_idle_conns: pool.min_idle_conns,
            max_conn_age: pool.max_conn_age,
            pool_timeout: pool.pool_timeout,
            idle_timeout: pool.idle_timeout,
            idle_check_frequency: pool.idle_check_frequency,
            max_frame_size: RespCodec::max_frame_size_from_env(),
            on_pre_cmd: None,
            on_post_cmd: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("address", &self.address)
            .field("pool_size", &self.pool_size)
            .field("min_idle_conns", &self.min_idle_conns)
            .field("max_conn_age", &self.max_conn_age)
            .field("pool_timeout", &self.pool_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("idle_check_frequency", &self.idle_check_frequency)
            .field("max_frame_size", &self.max_frame_size)
            .field("on_pre_cmd", &self.on_pre_cmd.is_some())
            .field("on_post_cmd", &self.on_post_cmd.is_some())
            .finish()
    }
}

/// A pooled client. Clones share the pool.
pub struct Client<D: Dial = TcpDialer> {
    pool: Pool<D>,
    on_pre_cmd: Option<PreCmdHook>,
    on_post_cmd: Option<PostCmdHook>,
}

impl<D: Dial> Clone for Client<D> {
    fn clone(&self) -> Self {
        Client {
            pool: self.pool.clone(),
            on_pre_cmd: self.on_pre_cmd.clone(),
            on_post_cmd: self.on_post_cmd.clone(),
        }
    }
}

impl Client<TcpDialer> {
    /// Creates a client for `options.address`. No connection is opened until the first call,
    /// unless `min_idle_conns` asks for some up front.
    pub fn new(options: Options) -> Client<TcpDialer> {
        let dialer = TcpDialer::new(options.address.clone());
        Client::with_dialer(dialer, options)
    }
}

impl<D: Dial> Client<D> {
    /// Creates a client that opens its transports through `dialer`. `options.address` is
    /// ignored.
    pub fn with_dialer(dialer: D, options: Options) -> Client<D> {
        Client {
            pool: Pool::new(dialer, options.pool_config()),
            on_pre_cmd: options.on_pre_cmd,
            on_post_cmd: options.on_post_cmd,
        }
    }

    /// Runs one request/reply cycle on a pooled connection.
    ///
    /// `step` gets exclusive use of the connection and is expected to send `request` and read
    /// its reply. The connection's I/O deadline is bound to the context deadline before the step
    /// runs, and the step is abandoned as soon as the context is cancelled. Afterwards the
    /// connection goes back to the pool, unless the error the step failed with leaves its byte
    /// stream in an unknown state, in which case it is closed.
    ///
    /// Nothing is retried: the error of the single attempt is returned as is.
    pub async fn execute<R, F>(&self, ctx: &Context, request: Request, step: F) -> Result<R>
    where
        F: for<'c> FnOnce(&'c mut Connection<D::Transport>, &'c Request) -> BoxFuture<'c, Result<R>>,
    {
        let ctx = match &self.on_pre_cmd {
            Some(hook) => hook(ctx.clone(), &request),
            None => ctx.clone(),
        };

        let result = self.cycle(&ctx, &request, step).await;

        if let Some(hook) = &self.on_post_cmd {
            hook(&ctx, result.as_ref().err());
        }

        result
    }

    #[instrument(
        name = "command",
        parent = ctx.span(),
        skip_all,
        fields(command = %request.name(), connection_id = field::Empty)
    )]
    async fn cycle<R, F>(&self, ctx: &Context, request: &Request, step: F) -> Result<R>
    where
        F: for<'c> FnOnce(&'c mut Connection<D::Transport>, &'c Request) -> BoxFuture<'c, Result<R>>,
    {
        let mut conn = self.pool.acquire(ctx).await?;
        Span::current().record("connection_id", field::display(conn.id));

        // A reused connection must not keep the deadline of its previous call.
        conn.set_deadline(ctx.deadline());

        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Canceled),
            result = step(&mut *conn, request) => result,
        };

        match &result {
            Err(err) if err.is_connection_fatal() => {
                warn!("discarding connection after error: {}", err);
                self.pool.discard(conn);
            }
            _ => {
                debug!("releasing connection");
                self.pool.release(conn);
            }
        }

        result
    }

    /// Sends a raw request and returns whatever the server replied, server errors and nil
    /// markers included.
    pub async fn query(&self, ctx: &Context, request: Request) -> Result<Reply> {
        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;
                conn.read_reply().await
            })
        })
        .await
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Closes the pool. Calls in flight finish; later calls fail with a pool error.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoolError;
    use crate::request::cmd;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    // Every dialed transport is answered by a task that replies to each request with the next
    // canned reply, then stops reading.
    #[derive(Clone)]
    struct ScriptedDialer {
        replies: Arc<Mutex<Vec<&'static [u8]>>>,
        dials: Arc<AtomicUsize>,
    }

    impl ScriptedDialer {
        fn new(replies: &[&'static [u8]]) -> ScriptedDialer {
            ScriptedDialer {
                replies: Arc::new(Mutex::new(replies.iter().rev().copied().collect())),
                dials: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Dial for ScriptedDialer {
        type Transport = DuplexStream;

        fn dial(&self) -> BoxFuture<'_, io::Result<DuplexStream>> {
            Box::pin(async move {
                self.dials.fetch_add(1, Ordering::SeqCst);
                let (client, mut server) = duplex(4096);
                let replies = self.replies.clone();

                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = server.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                        let reply = replies.lock().unwrap().pop();
                        match reply {
                            Some(reply) => {
                                if server.write_all(reply).await.is_err() {
                                    break;
                                }
                            }
                            // Out of replies: keep the stream open and silent.
                            None => std::future::pending::<()>().await,
                        }
                    }
                });

                Ok(client)
            })
        }
    }

    fn client(replies: &[&'static [u8]]) -> (Client<ScriptedDialer>, ScriptedDialer) {
        let dialer = ScriptedDialer::new(replies);
        let options = Options {
            pool_size: 1,
            pool_timeout: Duration::from_millis(200),
            ..Options::default()
        };
        (Client::with_dialer(dialer.clone(), options), dialer)
    }

    #[tokio::test]
    async fn query_returns_raw_replies() {
        let (client, _) = client(&[b"+OK\r\n", b"$-1\r\n", b"-ERR unknown command\r\n"]);
        let ctx = Context::background();

        assert_eq!(
            client.query(&ctx, cmd("set").arg("foo").arg("bar")).await.unwrap(),
            Reply::Status("OK".to_string())
        );
        assert_eq!(
            client.query(&ctx, cmd("get").arg("missing")).await.unwrap(),
            Reply::Bulk(None)
        );
        assert_eq!(
            client.query(&ctx, cmd("nope")).await.unwrap(),
            Reply::Error("ERR unknown command".to_string())
        );
    }

    #[tokio::test]
    async fn server_error_keeps_the_connection() {
        let (client, dialer) = client(&[b"-WRONGTYPE bad\r\n", b":1\r\n"]);
        let ctx = Context::background();

        let err = client
            .execute(&ctx, cmd("incr").arg("k"), |conn, request| {
                Box::pin(async move {
                    conn.send(request).await?;
                    conn.read_int().await
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Server(_)));

        let n = client
            .execute(&ctx, cmd("incr").arg("k"), |conn, request| {
                Box::pin(async move {
                    conn.send(request).await?;
                    conn.read_int().await
                })
            })
            .await
            .unwrap();

        assert_eq!(n, 1);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);
        assert_eq!(client.pool_stats().hits, 1);
    }

    #[tokio::test]
    async fn framing_error_discards_the_connection() {
        let (client, dialer) = client(&[b"!garbage\r\n"]);
        let ctx = Context::background();

        let err = client.query(&ctx, cmd("ping")).await.unwrap_err();

        assert!(matches!(err, Error::Frame(_)));
        assert_eq!(client.pool_stats().total_conns, 0);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hooks_see_every_call() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let dialer = ScriptedDialer::new(&[b"+PONG\r\n"]);

        let options = Options {
            pool_size: 1,
            on_pre_cmd: Some(Arc::new({
                let calls = calls.clone();
                move |ctx: Context, request: &Request| {
                    calls.lock().unwrap().push(format!("pre {}", request));
                    ctx
                }
            })),
            on_post_cmd: Some(Arc::new({
                let calls = calls.clone();
                move |_: &Context, err: Option<&Error>| {
                    calls.lock().unwrap().push(format!("post {:?}", err.map(|e| e.to_string())));
                }
            })),
            ..Options::default()
        };
        let client = Client::with_dialer(dialer, options);

        client.query(&Context::background(), cmd("ping")).await.unwrap();
        client.close();
        let _ = client.query(&Context::background(), cmd("ping")).await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "pre ping".to_string(),
                "post None".to_string(),
                "pre ping".to_string(),
                "post Some(\"pool error; connection pool is closed\")".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pre_hook_context_bounds_the_call() {
        let dialer = ScriptedDialer::new(&[]);
        let options = Options {
            pool_size: 1,
            on_pre_cmd: Some(Arc::new(|ctx: Context, _: &Request| {
                ctx.with_timeout(Duration::from_millis(50))
            })),
            ..Options::default()
        };
        let client = Client::with_dialer(dialer, options);
        let start = Instant::now();

        // No reply ever comes; the deadline from the hook ends the read.
        let err = client
            .query(&Context::background(), cmd("blpop").arg("q").arg(0))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(client.pool_stats().total_conns, 0);
    }

    #[tokio::test]
    async fn cancellation_discards_the_connection() {
        let (client, _) = client(&[]);
        let token = CancellationToken::new();
        let ctx = Context::background().with_cancellation(token.clone());

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.query(&ctx, cmd("blpop").arg("q").arg(0)).await }
        });

        // Wait until the call holds the connection.
        while client.pool_stats().active_conns == 0 {
            tokio::task::yield_now().await;
        }
        token.cancel();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Canceled));
        assert_eq!(client.pool_stats().total_conns, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_pool_times_out_without_touching_a_connection() {
        let (client, dialer) = client(&[]);

        let hung = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .query(&Context::background(), cmd("blpop").arg("q").arg(0))
                    .await
            }
        });
        while client.pool_stats().active_conns == 0 {
            tokio::task::yield_now().await;
        }

        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let err = client.query(&ctx, cmd("ping")).await.unwrap_err();

        assert!(matches!(err, Error::Pool(PoolError::Timeout)));
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);

        hung.abort();
    }
}
