use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::context::Context;
use crate::error::PoolError;
use crate::frame::DEFAULT_MAX_FRAME_SIZE;
use crate::{Error, Result};

/// Opens the transports a [`Pool`] wraps into connections.
pub trait Dial: Send + Sync + 'static {
    type Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn dial(&self) -> BoxFuture<'_, io::Result<Self::Transport>>;
}

/// Dials a TCP address with Nagle's algorithm disabled.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
}

impl TcpDialer {
    pub fn new(addr: impl Into<String>) -> TcpDialer {
        TcpDialer { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Dial for TcpDialer {
    type Transport = TcpStream;

    fn dial(&self) -> BoxFuture<'_, io::Result<TcpStream>> {
        Box::pin(async move {
            let stream = TcpStream::connect(&self.addr).await?;
            stream.set_nodelay(true)?;
            Ok(stream)
        })
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on connections handed out at the same time.
    pub pool_size: usize,
    /// Idle connections kept open ahead of demand.
    pub min_idle_conns: usize,
    /// Connections older than this are closed instead of reused.
    pub max_conn_age: Option<Duration>,
    /// How long `acquire` waits for a free connection when the context allows longer.
    pub pool_timeout: Duration,
    /// Idle connections unused for this long are closed.
    pub idle_timeout: Option<Duration>,
    /// How often the background reaper looks for stale idle connections.
    pub idle_check_frequency: Option<Duration>,
    pub max_frame_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism().map_or(1, NonZeroUsize::get);

        PoolConfig {
            pool_size: 10 * cpus,
            min_idle_conns: 0,
            max_conn_age: None,
            pool_timeout: Duration::from_secs(4),
            idle_timeout: Some(Duration::from_secs(5 * 60)),
            idle_check_frequency: Some(Duration::from_secs(60)),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Counters and gauges describing a pool at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions served by an idle connection.
    pub hits: u64,
    /// Acquisitions that had to dial.
    pub misses: u64,
    /// Acquisitions that gave up waiting for a free connection.
    pub timeouts: u64,
    pub total_conns: usize,
    pub idle_conns: usize,
    pub active_conns: usize,
    /// Idle connections closed for exceeding the idle timeout or the maximum age.
    pub stale_conns: u64,
}

/// A bounded set of connections to one server.
///
/// At most `pool_size` connections are handed out at once; further callers wait in
/// [`Pool::acquire`] until one comes back, their context gives up, or the pool timeout elapses.
/// The pool is cheap to clone, clones share the same connections.
pub struct Pool<D: Dial> {
    inner: Arc<Inner<D>>,
}

impl<D: Dial> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Pool {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<D: Dial> {
    dialer: D,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    state: Mutex<State<D::Transport>>,
    closed: AtomicBool,
    filling: AtomicBool,
    // Stops the reaper.
    shutdown: CancellationToken,
    hits: AtomicU64,
    misses: AtomicU64,
    timeouts: AtomicU64,
    stale: AtomicU64,
}

struct State<T> {
    // Most recently released at the back.
    idle: VecDeque<IdleConn<T>>,
    // Open connections, idle and handed out.
    total: usize,
}

struct IdleConn<T> {
    conn: Connection<T>,
    created_at: Instant,
    idle_since: Instant,
}

impl<D: Dial> Pool<D> {
    /// Creates the pool and, when a tokio runtime is running, starts the reaper and the dials
    /// that bring the pool up to `min_idle_conns`.
    pub fn new(dialer: D, mut config: PoolConfig) -> Pool<D> {
        config.pool_size = config.pool_size.max(1);

        let inner = Arc::new(Inner {
            dialer,
            permits: Arc::new(Semaphore::new(config.pool_size)),
            state: Mutex::new(State {
                idle: VecDeque::with_capacity(config.pool_size),
                total: 0,
            }),
            config,
            closed: AtomicBool::new(false),
            filling: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        });

        spawn_reaper(&inner);
        inner.fill_idle();

        Pool { inner }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn dialer(&self) -> &D {
        &self.inner.dialer
    }

    /// Hands out a connection for exclusive use.
    ///
    /// Waits no longer than the earlier of the context deadline and the pool timeout, and stops
    /// waiting as soon as the context is cancelled. Idle connections are reused most recent
    /// first; when none is left a new one is dialed.
    pub async fn acquire(&self, ctx: &Context) -> Result<Pooled<D>> {
        if self.inner.is_closed() {
            return Err(PoolError::Closed.into());
        }
        if ctx.is_cancelled() {
            return Err(PoolError::Canceled.into());
        }
        if ctx.is_expired() {
            self.inner.timeouts.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::Timeout.into());
        }

        let wait_until = Instant::now() + self.inner.config.pool_timeout;
        let wait_until = ctx.deadline().map_or(wait_until, |deadline| deadline.min(wait_until));

        let permit = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(PoolError::Canceled.into()),
            permit = timeout_at(wait_until, self.inner.permits.clone().acquire_owned()) => match permit {
                Ok(Ok(permit)) => permit,
                // The semaphore is only ever closed by `Pool::close`.
                Ok(Err(_)) => return Err(PoolError::Closed.into()),
                Err(_) => {
                    self.inner.timeouts.fetch_add(1, Ordering::Relaxed);
                    return Err(PoolError::Timeout.into());
                }
            },
        };

        if let Some(idle) = self.inner.pop_idle() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Pooled::new(idle.conn, idle.created_at, &self.inner, permit));
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        let conn = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(PoolError::Canceled.into()),
            conn = self.inner.dial(ctx.deadline()) => conn?,
        };

        let total = {
            let mut state = self.inner.lock();
            state.total += 1;
            state.total
        };
        debug!(connection_id = %conn.id, total, "dialed new connection");

        Ok(Pooled::new(conn, Instant::now(), &self.inner, permit))
    }

    /// Returns a healthy connection to the idle set.
    pub fn release(&self, pooled: Pooled<D>) {
        let Pooled {
            conn,
            created_at,
            mut lease,
        } = pooled;

        lease.settle();
        self.inner.put(conn, created_at);
        // The permit goes back only once the connection is idle again.
        drop(lease);
    }

    /// Closes a connection whose byte stream can no longer be trusted.
    pub fn discard(&self, pooled: Pooled<D>) {
        debug!(connection_id = %pooled.id, "discarding connection");
        // Dropping an unsettled lease is a discard.
        drop(pooled);
    }

    pub fn stats(&self) -> PoolStats {
        let (total, idle) = {
            let state = self.inner.lock();
            (state.total, state.idle.len())
        };

        PoolStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            timeouts: self.inner.timeouts.load(Ordering::Relaxed),
            total_conns: total,
            idle_conns: idle,
            active_conns: total - idle,
            stale_conns: self.inner.stale.load(Ordering::Relaxed),
        }
    }

    /// Closes every idle connection and fails all current and future acquisitions with
    /// [`PoolError::Closed`]. Connections handed out before are closed when they come back.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.permits.close();
        self.inner.shutdown.cancel();

        let drained = {
            let mut state = self.inner.lock();
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.total -= drained.len();
            drained
        };
        debug!(closed = drained.len(), "pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<D: Dial> Inner<D> {
    fn lock(&self) -> MutexGuard<'_, State<D::Transport>> {
        // Every critical section leaves the state consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_stale(&self, created_at: Instant, idle_since: Instant, now: Instant) -> bool {
        let too_old = self
            .config
            .max_conn_age
            .map_or(false, |age| now.saturating_duration_since(created_at) >= age);
        let too_idle = self
            .config
            .idle_timeout
            .map_or(false, |timeout| now.saturating_duration_since(idle_since) >= timeout);

        too_old || too_idle
    }

    async fn dial(&self, deadline: Option<Instant>) -> Result<Connection<D::Transport>> {
        let transport = match deadline {
            Some(deadline) => timeout_at(deadline, self.dialer.dial())
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "dial deadline exceeded"))?,
            None => self.dialer.dial().await,
        }
        .map_err(Error::from)?;

        Ok(Connection::with_max_frame_size(
            transport,
            self.config.max_frame_size,
        ))
    }

    // Pops the most recently used idle connection, closing stale ones on the way.
    fn pop_idle(self: &Arc<Self>) -> Option<IdleConn<D::Transport>> {
        let now = Instant::now();
        let mut stale = Vec::new();

        let found = {
            let mut state = self.lock();
            let mut found = None;
            while let Some(idle) = state.idle.pop_back() {
                if self.is_stale(idle.created_at, idle.idle_since, now) {
                    state.total -= 1;
                    stale.push(idle);
                } else {
                    found = Some(idle);
                    break;
                }
            }
            found
        };

        if !stale.is_empty() {
            self.stale.fetch_add(stale.len() as u64, Ordering::Relaxed);
            debug!(closed = stale.len(), "closed stale idle connections");
            self.fill_idle();
        }

        found
    }

    fn put(self: &Arc<Self>, conn: Connection<D::Transport>, created_at: Instant) {
        let now = Instant::now();
        let too_old = self
            .config
            .max_conn_age
            .map_or(false, |age| now.saturating_duration_since(created_at) >= age);

        let mut state = self.lock();
        if self.is_closed() || too_old || state.total > self.config.pool_size {
            state.total -= 1;
            drop(state);
            debug!(connection_id = %conn.id, "closing released connection");
            if too_old {
                self.stale.fetch_add(1, Ordering::Relaxed);
                self.fill_idle();
            }
            return;
        }

        state.idle.push_back(IdleConn {
            conn,
            created_at,
            idle_since: now,
        });
    }

    fn forget(self: &Arc<Self>) {
        self.lock().total -= 1;
        self.fill_idle();
    }

    fn reap(self: &Arc<Self>) {
        let now = Instant::now();

        let stale = {
            let mut state = self.lock();
            let (stale, fresh): (VecDeque<_>, VecDeque<_>) = state
                .idle
                .drain(..)
                .partition(|idle| self.is_stale(idle.created_at, idle.idle_since, now));
            state.idle = fresh;
            state.total -= stale.len();
            stale
        };

        if !stale.is_empty() {
            self.stale.fetch_add(stale.len() as u64, Ordering::Relaxed);
            debug!(closed = stale.len(), "reaped stale idle connections");
        }
        self.fill_idle();
    }

    // Dials in the background until `min_idle_conns` connections are idle, or the pool is full.
    // A failed dial stops the round; the next release, discard or reap starts another.
    fn fill_idle(self: &Arc<Self>) {
        if self.config.min_idle_conns == 0 || self.is_closed() {
            return;
        }
        if self.filling.swap(true, Ordering::AcqRel) {
            return;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.filling.store(false, Ordering::Release);
                return;
            }
        };

        let inner = self.clone();
        handle.spawn(async move {
            while inner.needs_idle() {
                match inner.dial(None).await {
                    Ok(conn) => {
                        let mut state = inner.lock();
                        if inner.is_closed() || state.total >= inner.config.pool_size {
                            break;
                        }
                        state.total += 1;
                        debug!(connection_id = %conn.id, "dialed idle connection");
                        state.idle.push_back(IdleConn {
                            conn,
                            created_at: Instant::now(),
                            idle_since: Instant::now(),
                        });
                    }
                    Err(err) => {
                        warn!("failed to dial idle connection: {}", err);
                        break;
                    }
                }
            }
            inner.filling.store(false, Ordering::Release);
        });
    }

    fn needs_idle(&self) -> bool {
        let state = self.lock();
        !self.is_closed()
            && state.idle.len() < self.config.min_idle_conns
            && state.total < self.config.pool_size
    }
}

impl<D: Dial> Drop for Inner<D> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn spawn_reaper<D: Dial>(inner: &Arc<Inner<D>>) {
    let config = &inner.config;
    let period = match config.idle_check_frequency {
        Some(period) if config.idle_timeout.is_some() || config.max_conn_age.is_some() => period,
        _ => return,
    };
    let Ok(handle) = Handle::try_current() else {
        return;
    };

    let shutdown = inner.shutdown.clone();
    let inner: Weak<Inner<D>> = Arc::downgrade(inner);

    handle.spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match inner.upgrade() {
                    Some(inner) => inner.reap(),
                    None => break,
                },
            }
        }
    });
}

/// A connection on loan from a [`Pool`].
///
/// Give it back with [`Pool::release`] or [`Pool::discard`]. Dropping it without either
/// discards the connection, so an aborted call never returns a half-read stream to the pool.
pub struct Pooled<D: Dial> {
    conn: Connection<D::Transport>,
    created_at: Instant,
    lease: Lease<D>,
}

impl<D: Dial> Pooled<D> {
    fn new(
        conn: Connection<D::Transport>,
        created_at: Instant,
        inner: &Arc<Inner<D>>,
        permit: OwnedSemaphorePermit,
    ) -> Pooled<D> {
        Pooled {
            conn,
            created_at,
            lease: Lease {
                pool: inner.clone(),
                _permit: permit,
                settled: false,
            },
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl<D: Dial> fmt::Debug for Pooled<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.conn.id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl<D: Dial> Deref for Pooled<D> {
    type Target = Connection<D::Transport>;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<D: Dial> DerefMut for Pooled<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

// Holds the pool slot of a loaned connection. Fields drop in order, so the connection is
// already closed by the time an unsettled lease gives its slot back.
struct Lease<D: Dial> {
    pool: Arc<Inner<D>>,
    _permit: OwnedSemaphorePermit,
    settled: bool,
}

impl<D: Dial> Lease<D> {
    fn settle(&mut self) {
        self.settled = true;
    }
}

impl<D: Dial> Drop for Lease<D> {
    fn drop(&mut self) {
        if !self.settled {
            self.pool.forget();
        }
    }
}
