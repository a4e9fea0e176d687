pub mod client;
pub mod codec;
pub mod commands;
pub mod connection;
pub mod context;
pub mod error;
pub mod frame;
pub mod pool;
pub mod request;

pub use client::{Client, Options, PostCmdHook, PreCmdHook};
pub use commands::{SetCondition, SetOptions, Ttl, ZAddFlags, ZSetValue};
pub use connection::Connection;
pub use context::Context;
pub use error::{Error, PoolError};
pub use frame::{Reply, ReplyKind};
pub use pool::{Dial, Pool, PoolConfig, PoolStats, Pooled, TcpDialer};
pub use request::{cmd, Arg, Request};

pub type Result<T> = std::result::Result<T, Error>;
