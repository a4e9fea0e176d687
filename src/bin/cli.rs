use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use redcall::{Client, Context, Options, Reply, Request};
use tracing::debug;

const ADDR: &str = "127.0.0.1:6379";

/// Sends one command and prints the reply.
#[derive(Parser, Debug)]
#[command(name = "redcall")]
struct Args {
    /// Server address
    #[arg(short, long, env = "REDCALL_ADDR", default_value = ADDR)]
    addr: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "REDCALL_POOL_SIZE", default_value_t = 1)]
    pool_size: usize,

    /// Give up on the command after this many milliseconds
    #[arg(short, long, env = "REDCALL_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Command name followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let args = Args::parse();

    let client = Client::new(Options {
        pool_size: args.pool_size,
        ..Options::new(args.addr)
    });

    let mut ctx = Context::background();
    if let Some(ms) = args.timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    let request: Request = args.command.into_iter().collect();
    let result = client.query(&ctx, request).await;
    client.close();

    match result {
        Ok(reply @ Reply::Error(_)) => {
            println!("{}", reply);
            ExitCode::FAILURE
        }
        Ok(reply) => {
            println!("{}", reply);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("redcall: {}", err);
            ExitCode::FAILURE
        }
    }
}
