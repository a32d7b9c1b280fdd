use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use domserve::{serve, DispatchEngine, ServeOptions};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("[domserve] {err}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let opts = parse_args()?;
    init_tracing();

    // The binary serves plain static sites. Embedders build their own engine,
    // register handlers on it, and call `serve` themselves.
    let engine = Arc::new(DispatchEngine::new());
    serve(engine, opts).await?;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn parse_args() -> anyhow::Result<ServeOptions> {
    let mut opts = ServeOptions::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --port"))?;
                opts.port = value
                    .parse()
                    .map_err(|_| anyhow!("invalid port '{value}'"))?;
            }
            "--root" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --root"))?;
                opts.root = PathBuf::from(value);
            }
            "--watch" => {
                opts.watch = true;
            }
            "--interval" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --interval"))?;
                let secs: u64 = value
                    .parse()
                    .map_err(|_| anyhow!("invalid interval '{value}'"))?;
                opts.watch_interval = Duration::from_secs(secs);
            }
            _ => {
                bail!(
                    "unknown argument '{arg}'. usage: domserve [--port <port>] [--root <dir>] [--watch] [--interval <secs>]"
                );
            }
        }
    }

    Ok(opts)
}
