//! loginsvc - serves name resolution over HTTP and gRPC.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use loginsvc_config::{ConfigLoader, LoginsvcConfig};
use loginsvc_core::Tracer;
use loginsvc_server::{server_pipeline, Server, ShutdownSignal};
use loginsvc_telemetry::{init_telemetry, LogTracer, OtelTracer};

#[derive(Debug, Parser)]
#[command(name = "loginsvc", version, about = "Name resolution service")]
struct Args {
    /// Configuration file (TOML or JSON).
    #[arg(short, long, env = "LOGINSVC_CONFIG")]
    config: Option<PathBuf>,

    /// Start from the development preset instead of the defaults.
    #[arg(long)]
    dev: bool,
}

fn load_config(args: &Args) -> anyhow::Result<LoginsvcConfig> {
    let mut loader = if args.dev {
        ConfigLoader::new().with_development()
    } else {
        ConfigLoader::new().with_defaults()
    };
    if let Some(path) = &args.config {
        loader = loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
    }
    loader
        .with_dotenv()?
        .load()
        .context("invalid configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let telemetry = init_telemetry(config.telemetry.to_telemetry_config())
        .context("failed to initialize telemetry")?;

    let tracer: Arc<dyn Tracer> = if telemetry.exports_spans() {
        Arc::new(OtelTracer::new("loginsvc"))
    } else {
        Arc::new(LogTracer)
    };

    let lookup = loginsvc_store::open(&config.lookup)
        .await
        .context("failed to open lookup store")?;

    let pipeline = server_pipeline(&config, lookup, tracer);
    let server = Server::bind(&config.server, Arc::new(pipeline)).await?;
    tracing::info!(
        http = %server.http_addr()?,
        grpc = %server.grpc_addr()?,
        "loginsvc started"
    );

    server.serve(ShutdownSignal::with_os_signals()).await?;
    tracing::info!("loginsvc stopped");
    Ok(())
}
