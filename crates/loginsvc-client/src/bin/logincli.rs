//! logincli - resolves one name against a running loginsvc.

use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgGroup, Parser};

use loginsvc_client::{connect, ClientConfig, Target};
use loginsvc_core::{CallContext, NameService};

#[derive(Debug, Parser)]
#[command(name = "logincli", version, about = "Resolve a name to a subject id")]
#[command(group(ArgGroup::new("target").required(true).args(["http_addr", "grpc_addr"])))]
struct Args {
    /// HTTP address of loginsvc.
    #[arg(long)]
    http_addr: Option<String>,

    /// gRPC address of loginsvc.
    #[arg(long)]
    grpc_addr: Option<String>,

    /// Method to call.
    #[arg(long, default_value = "name", value_parser = ["name"])]
    method: String,

    /// Call timeout in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// The name to resolve.
    name: String,
}

impl Args {
    fn target(&self) -> Option<Target> {
        match (&self.http_addr, &self.grpc_addr) {
            (Some(addr), _) => Some(Target::Http(addr.clone())),
            (None, Some(addr)) => Some(Target::Grpc(addr.clone())),
            (None, None) => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let Some(target) = args.target() else {
        eprintln!("error: no remote address specified");
        return ExitCode::FAILURE;
    };

    let client = match connect(&target, &ClientConfig::default()).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let ctx = CallContext::with_timeout(Duration::from_millis(args.timeout_ms));
    match client.resolve(ctx, args.name.clone()).await {
        Ok(sid) => {
            println!("name: {}, sid: {sid}", args.name);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
