//! webtunnel-client - managed pluggable-transport client

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use webtunnel_client::app::signals::shutdown_signal;
use webtunnel_client::error::{Error, Result};
use webtunnel_client::{
    ChainBuilder, ClientInfo, DefaultLayers, Negotiator, Reporter, Runtime, TcpTransport,
};

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        print_version();
        return Ok(());
    }

    // stdout carries status lines for the parent process; logs go to stderr
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let mut reporter = Reporter::stdout();

    let info = match ClientInfo::from_env() {
        Ok(info) => info,
        Err(Error::Version) => {
            reporter.version_error()?;
            std::process::exit(1);
        }
        Err(e) => {
            reporter.env_error(&e.to_string())?;
            std::process::exit(1);
        }
    };
    reporter.version()?;

    if info.proxy.is_some() {
        reporter.proxy_error("proxy is not supported")?;
        std::process::exit(1);
    }

    info!("webtunnel-client v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(state) = &info.state_location {
        info!("State location: {}", state.display());
    }

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let transport = Arc::new(TcpTransport::new());
        let builder = ChainBuilder::new(transport.clone(), Arc::new(DefaultLayers::new()));
        let shutdown = CancellationToken::new();

        let mut runtime = Runtime::new(Negotiator::new(builder), shutdown.clone());
        runtime
            .bind(transport.as_ref(), &info.method_names, &mut reporter)
            .await?;

        let exit_on_stdin_close = info.exit_on_stdin_close;
        tokio::spawn(async move {
            shutdown_signal(exit_on_stdin_close).await;
            shutdown.cancel();
        });

        runtime.run().await
    });
    // The stdin watcher may still sit in a blocking read
    rt.shutdown_background();
    result?;

    info!("webtunnel-client is done");
    Ok(())
}

/// Command line arguments
struct Args {
    version: bool,
}

impl Args {
    fn parse() -> Self {
        let mut version = false;

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "-v" | "--version" => version = true,
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {}
            }
        }

        Self { version }
    }
}

fn print_help() {
    println!(r#"webtunnel-client - managed pluggable-transport client

USAGE:
    webtunnel-client [OPTIONS]

Launched by a parent process that configures it through TOR_PT_*
environment variables. Status lines are written to stdout, logs to
stderr (level from RUST_LOG, default info).

OPTIONS:
    -v, --version           Print version information
    -h, --help              Print help information

ENVIRONMENT:
    TOR_PT_MANAGED_TRANSPORT_VER   Must include 1
    TOR_PT_CLIENT_TRANSPORTS       Comma-separated methods (webtunnel or *)
    TOR_PT_EXIT_ON_STDIN_CLOSE     1 = shut down when stdin closes
    TOR_PT_PROXY                   Not supported

SOCKS ARGUMENTS:
    addr=<host:port>    Remote endpoint (required)
    path=<path>         HTTP upgrade path (default /)
    tls=<kind>          Any non-empty value enables TLS
    servername=<name>   TLS server name and HTTP Host
"#);
}

fn print_version() {
    println!("webtunnel-client v{}", env!("CARGO_PKG_VERSION"));
}
