//! Image generation MCP server - standalone binary
//!
//! Serves over stdio by default. Pass `--transport http` to listen on a port.

use clap::{Parser, ValueEnum};
use imagegen_mcp::{ImageGenServer, logging};
use tracing::info;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transport to serve MCP over
    #[arg(short, long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Port to listen on when serving HTTP (0 for random)
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Host to bind to when serving HTTP
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Log level, used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_env_file();
    let args = Args::parse();

    logging::init_logging(&args.log_level);

    let server = ImageGenServer::from_env()?;

    match args.transport {
        Transport::Stdio => imagegen_mcp::serve_stdio(server).await?,
        Transport::Http => {
            let handle = imagegen_mcp::start_server_on(&args.host, args.port, server).await?;

            info!("Image generation MCP server running at {}", handle.url());
            eprintln!("Image generation MCP server running at {}", handle.url());
            eprintln!("Press Ctrl+C to stop");

            tokio::signal::ctrl_c().await?;
            handle.stop();
        }
    }

    Ok(())
}
