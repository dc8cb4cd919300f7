use clap::{Parser, Subcommand};
use dbgd::config::Config;
use dbgd::daemon::protocol::{Request, Response};
use dbgd::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbgd")]
#[command(about = "Background daemon for a socket-driven CDP/DAP debugger front-end", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon, listening on the command socket.
    Serve {
        /// Enable verbose logging.
        #[arg(short, long)]
        verbose: bool,

        /// Set log level (trace, debug, info, warn, error).
        #[arg(long, default_value = "info")]
        log_level: String,
    },
    /// Send a single command to a running daemon and print its response.
    Send {
        /// Command name, e.g. `open`, `c`, `e`, `q`.
        cmd: String,

        /// Raw argument string passed through to the command handler.
        #[arg(long)]
        args: Option<String>,

        /// Target a specific session by name.
        #[arg(short, long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { verbose, log_level } => {
            let level = if verbose { "debug" } else { &log_level };
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();

            let config = Config::from_env();
            dbgd::daemon::run(config).await?;
        }
        Commands::Send { cmd, args, session } => {
            let config = Config::from_env();
            send_one(&config, cmd, args, session).await?;
        }
    }

    Ok(())
}

async fn send_one(config: &Config, cmd: String, args: Option<String>, session: Option<String>) -> Result<()> {
    let stream = UnixStream::connect(&config.socket_path).await?;
    let (reader, mut writer) = stream.into_split();
    let request = Request { cmd, args, s: session };
    let mut payload = serde_json::to_vec(&request)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;

    let mut lines = BufReader::new(reader).lines();
    if let Some(line) = lines.next_line().await? {
        let response: Response = serde_json::from_str(&line)?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}
