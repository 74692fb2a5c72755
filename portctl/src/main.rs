use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod client;

use client::Outcome;

#[derive(Parser, Debug)]
#[command(name = "portctl")]
#[command(about = "Edit and inspect the portfilterd rule table")]
struct Args {
    /// Control socket of the running daemon
    #[arg(long, short = 's', env = "PORTFILTER_SOCKET", default_value = "/tmp/portfilter.sock")]
    socket: PathBuf,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a rule: KIND is I (drop inbound), P (proxy), F (drop forward) or O (drop outbound)
    Add { kind: String, port: String },
    /// List rules as `index(kind) port`
    ///
    /// With the daemon's default `--show-mode toggle`, every second call
    /// prints nothing; start portfilterd with `--show-mode always` to list
    /// on every call.
    Show,
    /// Delete the rule at INDEX; later rules move up by one
    Del { index: String },
}

impl Command {
    fn request(&self) -> String {
        match self {
            Command::Add { kind, port } => format!("add {} {}", kind, port),
            Command::Show => "show".to_string(),
            Command::Del { index } => format!("del {}", index),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging - only if PORTFILTER_LOG env var or verbose flag
    let _ = if args.verbose || std::env::var("PORTFILTER_LOG").is_ok() {
        let filter = std::env::var("PORTFILTER_LOG").unwrap_or_else(|_| "debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_writer(std::io::stderr)
            .try_init()
    };

    let reply = client::send_request(&args.socket, &args.command.request()).await?;

    match client::interpret(&reply)? {
        Outcome::Ok { value, body } => {
            print!("{}", body);
            if let (Command::Add { .. }, Some(index)) = (&args.command, value) {
                println!("{}", index);
            }
            Ok(())
        }
        Outcome::Err(message) => {
            eprintln!("portctl: {}", message);
            std::process::exit(1);
        }
    }
}
