//! RAX Relay - terminal client
//!
//! Connects to a relay, prints every message it receives, and sends each
//! line typed on stdin. With `--details` each line is sent in a details
//! envelope so other clients also see its sender and send time.

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use rax_relay::peer::{RelayClient, render_incoming};
use rax_relay::protocol::Framing;

#[derive(Clone, Copy, ValueEnum)]
enum FramingArg {
    Raw,
    LengthPrefixed,
}

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Raw => Framing::Raw,
            FramingArg::LengthPrefixed => Framing::LengthPrefixed,
        }
    }
}

#[derive(Parser)]
#[command(name = "rax-relay-client")]
#[command(about = "Terminal client for the RAX encrypted relay")]
struct Cli {
    /// Relay address
    #[arg(default_value = "127.0.0.1:12345")]
    server: String,

    /// Message framing; must match the server
    #[arg(long, value_enum, default_value = "raw")]
    framing: FramingArg,

    /// Attach local ip, client id and timestamp to each message
    #[arg(long)]
    details: bool,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let client = match RelayClient::connect(&cli.server, cli.framing.into()).await {
        Ok(client) => client,
        Err(e) => {
            error!("Could not connect to {}: {}", cli.server, e);
            std::process::exit(1);
        }
    };
    info!("Connected to {}", cli.server);

    let (mut sender, mut receiver) = client.into_split();

    let mut incoming = tokio::spawn(async move {
        loop {
            match receiver.recv_text().await {
                Ok(text) => println!("{}", render_incoming(&text)),
                // A message we cannot read is skipped; the connection is still good.
                Err(e) if e.is_unreadable_message() => {
                    warn!("Skipping unreadable message: {}", e);
                }
                Err(e) => {
                    info!("Disconnected: {}", e);
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.is_empty() => continue,
                Ok(Some(line)) => {
                    let sent = if cli.details {
                        sender.send_text_with_details(&line).await
                    } else {
                        sender.send_text(&line).await
                    };
                    if let Err(e) = sent {
                        error!("Send failed: {}", e);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = &mut incoming => break,
        }
    }
}
