//! Line Chat Client
//!
//! Prints every line from the server and forwards each stdin line as-is.
//! Type `who`, `rename|<name>` or `to|<name>|<message>`; anything else is
//! a public message.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::FramedRead;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use line_chat::transport::LineCodec;
use line_chat::{ChatClient, ClientConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with chat output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_client=warn")),
        )
        .init();

    let config = ClientConfig::parse();
    let client = ChatClient::connect(&config.addr()).await?;
    info!("Connected to {}", config.addr());

    let (mut server_lines, mut server_sink) = client.split();
    // Piped input may end without a final newline; still send that line
    let mut input = FramedRead::new(tokio::io::stdin(), LineCodec::new().keep_fragment());

    loop {
        tokio::select! {
            line = server_lines.next() => match line {
                Some(Ok(line)) => println!("{}", line),
                Some(Err(e)) => {
                    error!("Failed to read from server: {}", e);
                    break;
                }
                None => {
                    println!("Server closed the connection");
                    break;
                }
            },
            line = input.next() => match line {
                Some(Ok(line)) => server_sink.send(line).await?,
                Some(Err(e)) => return Err(e.into()),
                // stdin closed
                None => break,
            },
        }
    }

    Ok(())
}
