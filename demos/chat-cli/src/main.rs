//! Line-oriented chat driver for the session controller.
//!
//! Run with: cargo run -p chat-cli-demo
//!
//! Reads `RELAY_CHAT_ENDPOINT` (and optionally `RELAY_CHAT_PROBE`), connects,
//! and sends every non-empty stdin line. Commands: `/reconnect`, `/log`,
//! `/quit`. Set `RUST_LOG=debug` to trace channel events on stderr.

use anyhow::Context;
use relay_chat_core::{Message, Sender};
use relay_chat_session::{ClientConfig, SessionController, SessionError};
use relay_chat_transport::WsTransport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env().context("loading client configuration")?;
    let mut controller = SessionController::from_config(WsTransport::new(), &config);

    println!("Relay Chat - session {}", controller.identity());
    println!("Commands: /reconnect, /log, /quit");
    println!();

    let mut messages = controller.subscribe_messages();
    let mut health = controller.subscribe_health();
    let handle = controller.start(config.endpoint.clone());
    tracing::info!(
        %handle,
        endpoint = %config.endpoint,
        identity = %controller.identity(),
        "chat session started"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            () = controller.process_next() => {}
            Ok(msg) = messages.recv() => print_message(&msg),
            Ok(()) = health.changed() => {
                println!("[{}]", *health.borrow_and_update());
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                if !handle_line(&mut controller, &line) {
                    break;
                }
            }
        }
    }

    controller.shutdown();
    tracing::info!(messages = controller.log().len(), "chat session ended");
    Ok(())
}

/// Apply one input line. Returns false when the user asked to quit.
fn handle_line(controller: &mut SessionController<WsTransport>, line: &str) -> bool {
    match line.trim() {
        "/quit" => return false,
        "/reconnect" => {
            match controller.reconnect() {
                Ok(handle) => tracing::info!(%handle, "reconnect requested"),
                Err(e) => println!("! {e}"),
            }
        }
        "/log" => {
            for msg in controller.log().as_slice() {
                print_message(msg);
            }
        }
        _ => match controller.send_user_text(line) {
            Ok(_) | Err(SessionError::EmptyText) => {}
            Err(SessionError::NotConnected) => {
                println!("! Not connected: unable to send message. Try /reconnect.");
            }
            Err(e) => println!("! {e}"),
        },
    }
    true
}

fn print_message(msg: &Message) {
    let who = match msg.sender() {
        Sender::User => "you",
        Sender::Remote => "bot",
    };
    println!("{who:>3} #{}> {}", msg.id(), msg.text());
}
