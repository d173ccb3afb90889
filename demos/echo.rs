//! WebSocket echo server.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example echo
//!
//! Connect with any WebSocket client, e.g.
//!   websocat ws://localhost:3000/echo

use std::time::Duration;

use tether::{Message, Request, Router, Server, WebSocket};

#[tokio::main]
async fn main() -> Result<(), tether::Error> {
    tracing_subscriber::fmt::init();

    let app = Router::new().ws("echo", echo);

    Server::bind("0.0.0.0:3000").await?.serve(app).await
}

fn echo(req: Request, ws: WebSocket) {
    let peer = req.header("user-agent").unwrap_or("client").to_owned();

    ws.on_ready(move |ws| async move {
        let _ = ws.send_text(format!("hello, {peer}")).await;
        // Heartbeat until the session ends.
        while ws.is_alive() {
            tokio::time::sleep(Duration::from_secs(30)).await;
            if ws.ping("beat").await.is_err() {
                break;
            }
        }
    });

    ws.on_message(|ws, msg| async move {
        let sent = match msg {
            Message::Text(text) => ws.send_text(text).await,
            Message::Binary(data) => ws.send_binary(data).await,
        };
        if let Err(e) = sent {
            tracing::warn!("echo failed: {e}");
        }
    });

    ws.on_close(|_ws| async {
        tracing::info!("client said goodbye");
    });
}
