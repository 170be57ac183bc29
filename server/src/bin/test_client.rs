use clap::Parser;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use serde_json::json;
use shared::{
    Frame, Movement, ServerEvent, PLAYER_MOVEMENT, RESTART_GAME, SESSION_EVENT, SHOOT,
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless client that exercises a running arena server")]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5001")]
    server: String,

    /// How long to keep printing received events, in seconds
    #[arg(short = 'w', long, default_value_t = 3)]
    watch: u64,
}

async fn send(sink: &mut WsSink, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    let text = serde_json::to_string(frame)?;
    sink.send(Message::text(text)).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let url = format!("ws://{}/", args.server);

    info!("Connecting to {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = ws_stream.split();

    // The first frame names our session
    let session_id = match stream.next().await {
        Some(Ok(Message::Text(text))) => {
            let frame: Frame = serde_json::from_str(text.as_str())?;
            if frame.event != SESSION_EVENT {
                return Err(format!("expected session frame, got {}", frame.event).into());
            }
            frame.data.as_str().unwrap_or_default().to_string()
        }
        other => return Err(format!("unexpected first message: {:?}", other).into()),
    };
    info!("Connected as session {}", session_id);

    let movement = Movement {
        x: 150.0,
        y: 120.0,
        block: false,
    };
    send(&mut sink, &Frame::new(PLAYER_MOVEMENT, &movement)?).await?;
    send(
        &mut sink,
        &Frame::new(SHOOT, json!({"x": 150, "y": 120, "vx": 10, "vy": 0, "damage": 10}))?,
    )
    .await?;
    send(&mut sink, &Frame::new(RESTART_GAME, json!(null))?).await?;

    let deadline = Instant::now() + Duration::from_secs(args.watch);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match timeout(remaining, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                match serde_json::from_str::<ServerEvent>(text.as_str()) {
                    Ok(event) => info!("<- {}: {}", event.name(), text.as_str()),
                    Err(e) => warn!("Unrecognised frame {} ({})", text.as_str(), e),
                }
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                warn!("Connection error: {}", e);
                break;
            }
            Ok(None) => {
                warn!("Server closed the connection");
                break;
            }
            Err(_) => break,
        }
    }

    sink.close().await?;
    // Give the server a moment to see the close before exiting
    sleep(Duration::from_millis(50)).await;
    info!("Done");
    Ok(())
}
