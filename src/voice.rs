//! WebSocket voice relay.
//!
//! Browsers connect to `/voice`; each connection opens its own upstream
//! socket to `AI_VOICE_WS_URL` and frames are forwarded unchanged in both
//! directions until either side closes.
//!
//! ```text
//! Browser ──ws──► /voice ──ws──► AI voice provider
//!         ◄──────        ◄──────
//! ```

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message as ClientMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::api::ApiState;
use crate::config::VoiceConfig;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const UPSTREAM_FAILURE: &str = "Failed to connect to the upstream voice relay.";

/// Errors opening the upstream connection.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Voice relay is not configured on the backend.")]
    NotConfigured,

    #[error("Invalid upstream request: {0}")]
    InvalidRequest(String),

    #[error("Upstream connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Upgrade handler for `GET /voice`.
pub async fn voice_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    let config = Arc::clone(&state.voice);
    ws.on_upgrade(move |socket| relay(socket, config))
}

/// Pump frames between the browser and the upstream provider.
pub async fn relay(mut client: WebSocket, config: Arc<VoiceConfig>) {
    let upstream = match connect_upstream(&config).await {
        Ok(upstream) => upstream,
        Err(RelayError::NotConfigured) => {
            tracing::warn!("Voice connection refused: relay not configured");
            send_error(&mut client, &RelayError::NotConfigured.to_string()).await;
            let _ = client.send(ClientMessage::Close(None)).await;
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Voice relay upstream error");
            send_error(&mut client, UPSTREAM_FAILURE).await;
            let _ = client.send(ClientMessage::Close(None)).await;
            return;
        }
    };

    tracing::info!("Voice relay connected");

    let (mut up_tx, mut up_rx) = upstream.split();
    let (mut client_tx, mut client_rx) = client.split();

    if let Some(payload) = &config.init_payload
        && let Err(e) = up_tx
            .send(UpstreamMessage::Text(payload.as_str().into()))
            .await
    {
        tracing::warn!(error = %e, "Failed to send initial payload upstream");
    }

    let client_to_upstream = async {
        while let Some(Ok(msg)) = client_rx.next().await {
            let forwarded = match msg {
                ClientMessage::Text(text) => UpstreamMessage::Text(text.as_str().into()),
                ClientMessage::Binary(data) => UpstreamMessage::Binary(data),
                ClientMessage::Close(_) => break,
                ClientMessage::Ping(_) | ClientMessage::Pong(_) => continue,
            };
            if up_tx.send(forwarded).await.is_err() {
                break;
            }
        }
        let _ = up_tx.close().await;
    };

    let upstream_to_client = async {
        while let Some(msg) = up_rx.next().await {
            let forwarded = match msg {
                Ok(UpstreamMessage::Text(text)) => ClientMessage::Text(text.as_str().into()),
                Ok(UpstreamMessage::Binary(data)) => ClientMessage::Binary(data),
                Ok(UpstreamMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Voice relay upstream error");
                    let _ = client_tx
                        .send(error_frame(UPSTREAM_FAILURE))
                        .await;
                    break;
                }
            };
            if client_tx.send(forwarded).await.is_err() {
                break;
            }
        }
        let _ = client_tx.send(ClientMessage::Close(None)).await;
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }

    tracing::info!("Voice relay closed");
}

async fn connect_upstream(config: &VoiceConfig) -> Result<UpstreamSocket, RelayError> {
    let url = config
        .upstream_url
        .as_deref()
        .ok_or(RelayError::NotConfigured)?;

    let mut request = url.into_client_request()?;
    if let Some(key) = &config.api_key {
        let value = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
            .map_err(|e| RelayError::InvalidRequest(e.to_string()))?;
        request.headers_mut().insert("authorization", value);
    }

    let (socket, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(socket)
}

fn error_frame(message: &str) -> ClientMessage {
    ClientMessage::Text(
        json!({ "type": "error", "message": message })
            .to_string()
            .into(),
    )
}

async fn send_error(client: &mut WebSocket, message: &str) {
    let _ = client.send(error_frame(message)).await;
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tempfile::tempdir;
    use tokio::net::TcpListener;

    use crate::api::router;
    use crate::config::Config;
    use crate::history::HistoryStore;
    use crate::server::Server;
    use crate::vision::StubVisionProvider;

    use super::*;

    async fn start_app(voice: VoiceConfig) -> (Server, SocketAddr, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = Config {
            voice,
            ..Config::default()
        };
        let store = Arc::new(HistoryStore::new(dir.path().join("history.json"), 10));
        let state = ApiState::new(&config, store, Arc::new(StubVisionProvider));

        let mut server = Server::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        let addr = server.start(router(state)).await.unwrap();
        (server, addr, dir)
    }

    /// Upstream that echoes every frame back.
    async fn start_echo_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
                if ws.send(msg).await.is_err() {
                    break;
                }
            }
        });
        addr
    }

    async fn next_text(ws: &mut UpstreamSocket) -> String {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        msg.into_text().unwrap().as_str().to_string()
    }

    #[tokio::test]
    async fn unconfigured_relay_sends_error_and_closes() {
        let (mut server, addr, _dir) = start_app(VoiceConfig::default()).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/voice", addr))
            .await
            .unwrap();

        let frame: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
        assert_eq!(frame["type"], "error");

        let next = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap();
        assert!(matches!(next, None | Some(Ok(UpstreamMessage::Close(_))) | Some(Err(_))));

        drop(ws);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn relay_forwards_init_payload_and_frames() {
        let upstream = start_echo_upstream().await;
        let (mut server, addr, _dir) = start_app(VoiceConfig {
            upstream_url: Some(format!("ws://{}", upstream)),
            api_key: None,
            init_payload: Some(r#"{"setup":true}"#.to_string()),
        })
        .await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/voice", addr))
            .await
            .unwrap();

        // The echo upstream bounces the init payload back first.
        assert_eq!(next_text(&mut ws).await, r#"{"setup":true}"#);

        ws.send(UpstreamMessage::Text("hello herd".into()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut ws).await, "hello herd");

        drop(ws);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn unreachable_upstream_reports_error() {
        // Bind and drop to get a port with nothing listening.
        let dead = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let (mut server, addr, _dir) = start_app(VoiceConfig {
            upstream_url: Some(format!("ws://{}", dead)),
            ..Default::default()
        })
        .await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/voice", addr))
            .await
            .unwrap();
        let frame: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["message"], UPSTREAM_FAILURE);

        drop(ws);
        server.shutdown().await;
    }
}
