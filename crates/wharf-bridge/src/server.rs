//! Localhost WebSocket host for the capture core.
//!
//! Each text frame is one request `{id?, action, data?}`; the reply is the
//! envelope with `id` echoed. Effects decided by the core are pushed to every
//! connected surface as `{event, ...}` frames.

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tracing::{debug, error, info, warn};
use wharf_engine::config::default_allowed_origins;
use wharf_engine::dispatcher::{Dispatcher, InstallReason};
use wharf_engine::effects::BroadcastSink;
use wharf_engine::error::CaptureError;
use wharf_engine::protocol::{Effect, Envelope};

/// Replies waiting to be written back on one connection.
const REPLY_QUEUE: usize = 64;

#[derive(Serialize)]
struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(flatten)]
    envelope: Envelope,
}

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct BridgeServer {
    port: u16,
    context: Context,
}

/// State shared by the accept loop and every connection.
#[derive(Clone)]
struct Context {
    dispatcher: Dispatcher,
    effects: BroadcastSink,
    install_pending: Arc<AtomicBool>,
    allowed_origins: Arc<Vec<String>>,
}

pub struct ServerHandle {
    pub local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting connections. Open connections finish on their own.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl BridgeServer {
    /// `effects` must be the sink the dispatcher was built with.
    ///
    /// Only extension pages may connect until [`with_allowed_origins`](Self::with_allowed_origins)
    /// says otherwise.
    pub fn new(port: u16, dispatcher: Dispatcher, effects: BroadcastSink) -> Self {
        Self {
            port,
            context: Context {
                dispatcher,
                effects,
                install_pending: Arc::new(AtomicBool::new(false)),
                allowed_origins: Arc::new(default_allowed_origins()),
            },
        }
    }

    /// Deliver the first-install effect to the first surface that completes a handshake.
    pub fn with_install_notice(self) -> Self {
        self.context.install_pending.store(true, Ordering::SeqCst);
        self
    }

    /// Origins allowed to open a connection. An entry ending in `://` admits
    /// the whole scheme; any other entry must match the `Origin` header exactly.
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.context.allowed_origins = Arc::new(origins);
        self
    }

    /// Bind `127.0.0.1:<port>` and start accepting. Port 0 picks a free port.
    pub async fn start(self) -> io::Result<ServerHandle> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Bridge listening on ws://{}", local_addr);

        let task = tokio::spawn(accept_loop(listener, self.context));
        Ok(ServerHandle { local_addr, task })
    }
}

/// Source of inbound TCP connections.
trait Acceptor: Send + 'static {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

async fn accept_loop<A: Acceptor>(mut acceptor: A, context: Context) {
    loop {
        match acceptor.accept().await {
            Ok((stream, peer)) => {
                debug!("Accepted TCP connection from {}", peer);
                let effects_rx = context.effects.subscribe();
                tokio::spawn(serve_connection(stream, context.clone(), effects_rx));
            }
            Err(e) => {
                warn!("Accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Whether a handshake carrying `origin` may proceed. Clients that send no
/// `Origin` (native processes, not browser pages) are admitted.
fn origin_allowed(origin: Option<&str>, allowed: &[String]) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    allowed.iter().any(|entry| {
        if entry.ends_with("://") {
            origin.starts_with(entry.as_str())
        } else {
            origin == entry
        }
    })
}

fn forbidden() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("Origin not allowed".to_string()));
    *response.status_mut() = StatusCode::FORBIDDEN;
    response
}

async fn serve_connection(
    stream: TcpStream,
    context: Context,
    mut effects_rx: broadcast::Receiver<Effect>,
) {
    let allowed = context.allowed_origins.clone();
    let check_origin = |request: &HandshakeRequest, response: HandshakeResponse| {
        let origin = request.headers().get(ORIGIN).map(|v| v.to_str().unwrap_or(""));
        if origin_allowed(origin, &allowed) {
            Ok(response)
        } else {
            warn!("Refused connection from origin {:?}", origin);
            Err(forbidden())
        }
    };

    let ws_stream = match accept_hdr_async(stream, check_origin).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    info!("Surface connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(REPLY_QUEUE);

    if context.install_pending.swap(false, Ordering::SeqCst)
        && let Some(effect) = Dispatcher::install_effect(InstallReason::Install)
        && let Some(text) = encode(&effect)
        && ws_sender.send(Message::Text(text)).await.is_err()
    {
        // Hand the notice to the next surface instead.
        context.install_pending.store(true, Ordering::SeqCst);
        return;
    }

    match context.dispatcher.stats().badge_state().await {
        Ok(badge) => {
            if let Some(text) = encode(&Effect::Badge(badge))
                && ws_sender.send(Message::Text(text)).await.is_err()
            {
                return;
            }
        }
        Err(e) => warn!("Could not compute badge for new connection: {}", e),
    }

    let mut effects_open = true;
    loop {
        tokio::select! {
            Some(text) = reply_rx.recv() => {
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    error!("Failed to send reply: {}", e);
                    break;
                }
            }

            effect = effects_rx.recv(), if effects_open => match effect {
                Ok(effect) => {
                    if let Some(text) = encode(&effect)
                        && let Err(e) = ws_sender.send(Message::Text(text)).await
                    {
                        error!("Failed to push effect: {}", e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Surface missed {} effects", skipped),
                Err(RecvError::Closed) => effects_open = false,
            },

            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    // One task per request: a slow capture must not hold up config reads.
                    let dispatcher = context.dispatcher.clone();
                    let reply_tx = reply_tx.clone();
                    tokio::spawn(async move {
                        if let Some(reply) = handle_frame(&dispatcher, &text).await {
                            let _ = reply_tx.send(reply).await;
                        }
                    });
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Surface disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
            },
        }
    }
}

/// Handle one inbound text frame and produce the serialized reply.
pub async fn handle_frame(dispatcher: &Dispatcher, text: &str) -> Option<String> {
    let reply = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut message)) => {
            let id = message.remove("id");
            Reply {
                id,
                envelope: dispatcher.handle_value(Value::Object(message)).await,
            }
        }
        Ok(_) => Reply {
            id: None,
            envelope: Envelope::failure(CaptureError::MalformedRequest(
                "expected a JSON object".into(),
            )),
        },
        Err(e) => Reply {
            id: None,
            envelope: Envelope::failure(CaptureError::MalformedRequest(e.to_string())),
        },
    };
    encode(&reply)
}

fn encode<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to encode outbound frame: {}", e);
            None
        }
    }
}
