use crate::agent::SymptomAgent;
use crate::cli::Args;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::server::tls::load_tls_config;
use crate::session::{ ChatSession, SessionError, SessionEvent };

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;

use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;

use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use lazy_static::lazy_static;

use chrono::Utc;
use hmac::{ Hmac, Mac };
use sha2::Sha256;
use url::form_urlencoded;

use futures::{ Sink, SinkExt, StreamExt };
use log::{ debug, error, info, warn };
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
const SIGNATURE_WINDOW_SECS: i64 = 300;
const CONNECTIONS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => panic!("connection rate must be non-zero"),
};

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(CONNECTIONS_PER_SECOND));
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<SymptomAgent>,
    api_key: Option<String>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let protocol = if args.tls_enabled() { "wss" } else { "ws" };
    info!("{} server listening on: {}", protocol.to_uppercase(), addr);

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        None
    };

    let reveal_interval = args.reveal_interval();

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let agent_clone = Arc::clone(&agent);
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(
                            peer,
                            tls_stream,
                            agent_clone,
                            required_api_key,
                            reveal_interval
                        ).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(
                    peer,
                    stream,
                    agent_clone,
                    required_api_key,
                    reveal_interval
                ).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

/// Hex HMAC-SHA256 of `ts` under `secret`, as clients are expected to send it.
pub fn sign_timestamp(secret: &str, ts: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e|
        format!("Invalid HMAC key: {}", e)
    )?;
    mac.update(ts.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `ts`/`sig` pair against `secret` with a ±300 s clock window.
pub fn verify_signature(
    secret: &str,
    ts: &str,
    sig: &str,
    now: i64
) -> Result<(), &'static str> {
    let ts_i: i64 = ts.parse().map_err(|_| "invalid timestamp")?;
    if (now - ts_i).abs() > SIGNATURE_WINDOW_SECS {
        return Err("timestamp out of range");
    }
    let expected = hex::decode(sig).map_err(|_| "bad signature")?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad signature")?;
    mac.update(ts.as_bytes());
    mac.verify_slice(&expected).map_err(|_| "bad signature")
}

fn reject(reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: Arc<SymptomAgent>,
    required_api_key: Option<String>,
    reveal_interval: Duration
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let secret = match &required_api_key {
            Some(k) if !k.is_empty() => k,
            _ => {
                return Ok(response);
            }
        };

        let qs = req.uri().query().unwrap_or("");
        let params: HashMap<String, String> = form_urlencoded
            ::parse(qs.as_bytes())
            .into_owned()
            .collect();

        let ts = params.get("ts").map(|s| s.as_str());
        let sig = params.get("sig").map(|s| s.as_str());

        match (ts, sig) {
            (Some(ts), Some(sig)) => {
                match verify_signature(secret, ts, sig, Utc::now().timestamp()) {
                    Ok(()) => Ok(response),
                    Err(reason) => {
                        warn!("Rejected handshake from {}: {}", peer, reason);
                        Err(reject(reason))
                    }
                }
            }
            _ => Err(reject("missing ts/sig")),
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent, reveal_interval).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send_message<S>(tx: &mut S, message: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: Sink<Message> + Unpin, S::Error: Display
{
    let json = serde_json::to_string(message)?;
    tx.send(Message::Text(json)).await.map_err(|e| format!("Failed to send message: {}", e).into())
}

/// Sends `messages` in order, stopping at the first failure.
async fn send_all<S>(tx: &mut S, messages: &[ServerMessage]) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: Sink<Message> + Unpin, S::Error: Display
{
    for message in messages {
        send_message(tx, message).await?;
    }
    Ok(())
}

fn to_server_messages(event: SessionEvent) -> Vec<ServerMessage> {
    match event {
        SessionEvent::Appended(message) => vec![ServerMessage::from(message)],
        SessionEvent::Typing => vec![ServerMessage::Typing],
        SessionEvent::Reveal(ch) => vec![ServerMessage::Partial { content: ch.to_string() }],
        SessionEvent::RevealComplete => vec![ServerMessage::Done { timestamp: Utc::now().timestamp() }],
        SessionEvent::RevealCancelled => vec![ServerMessage::RevealCancelled],
        SessionEvent::Cleared(conversation) => {
            let mut messages = vec![ServerMessage::Cleared];
            messages.extend(conversation.messages.into_iter().map(ServerMessage::from));
            messages
        }
        SessionEvent::Failed(message) => vec![ServerMessage::Error { message }],
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<SymptomAgent>,
    reveal_interval: Duration
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);

    let (mut tx, mut rx) = websocket.split();
    let conversation_id = Uuid::new_v4().to_string();
    info!("Assigned conversation ID {} to {}", conversation_id, peer);

    let (mut session, mut events, conversation) = match
        ChatSession::open(Arc::clone(&agent), conversation_id.clone(), reveal_interval).await
    {
        Ok(opened) => opened,
        Err(e) => {
            error!("Failed to open session for {}: {}", peer, e);
            return;
        }
    };

    for message in conversation.messages {
        if let Err(e) = send_message(&mut tx, &ServerMessage::from(message)).await {
            error!("Error sending greeting to {}: {}", peer, e);
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = rx.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        match e {
                            | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                            | tokio_tungstenite::tungstenite::Error::Protocol(_)
                            | tokio_tungstenite::tungstenite::Error::Utf8 => {
                                info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                            }
                            tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                                io_err.kind() == std::io::ErrorKind::ConnectionReset
                            => {
                                info!("WebSocket connection reset by peer {}", peer);
                            }
                            _ => {
                                error!("Error receiving message from {}: {}", peer, e);
                            }
                        }
                        break;
                    }
                    None => break,
                };

                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error { message: "Message too large".to_string() };
                    if let Err(e) = send_message(&mut tx, &error_msg).await {
                        error!("Failed to send size limit error to {}: {}", peer, e);
                    }
                    break;
                }

                let reply = match message {
                    Message::Text(text) => handle_client_message(&mut session, &text).await,
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                        Vec::new()
                    }
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                        Vec::new()
                    }
                    Message::Pong(_) | Message::Frame(_) => Vec::new(),
                };

                if let Err(e) = send_all(&mut tx, &reply).await {
                    error!("Error sending reply to {}: {}", peer, e);
                    break;
                }
            }
            Some(event) = events.recv() => {
                if let Err(e) = send_all(&mut tx, &to_server_messages(event)).await {
                    error!("Error sending session event to {}: {}", peer, e);
                    break;
                }
            }
        }
    }

    drop(session);
    if let Err(e) = agent.close_conversation(&conversation_id).await {
        error!("Failed to discard conversation {}: {}", conversation_id, e);
    }
    info!("WebSocket connection closed for {} (Conv ID: {})", peer, conversation_id);
}

/// Applies one client frame to the session and returns the direct replies.
/// Session events, including the redraw after a clear, arrive separately.
async fn handle_client_message(session: &mut ChatSession, text: &str) -> Vec<ServerMessage> {
    let client_message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to parse message on {}: {}", session.conversation_id(), e);
            return vec![ServerMessage::Error { message: format!("Failed to parse message: {}", e) }];
        }
    };

    match client_message {
        ClientMessage::Chat { content } => {
            match session.submit(&content).await {
                Ok(_) => Vec::new(),
                Err(SessionError::Busy) => vec![ServerMessage::Busy],
                Err(e) => vec![ServerMessage::Error { message: e.to_string() }],
            }
        }
        ClientMessage::Clear => {
            match session.clear().await {
                Ok(_) => {
                    debug!("Conversation {} cleared by client", session.conversation_id());
                    Vec::new()
                }
                Err(e) => vec![ServerMessage::Error { message: e.to_string() }],
            }
        }
        ClientMessage::History => {
            match session.history().await {
                Ok(conversation) => vec![ServerMessage::History { messages: conversation.messages }],
                Err(e) => vec![ServerMessage::Error { message: e.to_string() }],
            }
        }
    }
}
