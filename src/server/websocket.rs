use crate::assistant::exchange::Exchange;
use crate::assistant::pdf::PdfInput;
use crate::assistant::Assistant;
use crate::history::HistoryStore;
use crate::models::chat::{ Conversation, ConversationSnapshot };
use crate::models::websocket::{ ClientMessage, ServerMessage };

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;

use base64::{ engine::general_purpose, Engine as _ };
use chrono::Utc;
use futures::{ SinkExt, StreamExt };
use log::{ debug, error, info, warn };

const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
const OUTBOUND_BUFFER: usize = 64;

pub async fn start_ws_server(
    addr: &str,
    assistant: Arc<Assistant>,
    history: Arc<dyn HistoryStore>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);
    serve(listener, assistant, history).await
}

pub async fn serve(
    listener: TcpListener,
    assistant: Arc<Assistant>,
    history: Arc<dyn HistoryStore>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);
        let assistant = Arc::clone(&assistant);
        let history = Arc::clone(&history);

        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => handle_connection(peer, ws, assistant, history).await,
                Err(e) => error!("Handshake failed for {}: {}", peer, e),
            }
        });
    }
}

/// Per-connection state. The session task is the only writer of `conversation`;
/// while an exchange runs it works on a copy and hands back the settled result.
struct Session {
    peer: SocketAddr,
    assistant: Arc<Assistant>,
    history: Arc<dyn HistoryStore>,
    conversation: Conversation,
    active: Option<Exchange>,
    out: mpsc::Sender<ServerMessage>,
}

impl Session {
    async fn send(&self, message: ServerMessage) {
        if self.out.send(message).await.is_err() {
            warn!("Outbound channel closed for {}", self.peer);
        }
    }

    async fn send_error(&self, message: impl Into<String>) {
        self.send(ServerMessage::Error { message: message.into() }).await;
    }

    async fn open(&self) {
        self.history.save(&self.conversation).await;
        self.send(ServerMessage::Session {
            conversation_id: self.conversation.id().to_string(),
        }).await;
    }

    /// Returns `false` when the connection should close.
    async fn on_frame(&mut self, message: Message) -> bool {
        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                self.peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            self.send_error("Message too large").await;
            return false;
        }

        match message {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_message) => self.on_client_message(client_message).await,
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", self.peer, e);
                        self.send_error(format!("Failed to parse message: {}", e)).await;
                    }
                }
                true
            }
            Message::Close(_) => {
                info!("Received close frame from {}", self.peer);
                false
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => true,
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", self.peer);
                true
            }
        }
    }

    async fn on_client_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Chat { content } => self.start_exchange(&content).await,
            ClientMessage::Cancel => {
                match self.active.as_mut() {
                    Some(exchange) => exchange.cancel(),
                    None => self.send_error("No reply is being generated").await,
                }
            }
            ClientMessage::Clear => self.clear().await,
            ClientMessage::StudyPlan(req) => {
                let assistant = Arc::clone(&self.assistant);
                let out = self.out.clone();
                tokio::spawn(async move {
                    let content = assistant.generate_study_plan(&req).await;
                    let _ = out.send(ServerMessage::StudyPlan { content }).await;
                });
            }
            ClientMessage::Pdf { data, filename } => {
                debug!("PDF upload from {}: {:?} ({} base64 bytes)", self.peer, filename, data.len());
                let input = if data.is_empty() {
                    None
                } else {
                    match general_purpose::STANDARD.decode(data.as_bytes()) {
                        Ok(bytes) => Some(PdfInput::Bytes(bytes)),
                        Err(e) => {
                            self.send(ServerMessage::Pdf {
                                content: format!("Error processing PDF: {}", e),
                            }).await;
                            return;
                        }
                    }
                };
                let assistant = Arc::clone(&self.assistant);
                let out = self.out.clone();
                tokio::spawn(async move {
                    let content = assistant.preview_pdf(input).await;
                    let _ = out.send(ServerMessage::Pdf { content }).await;
                });
            }
        }
    }

    async fn start_exchange(&mut self, content: &str) {
        if self.active.is_some() {
            self.send_error("A reply is still being generated; cancel it first").await;
            return;
        }

        match self.assistant.respond(self.conversation.clone(), content) {
            Ok(exchange) => {
                self.active = Some(exchange);
                self.send(ServerMessage::Typing).await;
            }
            Err(e) => {
                error!("Could not start exchange for {}: {}", self.peer, e);
                self.send_error(e.to_string()).await;
            }
        }
    }

    async fn settle_exchange(&mut self) {
        let exchange = match self.active.take() {
            Some(exchange) => exchange,
            None => {
                return;
            }
        };
        match exchange.finish().await {
            Ok(conversation) => {
                self.conversation = conversation;
            }
            Err(e) => {
                error!("Exchange for {} did not settle: {}", self.peer, e);
            }
        }
        self.history.save(&self.conversation).await;
        self.send(ServerMessage::Done {
            conversation: self.conversation.snapshot(),
            timestamp: Utc::now().timestamp(),
        }).await;
    }

    async fn clear(&mut self) {
        if let Some(mut exchange) = self.active.take() {
            exchange.cancel();
            match exchange.finish().await {
                Ok(conversation) => {
                    self.conversation = conversation;
                }
                Err(e) => error!("Cancelled exchange for {} did not settle: {}", self.peer, e),
            }
        }
        if let Err(e) = self.conversation.clear() {
            error!("Could not clear conversation for {}: {}", self.peer, e);
            self.send_error(e.to_string()).await;
            return;
        }
        self.history.save(&self.conversation).await;
        self.send(ServerMessage::Cleared {
            conversation_id: self.conversation.id().to_string(),
        }).await;
    }

    async fn close(mut self) {
        if let Some(mut exchange) = self.active.take() {
            exchange.cancel();
            let _ = exchange.finish().await;
        }
        self.history.remove(self.conversation.id()).await;
        info!(
            "WebSocket connection closed for {} (Conv ID: {})",
            self.peer,
            self.conversation.id()
        );
    }
}

async fn next_snapshot(active: &mut Option<Exchange>) -> Option<ConversationSnapshot> {
    match active.as_mut() {
        Some(exchange) => exchange.next().await,
        None => std::future::pending().await,
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    assistant: Arc<Assistant>,
    history: Arc<dyn HistoryStore>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let (mut sink, mut rx) = websocket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", peer, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(json)).await {
                error!("Error sending to {}: {}", peer, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session {
        peer,
        assistant,
        history,
        conversation: Conversation::new(),
        active: None,
        out: out_tx,
    };
    info!("Assigned conversation ID {} to {}", session.conversation.id(), peer);
    session.open().await;

    loop {
        tokio::select! {
            incoming = rx.next() => {
                match incoming {
                    Some(Ok(message)) => {
                        if !session.on_frame(message).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        match e {
                            | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                            | tokio_tungstenite::tungstenite::Error::Protocol(_) => {
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
                }
            }
            snapshot = next_snapshot(&mut session.active) => {
                match snapshot {
                    Some(conversation) => {
                        session.send(ServerMessage::Conversation { conversation }).await;
                    }
                    None => session.settle_exchange().await,
                }
            }
        }
    }

    session.close().await;
    let _ = writer.await;
}
