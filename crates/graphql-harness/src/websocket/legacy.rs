//! The `graphql-ws` subprotocol of the deprecated `subscriptions-transport-ws` library.

use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_tungstenite::tungstenite::{self, Message};
use futures::{channel::mpsc, Sink, SinkExt, Stream, StreamExt};
use futures_util::lock::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use super::{ConnectRequest, EventStream, SubscriptionTransport};
use crate::{Error, ExecutionResult, GraphqlRequest};

type WebsocketSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;
type WebsocketStream = Pin<Box<dyn Stream<Item = Result<Message, tungstenite::Error>> + Send>>;
type Senders = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Result<ExecutionResult, Error>>>>>;

#[derive(Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Start {
        id: String,
        payload: GraphqlRequest,
    },
    Stop {
        id: String,
    },
    ConnectionTerminate,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    ConnectionAck,
    ConnectionError {
        #[serde(default)]
        payload: serde_json::Value,
    },
    #[serde(rename = "ka")]
    KeepAlive,
    Data {
        id: String,
        payload: ExecutionResult,
    },
    Error {
        id: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Complete {
        id: String,
    },
}

pub(super) struct LegacyTransport {
    sink: AsyncMutex<WebsocketSink>,
    senders: Senders,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl LegacyTransport {
    pub(super) async fn connect(request: ConnectRequest) -> Result<Self, Error> {
        let (connection, _) = async_tungstenite::tokio::connect_async(request.client_request()?).await?;
        let (sink, stream) = connection.split();

        let mut sink: WebsocketSink = Box::pin(sink);
        let mut stream: WebsocketStream = Box::pin(stream);

        send(
            &mut sink,
            &ClientMessage::ConnectionInit {
                payload: request.connection_params,
            },
        )
        .await?;

        loop {
            let Some(message) = stream.next().await else {
                return Err(Error::Protocol("connection closed before connection_ack".into()));
            };

            let text = match message? {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    return Err(Error::Protocol(format!("connection closed before connection_ack: {frame:?}")));
                }
                _ => continue,
            };

            match serde_json::from_str::<ServerMessage>(&text)? {
                ServerMessage::ConnectionAck => break,
                ServerMessage::ConnectionError { payload } => return Err(Error::ConnectionRejected(payload)),
                ServerMessage::KeepAlive => continue,
                other => {
                    return Err(Error::Protocol(format!("unexpected message before connection_ack: {other:?}")));
                }
            }
        }

        let senders = Senders::default();

        Ok(LegacyTransport {
            sink: AsyncMutex::new(sink),
            senders: senders.clone(),
            next_id: AtomicU64::new(1),
            reader: tokio::spawn(read(stream, senders)),
        })
    }
}

#[async_trait::async_trait]
impl SubscriptionTransport for LegacyTransport {
    async fn subscribe(&self, request: GraphqlRequest) -> Result<EventStream, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (sender, receiver) = mpsc::unbounded();

        // registered first so that no data message can be missed
        lock(&self.senders).insert(id.clone(), sender);

        let start = ClientMessage::Start {
            id: id.clone(),
            payload: request,
        };

        if let Err(err) = send(&mut *self.sink.lock().await, &start).await {
            lock(&self.senders).remove(&id);
            return Err(err);
        }

        Ok(Box::pin(receiver))
    }

    async fn dispose(&self) {
        let ids = lock(&self.senders).drain().map(|(id, _)| id).collect::<Vec<_>>();
        let mut sink = self.sink.lock().await;

        for id in ids {
            if let Err(err) = send(&mut sink, &ClientMessage::Stop { id }).await {
                tracing::debug!("could not stop subscription: {err}");
            }
        }

        if let Err(err) = send(&mut sink, &ClientMessage::ConnectionTerminate).await {
            tracing::debug!("could not terminate connection: {err}");
        }

        if let Err(err) = sink.close().await {
            tracing::debug!("could not close websocket: {err}");
        }

        self.reader.abort();
    }
}

impl Drop for LegacyTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn send(sink: &mut WebsocketSink, message: &ClientMessage) -> Result<(), Error> {
    let text = serde_json::to_string(message)?;
    sink.send(Message::text(text)).await?;

    Ok(())
}

/// Routes server messages to the subscription they belong to.
async fn read(mut stream: WebsocketStream, senders: Senders) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                tracing::warn!("websocket read failed: {err}");
                break;
            }
        };

        let message = match serde_json::from_str::<ServerMessage>(&text) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!("ignoring unexpected message {text}: {err}");
                continue;
            }
        };

        match message {
            ServerMessage::Data { id, payload } => {
                if let Some(sender) = lock(&senders).get(&id) {
                    sender.unbounded_send(Ok(payload)).ok();
                }
            }
            ServerMessage::Error { id, payload } => {
                if let Some(sender) = lock(&senders).remove(&id) {
                    sender.unbounded_send(Err(Error::OperationRejected(payload))).ok();
                }
            }
            // dropping the sender ends the stream
            ServerMessage::Complete { id } => {
                lock(&senders).remove(&id);
            }
            ServerMessage::ConnectionError { payload } => {
                tracing::warn!("connection error from the server: {payload}");
            }
            ServerMessage::ConnectionAck | ServerMessage::KeepAlive => {}
        }
    }

    for (_, sender) in lock(&senders).drain() {
        sender
            .unbounded_send(Err(Error::Protocol("connection closed by the server".into())))
            .ok();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
