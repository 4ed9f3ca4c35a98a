//! A mock GraphQL server for testing the harness

use std::{net::SocketAddr, ops::Deref, sync::Arc};

use async_graphql_axum::GraphQLResponse;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use crossbeam_queue::SegQueue;
use url::Url;

mod greetings;
mod websockets;

pub use greetings::{GreetingsGraphql, GreetingsSchema};
pub use websockets::WebsocketHandshake;

/// An HTTP request received by the GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

/// The application under test: a [`GreetingsSchema`] served over HTTP `POST`
/// and both websocket subprotocols on a single path.
#[derive(Clone)]
pub struct MockApp {
    schema: GreetingsSchema,
    path: String,
    received: Arc<SegQueue<ReceivedRequest>>,
    handshakes: Arc<SegQueue<websockets::WebsocketHandshake>>,
}

impl Default for MockApp {
    fn default() -> Self {
        Self::new(GreetingsSchema::default())
    }
}

impl MockApp {
    pub fn new(schema: GreetingsSchema) -> Self {
        MockApp {
            schema,
            path: String::from("/graphql"),
            received: Default::default(),
            handshakes: Default::default(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn schema(&self) -> &GreetingsSchema {
        &self.schema
    }

    pub fn router(&self) -> Router {
        let subscriptions = websockets::SubscriptionService::new(self.schema.schema().clone(), self.handshakes.clone());

        Router::new()
            .route(&self.path, post(graphql_handler).get_service(subscriptions))
            .with_state(self.clone())
    }

    pub fn drain_received_requests(&self) -> impl Iterator<Item = ReceivedRequest> + '_ {
        std::iter::from_fn(|| self.received.pop())
    }

    pub fn drain_websocket_handshakes(&self) -> impl Iterator<Item = WebsocketHandshake> + '_ {
        std::iter::from_fn(|| self.handshakes.pop())
    }

    /// Serves the application on a random local port.
    pub async fn serve(self) -> MockGraphQlServer {
        let router = self.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let (shutdown_sender, shutdown_receiver) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_receiver.await.ok();
                })
                .await
                .unwrap();
        });

        MockGraphQlServer {
            app: self,
            shutdown: Some(shutdown_sender),
            address,
        }
    }
}

async fn graphql_handler(State(app): State<MockApp>, headers: HeaderMap, body: Bytes) -> Response {
    let body: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    app.received.push(ReceivedRequest {
        headers,
        body: body.clone(),
    });

    let request: async_graphql::Request = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    GraphQLResponse::from(app.schema.schema().execute(request).await).into_response()
}

/// A [`MockApp`] listening on a local port, shut down when dropped.
pub struct MockGraphQlServer {
    app: MockApp,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    address: SocketAddr,
}

impl Drop for MockGraphQlServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send(()).ok();
        }
    }
}

impl Deref for MockGraphQlServer {
    type Target = MockApp;

    fn deref(&self) -> &Self::Target {
        &self.app
    }
}

impl MockGraphQlServer {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn url(&self) -> Url {
        format!("http://{}", self.address).parse().unwrap()
    }
}
