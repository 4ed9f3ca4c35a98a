use std::time::Duration;

use crate::assertion::AssertionError;

/// The error type of every fallible harness operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The builder was executed before `query`, `mutate`, `operation` or `subscribe` was called.
    #[error("missing operation: call `query`, `mutate`, `operation` or `subscribe` before executing the request")]
    MissingOperation,
    /// The server answered with something that isn't a JSON object.
    #[error("received a non valid body: {0}")]
    InvalidBody(String),
    #[error(
        "server must be listening before a websocket operation can target it:\n\
         bind a listener first, e.g. `tokio::net::TcpListener::bind(\"127.0.0.1:0\")`,\n\
         serve the application on it, then hand the listener or its address to the subscription request.\n\
         In-process routers are only supported for HTTP operations."
    )]
    ServerNotListening,
    #[error("invalid GraphQL document: {0}")]
    InvalidDocument(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("invalid variables: {0}")]
    InvalidVariables(String),
    #[error("invalid connection params: {0}")]
    InvalidConnectionParams(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("unsupported url scheme for {0}")]
    UnsupportedScheme(String),
    #[error("http request failed: {0}")]
    Http(String),
    /// The server refused the websocket connection during the protocol handshake.
    #[error("connection rejected by the server: {0}")]
    ConnectionRejected(serde_json::Value),
    /// The server refused to start the operation.
    #[error("operation rejected by the server: {0}")]
    OperationRejected(serde_json::Value),
    #[error("websocket protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    WebsocketClient(#[from] graphql_ws_client::Error),
    #[error(transparent)]
    Websocket(#[from] async_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Timeout after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("the result queue was dropped before a result arrived")]
    QueueClosed,
    #[error("expect no pending, but got {0}")]
    PendingResults(usize),
    #[error(transparent)]
    Assertion(#[from] AssertionError),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

impl From<http::Error> for Error {
    fn from(value: http::Error) -> Self {
        Self::Http(value.to_string())
    }
}

impl From<axum::Error> for Error {
    fn from(value: axum::Error) -> Self {
        Self::Http(value.to_string())
    }
}
