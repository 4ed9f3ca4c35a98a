//! Websocket transports for subscriptions.
//!
//! Both subprotocols are hidden behind [`SubscriptionTransport`]: the
//! streaming result only sees a stream of execution results and a way to
//! tear the connection down.

mod legacy;
mod modern;

use std::{fmt, net::SocketAddr, time::Duration};

use async_tungstenite::tungstenite::{client::IntoClientRequest, handshake::client::Request};
use futures::stream::BoxStream;
use http::{HeaderMap, HeaderValue};
use url::Url;

use crate::{Error, ExecutionResult, GraphqlRequest};

/// Subprotocol name of the legacy `subscriptions-transport-ws` protocol.
pub const LEGACY_WEBSOCKET_PROTOCOL: &str = "graphql-ws";

/// Results of a single subscription, in arrival order. An `Err` ends the
/// subscription.
pub type EventStream = BoxStream<'static, Result<ExecutionResult, Error>>;

/// A connected websocket client able to run one subscription.
#[async_trait::async_trait]
pub trait SubscriptionTransport: Send + Sync {
    async fn subscribe(&self, request: GraphqlRequest) -> Result<EventStream, Error>;

    /// Unsubscribes and closes the connection. Failures are logged, never returned.
    async fn dispose(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum WebSocketProtocol {
    /// `graphql-transport-ws`, from the `graphql-ws` library.
    #[default]
    #[serde(rename = "graphql-transport-ws")]
    GraphqlTransportWs,
    /// `graphql-ws`, from the deprecated `subscriptions-transport-ws` library.
    #[serde(rename = "graphql-ws")]
    GraphqlWs,
}

impl WebSocketProtocol {
    /// Value of the `Sec-WebSocket-Protocol` header.
    pub fn as_str(self) -> &'static str {
        match self {
            WebSocketProtocol::GraphqlTransportWs => "graphql-transport-ws",
            WebSocketProtocol::GraphqlWs => LEGACY_WEBSOCKET_PROTOCOL,
        }
    }

    pub(crate) async fn connect(self, request: ConnectRequest) -> Result<Box<dyn SubscriptionTransport>, Error> {
        tracing::debug!(url = %request.url, protocol = self.as_str(), "opening websocket connection");

        match self {
            WebSocketProtocol::GraphqlTransportWs => Ok(Box::new(modern::ModernTransport::connect(request).await?)),
            WebSocketProtocol::GraphqlWs => Ok(Box::new(legacy::LegacyTransport::connect(request).await?)),
        }
    }
}

impl fmt::Display for WebSocketProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WebSocketProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graphql-transport-ws" => Ok(WebSocketProtocol::GraphqlTransportWs),
            LEGACY_WEBSOCKET_PROTOCOL => Ok(WebSocketProtocol::GraphqlWs),
            other => Err(Error::Protocol(format!("unknown websocket subprotocol {other:?}"))),
        }
    }
}

pub(crate) struct ConnectRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub connection_params: Option<serde_json::Value>,
    pub protocol: WebSocketProtocol,
    pub grace_period: Duration,
}

impl ConnectRequest {
    fn client_request(&self) -> Result<Request, Error> {
        let mut request = self.url.as_str().into_client_request()?;

        request.headers_mut().extend(self.headers.clone());
        request.headers_mut().insert(
            http::header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(self.protocol.as_str()),
        );

        Ok(request)
    }
}

/// Something a websocket connection can be opened against.
///
/// The server has to be listening already: in-process applications only
/// work for HTTP operations.
pub trait ServerAddress {
    /// Base `ws://` or `wss://` URL of the server, path excluded.
    fn websocket_base(&self) -> Result<Url, Error>;
}

impl ServerAddress for SocketAddr {
    fn websocket_base(&self) -> Result<Url, Error> {
        // SocketAddr's Display already brackets IPv6 hosts.
        Ok(Url::parse(&format!("ws://{self}"))?)
    }
}

impl ServerAddress for Option<SocketAddr> {
    fn websocket_base(&self) -> Result<Url, Error> {
        self.as_ref().ok_or(Error::ServerNotListening)?.websocket_base()
    }
}

impl ServerAddress for tokio::net::TcpListener {
    fn websocket_base(&self) -> Result<Url, Error> {
        self.local_addr().ok().websocket_base()
    }
}

impl ServerAddress for std::net::TcpListener {
    fn websocket_base(&self) -> Result<Url, Error> {
        self.local_addr().ok().websocket_base()
    }
}

/// `http` and `https` URLs are mapped to `ws` and `wss`.
impl ServerAddress for Url {
    fn websocket_base(&self) -> Result<Url, Error> {
        let scheme = match self.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            _ => return Err(Error::UnsupportedScheme(self.to_string())),
        };

        let mut url = self.clone();
        url.set_scheme(scheme)
            .map_err(|()| Error::UnsupportedScheme(self.to_string()))?;

        Ok(url)
    }
}

impl ServerAddress for str {
    fn websocket_base(&self) -> Result<Url, Error> {
        Url::parse(self)?.websocket_base()
    }
}

impl ServerAddress for String {
    fn websocket_base(&self) -> Result<Url, Error> {
        self.as_str().websocket_base()
    }
}

impl<T: ServerAddress + ?Sized> ServerAddress for &T {
    fn websocket_base(&self) -> Result<Url, Error> {
        (**self).websocket_base()
    }
}

/// Connects with `wss` to a server terminating TLS.
#[derive(Debug, Clone, Copy)]
pub struct Tls<A>(pub A);

impl<A: ServerAddress> ServerAddress for Tls<A> {
    fn websocket_base(&self) -> Result<Url, Error> {
        let mut url = self.0.websocket_base()?;
        url.set_scheme("wss")
            .map_err(|()| Error::UnsupportedScheme(url.to_string()))?;

        Ok(url)
    }
}
