use std::{future::IntoFuture, time::Duration};

use futures::future::BoxFuture;
use url::Url;

use crate::{
    directives::HeaderDirectives, request::Operation, websocket::ConnectRequest, Auth, Document, Error,
    HarnessConfig, HeaderDirective, ServerAddress, StreamingResult, SubscriptionPool, WebSocketProtocol,
};

/// Builds a subscription over a websocket connection. Awaiting it connects,
/// starts the operation and returns the live [`StreamingResult`].
///
/// ```ignore
/// let greetings = subscription(listener.local_addr()?)
///     .subscribe("subscription { greetings }")
///     .await?;
///
/// let first = greetings.next().expect_no_errors().await?;
/// greetings.close().await;
/// ```
#[must_use = "a subscription request does nothing unless awaited"]
pub struct SubscriptionRequest {
    base: Result<Url, Error>,
    operation: Operation,
    path: String,
    protocol: WebSocketProtocol,
    connection_params: Option<serde_json::Value>,
    connection_params_error: Option<String>,
    headers: HeaderDirectives,
    pool: Option<SubscriptionPool>,
    grace_period: Duration,
    next_timeout: Option<Duration>,
}

impl SubscriptionRequest {
    pub fn new(server: impl ServerAddress) -> Self {
        let config = HarnessConfig::default();

        SubscriptionRequest {
            base: server.websocket_base(),
            operation: Operation::default(),
            path: config.path,
            protocol: config.protocol,
            connection_params: None,
            connection_params_error: None,
            headers: HeaderDirectives::default(),
            pool: None,
            grace_period: config.dispose_grace_period,
            next_timeout: config.next_timeout,
        }
    }

    pub fn with_config(mut self, config: &HarnessConfig) -> Self {
        self.path.clone_from(&config.path);
        self.protocol = config.protocol;
        self.grace_period = config.dispose_grace_period;
        self.next_timeout = config.next_timeout;
        self
    }

    pub fn subscribe(mut self, document: impl Into<Document>) -> Self {
        self.operation.set_document(document.into());
        self
    }

    pub fn subscribe_with_variables(self, document: impl Into<Document>, variables: impl serde::Serialize) -> Self {
        self.subscribe(document).variables(variables)
    }

    pub fn query(self, document: impl Into<Document>) -> Self {
        self.subscribe(document)
    }

    pub fn query_with_variables(self, document: impl Into<Document>, variables: impl serde::Serialize) -> Self {
        self.subscribe_with_variables(document, variables)
    }

    pub fn mutate(self, document: impl Into<Document>) -> Self {
        self.subscribe(document)
    }

    pub fn mutate_with_variables(self, document: impl Into<Document>, variables: impl serde::Serialize) -> Self {
        self.subscribe_with_variables(document, variables)
    }

    /// Accepts a parse result so that invalid documents are reported when the request is awaited.
    pub fn operation(mut self, document: Result<Document, Error>) -> Self {
        self.operation.set_document_source(document);
        self
    }

    pub fn variables(mut self, variables: impl serde::Serialize) -> Self {
        self.operation.set_variables(variables);
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation.set_operation_name(name);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn protocol(mut self, protocol: WebSocketProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Payload of the connection init message.
    pub fn connection_params(mut self, params: impl serde::Serialize) -> Self {
        match serde_json::to_value(params) {
            Ok(params) => {
                self.connection_params = Some(params);
                self.connection_params_error = None;
            }
            Err(err) => self.connection_params_error = Some(err.to_string()),
        }
        self
    }

    /// Sets headers on the websocket upgrade request.
    pub fn set(mut self, directive: impl Into<HeaderDirective>) -> Self {
        self.headers.set(directive.into());
        self
    }

    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set((name, value))
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.headers.auth(auth);
        self
    }

    /// Waits at most `duration` in each `next()` of the resulting subscription.
    pub fn next_timeout(mut self, duration: Duration) -> Self {
        self.next_timeout = Some(duration);
        self
    }

    /// Registers the subscription in `pool` once started, so that it can be
    /// closed with [`SubscriptionPool::end_all`].
    pub fn pool(mut self, pool: &SubscriptionPool) -> Self {
        self.pool = Some(pool.clone());
        self
    }

    async fn start(self) -> Result<StreamingResult, Error> {
        if let Some(message) = self.connection_params_error {
            return Err(Error::InvalidConnectionParams(message));
        }

        let request = self.operation.into_request()?;
        let url = self.base?.join(&self.path)?;

        let transport = self
            .protocol
            .connect(ConnectRequest {
                url,
                headers: self.headers.resolve()?,
                connection_params: self.connection_params,
                protocol: self.protocol,
                grace_period: self.grace_period,
            })
            .await?;

        let events = match transport.subscribe(request).await {
            Ok(events) => events,
            Err(err) => {
                transport.dispose().await;
                return Err(err);
            }
        };

        let streaming = StreamingResult::new(transport, events, self.next_timeout);

        if let Some(pool) = self.pool {
            pool.add(&streaming);
        }

        Ok(streaming)
    }
}

impl IntoFuture for SubscriptionRequest {
    type Output = Result<StreamingResult, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.start())
    }
}
