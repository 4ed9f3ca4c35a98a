//! Adapted from [this async-graphql-axum module](https://github.com/async-graphql/async-graphql/blob/33282a1bb54912aff2c377fa216df758021fda2c/integrations/axum/src/subscription.rs), but recording every connection handshake.

use std::{
    convert::Infallible,
    sync::Arc,
    task::{Context, Poll},
};

use async_graphql::{http::ALL_WEBSOCKET_PROTOCOLS, Data};
use async_graphql_axum::{GraphQLProtocol, GraphQLWebSocket};
use axum::{
    body::{Body, HttpBody},
    extract::{FromRequestParts as _, Request, WebSocketUpgrade},
    response::{IntoResponse as _, Response},
};
use crossbeam_queue::SegQueue;
use futures_util::future::BoxFuture;
use tower::Service;

use crate::greetings::GreetingsGraphql;

/// What the server saw when a websocket client connected.
#[derive(Debug, Clone)]
pub struct WebsocketHandshake {
    /// Headers of the upgrade request.
    pub headers: http::HeaderMap,
    /// Subprotocol negotiated with the client.
    pub protocol: &'static str,
    /// Payload of the connection init message.
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub(crate) struct SubscriptionService {
    schema: GreetingsGraphql,
    handshakes: Arc<SegQueue<WebsocketHandshake>>,
}

impl SubscriptionService {
    pub(crate) fn new(schema: GreetingsGraphql, handshakes: Arc<SegQueue<WebsocketHandshake>>) -> Self {
        Self { schema, handshakes }
    }
}

impl<B> Service<Request<B>> for SubscriptionService
where
    B: HttpBody + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let schema = self.schema.clone();
        let handshakes = Arc::clone(&self.handshakes);

        Box::pin(async move {
            let (mut parts, _body) = req.into_parts();

            let protocol = match GraphQLProtocol::from_request_parts(&mut parts, &()).await {
                Ok(protocol) => protocol,
                Err(err) => return Ok(err.into_response()),
            };
            let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
                Ok(protocol) => protocol,
                Err(err) => return Ok(err.into_response()),
            };

            let negotiated = protocol.0.sec_websocket_protocol();

            let resp = upgrade.protocols(ALL_WEBSOCKET_PROTOCOLS).on_upgrade(move |stream| {
                GraphQLWebSocket::new(stream, schema, protocol)
                    .on_connection_init(move |payload| async move {
                        let rejected = payload.get("reject").and_then(serde_json::Value::as_bool) == Some(true);

                        handshakes.push(WebsocketHandshake {
                            headers: parts.headers,
                            protocol: negotiated,
                            payload,
                        });

                        if rejected {
                            return Err(async_graphql::Error::new("connection rejected"));
                        }

                        Ok(Data::default())
                    })
                    .serve()
            });

            Ok(resp.into_response())
        })
    }
}
