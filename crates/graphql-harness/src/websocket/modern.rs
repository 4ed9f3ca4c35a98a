//! `graphql-transport-ws` through graphql-ws-client.

use std::{future::IntoFuture, time::Duration};

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::{ConnectRequest, EventStream, SubscriptionTransport};
use crate::{Error, ExecutionResult, GraphqlRequest};

pub(super) struct ModernTransport {
    client: graphql_ws_client::Client,
    actor: JoinHandle<()>,
    grace_period: Duration,
}

impl ModernTransport {
    pub(super) async fn connect(request: ConnectRequest) -> Result<Self, Error> {
        let (connection, _) = async_tungstenite::tokio::connect_async(request.client_request()?).await?;

        let (client, actor) = graphql_ws_client::Client::build(connection)
            .payload(request.connection_params.unwrap_or_default())?
            .await?;

        Ok(ModernTransport {
            client,
            actor: tokio::spawn(actor.into_future()),
            grace_period: request.grace_period,
        })
    }
}

#[async_trait::async_trait]
impl SubscriptionTransport for ModernTransport {
    async fn subscribe(&self, request: GraphqlRequest) -> Result<EventStream, Error> {
        let subscription = self.client.subscribe(request).await?;

        Ok(Box::pin(subscription.map(|item| item.map_err(Error::from))))
    }

    async fn dispose(&self) {
        self.client.clone().close(1000, "Normal Closure").await;

        // lets the complete and close frames reach the server before the actor goes
        tokio::time::sleep(self.grace_period).await;
        self.actor.abort();
    }
}

impl Drop for ModernTransport {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

impl graphql_ws_client::graphql::GraphqlOperation for GraphqlRequest {
    type Response = ExecutionResult;
    type Error = serde_json::Error;

    fn decode(&self, data: serde_json::Value) -> Result<Self::Response, Self::Error> {
        serde_json::from_value(data)
    }
}
