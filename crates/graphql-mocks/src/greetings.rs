use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_graphql::{Context, Object, Result, Subscription};
use futures::Stream;
use tokio::sync::broadcast;

pub type GreetingsGraphql = async_graphql::Schema<Query, Mutation, SubscriptionRoot>;

/// A small schema greeting people:
///
/// ```graphql
/// type Query { hi(name: String): String! }
/// type Mutation { do: String! }
/// type Subscription { greetings: String! countdown(from: Int!): Int! }
/// ```
///
/// `greetings` streams whatever is passed to [`GreetingsSchema::publish`].
#[derive(Clone)]
pub struct GreetingsSchema {
    schema: GreetingsGraphql,
    state: Arc<GreetingsState>,
}

struct GreetingsState {
    failure: Mutex<Option<String>>,
    greetings: broadcast::Sender<String>,
}

impl Default for GreetingsSchema {
    fn default() -> Self {
        let (greetings, _) = broadcast::channel(64);
        let state = Arc::new(GreetingsState {
            failure: Mutex::new(None),
            greetings,
        });

        GreetingsSchema {
            schema: async_graphql::Schema::build(Query, Mutation, SubscriptionRoot)
                .data(Arc::clone(&state))
                .finish(),
            state,
        }
    }
}

impl GreetingsSchema {
    pub fn schema(&self) -> &GreetingsGraphql {
        &self.schema
    }

    /// Makes `hi` fail with `message` until reset with `None`.
    pub fn fail_with(&self, message: Option<&str>) {
        *self.state.failure.lock().unwrap_or_else(PoisonError::into_inner) = message.map(str::to_string);
    }

    /// Sends a greeting to every active `greetings` subscription and returns
    /// how many received it.
    ///
    /// Subscriptions are started asynchronously by the server, so this waits
    /// a little for at least one of them.
    pub async fn publish(&self, greeting: impl Into<String>) -> usize {
        self.wait_for_subscribers(1).await;
        self.state.greetings.send(greeting.into()).unwrap_or_default()
    }

    /// Waits up to a second for `count` active `greetings` subscriptions.
    pub async fn wait_for_subscribers(&self, count: usize) -> bool {
        for _ in 0..200 {
            if self.state.greetings.receiver_count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        false
    }

    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }
}

pub struct Query;

#[Object]
impl Query {
    async fn hi(&self, ctx: &Context<'_>, name: Option<String>) -> Result<String> {
        let state = ctx.data::<Arc<GreetingsState>>()?;

        if let Some(message) = state.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(message.into());
        }

        Ok(format!("hi {}!", name.unwrap_or_default()))
    }
}

pub struct Mutation;

#[Object]
impl Mutation {
    #[graphql(name = "do")]
    async fn do_(&self) -> &'static str {
        "done!"
    }
}

pub struct SubscriptionRoot;

#[Subscription(name = "Subscription")]
impl SubscriptionRoot {
    async fn greetings(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = String>> {
        let receiver = ctx.data::<Arc<GreetingsState>>()?.greetings.subscribe();

        Ok(futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(greeting) => return Some((greeting, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("greetings subscription skipped {skipped} messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }

    async fn countdown(&self, from: u32) -> impl Stream<Item = u32> {
        futures::stream::iter((0..=from).rev())
    }
}
