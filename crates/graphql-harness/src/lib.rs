//! Fluent test harness for GraphQL servers.
//!
//! HTTP operations are sent through an [`HttpTransport`], either an in-process
//! [`axum::Router`] or a listening server through [`ReqwestTransport`]:
//!
//! ```ignore
//! let response = graphql_harness::request(app)
//!     .query("{ hi }")
//!     .expect_no_errors()
//!     .await?;
//! ```
//!
//! Subscriptions need a listening server and return a [`StreamingResult`]
//! from which results are pulled one at a time:
//!
//! ```ignore
//! let pool = SubscriptionPool::new();
//! let greetings = pool.subscription(address).subscribe("subscription { greetings }").await?;
//!
//! let first = greetings.next().expect_no_errors().await?;
//! greetings.expect_no_pending()?;
//!
//! pool.end_all().await;
//! ```
//!
//! Builders only record configuration, nothing is sent before they are awaited.

mod assertion;
mod config;
mod directives;
mod document;
mod error;
mod operation;
mod pool;
mod queue;
mod request;
mod response;
mod streaming;
mod subscription;
mod transport;
mod websocket;

pub use assertion::{Assertion, AssertionError, Assertions};
pub use config::HarnessConfig;
pub use directives::{Auth, Cookies, HeaderDirective};
pub use document::{operation_name, Document};
pub use error::Error;
pub use operation::OperationRequest;
pub use pool::SubscriptionPool;
pub use queue::{Pop, RendezvousQueue};
pub use request::GraphqlRequest;
pub use response::{ExecutionResult, GraphqlError, HttpExecutionResult};
pub use streaming::{NextResult, StreamingResult};
pub use subscription::SubscriptionRequest;
pub use transport::{HttpTransport, ReqwestTransport};
pub use websocket::{
    EventStream, ServerAddress, SubscriptionTransport, Tls, WebSocketProtocol, LEGACY_WEBSOCKET_PROTOCOL,
};

/// Starts an HTTP operation against `transport`.
pub fn request(transport: impl HttpTransport + 'static) -> OperationRequest {
    OperationRequest::new(transport)
}

/// Starts a subscription against a listening server.
///
/// The subscription isn't tracked by any pool, see [`SubscriptionPool::subscription`].
pub fn subscription(server: impl ServerAddress) -> SubscriptionRequest {
    SubscriptionRequest::new(server)
}
