#![allow(unused_crate_dependencies, clippy::panic)]

use std::sync::OnceLock;

use graphql_harness::SubscriptionPool;
use tokio::runtime::Runtime;

#[ctor::ctor]
fn setup_rustls() {
    rustls::crypto::ring::default_provider().install_default().unwrap();
}

#[ctor::ctor]
fn setup_logging() {
    let filter = tracing_subscriber::filter::EnvFilter::builder()
        .parse(std::env::var("RUST_LOG").unwrap_or("graphql_harness=debug".to_string()))
        .unwrap();
    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .without_time()
        .with_test_writer()
        .init();
}

pub fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    })
}

/// Process-wide pool, drained by [`teardown`].
///
/// Tests run concurrently within a binary: a test draining it closes every
/// subscription registered here, not only its own.
pub fn subscriptions() -> &'static SubscriptionPool {
    static POOL: OnceLock<SubscriptionPool> = OnceLock::new();
    POOL.get_or_init(SubscriptionPool::new)
}

pub async fn teardown() {
    subscriptions().end_all().await;
}
