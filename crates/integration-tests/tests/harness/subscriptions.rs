use std::{net::SocketAddr, time::Duration};

use graphql_harness::{Error, StreamingResult, SubscriptionPool, WebSocketProtocol};
use graphql_mocks::MockApp;
use integration_tests::runtime;
use serde_json::json;

const PROTOCOLS: [WebSocketProtocol; 2] = [WebSocketProtocol::GraphqlTransportWs, WebSocketProtocol::GraphqlWs];

async fn wait_for_pending(subscription: &StreamingResult, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while subscription.len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[test]
fn published_events_are_received() {
    for protocol in PROTOCOLS {
        let result = runtime().block_on(async move {
            let server = MockApp::default().serve().await;

            let greetings = graphql_harness::subscription(server.address())
                .protocol(protocol)
                .subscribe("subscription { greetings }")
                .await
                .unwrap();

            assert_eq!(server.schema().publish("Hi").await, 1);

            let result = greetings.next().expect_no_errors().await.unwrap();
            greetings.expect_no_pending().unwrap();
            greetings.close().await;

            result
        });

        insta::assert_json_snapshot!(result, @r#"
        {
          "data": {
            "greetings": "Hi"
          }
        }
        "#);
    }
}

#[test]
fn results_arrive_in_order() {
    for protocol in PROTOCOLS {
        runtime().block_on(async move {
            let server = MockApp::default().serve().await;

            let countdown = graphql_harness::subscription(server.address())
                .protocol(protocol)
                .subscribe_with_variables(
                    "subscription Countdown($from: Int!) { countdown(from: $from) }",
                    json!({ "from": 3 }),
                )
                .await
                .unwrap();

            let first = countdown.next();
            let second = countdown.next();

            let mut values = vec![first.await.unwrap().into_data(), second.await.unwrap().into_data()];
            values.push(countdown.next().await.unwrap().into_data());
            values.push(countdown.next().await.unwrap().into_data());

            assert_eq!(
                values,
                vec![
                    json!({ "countdown": 3 }),
                    json!({ "countdown": 2 }),
                    json!({ "countdown": 1 }),
                    json!({ "countdown": 0 }),
                ],
                "{protocol}"
            );

            // completed, nothing else comes
            let error = countdown.next_within(Duration::from_millis(50)).await.unwrap_err();
            assert_eq!(error.to_string(), "Timeout after 50ms");

            countdown.close().await;
        });
    }
}

#[test]
fn next_times_out_and_keeps_late_results() {
    runtime().block_on(async move {
        let server = MockApp::default().serve().await;

        let greetings = graphql_harness::subscription(server.address())
            .next_timeout(Duration::from_millis(100))
            .subscribe("subscription { greetings }")
            .await
            .unwrap();

        let error = greetings.next().await.unwrap_err();
        assert!(matches!(error, Error::Timeout(_)), "{error}");

        server.schema().publish("late").await;

        let result = greetings.next().await.unwrap();
        assert_eq!(result.into_data(), json!({ "greetings": "late" }));

        greetings.close().await;
    });
}

#[test]
fn pending_results_can_be_flushed() {
    runtime().block_on(async move {
        let server = MockApp::default().serve().await;

        let greetings = graphql_harness::subscription(server.address())
            .subscribe("subscription { greetings }")
            .await
            .unwrap();

        server.schema().publish("Hi").await;
        server.schema().publish("Hello").await;
        wait_for_pending(&greetings, 2).await;

        let error = greetings.expect_no_pending().unwrap_err();
        assert_eq!(error.to_string(), "expect no pending, but got 2");

        let flushed = greetings.flush().into_iter().map(|result| result.into_data()).collect::<Vec<_>>();
        assert_eq!(flushed, vec![json!({ "greetings": "Hi" }), json!({ "greetings": "Hello" })]);

        assert!(greetings.expect_no_pending().is_ok());
        greetings.close().await;
    });
}

#[test]
fn handshake_carries_headers_and_connection_params() {
    for protocol in PROTOCOLS {
        runtime().block_on(async move {
            let server = MockApp::default().serve().await;

            let greetings = graphql_harness::subscription(server.address())
                .protocol(protocol)
                .header("x-client", "integration-tests")
                .connection_params(json!({ "token": "secret" }))
                .subscribe("subscription { greetings }")
                .await
                .unwrap();

            let handshake = server.drain_websocket_handshakes().next().unwrap();
            assert_eq!(handshake.protocol, protocol.as_str());
            assert_eq!(handshake.headers["x-client"], "integration-tests");
            assert_eq!(handshake.payload, json!({ "token": "secret" }));

            greetings.close().await;
        });
    }
}

#[test]
fn rejected_connection() {
    for protocol in PROTOCOLS {
        let (error, handshakes) = runtime().block_on(async move {
            let server = MockApp::default().serve().await;

            let error = graphql_harness::subscription(server.address())
                .protocol(protocol)
                .connection_params(json!({ "reject": true }))
                .subscribe("subscription { greetings }")
                .await
                .unwrap_err();

            (error, server.drain_websocket_handshakes().count())
        });

        assert_eq!(handshakes, 1, "{protocol}");

        match (protocol, error) {
            (WebSocketProtocol::GraphqlWs, Error::ConnectionRejected(payload)) => {
                assert_eq!(payload["message"], "connection rejected");
            }
            // the server closes the socket instead of acknowledging
            (WebSocketProtocol::GraphqlTransportWs, Error::WebsocketClient(_)) => {}
            (protocol, other) => unreachable!("{protocol}: unexpected error: {other}"),
        }
    }
}

#[test]
fn invalid_subscriptions_end_with_errors() {
    for protocol in PROTOCOLS {
        runtime().block_on(async move {
            let server = MockApp::default().serve().await;

            let invalid = graphql_harness::subscription(server.address())
                .protocol(protocol)
                .subscribe("subscription { unknown }")
                .await
                .unwrap();

            let result = invalid.next_within(Duration::from_secs(5)).await.unwrap();
            assert!(!result.errors().is_empty(), "{protocol}: {result}");

            invalid.close().await;
        });
    }
}

#[test]
fn http_urls_are_accepted() {
    runtime().block_on(async move {
        let server = MockApp::default().with_path("/specialUrl").serve().await;

        let greetings = graphql_harness::subscription(server.url())
            .path("/specialUrl")
            .subscribe("subscription { greetings }")
            .await
            .unwrap();

        server.schema().publish("Hi").await;
        greetings.next().expect_no_errors().await.unwrap();

        greetings.close().await;
        greetings.close().await;
    });
}

#[test]
fn server_must_be_listening() {
    let error = runtime().block_on(async move {
        graphql_harness::subscription(None::<SocketAddr>)
            .subscribe("subscription { greetings }")
            .await
            .unwrap_err()
    });

    assert!(matches!(error, Error::ServerNotListening));
    assert!(error.to_string().contains("must be listening"));
}

#[test]
fn pool_closes_every_subscription() {
    runtime().block_on(async move {
        let server = MockApp::default().serve().await;
        let pool = SubscriptionPool::new();

        let first = pool
            .subscription(server.address())
            .subscribe("subscription { greetings }")
            .await
            .unwrap();
        let second = pool
            .subscription(server.address())
            .protocol(WebSocketProtocol::GraphqlWs)
            .subscribe("subscription { greetings }")
            .await
            .unwrap();

        assert_eq!(pool.len(), 2);

        assert!(server.schema().wait_for_subscribers(2).await);
        server.schema().publish("Hi").await;
        first.next().await.unwrap();
        second.next().await.unwrap();

        pool.end_all().await;
        assert!(pool.is_empty());

        // already closed by the pool
        first.close().await;
        second.close().await;
    });
}

#[test]
fn process_wide_pool() {
    runtime().block_on(async move {
        let server = MockApp::default().serve().await;

        let greetings = graphql_harness::subscription(server.address())
            .pool(integration_tests::subscriptions())
            .subscribe("subscription { greetings }")
            .await
            .unwrap();

        assert!(!integration_tests::subscriptions().is_empty());

        server.schema().publish("Hi").await;
        greetings.next().expect_no_errors().await.unwrap();

        integration_tests::teardown().await;
        assert!(integration_tests::subscriptions().is_empty());
    });
}
