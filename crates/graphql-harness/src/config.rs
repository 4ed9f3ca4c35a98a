use std::time::Duration;

use crate::WebSocketProtocol;

/// Defaults applied to every request built from it. Per-request calls such as
/// `path` or `protocol` take precedence.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// GraphQL endpoint path, `/graphql` by default.
    pub path: String,
    /// Websocket subscription protocol, `graphql-transport-ws` by default.
    pub protocol: WebSocketProtocol,
    /// How long `next()` waits for a subscription result. Unbounded by default.
    #[serde(deserialize_with = "duration_str::deserialize_option_duration")]
    pub next_timeout: Option<Duration>,
    /// Delay after disposing a `graphql-transport-ws` connection, letting the
    /// unsubscribe messages go out. 5ms by default.
    #[serde(deserialize_with = "duration_str::deserialize_duration")]
    pub dispose_grace_period: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            path: String::from("/graphql"),
            protocol: WebSocketProtocol::default(),
            next_timeout: None,
            dispose_grace_period: Duration::from_millis(5),
        }
    }
}
