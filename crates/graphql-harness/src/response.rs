use std::{fmt, ops::Deref};

use bytes::Bytes;

use crate::Error;

/// A GraphQL execution result, as produced by the server.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphqlError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphqlError {
    pub message: String,
    /// `locations`, `path`, `extensions` and anything else the server sent.
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionResult {
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    pub fn errors(&self) -> &[GraphqlError] {
        self.errors.as_deref().unwrap_or_default()
    }

    pub fn into_data(self) -> serde_json::Value {
        self.data.unwrap_or_default()
    }

    pub fn data_as<T>(&self) -> Result<Option<T>, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        self.data
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// A terminal result standing for an error raised by the transport itself.
    pub(crate) fn from_transport_error(error: &Error) -> Self {
        ExecutionResult {
            data: None,
            errors: Some(vec![GraphqlError {
                message: error.to_string(),
                rest: serde_json::Map::new(),
            }]),
            extensions: None,
        }
    }

    pub(crate) fn from_http_body(body: &[u8]) -> Result<Self, Error> {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value @ serde_json::Value::Object(_)) => Ok(serde_json::from_value(value)?),
            _ => Err(Error::InvalidBody(String::from_utf8_lossy(body).into_owned())),
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// The result of an HTTP operation, merged with the raw response it came from.
#[derive(Debug, serde::Serialize)]
pub struct HttpExecutionResult {
    #[serde(flatten)]
    pub result: ExecutionResult,
    #[serde(skip)]
    pub response: http::Response<Bytes>,
}

impl HttpExecutionResult {
    pub fn status(&self) -> http::StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &http::HeaderMap {
        self.response.headers()
    }

    pub fn into_result(self) -> ExecutionResult {
        self.result
    }
}

impl Deref for HttpExecutionResult {
    type Target = ExecutionResult;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

impl fmt::Display for HttpExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.result.fmt(f)
    }
}
