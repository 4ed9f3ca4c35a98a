use std::{future::IntoFuture, sync::Arc};

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{header, HeaderValue};

use crate::{
    directives::HeaderDirectives, request::Operation, Assertion, AssertionError, Assertions, Auth, Document, Error,
    ExecutionResult, HarnessConfig, HeaderDirective, HttpExecutionResult, HttpTransport,
};

/// Builds a single HTTP GraphQL operation. Awaiting it sends a `POST` to the
/// endpoint and runs the registered assertions against the result.
///
/// The builder can also be awaited by reference, executing the same operation
/// again each time.
#[must_use = "an operation request does nothing unless awaited"]
pub struct OperationRequest {
    transport: Arc<dyn HttpTransport>,
    operation: Operation,
    path: String,
    headers: HeaderDirectives,
    assertions: Assertions,
}

impl OperationRequest {
    pub fn new(transport: impl HttpTransport + 'static) -> Self {
        Self::with_shared_transport(Arc::new(transport))
    }

    pub fn with_shared_transport(transport: Arc<dyn HttpTransport>) -> Self {
        OperationRequest {
            transport,
            operation: Operation::default(),
            path: HarnessConfig::default().path,
            headers: HeaderDirectives::default(),
            assertions: Assertions::default(),
        }
    }

    pub fn with_config(mut self, config: &HarnessConfig) -> Self {
        self.path.clone_from(&config.path);
        self
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn query(mut self, document: impl Into<Document>) -> Self {
        self.operation.set_document(document.into());
        self
    }

    pub fn query_with_variables(self, document: impl Into<Document>, variables: impl serde::Serialize) -> Self {
        self.query(document).variables(variables)
    }

    pub fn mutate(self, document: impl Into<Document>) -> Self {
        self.query(document)
    }

    pub fn mutate_with_variables(self, document: impl Into<Document>, variables: impl serde::Serialize) -> Self {
        self.query_with_variables(document, variables)
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

    #[track_caller]
    pub fn expect_no_errors(mut self) -> Self {
        self.assertions.push(Assertion::no_errors());
        self
    }

    #[track_caller]
    pub fn expect<F>(mut self, check: F) -> Self
    where
        F: Fn(&ExecutionResult) -> Option<AssertionError> + Send + Sync + 'static,
    {
        self.assertions.push(Assertion::new(check));
        self
    }

    pub async fn execute(&self) -> Result<HttpExecutionResult, Error> {
        let payload = serde_json::to_vec(&self.operation.to_request()?)?;

        let mut headers = self.headers.resolve()?;
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));

        let mut request = http::Request::post(self.path.as_str()).body(Bytes::from(payload))?;
        *request.headers_mut() = headers;

        tracing::debug!(path = %self.path, "sending GraphQL operation");

        let response = self.transport.send(request).await?;

        tracing::debug!(status = %response.status(), "received GraphQL response");

        let result = ExecutionResult::from_http_body(response.body())?;
        self.assertions.run(&result)?;

        Ok(HttpExecutionResult { result, response })
    }
}

impl std::fmt::Debug for OperationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRequest")
            .field("operation", &self.operation)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("assertions", &self.assertions)
            .finish_non_exhaustive()
    }
}

impl IntoFuture for OperationRequest {
    type Output = Result<HttpExecutionResult, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.execute().await })
    }
}

impl<'a> IntoFuture for &'a OperationRequest {
    type Output = Result<HttpExecutionResult, Error>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    /// Records requests and answers with a fixed body.
    struct Recorder {
        requests: Mutex<Vec<http::Request<Bytes>>>,
        body: &'static str,
    }

    impl Recorder {
        fn answering(body: &'static str) -> Arc<Self> {
            Arc::new(Recorder {
                requests: Mutex::default(),
                body,
            })
        }

        fn last_body(&self) -> serde_json::Value {
            let requests = self.requests.lock().unwrap();
            serde_json::from_slice(requests.last().unwrap().body()).unwrap()
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for Recorder {
        async fn send(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>, Error> {
            self.requests.lock().unwrap().push(request);
            Ok(http::Response::new(Bytes::from_static(self.body.as_bytes())))
        }
    }

    #[tokio::test]
    async fn posts_json_to_the_endpoint() {
        let recorder = Recorder::answering(r#"{"data":{"hi":"hi !"}}"#);

        let result = OperationRequest::with_shared_transport(recorder.clone())
            .query("{ hi }")
            .header("accept", "text/html")
            .await
            .unwrap();

        assert_eq!(result.data, Some(json!({ "hi": "hi !" })));

        let requests = recorder.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.method(), http::Method::POST);
        assert_eq!(request.uri(), "/graphql");
        assert_eq!(request.headers()["accept"], "application/json");
        assert_eq!(request.headers()["content-type"], "application/json");
    }

    #[tokio::test]
    async fn variables_and_path() {
        let recorder = Recorder::answering(r#"{"data":{"hi":"hi Alex!"}}"#);

        OperationRequest::with_shared_transport(recorder.clone())
            .query_with_variables("query Hi($name: String) { hi(name: $name) }", json!({ "name": "Alex" }))
            .path("/specialUrl")
            .await
            .unwrap();

        assert_eq!(recorder.requests.lock().unwrap()[0].uri(), "/specialUrl");
        assert_eq!(
            recorder.last_body(),
            json!({ "query": "query Hi($name: String) { hi(name: $name) }", "variables": { "name": "Alex" } })
        );
    }

    #[tokio::test]
    async fn builders_can_be_executed_again() {
        let recorder = Recorder::answering(r#"{"data":{"do":"done!"}}"#);

        let request = OperationRequest::with_shared_transport(recorder.clone())
            .mutate("mutation { do }")
            .expect_no_errors();

        (&request).await.unwrap();
        (&request).await.unwrap();

        assert_eq!(recorder.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn assertions_reject_the_result() {
        let recorder = Recorder::answering(r#"{"data":null,"errors":[{"message":"Bad"}]}"#);

        let error = OperationRequest::with_shared_transport(recorder)
            .query("{ hi }")
            .expect_no_errors()
            .await
            .unwrap_err();

        let assertion = match error {
            Error::Assertion(assertion) => assertion,
            other => unreachable!("expected an assertion error, got {other}"),
        };
        assert_eq!(
            assertion.message(),
            "expected no errors but got 1 error(s) in GraphQL response: Bad"
        );
        assert_eq!(assertion.declared_at().unwrap().file(), file!());
    }

    #[tokio::test]
    async fn missing_operation() {
        let recorder = Recorder::answering("{}");

        let error = OperationRequest::with_shared_transport(recorder.clone())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::MissingOperation));
        assert!(recorder.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_operation_call_wins() {
        let recorder = Recorder::answering(r#"{"data":{"hi":"hi !"}}"#);

        OperationRequest::with_shared_transport(recorder.clone())
            .operation(Document::parse("query {"))
            .query("{ hi }")
            .await
            .unwrap();

        assert_eq!(recorder.last_body(), json!({ "query": "{ hi }" }));

        let error = OperationRequest::with_shared_transport(recorder)
            .query("{ hi }")
            .operation(Document::parse("query {"))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::InvalidDocument(_)), "{error}");
    }

    #[tokio::test]
    async fn non_json_bodies_are_rejected() {
        let recorder = Recorder::answering("Internal Server Error");

        let error = OperationRequest::with_shared_transport(recorder)
            .query("{ hi }")
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "received a non valid body: Internal Server Error");
    }
}
