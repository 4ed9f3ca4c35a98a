//! HTTP collaborators the operation builder sends its requests through.

use bytes::Bytes;
use http_body_util::BodyExt;
use tower::ServiceExt;
use url::Url;

use crate::Error;

/// Sends one HTTP request and reads the whole response back.
///
/// Request URIs only carry the path, the transport decides where it goes.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>, Error>;
}

/// Executes requests in-process against the application, no socket involved.
#[async_trait::async_trait]
impl HttpTransport for axum::Router {
    async fn send(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>, Error> {
        let response = match self.clone().oneshot(request.map(axum::body::Body::from)).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let (parts, body) = response.into_parts();
        let bytes = body.collect().await?.to_bytes();

        Ok(http::Response::from_parts(parts, bytes))
    }
}

/// Sends requests to a listening server.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl TryFrom<&str> for ReqwestTransport {
    type Error = Error;

    fn try_from(base_url: &str) -> Result<Self, Self::Error> {
        Ok(Self::new(base_url.parse()?))
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>, Error> {
        let path = request.uri().path_and_query().map(|path| path.as_str()).unwrap_or("/");
        let url = self.base_url.join(path)?;

        let (parts, body) = request.into_parts();

        let mut response = self
            .client
            .request(parts.method, url)
            .headers(parts.headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let version = response.version();
        let headers = std::mem::take(response.headers_mut());
        let bytes = response.bytes().await?;

        let mut response = http::Response::new(bytes);
        *response.status_mut() = status;
        *response.version_mut() = version;
        *response.headers_mut() = headers;

        Ok(response)
    }
}
