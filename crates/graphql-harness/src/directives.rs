//! Header and credential directives, forwarded verbatim to the transport.

use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::Error;

/// One way of setting request headers.
#[derive(Debug, Clone)]
pub enum HeaderDirective {
    Single(String, String),
    Map(HeaderMap),
    /// Joined into a single `Cookie` header.
    Cookies(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookies(pub Vec<String>);

impl<N, V> From<(N, V)> for HeaderDirective
where
    N: Into<String>,
    V: Into<String>,
{
    fn from((name, value): (N, V)) -> Self {
        HeaderDirective::Single(name.into(), value.into())
    }
}

impl From<HeaderMap> for HeaderDirective {
    fn from(map: HeaderMap) -> Self {
        HeaderDirective::Map(map)
    }
}

impl From<Cookies> for HeaderDirective {
    fn from(Cookies(cookies): Cookies) -> Self {
        HeaderDirective::Cookies(cookies)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { user: String, password: String },
    Bearer(String),
}

impl Auth {
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Bearer(token.into())
    }
}

#[derive(Debug, Clone)]
enum Directive {
    Header(HeaderDirective),
    Auth(Auth),
}

/// Directives in call order, resolved into a header map at execution.
#[derive(Debug, Clone, Default)]
pub(crate) struct HeaderDirectives(Vec<Directive>);

impl HeaderDirectives {
    pub(crate) fn set(&mut self, directive: HeaderDirective) {
        self.0.push(Directive::Header(directive));
    }

    pub(crate) fn auth(&mut self, auth: Auth) {
        self.0.push(Directive::Auth(auth));
    }

    pub(crate) fn resolve(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();

        for directive in &self.0 {
            match directive {
                Directive::Header(HeaderDirective::Single(name, value)) => {
                    headers.insert(header_name(name)?, header_value(value)?);
                }
                Directive::Header(HeaderDirective::Map(map)) => {
                    for name in map.keys() {
                        headers.remove(name);
                    }
                    for (name, value) in map {
                        headers.append(name.clone(), value.clone());
                    }
                }
                Directive::Header(HeaderDirective::Cookies(cookies)) => {
                    headers.insert(header::COOKIE, header_value(&cookies.join("; "))?);
                }
                Directive::Auth(Auth::Basic { user, password }) => {
                    headers.typed_insert(Authorization::basic(user, password));
                }
                Directive::Auth(Auth::Bearer(token)) => {
                    let authorization: Authorization<Bearer> = Authorization::bearer(token)
                        .map_err(|_| Error::InvalidHeader(format!("invalid bearer token {token:?}")))?;
                    headers.typed_insert(authorization);
                }
            }
        }

        Ok(headers)
    }
}

fn header_name(name: &str) -> Result<HeaderName, Error> {
    HeaderName::try_from(name).map_err(|_| Error::InvalidHeader(format!("invalid header name {name:?}")))
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::try_from(value).map_err(|_| Error::InvalidHeader(format!("invalid value {value:?}")))
}
