//! Outgoing invocation descriptor.
//!
//! # Responsibilities
//! - Describe one HTTP exchange: method, absolute URI, headers, entity, framing
//! - Carry the exchange context between the request and response phases
//!
//! # Design Decisions
//! - Built once through [`InvocationBuilder`]; fields are read-only afterwards
//! - The client logging filter is the only stage allowed to wrap the entity,
//!   and it does so before the invocation reaches a connector

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use url::Url;

use crate::connector::{ConnectorError, ConnectorResult};
use crate::http::entity::{Entity, StreamingMode};
use crate::http::media::MediaType;
use crate::logging::LogRecordId;

/// State threaded from the request phase of an exchange to its response phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangeContext {
    /// Log record id assigned when the request was logged.
    pub log_id: Option<LogRecordId>,
}

/// Immutable description of an outgoing HTTP exchange.
#[derive(Debug)]
pub struct Invocation {
    method: Method,
    url: Url,
    headers: HeaderMap,
    entity: Option<Entity>,
    mode: StreamingMode,
    context: ExchangeContext,
}

impl Invocation {
    pub fn builder(method: Method, url: Url) -> InvocationBuilder {
        InvocationBuilder::new(method, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::from_headers(&self.headers)
    }

    pub fn has_entity(&self) -> bool {
        self.entity.is_some()
    }

    pub fn mode(&self) -> StreamingMode {
        self.mode
    }

    pub fn context(&self) -> ExchangeContext {
        self.context
    }

    pub(crate) fn set_context(&mut self, context: ExchangeContext) {
        self.context = context;
    }

    pub(crate) fn take_entity(&mut self) -> Option<Entity> {
        self.entity.take()
    }

    pub(crate) fn set_entity(&mut self, entity: Option<Entity>) {
        self.entity = entity;
    }

    /// Split into the parts a connector needs to put on the wire.
    pub fn into_parts(self) -> (Method, Url, HeaderMap, Option<Entity>, StreamingMode) {
        (self.method, self.url, self.headers, self.entity, self.mode)
    }
}

/// Builder for [`Invocation`].
#[derive(Debug)]
pub struct InvocationBuilder {
    method: Method,
    url: Url,
    headers: HeaderMap,
    entity: Option<Entity>,
    mode: StreamingMode,
    error: Option<String>,
}

impl InvocationBuilder {
    fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            entity: None,
            mode: StreamingMode::default(),
            error: None,
        }
    }

    /// Append a header value, keeping any values already present for `name`.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => {
                self.error
                    .get_or_insert_with(|| format!("invalid header {}: {:?}", name, value));
            }
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn entity(mut self, entity: impl Into<Entity>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn mode(mut self, mode: StreamingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> ConnectorResult<Invocation> {
        if let Some(error) = self.error {
            return Err(ConnectorError::InvalidRequest(error));
        }
        if !matches!(self.url.scheme(), "http" | "https") {
            return Err(ConnectorError::InvalidRequest(format!(
                "unsupported URI scheme: {}",
                self.url.scheme()
            )));
        }
        Ok(Invocation {
            method: self.method,
            url: self.url,
            headers: self.headers,
            entity: self.entity,
            mode: self.mode,
            context: ExchangeContext::default(),
        })
    }
}
