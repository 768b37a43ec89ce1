//! Incoming response descriptor.
//!
//! # Responsibilities
//! - Expose status, headers, media type and the entity stream to the caller
//! - Let the client logging filter replace the entity stream in place
//!
//! # Design Decisions
//! - The entity is a blocking `Read` for every connector, so callers are
//!   connector-agnostic
//! - Entity reads fail once the owning invocation is cancelled

use std::io;

use bytes::Bytes;
use http::header::{HeaderMap, CONTENT_LENGTH};
use http::{Method, StatusCode};

use crate::http::entity::EntityStream;
use crate::http::media::MediaType;
use crate::http::request::ExchangeContext;

/// Description of an HTTP response as produced by a connector.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    media_type: Option<MediaType>,
    entity: Option<EntityStream>,
    context: ExchangeContext,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, entity: Option<EntityStream>) -> Self {
        let media_type = MediaType::from_headers(&headers);
        Self {
            status,
            headers,
            media_type,
            entity,
            context: ExchangeContext::default(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn media_type(&self) -> Option<&MediaType> {
        self.media_type.as_ref()
    }

    pub fn has_entity(&self) -> bool {
        self.entity.is_some()
    }

    pub fn context(&self) -> ExchangeContext {
        self.context
    }

    pub(crate) fn set_context(&mut self, context: ExchangeContext) {
        self.context = context;
    }

    pub fn entity_mut(&mut self) -> Option<&mut EntityStream> {
        self.entity.as_mut()
    }

    pub fn take_entity(&mut self) -> Option<EntityStream> {
        self.entity.take()
    }

    pub(crate) fn replace_entity(&mut self, entity: Option<EntityStream>) {
        self.entity = entity;
    }

    /// Read the whole entity; an absent entity reads as empty.
    pub fn read_bytes(&mut self) -> io::Result<Bytes> {
        match self.entity.as_mut() {
            Some(stream) => stream.read_to_bytes(),
            None => Ok(Bytes::new()),
        }
    }

    pub fn read_string(&mut self) -> io::Result<String> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Whether a response to `method` with `status` and `headers` carries a body.
pub(crate) fn response_has_entity(method: &Method, status: StatusCode, headers: &HeaderMap) -> bool {
    if method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return false;
    }
    let declared_empty = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        == Some(0);
    !declared_empty
}
