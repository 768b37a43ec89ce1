//! Server-side message views.
//!
//! The dispatch runtime is not part of this crate. These two types are the
//! narrow interface through which it hands a received request to the server
//! logging filter (and the in-memory connector hands one to its handler), and
//! through which the response travels back.

use http::header::HeaderMap;
use http::{Method, StatusCode};
use url::Url;

use crate::http::entity::{Entity, EntityStream};
use crate::http::media::MediaType;
use crate::http::request::ExchangeContext;

/// A request as received by a server.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub entity: Option<EntityStream>,
    pub context: ExchangeContext,
}

impl InboundRequest {
    pub fn new(method: Method, url: Url, headers: HeaderMap, entity: Option<EntityStream>) -> Self {
        Self {
            method,
            url,
            headers,
            entity,
            context: ExchangeContext::default(),
        }
    }

    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::from_headers(&self.headers)
    }

    /// Read the whole request body as UTF-8 (lossy); absent bodies read as empty.
    pub fn read_string(&mut self) -> std::io::Result<String> {
        match self.entity.as_mut() {
            Some(stream) => stream.read_to_string_lossy(),
            None => Ok(String::new()),
        }
    }
}

/// A response about to be written by a server.
#[derive(Debug)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub entity: Option<Entity>,
}

impl OutboundResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            entity: None,
        }
    }

    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn entity(mut self, entity: impl Into<Entity>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::from_headers(&self.headers)
    }
}
