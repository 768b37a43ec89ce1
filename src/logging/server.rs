//! Server-side logging filter.

use std::sync::Arc;

use crate::connector::ConnectorResult;
use crate::http::{ExchangeContext, InboundRequest, OutboundResponse};
use crate::logging::interceptor::{LoggingInterceptor, REQUEST_PREFIX, RESPONSE_PREFIX};

/// Logs received requests and the responses sent back for them.
#[derive(Debug, Clone)]
pub struct ServerLoggingFilter {
    interceptor: Arc<LoggingInterceptor>,
}

impl ServerLoggingFilter {
    pub fn new(interceptor: LoggingInterceptor) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
        }
    }

    pub fn interceptor(&self) -> &LoggingInterceptor {
        &self.interceptor
    }

    /// Assign a record id to `request`, store it in its context and log it.
    pub fn filter_request(&self, request: &mut InboundRequest) -> ConnectorResult<()> {
        if !self.interceptor.is_enabled() {
            return Ok(());
        }

        let id = self.interceptor.next_id();
        request.context = ExchangeContext { log_id: Some(id) };

        let mut b = String::new();
        self.interceptor.request_line(
            &mut b,
            "Server has received a request",
            id,
            &request.method,
            &request.url,
        );
        self.interceptor
            .prefixed_headers(&mut b, id, REQUEST_PREFIX, &request.headers);

        let media_type = request.media_type();
        if self.interceptor.prints_entity(media_type.as_ref()) {
            if let Some(stream) = request.entity.take() {
                let stream =
                    self.interceptor
                        .log_inbound_entity(&mut b, stream, media_type.as_ref())?;
                request.entity = Some(stream);
            }
        }

        self.interceptor.log(&b);
        Ok(())
    }

    /// Log `response` under the id stored by [`Self::filter_request`].
    ///
    /// A printed entity is wrapped; the record is emitted once the entity has
    /// been written.
    pub fn filter_response(&self, context: ExchangeContext, response: &mut OutboundResponse) {
        if !self.interceptor.is_enabled() {
            return;
        }

        let id = context
            .log_id
            .unwrap_or_else(|| self.interceptor.next_id());

        let mut b = String::new();
        self.interceptor.response_line(
            &mut b,
            "Server responded with a response",
            id,
            response.status,
        );
        self.interceptor
            .prefixed_headers(&mut b, id, RESPONSE_PREFIX, &response.headers);

        let media_type = response.media_type();
        let entity = response.entity.take();
        response.entity = self
            .interceptor
            .log_outbound(b, entity, media_type.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::EntityStream;
    use crate::logging::{LogRecordIds, LoggingSettings, RecordingSink, Verbosity};
    use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    use http::{Method, StatusCode};
    use url::Url;

    fn filter(verbosity: Verbosity) -> (ServerLoggingFilter, RecordingSink) {
        let sink = RecordingSink::new();
        let interceptor = LoggingInterceptor::new(
            LoggingSettings {
                verbosity,
                ..LoggingSettings::default()
            },
            Arc::new(sink.clone()),
            Arc::new(LogRecordIds::new()),
        );
        (ServerLoggingFilter::new(interceptor), sink)
    }

    fn json_request(body: &'static str) -> InboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        InboundRequest::new(
            Method::PUT,
            Url::parse("http://localhost/items/1").unwrap(),
            headers,
            Some(EntityStream::from_bytes(body)),
        )
    }

    #[test]
    fn request_and_response_share_an_id() {
        let (filter, sink) = filter(Verbosity::PayloadText);

        let mut request = json_request("{\"a\":1}");
        filter.filter_request(&mut request).unwrap();
        assert_eq!(request.read_string().unwrap(), "{\"a\":1}");

        let mut response = OutboundResponse::new(StatusCode::CREATED)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .entity("{\"id\":1}");
        filter.filter_response(request.context, &mut response);
        // Deferred until the entity is written.
        assert_eq!(sink.messages().len(), 1);

        let mut wire = Vec::new();
        response.entity.take().unwrap().write_to(&mut wire).unwrap();
        assert_eq!(wire, b"{\"id\":1}");

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("1 * Server has received a request on thread "));
        assert!(messages[0].contains("1 > PUT http://localhost/items/1\n"));
        assert!(messages[0].ends_with("{\"a\":1}\n"));
        assert!(messages[1].starts_with("1 * Server responded with a response on thread "));
        assert!(messages[1].contains("1 < 201\n"));
        assert!(messages[1].ends_with("{\"id\":1}\n"));
    }

    #[test]
    fn payload_text_skips_binary_entities() {
        let (filter, sink) = filter(Verbosity::PayloadText);
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        let mut request = InboundRequest::new(
            Method::POST,
            Url::parse("http://localhost/blob").unwrap(),
            headers,
            Some(EntityStream::from_bytes("BINARYDATA")),
        );
        filter.filter_request(&mut request).unwrap();
        assert!(!sink.messages()[0].contains("BINARYDATA"));
        assert_eq!(request.read_string().unwrap(), "BINARYDATA");
    }

    #[test]
    fn payload_any_logs_binary_entities() {
        let (filter, sink) = filter(Verbosity::PayloadAny);
        let mut response = OutboundResponse::new(StatusCode::OK).entity("BINARYDATA");
        filter.filter_response(ExchangeContext::default(), &mut response);
        response
            .entity
            .take()
            .unwrap()
            .write_to(&mut Vec::new())
            .unwrap();
        assert!(sink.messages()[0].ends_with("BINARYDATA\n"));
    }
}
