//! Client-side logging filter.

use std::sync::Arc;

use crate::connector::ConnectorResult;
use crate::http::{ExchangeContext, Invocation, Response};
use crate::logging::interceptor::{LoggingInterceptor, REQUEST_PREFIX, RESPONSE_PREFIX};

/// Logs outgoing invocations and the responses they receive.
#[derive(Debug, Clone)]
pub struct ClientLoggingFilter {
    interceptor: Arc<LoggingInterceptor>,
}

impl ClientLoggingFilter {
    pub fn new(interceptor: LoggingInterceptor) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
        }
    }

    pub fn interceptor(&self) -> &LoggingInterceptor {
        &self.interceptor
    }

    /// Assign a record id to `invocation` and log it.
    ///
    /// When the entity is printed, the record is emitted by the connector
    /// after the entity has been written.
    pub fn filter_request(&self, invocation: &mut Invocation) {
        if !self.interceptor.is_enabled() {
            return;
        }

        let id = self.interceptor.next_id();
        invocation.set_context(ExchangeContext { log_id: Some(id) });

        let mut b = String::new();
        self.interceptor.request_line(
            &mut b,
            "Sending client request",
            id,
            invocation.method(),
            invocation.url(),
        );
        self.interceptor
            .prefixed_headers(&mut b, id, REQUEST_PREFIX, invocation.headers());

        let media_type = invocation.media_type();
        let entity = invocation.take_entity();
        let entity = self
            .interceptor
            .log_outbound(b, entity, media_type.as_ref());
        invocation.set_entity(entity);
    }

    /// Log `response` under the id carried by its exchange context, or a fresh
    /// one when the request was not logged.
    ///
    /// A printed entity is prefetched up to the size limit and pushed back, so
    /// the caller still reads all of it. Read failures are transport errors.
    pub fn filter_response(&self, response: &mut Response) -> ConnectorResult<()> {
        if !self.interceptor.is_enabled() {
            return Ok(());
        }

        let id = response
            .context()
            .log_id
            .unwrap_or_else(|| self.interceptor.next_id());

        let mut b = String::new();
        self.interceptor
            .response_line(&mut b, "Client response received", id, response.status());
        self.interceptor
            .prefixed_headers(&mut b, id, RESPONSE_PREFIX, response.headers());

        if self.interceptor.prints_entity(response.media_type()) {
            if let Some(stream) = response.take_entity() {
                let media_type = response.media_type().cloned();
                let stream =
                    self.interceptor
                        .log_inbound_entity(&mut b, stream, media_type.as_ref())?;
                response.replace_entity(Some(stream));
            }
        }

        self.interceptor.log(&b);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{EntityStream, StreamingMode};
    use crate::logging::{LogRecordIds, LoggingSettings, RecordingSink, Verbosity};
    use http::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
    use http::{Method, StatusCode};
    use url::Url;

    fn filter(settings: LoggingSettings) -> (ClientLoggingFilter, RecordingSink) {
        let sink = RecordingSink::new();
        let interceptor = LoggingInterceptor::new(
            settings,
            Arc::new(sink.clone()),
            Arc::new(LogRecordIds::new()),
        );
        (ClientLoggingFilter::new(interceptor), sink)
    }

    fn text_response(body: &'static str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Response::new(StatusCode::OK, headers, Some(EntityStream::from_bytes(body)))
    }

    #[test]
    fn logs_request_and_truncated_response() {
        let (filter, sink) = filter(LoggingSettings {
            max_entity_size: 8,
            ..LoggingSettings::default()
        });

        let mut invocation = Invocation::builder(
            Method::GET,
            Url::parse("http://host/resource").unwrap(),
        )
        .header("Accept", "text/plain")
        .build()
        .unwrap();
        filter.filter_request(&mut invocation);
        let context = invocation.context();
        assert_eq!(context.log_id.map(|id| id.as_u64()), Some(1));

        let mut response = text_response("0123456789");
        response.set_context(context);
        filter.filter_response(&mut response).unwrap();
        assert_eq!(response.read_string().unwrap(), "0123456789");

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("1 > GET http://host/resource\n"));
        assert!(messages[0].contains("1 > accept: text/plain\n"));
        assert!(messages[1].starts_with("1 * Client response received on thread "));
        assert!(messages[1].contains("1 < 200\n1 < content-type: text/plain\n"));
        assert!(messages[1].ends_with("\n01234567...more...\n"));
    }

    #[test]
    fn headers_only_never_prints_entities() {
        let (filter, sink) = filter(LoggingSettings {
            verbosity: Verbosity::HeadersOnly,
            ..LoggingSettings::default()
        });

        let mut invocation = Invocation::builder(Method::POST, Url::parse("http://host/").unwrap())
            .header("Content-Type", "text/plain")
            .entity("secret request")
            .mode(StreamingMode::Buffered)
            .build()
            .unwrap();
        filter.filter_request(&mut invocation);
        // Logged immediately since the entity is not printed.
        assert_eq!(sink.messages().len(), 1);

        let mut response = text_response("secret response");
        filter.filter_response(&mut response).unwrap();

        for message in sink.messages() {
            assert!(!message.contains("secret"), "{message}");
        }
    }

    #[test]
    fn response_without_request_id_gets_a_fresh_one() {
        let (filter, sink) = filter(LoggingSettings::default());
        let mut response = text_response("x");
        filter.filter_response(&mut response).unwrap();
        assert!(sink.messages()[0].starts_with("1 * "));
    }

    #[test]
    fn disabled_filter_leaves_invocation_untouched() {
        let sink = RecordingSink::with_max_level(tracing::Level::INFO);
        let filter = ClientLoggingFilter::new(LoggingInterceptor::new(
            LoggingSettings::default(),
            Arc::new(sink.clone()),
            Arc::new(LogRecordIds::new()),
        ));
        let mut invocation = Invocation::builder(Method::GET, Url::parse("http://host/").unwrap())
            .header(ACCEPT.as_str(), "*/*")
            .build()
            .unwrap();
        filter.filter_request(&mut invocation);
        assert_eq!(invocation.context().log_id, None);
        assert_eq!(filter.interceptor().ids().next().as_u64(), 1);
        assert!(sink.messages().is_empty());
    }
}
