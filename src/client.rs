//! Connector-agnostic client facade.
//!
//! # Responsibilities
//! - Build invocations with the configured default framing
//! - Run the client logging filter around every exchange
//! - Bridge asynchronous connector execution to an [`AsyncInvocation`]
//!
//! # Data Flow
//! ```text
//! Client::request → InvocationBuilder → Invocation
//!     → ClientLoggingFilter::filter_request (id assigned, entity wrapped)
//!     → Connector::execute | execute_async
//!     → Response (context copied) → ClientLoggingFilter::filter_response
//!     → caller, or consume() on the worker then Completer::complete
//! ```

use std::sync::Arc;

use http::Method;
use url::Url;

use crate::config::CourierConfig;
use crate::connector::{self, Connector, ConnectorResult};
use crate::http::{Invocation, InvocationBuilder, Response, StreamingMode};
use crate::lifecycle::AsyncInvocation;
use crate::logging::{ClientLoggingFilter, LoggingFeature};

/// Executes invocations through one connector.
#[derive(Clone)]
pub struct Client {
    connector: Arc<dyn Connector>,
    logging: Option<ClientLoggingFilter>,
    default_mode: StreamingMode,
}

impl Client {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            logging: None,
            default_mode: StreamingMode::Buffered,
        }
    }

    /// Client over the configured network connector with client logging on.
    pub fn from_config(config: &CourierConfig) -> ConnectorResult<Self> {
        let connector = connector::from_config(&config.connector, &config.timeouts)?;
        let logging = LoggingFeature::default().client_filter(&config.effective_logging());
        Ok(Self::new(connector)
            .with_logging(logging)
            .with_default_mode(config.connector.request_entity_processing))
    }

    pub fn with_logging(mut self, filter: ClientLoggingFilter) -> Self {
        self.logging = Some(filter);
        self
    }

    /// Framing of invocations built through [`Client::request`].
    pub fn with_default_mode(mut self, mode: StreamingMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub fn request(&self, method: Method, url: Url) -> InvocationBuilder {
        Invocation::builder(method, url).mode(self.default_mode)
    }

    /// Execute on the calling thread.
    pub fn execute(&self, mut invocation: Invocation) -> ConnectorResult<Response> {
        if let Some(logging) = &self.logging {
            logging.filter_request(&mut invocation);
        }
        let context = invocation.context();

        let mut response = self.connector.execute(invocation)?;
        response.set_context(context);
        if let Some(logging) = &self.logging {
            logging.filter_response(&mut response)?;
        }
        Ok(response)
    }

    /// Execute on a connector worker and return at once.
    ///
    /// `consume` runs on the worker after the response has been logged; its
    /// outcome resolves the handle. Cancelling the handle stops the transport
    /// from delivering further entity bytes.
    pub fn submit<T, F>(&self, mut invocation: Invocation, consume: F) -> AsyncInvocation<T>
    where
        T: Send + 'static,
        F: FnOnce(Response) -> ConnectorResult<T> + Send + 'static,
    {
        if let Some(logging) = &self.logging {
            logging.filter_request(&mut invocation);
        }
        let context = invocation.context();

        let (handle, completer) = AsyncInvocation::pending();
        let cancel = completer.cancellation_token();
        let logging = self.logging.clone();

        tracing::debug!(
            connector = self.connector.name(),
            method = %invocation.method(),
            url = %invocation.url(),
            "Submitting invocation"
        );

        self.connector.execute_async(
            invocation,
            cancel,
            Box::new(move |result| {
                let outcome = result.and_then(|mut response| {
                    response.set_context(context);
                    if let Some(logging) = &logging {
                        logging.filter_response(&mut response)?;
                    }
                    consume(response)
                });
                if !completer.complete(outcome) {
                    tracing::debug!("Invocation outcome discarded after cancellation");
                }
            }),
        );

        handle
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connector", &self.connector.name())
            .field("logging", &self.logging.is_some())
            .field("default_mode", &self.default_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorError, InMemoryConnector};
    use crate::http::OutboundResponse;
    use crate::lifecycle::InvocationState;
    use crate::logging::{LogRecordIds, LoggingInterceptor, LoggingSettings, RecordingSink};
    use http::StatusCode;
    use std::time::Duration;

    fn echo_client() -> Client {
        Client::new(Arc::new(InMemoryConnector::new(|mut request| {
            let body = request.read_string().unwrap_or_default();
            OutboundResponse::new(StatusCode::OK).entity(body)
        })))
    }

    fn url() -> Url {
        Url::parse("http://in-memory/echo").unwrap()
    }

    #[test]
    fn request_uses_default_mode() {
        let client = echo_client().with_default_mode(StreamingMode::Chunked);
        let invocation = client.request(Method::POST, url()).build().unwrap();
        assert_eq!(invocation.mode(), StreamingMode::Chunked);
    }

    #[test]
    fn execute_copies_context_to_response() {
        let sink = RecordingSink::new();
        let filter = ClientLoggingFilter::new(LoggingInterceptor::new(
            LoggingSettings::default(),
            Arc::new(sink.clone()),
            Arc::new(LogRecordIds::new()),
        ));
        let client = echo_client().with_logging(filter);

        let invocation = client
            .request(Method::PATCH, url())
            .header("Content-Type", "text/plain")
            .entity("patch")
            .build()
            .unwrap();
        let mut response = client.execute(invocation).unwrap();
        assert_eq!(response.context().log_id.map(|id| id.as_u64()), Some(1));
        assert_eq!(response.read_string().unwrap(), "patch");

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("1 > PATCH http://in-memory/echo\n"));
        assert!(messages[0].ends_with("\npatch\n"));
        assert!(messages[1].contains("1 < 200\n"));
    }

    #[test]
    fn submit_resolves_with_consumed_value() {
        let client = echo_client();
        let invocation = client
            .request(Method::POST, url())
            .entity("async")
            .build()
            .unwrap();
        let handle = client.submit(invocation, |mut response| Ok(response.read_string()?));
        assert_eq!(handle.wait().unwrap(), "async");
    }

    #[test]
    fn submit_reports_consumer_errors() {
        let client = echo_client();
        let invocation = client.request(Method::GET, url()).build().unwrap();
        let handle = client.submit::<(), _>(invocation, |_| {
            Err(ConnectorError::Transport("consumer gave up".into()))
        });
        assert_eq!(
            handle.wait_timeout(Duration::from_secs(5)),
            InvocationState::Failed
        );
        assert!(matches!(handle.wait(), Err(ConnectorError::Transport(_))));
    }
}
