//! courier: execute one HTTP invocation with exchange logging.
//!
//! ```text
//! courier [--config FILE] [--connector blocking|hyper] [--verbosity V]
//!         [--max-entity-size N] [-H 'Name: value']... [-d BODY] [--chunked]
//!         [--json] METHOD URL
//! ```
//!
//! Exchange records are emitted through `tracing` on stderr; the response
//! goes to stdout.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use courier::config::{self, ConnectorKind, CourierConfig, Role};
use courier::connector;
use courier::http::{Entity, StreamingMode};
use courier::logging::{LoggingFeature, Verbosity};
use courier::observability;
use courier::Client;
use http::Method;
use url::Url;

#[derive(Parser)]
#[command(name = "courier", version)]
#[command(about = "Execute an HTTP request through a courier connector", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport, overriding the configured one
    #[arg(long, value_enum)]
    connector: Option<ConnectorArg>,

    /// HEADERS_ONLY, PAYLOAD_TEXT or PAYLOAD_ANY
    #[arg(long)]
    verbosity: Option<Verbosity>,

    /// Entity bytes kept per record; negative logs headers only
    #[arg(long, allow_negative_numbers = true)]
    max_entity_size: Option<i64>,

    /// Request header, `Name: value`
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request entity
    #[arg(short, long)]
    data: Option<String>,

    /// Send the entity with chunked transfer coding
    #[arg(long)]
    chunked: bool,

    /// Print a JSON summary instead of the raw body
    #[arg(long)]
    json: bool,

    method: Method,

    url: Url,
}

#[derive(Clone, Copy, ValueEnum)]
enum ConnectorArg {
    Blocking,
    Hyper,
}

impl From<ConnectorArg> for ConnectorKind {
    fn from(arg: ConnectorArg) -> Self {
        match arg {
            ConnectorArg::Blocking => ConnectorKind::Blocking,
            ConnectorArg::Hyper => ConnectorKind::Hyper,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => CourierConfig::default(),
    };
    if let Some(kind) = cli.connector {
        config.connector.kind = kind.into();
    }

    observability::init_tracing(&config.observability);

    let logging = config.effective_logging();
    let mut feature = LoggingFeature::builder();
    // Records default to DEBUG, which the default filter hides.
    if logging.resolve(Role::Client).level.is_none() {
        feature = feature.level(tracing::Level::INFO);
    }
    if let Some(verbosity) = cli.verbosity {
        feature = feature.verbosity(verbosity);
    }
    if let Some(size) = cli.max_entity_size {
        feature = feature.max_entity_size(size);
    }

    let connector = connector::from_config(&config.connector, &config.timeouts)?;
    tracing::info!(
        connector = connector.name(),
        method = %cli.method,
        url = %cli.url,
        "courier v0.1.0 starting"
    );
    let client = Client::new(connector)
        .with_logging(feature.build().client_filter(&logging))
        .with_default_mode(config.connector.request_entity_processing);

    let mut request = client.request(cli.method.clone(), cli.url.clone());
    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("malformed header `{}`, expected `Name: value`", header))?;
        request = request.header(name.trim(), value.trim());
    }
    if let Some(data) = cli.data.clone() {
        request = if cli.chunked {
            request
                .entity(Entity::from_writer(move |out| out.write_all(data.as_bytes())))
                .mode(StreamingMode::Chunked)
        } else {
            request.entity(data)
        };
    }

    let mut response = client.execute(request.build()?)?;
    let body = response.read_string()?;

    if cli.json {
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let summary = serde_json::json!({
            "connector": client.connector().name(),
            "status": response.status().as_u16(),
            "headers": headers,
            "media_type": response.media_type().map(|m| m.to_string()),
            "body": body,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", response.status());
        print!("{}", body);
        std::io::stdout().flush()?;
    }

    Ok(())
}
