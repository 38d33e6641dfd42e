//! ClickHouse HTTP command-line client.
//!
//! Posts one query to a server and streams the result to stdout.
//!
//! ```text
//! clickhouse-http --url http://localhost:8123 -s user=default "SELECT 1"
//! echo "SELECT {n:UInt8}" | clickhouse-http -p n=7 --format TSV
//! ```
//!
//! Failed attempts are retried per `retry` / `client_retry_on_failures`,
//! moving to the next `--url` on each retry.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::process::ExitCode;

use bytes::Bytes;
use clap::Parser;
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use clickhouse_http::config::{load_config, ConfigError};
use clickhouse_http::observability::logging;
use clickhouse_http::{
    payload, Backoff, ClientConfig, FaultCause, Node, Outcome, RequestExecutor, RequestSettings,
    RetryPolicy, ServerResponse,
};

type CliResult<T> = std::result::Result<T, Box<dyn StdError>>;

#[derive(Parser)]
#[command(name = "clickhouse-http")]
#[command(about = "Run a query against ClickHouse over HTTP", long_about = None)]
struct Cli {
    /// Server base URL. Repeat to fail over between nodes.
    #[arg(short, long = "url")]
    urls: Vec<String>,

    /// TOML file with a [settings] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration entry as key=value
    #[arg(short = 's', long = "set", value_parser = parse_key_value)]
    settings: Vec<(String, String)>,

    #[arg(long)]
    query_id: Option<String>,

    /// Output format, e.g. TSV or JSONEachRow
    #[arg(short, long)]
    format: Option<String>,

    /// Query parameter as name=value
    #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,

    /// Query text. Read from stdin when omitted.
    query: Option<String>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::new(),
    };
    for (key, value) in &cli.settings {
        config.set(key.as_str(), value.as_str());
    }
    config.validate().map_err(ConfigError::Validation)?;

    let nodes = if cli.urls.is_empty() {
        vec![Node::from_config(&config)?]
    } else {
        cli.urls
            .iter()
            .map(|url| Node::from_url(url))
            .collect::<Result<Vec<_>, _>>()?
    };
    let policy = RetryPolicy::from_config(&config)?;

    let mut settings = RequestSettings::new();
    if let Some(query_id) = cli.query_id {
        settings = settings.with_query_id(query_id);
    }
    if let Some(format) = cli.format {
        settings = settings.with_format(format);
    }
    for (name, value) in cli.params {
        settings = settings.with_statement_param(name, value);
    }

    let query = read_query(cli.query).await?;
    let executor = RequestExecutor::from_config(config);
    let response =
        execute_with_retries(&executor, &nodes, &settings, query, &policy, Backoff::default())
            .await?;

    tracing::debug!(
        query_id = response.query_id().unwrap_or_default(),
        summary = response.summary().unwrap_or_default(),
        "Streaming result"
    );

    let mut body = response.into_data_stream();
    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = body.next().await {
        stdout.write_all(&chunk?).await?;
    }
    stdout.flush().await?;
    Ok(())
}

async fn read_query(query: Option<String>) -> CliResult<Bytes> {
    match query {
        Some(text) => Ok(Bytes::from(text)),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            Ok(Bytes::from(buf))
        }
    }
}

async fn execute_with_retries(
    executor: &RequestExecutor,
    nodes: &[Node],
    settings: &RequestSettings,
    query: Bytes,
    policy: &RetryPolicy,
    backoff: Backoff,
) -> CliResult<ServerResponse> {
    let mut retries = 0;
    loop {
        let node = &nodes[retries as usize % nodes.len()];
        let result = executor.execute(node, settings, payload(query.clone())).await;
        let cause = match &result {
            Ok(outcome) => FaultCause::of_outcome(outcome),
            Err(e) => FaultCause::of_error(e),
        };

        let failure: Box<dyn StdError> = match result {
            Ok(Outcome::Success(response)) => return Ok(response),
            Ok(Outcome::ServerUnavailable(closed)) => format!(
                "server {node} unavailable (HTTP {}, code {})",
                closed.status(),
                closed.exception_code()
            )
            .into(),
            Ok(Outcome::Unreachable(failure)) => failure.into(),
            Err(e) => e.into(),
        };

        if !policy.should_retry(retries, cause) {
            return Err(failure);
        }

        retries += 1;
        let delay = backoff.delay(retries);
        tracing::info!(
            attempt = retries,
            cause = ?cause,
            error = %failure,
            delay_ms = delay.as_millis() as u64,
            "Retrying query"
        );
        tokio::time::sleep(delay).await;
    }
}
