//! Request construction.
//!
//! # Responsibilities
//! - Build the target URI from the node and the merged configuration
//! - Translate an enumerated set of properties into query parameters and headers
//! - Attach the streamed body
//!
//! # Design Decisions
//! - Only known keys are translated; anything else is ignored here
//! - Per-call parameters (`query_id`, `wait_end_of_query`, statement
//!   parameters) are sent only when the call sets them
//! - Header values are validated; a bad value is a configuration error

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{
    header::{self, HeaderName, HeaderValue},
    HeaderMap, Method, Request, Uri,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::{ConfigView, Property};
use crate::error::{Error, Result};
use crate::net::Node;

pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=UTF-8";
pub const HEADER_FORMAT: &str = "x-clickhouse-format";
pub const HEADER_USER: &str = "x-clickhouse-user";
pub const HEADER_KEY: &str = "x-clickhouse-key";
pub const HEADER_DATABASE: &str = "x-clickhouse-database";
pub const HEADER_SSL_CERT_AUTH: &str = "x-clickhouse-ssl-certificate-auth";

/// Plain registered properties forwarded as server settings when set explicitly.
/// Properties keyed under `clickhouse_setting_` travel with the dynamic settings.
const FORWARDED_SETTINGS: &[Property] = &[Property::MaxExecutionTime];

/// Build the full request for one call.
pub fn build_request(node: &Node, view: &ConfigView<'_>, body: Body) -> Result<Request<Body>> {
    let uri = build_uri(node, view)?;

    let mut request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(body)
        .map_err(|e| Error::Configuration(e.to_string()))?;

    apply_headers(request.headers_mut(), view)?;
    Ok(request)
}

/// Node base URI plus the query parameters derived from configuration.
pub fn build_uri(node: &Node, view: &ConfigView<'_>) -> Result<Uri> {
    let params = query_params(view);

    let mut url = node.base_url().clone();
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(&params);
    }

    Uri::try_from(url.as_str())
        .map_err(|e| Error::Configuration(format!("invalid request URI '{url}': {e}")))
}

fn query_params(view: &ConfigView<'_>) -> Vec<(String, String)> {
    let overrides = view.overrides();
    let mut params = Vec::new();

    let http_compression = view.get_bool(Property::UseHttpCompression);
    if !http_compression {
        if view.get_bool(Property::CompressServerResponse) {
            params.push(("compress".to_string(), "1".to_string()));
        }
        if view.get_bool(Property::CompressClientRequest) {
            params.push(("decompress".to_string(), "1".to_string()));
        }
    }

    for role in view.get_list(Property::SessionDbRoles) {
        params.push(("role".to_string(), role));
    }

    if let Some(wait) = overrides.get_property(Property::WaitEndOfQuery) {
        let flag = if crate::config::schema::is_truthy(wait) { "1" } else { "0" };
        params.push(("wait_end_of_query".to_string(), flag.to_string()));
    }

    if let Some(query_id) = overrides.query_id() {
        params.push(("query_id".to_string(), query_id.to_string()));
    }

    let mut settings: BTreeMap<&str, &str> = FORWARDED_SETTINGS
        .iter()
        .filter_map(|p| view.explicit(*p).map(|v| (p.key(), v)))
        .collect();
    settings.extend(view.server_settings());
    params.extend(settings.into_iter().map(|(k, v)| (k.to_string(), v.to_string())));

    for (name, value) in overrides.statement_params() {
        params.push((format!("param_{name}"), value.clone()));
    }

    params
}

fn apply_headers(headers: &mut HeaderMap, view: &ConfigView<'_>) -> Result<()> {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TEXT));

    if let Some(format) = view.explicit(Property::Format) {
        headers.insert(HEADER_FORMAT, header_value(HEADER_FORMAT, format)?);
    }

    if let Some(database) = view.property(Property::Database) {
        headers.insert(HEADER_DATABASE, header_value(HEADER_DATABASE, database)?);
    }

    apply_auth(headers, view)?;

    let client_name = view.property(Property::ClientName).unwrap_or_default().trim();
    let agent = if client_name.is_empty() {
        concat!("clickhouse-http/", env!("CARGO_PKG_VERSION")).to_string()
    } else {
        format!("{client_name} clickhouse-http/{}", env!("CARGO_PKG_VERSION"))
    };
    headers.insert(header::USER_AGENT, header_value("user-agent", &agent)?);

    if view.get_bool(Property::UseHttpCompression) {
        if view.get_bool(Property::CompressServerResponse) {
            headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("lz4"));
        }
        if view.get_bool(Property::CompressClientRequest) {
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("lz4"));
        }
    }

    for (name, value) in view.http_headers() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Configuration(format!("invalid header name '{name}': {e}")))?;
        headers.insert(header_name, header_value(name, value)?);
    }

    Ok(())
}

fn apply_auth(headers: &mut HeaderMap, view: &ConfigView<'_>) -> Result<()> {
    let token = view
        .explicit(Property::AccessToken)
        .or_else(|| view.explicit(Property::BearerToken));
    if let Some(token) = token {
        let value = format!("Bearer {token}");
        headers.insert(header::AUTHORIZATION, sensitive(header_value("authorization", &value)?));
        return Ok(());
    }

    let user = view.property(Property::User).unwrap_or("default");
    if view.get_bool(Property::SslAuthentication) {
        headers.insert(HEADER_USER, header_value(HEADER_USER, user)?);
        headers.insert(HEADER_SSL_CERT_AUTH, HeaderValue::from_static("on"));
        return Ok(());
    }

    let password = view.explicit(Property::Password).unwrap_or_default();
    if view.get_bool(Property::HttpUseBasicAuth) {
        let value = format!("Basic {}", STANDARD.encode(format!("{user}:{password}")));
        headers.insert(header::AUTHORIZATION, sensitive(header_value("authorization", &value)?));
    } else {
        headers.insert(HEADER_USER, header_value(HEADER_USER, user)?);
        headers.insert(HEADER_KEY, sensitive(header_value(HEADER_KEY, password)?));
    }
    Ok(())
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Configuration(format!("invalid value for header '{name}'")))
}

fn sensitive(mut value: HeaderValue) -> HeaderValue {
    value.set_sensitive(true);
    value
}
