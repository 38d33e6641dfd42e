//! Namespaced configuration keys and list encoding.
//!
//! Two dynamic key families sit next to the registry:
//! - `clickhouse_setting_<name>`: forwarded to the server as a session setting
//! - `http_header_<NAME>`: forwarded as a literal outbound header
//!
//! List-valued properties are stored as one string: values joined by `,` with
//! literal `,` written as `\,` and literal `\` written as `\\`.

/// Prefix of keys forwarded as server settings.
pub const SERVER_SETTING_PREFIX: &str = "clickhouse_setting_";

/// Prefix of keys forwarded as HTTP headers.
pub const HTTP_HEADER_PREFIX: &str = "http_header_";

/// Configuration key for the server setting `name`.
pub fn server_setting_key(name: &str) -> String {
    format!("{SERVER_SETTING_PREFIX}{name}")
}

/// Configuration key for the header `name`.
///
/// Upper-casing is ASCII-only so the key never depends on the host locale.
pub fn http_header_key(name: &str) -> String {
    format!("{HTTP_HEADER_PREFIX}{}", name.to_ascii_uppercase())
}

/// Setting name carried by a `clickhouse_setting_*` key.
pub fn parse_server_setting_key(key: &str) -> Option<&str> {
    key.strip_prefix(SERVER_SETTING_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Header name carried by an `http_header_*` key.
pub fn parse_http_header_key(key: &str) -> Option<&str> {
    key.strip_prefix(HTTP_HEADER_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Encode a list of values into a single comma-separated string.
pub fn encode_list<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut encoded = String::new();
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            encoded.push(',');
        }
        for c in value.as_ref().chars() {
            if c == ',' || c == '\\' {
                encoded.push('\\');
            }
            encoded.push(c);
        }
    }
    encoded
}

/// Decode a string produced by [`encode_list`].
///
/// An empty string decodes to an empty list. Only `\,` and `\\` are escapes;
/// any other backslash, including a trailing one, is kept as written.
pub fn decode_list(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }

    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = encoded.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next_if(|next| matches!(*next, ',' | '\\')) {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            ',' => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);
    values
}
