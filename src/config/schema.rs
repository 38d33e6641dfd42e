//! Base configuration, per-call overrides and the merged view over both.

use std::collections::BTreeMap;

use crate::config::keys::{
    decode_list, encode_list, http_header_key, parse_http_header_key, parse_server_setting_key,
    server_setting_key,
};
use crate::config::loader::ConfigError;
use crate::config::properties::Property;

/// Long-lived, client-wide configuration.
///
/// Keys are registry keys or dynamic `http_header_*` / `clickhouse_setting_*`
/// keys. Values are always strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    settings: BTreeMap<String, String>,
}

impl ClientConfig {
    /// Create an empty configuration; every property resolves to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`ClientConfig::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a registered property, checking its choice set.
    pub fn set_property(
        &mut self,
        property: Property,
        value: impl Into<String>,
    ) -> Result<&mut Self, ConfigError> {
        let value = value.into();
        property.validate(&value)?;
        self.settings.insert(property.key().to_string(), value);
        Ok(self)
    }

    /// Set a server setting forwarded with every request.
    pub fn set_server_setting(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.set(server_setting_key(name), value)
    }

    /// Set a header sent with every request.
    pub fn set_http_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.set(http_header_key(name), value)
    }

    /// Remove a key, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.settings.remove(key)
    }

    /// Raw value for `key`, without defaults.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Value for `property`, falling back to its default.
    pub fn get_property(&self, property: Property) -> Option<&str> {
        self.get(property.key()).or(property.default_value())
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check every registered key against its choice set.
    ///
    /// Returns all failures, not just the first.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let errors: Vec<_> = self
            .iter()
            .filter_map(|(key, value)| Property::lookup(key).map(|p| p.validate(value)))
            .filter_map(Result::err)
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merged view of this configuration with per-call overrides.
    pub fn view<'a>(&'a self, overrides: &'a RequestSettings) -> ConfigView<'a> {
        ConfigView {
            base: self,
            overrides,
        }
    }
}

/// Per-call overrides.
///
/// Option keys follow the same rules as [`ClientConfig`]. Statement
/// parameters are sent as `param_<name>` query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSettings {
    options: BTreeMap<String, String>,
    statement_params: BTreeMap<String, String>,
}

impl RequestSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw option key for this call.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_property(mut self, property: Property, value: impl Into<String>) -> Self {
        self.set(property.key(), value);
        self
    }

    pub fn with_query_id(self, query_id: impl Into<String>) -> Self {
        self.with_property(Property::QueryId, query_id)
    }

    pub fn with_format(self, format: impl Into<String>) -> Self {
        self.with_property(Property::Format, format)
    }

    pub fn with_wait_end_of_query(self, wait: bool) -> Self {
        self.with_property(Property::WaitEndOfQuery, wait.to_string())
    }

    pub fn with_roles<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_property(Property::SessionDbRoles, encode_list(roles))
    }

    pub fn with_server_setting(self, name: &str, value: impl Into<String>) -> Self {
        self.with(server_setting_key(name), value)
    }

    pub fn with_http_header(self, name: &str, value: impl Into<String>) -> Self {
        self.with(http_header_key(name), value)
    }

    /// Add a statement parameter, sent as `param_<name>=<value>`.
    pub fn with_statement_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.statement_params.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Value for `property` set on this call only. Never falls back to defaults.
    pub fn get_property(&self, property: Property) -> Option<&str> {
        self.get(property.key())
    }

    pub fn query_id(&self) -> Option<&str> {
        self.get_property(Property::QueryId)
    }

    pub fn statement_params(&self) -> &BTreeMap<String, String> {
        &self.statement_params
    }
}

/// Base configuration with per-call overrides layered on top.
///
/// Overrides win over base values; base values win over registry defaults.
#[derive(Debug, Clone, Copy)]
pub struct ConfigView<'a> {
    base: &'a ClientConfig,
    overrides: &'a RequestSettings,
}

impl<'a> ConfigView<'a> {
    /// Raw value for `key`, without defaults.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.overrides.get(key).or_else(|| self.base.get(key))
    }

    /// Explicitly configured value for `property`, ignoring its default.
    pub fn explicit(&self, property: Property) -> Option<&'a str> {
        self.get(property.key())
    }

    /// Value for `property`, falling back to its default.
    pub fn property(&self, property: Property) -> Option<&'a str> {
        self.explicit(property).or(property.default_value())
    }

    /// `true`/`1` (any ASCII case for `true`) are truthy, anything else is not.
    pub fn get_bool(&self, property: Property) -> bool {
        self.property(property).is_some_and(is_truthy)
    }

    pub fn get_u64(&self, property: Property) -> Option<u64> {
        self.property(property).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_list(&self, property: Property) -> Vec<String> {
        self.property(property).map(decode_list).unwrap_or_default()
    }

    /// Every configured key with overrides applied, ordered by key.
    pub fn entries(&self) -> BTreeMap<&'a str, &'a str> {
        let mut merged: BTreeMap<&'a str, &'a str> = self.base.iter().collect();
        merged.extend(
            self.overrides
                .options
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        merged
    }

    /// `clickhouse_setting_*` entries as (setting name, value).
    pub fn server_settings(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.entries()
            .into_iter()
            .filter_map(|(key, value)| parse_server_setting_key(key).map(|name| (name, value)))
    }

    /// `http_header_*` entries as (header name, value).
    pub fn http_headers(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.entries()
            .into_iter()
            .filter_map(|(key, value)| parse_http_header_key(key).map(|name| (name, value)))
    }

    pub fn overrides(&self) -> &'a RequestSettings {
        self.overrides
    }
}

pub(crate) fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}
