//! Gate configuration.
//!
//! The model mirrors the camelCase YAML document operators write:
//!
//! ```yaml
//! authentication:
//!   x509:
//!     clientCAFile: /etc/tls/client-ca.crt
//!   header:
//!     enabled: true
//!     userFieldName: x-remote-user
//!     groupsFieldName: x-remote-groups
//!     groupSeparator: "|"
//! authorization:
//!   rewrites:
//!     byQueryParameter:
//!       name: namespace
//!   resourceAttributes:
//!     resource: pods
//!     namespace: "{{ .Value }}"
//! ```
//!
//! Every nested block is owned, so `Clone` is a deep copy: a cloned
//! configuration can be modified without affecting gates built from the
//! original.

use std::path::{Path, PathBuf};

use http::HeaderName;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attributes::AttributeResolver;
use crate::error::ConfigError;

/// Default header naming the authenticated user.
pub const DEFAULT_USER_HEADER: &str = "x-remote-user";

/// Default header listing the authenticated user's groups.
pub const DEFAULT_GROUPS_HEADER: &str = "x-remote-groups";

/// Default separator between group names in the groups header.
pub const DEFAULT_GROUP_SEPARATOR: &str = "|";

/// Complete gate configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthConfig {
    /// How callers are authenticated and how identity is passed upstream
    #[serde(default)]
    pub authentication: AuthnConfig,
    /// How authorization queries are derived from requests
    #[serde(default)]
    pub authorization: AuthzConfig,
}

/// Authentication settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthnConfig {
    /// Client-certificate authentication against a CA bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509: Option<X509Config>,
    /// Identity-header injection towards the upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderConfig>,
}

/// Client-certificate authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct X509Config {
    /// PEM bundle of CAs that may sign client certificates
    #[serde(rename = "clientCAFile")]
    pub client_ca_file: PathBuf,
}

/// Identity-header injection policy.
///
/// When enabled, an authorized request is forwarded with the user name and
/// the joined group names in the configured headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HeaderConfig {
    /// Whether headers are injected at all
    #[serde(default)]
    pub enabled: bool,
    /// Header carrying the user name
    #[serde(default = "default_user_header")]
    pub user_field_name: String,
    /// Header carrying the joined group names
    #[serde(default = "default_groups_header")]
    pub groups_field_name: String,
    /// Separator placed between group names
    #[serde(default = "default_group_separator")]
    pub group_separator: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user_field_name: default_user_header(),
            groups_field_name: default_groups_header(),
            group_separator: default_group_separator(),
        }
    }
}

fn default_user_header() -> String {
    DEFAULT_USER_HEADER.to_string()
}

fn default_groups_header() -> String {
    DEFAULT_GROUPS_HEADER.to_string()
}

fn default_group_separator() -> String {
    DEFAULT_GROUP_SEPARATOR.to_string()
}

/// Authorization-attribute policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthzConfig {
    /// Rewrites that fan one request out into several queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrites: Option<Rewrites>,
    /// Resource coordinates to authorize instead of the request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_attributes: Option<ResourceAttributes>,
}

impl AuthzConfig {
    /// Returns the configured rewrite parameter, treating an empty name as unset.
    pub fn rewrite_parameter(&self) -> Option<&str> {
        self.rewrites
            .as_ref()
            .and_then(|r| r.by_query_parameter.as_ref())
            .map(|q| q.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Request rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Rewrites {
    /// Fan out over the values of a query parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_query_parameter: Option<QueryParameterRewrite>,
}

/// Query-parameter driven rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryParameterRewrite {
    /// Query parameter whose values drive the fan-out
    #[serde(default)]
    pub name: String,
}

/// Resource coordinates, each either a literal or a value template.
///
/// Fields are templates only when a query-parameter rewrite is configured;
/// otherwise they are used verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceAttributes {
    /// Namespace
    #[serde(default)]
    pub namespace: String,
    /// API group
    #[serde(default)]
    pub api_group: String,
    /// API version
    #[serde(default)]
    pub api_version: String,
    /// Resource type
    #[serde(default)]
    pub resource: String,
    /// Subresource
    #[serde(default)]
    pub subresource: String,
    /// Resource name
    #[serde(default)]
    pub name: String,
}

impl ResourceAttributes {
    /// Returns `(field name, value)` pairs in a fixed order.
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("namespace", self.namespace.as_str()),
            ("apiGroup", self.api_group.as_str()),
            ("apiVersion", self.api_version.as_str()),
            ("resource", self.resource.as_str()),
            ("subresource", self.subresource.as_str()),
            ("name", self.name.as_str()),
        ]
    }
}

impl AuthConfig {
    /// Parses and validates a YAML configuration document.
    ///
    /// # Examples
    ///
    /// ```
    /// use access_gate::config::AuthConfig;
    ///
    /// let config = AuthConfig::from_yaml_str(r#"
    /// authorization:
    ///   resourceAttributes:
    ///     resource: pods
    /// "#).unwrap();
    ///
    /// let attrs = config.authorization.resource_attributes.unwrap();
    /// assert_eq!(attrs.resource, "pods");
    /// assert!(config.authentication.header.is_none());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed YAML and any error
    /// [`validate`](Self::validate) reports.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: AuthConfig = if yaml.trim().is_empty() {
            AuthConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded gate configuration");
        Self::from_yaml_str(&yaml)
    }

    /// Checks the configuration eagerly so request handling cannot trip over it.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidHeaderName` if injection is enabled with a bad header name
    /// - `ConfigError::Template` if a resource-attribute template is malformed
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile().map(|_| ())
    }

    /// Validates the configuration and returns the compiled attribute resolver.
    pub(crate) fn compile(&self) -> Result<AttributeResolver, ConfigError> {
        if let Some(header) = self.header_injection() {
            validate_header_name("userFieldName", &header.user_field_name)?;
            validate_header_name("groupsFieldName", &header.groups_field_name)?;
        }

        // Template checks happen while compiling.
        AttributeResolver::new(&self.authorization)
    }

    /// Returns the header-injection policy if injection is enabled.
    pub fn header_injection(&self) -> Option<&HeaderConfig> {
        self.authentication.header.as_ref().filter(|h| h.enabled)
    }
}

fn validate_header_name(field: &'static str, value: &str) -> Result<(), ConfigError> {
    HeaderName::from_bytes(value.as_bytes())
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidHeaderName {
            field,
            value: value.to_string(),
        })
}
