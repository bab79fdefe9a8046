//! Authorization attribute resolution.
//!
//! Maps an authenticated identity and an incoming request onto the ordered
//! list of authorization queries the gate has to check. One of three
//! policies applies, fixed when the resolver is built:
//!
//! - no resource attributes: one non-resource query for the request path,
//!   whether or not a rewrite is configured
//! - static resource attributes: one resource query with the literal fields
//! - query-parameter rewrite: one resource query per parameter value, each
//!   field rendered as a template against that value

use http::Method;
use tracing::warn;

use crate::config::{AuthzConfig, ResourceAttributes};
use crate::error::ConfigError;
use crate::identity::Identity;
use crate::request::RequestView;
use crate::template::{TemplateError, TemplateExpander};

/// Maps an HTTP method onto an authorization verb.
///
/// Methods without a mapping yield an empty verb; deciding what an empty
/// verb means is left to the authorizer.
///
/// # Examples
///
/// ```
/// use access_gate::attributes::verb_for;
/// use http::Method;
///
/// assert_eq!(verb_for(&Method::POST), "create");
/// assert_eq!(verb_for(&Method::OPTIONS), "");
/// ```
pub fn verb_for(method: &Method) -> &'static str {
    match method {
        &Method::POST => "create",
        &Method::GET => "get",
        &Method::PUT => "update",
        &Method::PATCH => "patch",
        &Method::DELETE => "delete",
        _ => "",
    }
}

/// Resource coordinates of a resource query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResourceTarget {
    /// Namespace
    pub namespace: String,
    /// API group
    pub api_group: String,
    /// API version
    pub api_version: String,
    /// Resource type
    pub resource: String,
    /// Subresource
    pub subresource: String,
    /// Resource name
    pub name: String,
}

impl From<&ResourceAttributes> for ResourceTarget {
    fn from(attrs: &ResourceAttributes) -> Self {
        Self {
            namespace: attrs.namespace.clone(),
            api_group: attrs.api_group.clone(),
            api_version: attrs.api_version.clone(),
            resource: attrs.resource.clone(),
            subresource: attrs.subresource.clone(),
            name: attrs.name.clone(),
        }
    }
}

/// What a query addresses: API resource coordinates or a URL path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Addressed by resource coordinates
    Resource(ResourceTarget),
    /// Addressed by URL path
    NonResource {
        /// Request path
        path: String,
    },
}

/// A single (identity, verb, target) tuple to check against policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorizationQuery {
    /// The authenticated identity
    pub user: Identity,
    /// Verb derived from the request method; empty if the method has no mapping
    pub verb: String,
    /// The addressed resource or path
    pub target: Target,
}

impl AuthorizationQuery {
    /// Returns true if the query is addressed by resource coordinates.
    pub fn is_resource_request(&self) -> bool {
        matches!(self.target, Target::Resource(_))
    }

    /// Returns the resource coordinates, if this is a resource query.
    pub fn resource_target(&self) -> Option<&ResourceTarget> {
        match &self.target {
            Target::Resource(target) => Some(target),
            Target::NonResource { .. } => None,
        }
    }

    /// Returns the path, if this is a non-resource query.
    pub fn path(&self) -> Option<&str> {
        match &self.target {
            Target::Resource(_) => None,
            Target::NonResource { path } => Some(path),
        }
    }

    /// Returns the resource type, or an empty string for non-resource queries.
    pub fn resource(&self) -> &str {
        self.resource_target().map_or("", |t| t.resource.as_str())
    }

    /// Returns the subresource, or an empty string for non-resource queries.
    pub fn subresource(&self) -> &str {
        self.resource_target().map_or("", |t| t.subresource.as_str())
    }
}

/// Why no query could be derived from a request.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The rewrite query parameter is absent from the request
    #[error("query parameter {0:?} is required but missing")]
    MissingParameter(String),

    /// A resource-attribute template failed to render
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug)]
enum AttributePolicy {
    NonResource,
    Static(ResourceTarget),
    Rewrite {
        parameter: String,
        templates: TemplateExpander,
    },
}

/// Derives authorization queries from requests.
///
/// Built once from an [`AuthzConfig`]; templates are compiled at that point.
///
/// # Examples
///
/// ```
/// use access_gate::attributes::AttributeResolver;
/// use access_gate::config::{AuthzConfig, QueryParameterRewrite, ResourceAttributes, Rewrites};
/// use access_gate::request::RequestView;
/// use access_gate::Identity;
///
/// let config = AuthzConfig {
///     rewrites: Some(Rewrites {
///         by_query_parameter: Some(QueryParameterRewrite { name: "user".into() }),
///     }),
///     resource_attributes: Some(ResourceAttributes {
///         resource: "pods".into(),
///         name: "{{.Value}}".into(),
///         ..Default::default()
///     }),
/// };
/// let resolver = AttributeResolver::new(&config).unwrap();
///
/// let req = http::Request::get("/api/v1/pods?user=alice").body(()).unwrap();
/// let queries = resolver
///     .resolve(&Identity::new("alice"), &RequestView::from_request(&req))
///     .unwrap();
///
/// assert_eq!(queries.len(), 1);
/// assert_eq!(queries[0].verb, "get");
/// assert_eq!(queries[0].resource(), "pods");
/// assert_eq!(queries[0].resource_target().unwrap().name, "alice");
/// ```
#[derive(Debug)]
pub struct AttributeResolver {
    policy: AttributePolicy,
}

impl AttributeResolver {
    /// Compiles the attribute policy described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Template` if a resource-attribute template is
    /// malformed.
    pub fn new(config: &AuthzConfig) -> Result<Self, ConfigError> {
        let policy = match (&config.resource_attributes, config.rewrite_parameter()) {
            (None, None) => AttributePolicy::NonResource,
            (None, Some(parameter)) => {
                warn!(
                    parameter,
                    "query-parameter rewrite ignored: no resourceAttributes configured"
                );
                AttributePolicy::NonResource
            }
            (Some(attrs), None) => AttributePolicy::Static(ResourceTarget::from(attrs)),
            (Some(attrs), Some(parameter)) => {
                let mut templates = TemplateExpander::new();
                for (field, source) in attrs.fields() {
                    templates
                        .add(field, source)
                        .map_err(|e| ConfigError::Template {
                            field,
                            reason: e.to_string(),
                        })?;
                }
                AttributePolicy::Rewrite {
                    parameter: parameter.to_string(),
                    templates,
                }
            }
        };

        Ok(Self { policy })
    }

    /// Returns the rewrite parameter driving fan-out, if any.
    pub fn rewrite_parameter(&self) -> Option<&str> {
        match &self.policy {
            AttributePolicy::Rewrite { parameter, .. } => Some(parameter),
            _ => None,
        }
    }

    /// Derives the ordered queries for `req` made by `user`.
    ///
    /// On success the result always holds at least one query.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::MissingParameter` if a rewrite is configured and
    /// the request does not carry the parameter, and `ResolveError::Template`
    /// if a template fails to render.
    pub fn resolve(
        &self,
        user: &Identity,
        req: &RequestView<'_>,
    ) -> Result<Vec<AuthorizationQuery>, ResolveError> {
        let verb = verb_for(req.method());

        let query = |target| AuthorizationQuery {
            user: user.clone(),
            verb: verb.to_string(),
            target,
        };

        match &self.policy {
            AttributePolicy::NonResource => Ok(vec![query(Target::NonResource {
                path: req.path().to_string(),
            })]),
            AttributePolicy::Static(target) => Ok(vec![query(Target::Resource(target.clone()))]),
            AttributePolicy::Rewrite {
                parameter,
                templates,
            } => {
                let values = req
                    .query_values(parameter)
                    .ok_or_else(|| ResolveError::MissingParameter(parameter.clone()))?;

                let mut queries = Vec::with_capacity(values.len());
                for value in &values {
                    queries.push(query(Target::Resource(render_target(templates, value)?)));
                }
                Ok(queries)
            }
        }
    }
}

fn render_target(templates: &TemplateExpander, value: &str) -> Result<ResourceTarget, TemplateError> {
    Ok(ResourceTarget {
        namespace: templates.render("namespace", value)?,
        api_group: templates.render("apiGroup", value)?,
        api_version: templates.render("apiVersion", value)?,
        resource: templates.render("resource", value)?,
        subresource: templates.render("subresource", value)?,
        name: templates.render("name", value)?,
    })
}
