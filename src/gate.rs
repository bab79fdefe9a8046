use std::sync::Arc;

use http::request::Parts;
use http::{HeaderMap, Request};
use tracing::debug;
use uuid::Uuid;

use crate::attributes::AttributeResolver;
use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditSink, TracingAudit};
use crate::authn::Authenticator;
use crate::authz::Authorizer;
use crate::config::AuthConfig;
use crate::context::RequestCtx;
use crate::error::{ConfigError, Rejection};
use crate::request::RequestView;
use crate::state::Authorized;

/// The access decision gate.
///
/// `AccessGate` runs every request through a fixed sequence: authenticate the
/// caller, derive the authorization queries, check each query in order, then
/// write the identity headers. The first failing step ends the request with a
/// [`Rejection`]; the request is only mutated once every step has passed.
///
/// The gate holds no per-request state and can be shared across tasks.
///
/// # Examples
///
/// ```
/// use access_gate::authz::{Authorizer, AuthzResponse};
/// use access_gate::authn::Authenticator;
/// use access_gate::attributes::AuthorizationQuery;
/// use access_gate::config::AuthConfig;
/// use access_gate::request::RequestView;
/// use access_gate::{AccessGate, AuthnError, AuthzError, Identity};
/// use async_trait::async_trait;
///
/// struct Everyone;
///
/// #[async_trait]
/// impl Authenticator for Everyone {
///     async fn authenticate(&self, _: &RequestView<'_>) -> Result<Option<Identity>, AuthnError> {
///         Ok(Some(Identity::new("alice").with_groups(["devs"])))
///     }
/// }
///
/// struct AllowAll;
///
/// #[async_trait]
/// impl Authorizer for AllowAll {
///     async fn authorize(&self, _: &AuthorizationQuery) -> Result<AuthzResponse, AuthzError> {
///         Ok(AuthzResponse::allow())
///     }
/// }
///
/// let config = AuthConfig::from_yaml_str(
///     "authentication:\n  header:\n    enabled: true\n",
/// )
/// .unwrap();
/// let gate = AccessGate::builder(config, Everyone, AllowAll).build().unwrap();
///
/// let mut req = http::Request::get("/metrics").body(()).unwrap();
/// let ctx = block_on(gate.handle(&mut req)).unwrap();
///
/// assert_eq!(ctx.identity().name, "alice");
/// assert_eq!(req.headers()["x-remote-user"], "alice");
/// assert_eq!(req.headers()["x-remote-groups"], "devs");
/// # fn block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct AccessGate {
    config: Arc<AuthConfig>,
    resolver: AttributeResolver,
    authenticator: Arc<dyn Authenticator>,
    authorizer: Arc<dyn Authorizer>,
    audit: Arc<dyn AuditSink>,
}

impl AccessGate {
    /// Starts building a gate from its configuration and collaborators.
    pub fn builder(
        config: AuthConfig,
        authenticator: impl Authenticator + 'static,
        authorizer: impl Authorizer + 'static,
    ) -> AccessGateBuilder {
        AccessGateBuilder {
            config,
            authenticator: Arc::new(authenticator),
            authorizer: Arc::new(authorizer),
            audit: Arc::new(TracingAudit),
        }
    }

    /// Returns the configuration the gate was built with.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Runs the gate over a full request.
    ///
    /// On success the identity headers have been written (if injection is
    /// enabled) and the caller may forward the request.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] of the first failing step; `req` is left
    /// untouched in that case.
    pub async fn handle<B>(&self, req: &mut Request<B>) -> Result<RequestCtx<Authorized>, Rejection> {
        let ctx = self.check(&RequestView::from_request(req)).await?;
        self.annotate(&ctx, req.headers_mut())?;
        Ok(ctx)
    }

    /// Runs the gate over a request head.
    ///
    /// Same as [`handle`](Self::handle) for callers that split the body off.
    pub async fn handle_parts(&self, parts: &mut Parts) -> Result<RequestCtx<Authorized>, Rejection> {
        let ctx = self.check(&RequestView::from_parts(parts)).await?;
        self.annotate(&ctx, &mut parts.headers)?;
        Ok(ctx)
    }

    /// Authenticates and authorizes a request without touching it.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the authenticator errors or finds no identity
    /// - `MalformedRequest` if no authorization query can be derived
    /// - `AuthorizationError` if the authorizer errors on a query
    /// - `Forbidden` if a query is denied or gets no opinion
    ///
    /// Queries are checked in order and checking stops at the first failure.
    pub async fn check(&self, req: &RequestView<'_>) -> Result<RequestCtx<Authorized>, Rejection> {
        let request_id = req
            .request_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let ctx = RequestCtx::new(request_id);

        let identity = match self.authenticator.authenticate(req).await {
            Ok(identity) => identity,
            Err(e) => {
                self.audit.record(
                    &AuditEvent::new(
                        ctx.request_id(),
                        None::<String>,
                        AuditEventKind::Authentication,
                        AuditOutcome::Error,
                    )
                    .with_path(req.path())
                    .with_reason(e.to_string()),
                );
                return Err(Rejection::unauthenticated());
            }
        };

        let request_id = ctx.request_id().to_string();
        let ctx = ctx.authenticate(identity).map_err(|rejection| {
            self.audit.record(
                &AuditEvent::new(
                    request_id.as_str(),
                    None::<String>,
                    AuditEventKind::Authentication,
                    AuditOutcome::Denied,
                )
                .with_path(req.path())
                .with_reason("no credential accepted"),
            );
            rejection
        })?;
        self.audit.record(&AuditEvent::new(
            ctx.request_id(),
            Some(ctx.identity().name.as_str()),
            AuditEventKind::Authentication,
            AuditOutcome::Success,
        ));

        let queries = match self.resolver.resolve(ctx.identity(), req) {
            Ok(queries) => queries,
            Err(e) => {
                self.audit.record(
                    &AuditEvent::new(
                        ctx.request_id(),
                        Some(ctx.identity().name.as_str()),
                        AuditEventKind::AttributeResolution,
                        AuditOutcome::Denied,
                    )
                    .with_path(req.path())
                    .with_reason(e.to_string()),
                );
                return Err(Rejection::malformed());
            }
        };
        self.audit.record(
            &AuditEvent::new(
                ctx.request_id(),
                Some(ctx.identity().name.as_str()),
                AuditEventKind::AttributeResolution,
                AuditOutcome::Success,
            )
            .with_query_count(queries.len()),
        );

        for query in &queries {
            let user = query.user.name.as_str();
            match self.authorizer.authorize(query).await {
                Ok(response) if response.decision.is_allowed() => {
                    self.audit.record(&AuditEvent::for_query(
                        ctx.request_id(),
                        query,
                        AuditOutcome::Success,
                    ));
                }
                Ok(response) => {
                    let mut event =
                        AuditEvent::for_query(ctx.request_id(), query, AuditOutcome::Denied);
                    if !response.reason.is_empty() {
                        event = event.with_reason(response.reason);
                    }
                    self.audit.record(&event);
                    return Err(Rejection::forbidden(
                        user,
                        &query.verb,
                        query.resource(),
                        query.subresource(),
                    ));
                }
                Err(e) => {
                    self.audit.record(
                        &AuditEvent::for_query(ctx.request_id(), query, AuditOutcome::Error)
                            .with_reason(e.to_string()),
                    );
                    return Err(Rejection::authorization_error(
                        user,
                        &query.verb,
                        query.resource(),
                        query.subresource(),
                    ));
                }
            }
        }

        Ok(ctx.authorize(queries))
    }

    fn annotate(&self, ctx: &RequestCtx<Authorized>, headers: &mut HeaderMap) -> Result<(), Rejection> {
        let Some(policy) = self.config.header_injection() else {
            return Ok(());
        };

        ctx.annotate(headers, policy).map_err(|rejection| {
            self.audit.record(
                &AuditEvent::new(
                    ctx.request_id(),
                    Some(ctx.identity().name.as_str()),
                    AuditEventKind::Authorization,
                    AuditOutcome::Error,
                )
                .with_reason(rejection.message()),
            );
            rejection
        })?;

        debug!(
            request_id = %ctx.request_id(),
            user = %ctx.identity().name,
            header = %policy.user_field_name,
            "identity headers injected"
        );
        Ok(())
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AccessGate`].
///
/// The configuration is validated in [`build`](Self::build), so a built gate
/// cannot fail on its own configuration while handling requests.
pub struct AccessGateBuilder {
    config: AuthConfig,
    authenticator: Arc<dyn Authenticator>,
    authorizer: Arc<dyn Authorizer>,
    audit: Arc<dyn AuditSink>,
}

impl AccessGateBuilder {
    /// Sends audit events to `sink` instead of [`TracingAudit`].
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Validates the configuration and builds the gate.
    ///
    /// # Errors
    ///
    /// Returns any error [`AuthConfig::validate`] reports.
    pub fn build(self) -> Result<AccessGate, ConfigError> {
        let resolver = self.config.compile()?;

        debug!(
            rewrite = ?resolver.rewrite_parameter(),
            header_injection = self.config.header_injection().is_some(),
            "access gate built"
        );

        Ok(AccessGate {
            config: Arc::new(self.config),
            resolver,
            authenticator: self.authenticator,
            authorizer: self.authorizer,
            audit: self.audit,
        })
    }
}

impl std::fmt::Debug for AccessGateBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGateBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
