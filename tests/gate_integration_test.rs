//! End-to-end behaviour of the access gate with scripted collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use access_gate::attributes::AuthorizationQuery;
use access_gate::audit::{AuditEventKind, AuditOutcome, AuditTrail};
use access_gate::authn::Authenticator;
use access_gate::authz::{Authorizer, AuthzResponse, Decision};
use access_gate::config::AuthConfig;
use access_gate::request::RequestView;
use access_gate::{AccessGate, AuthnError, AuthzError, Identity, RejectionKind};
use async_trait::async_trait;
use http::{Method, Request, StatusCode};
use parking_lot::Mutex;

/// Authenticator returning a fixed outcome.
struct ScriptedAuthn(Result<Option<Identity>, AuthnError>);

#[async_trait]
impl Authenticator for ScriptedAuthn {
    async fn authenticate(&self, _req: &RequestView<'_>) -> Result<Option<Identity>, AuthnError> {
        self.0.clone()
    }
}

/// Authorizer answering per resource name (or path) and recording every query.
#[derive(Default)]
struct ScriptedAuthz {
    answers: HashMap<String, Result<Decision, AuthzError>>,
    default: Option<Decision>,
    seen: Mutex<Vec<AuthorizationQuery>>,
    calls: AtomicUsize,
}

impl ScriptedAuthz {
    fn allow_all() -> Self {
        Self {
            default: Some(Decision::Allow),
            ..Default::default()
        }
    }

    fn answer(mut self, key: &str, answer: Result<Decision, AuthzError>) -> Self {
        self.answers.insert(key.to_string(), answer);
        self
    }

    fn key(query: &AuthorizationQuery) -> String {
        match query.resource_target() {
            Some(target) => target.name.clone(),
            None => query.path().unwrap_or_default().to_string(),
        }
    }

    fn seen_keys(&self) -> Vec<String> {
        self.seen.lock().iter().map(Self::key).collect()
    }
}

#[async_trait]
impl Authorizer for ScriptedAuthz {
    async fn authorize(&self, query: &AuthorizationQuery) -> Result<AuthzResponse, AuthzError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(query.clone());

        let answer = self
            .answers
            .get(&ScriptedAuthz::key(query))
            .cloned()
            .unwrap_or(Ok(self.default.unwrap_or(Decision::NoOpinion)));
        answer.map(|decision| AuthzResponse::new(decision, "scripted"))
    }
}

struct Harness {
    gate: AccessGate,
    authz: Arc<ScriptedAuthz>,
    trail: Arc<AuditTrail>,
}

fn harness(yaml: &str, authn: Result<Option<Identity>, AuthnError>, authz: ScriptedAuthz) -> Harness {
    let config = AuthConfig::from_yaml_str(yaml).expect("valid config");
    let authz = Arc::new(authz);
    let trail = Arc::new(AuditTrail::new());
    let gate = AccessGate::builder(config, ScriptedAuthn(authn), Arc::clone(&authz))
        .audit_sink(trail.clone())
        .build()
        .expect("gate builds");
    Harness { gate, authz, trail }
}

fn alice() -> Identity {
    Identity::new("alice").with_groups(["a", "b"])
}

const HEADERS_ON: &str = "
authentication:
  header:
    enabled: true
";

const FAN_OUT: &str = "
authentication:
  header:
    enabled: true
authorization:
  rewrites:
    byQueryParameter:
      name: user
  resourceAttributes:
    resource: pods
    name: '{{.Value}}'
";

#[tokio::test]
async fn unauthenticated_caller_gets_401_without_authorization() {
    let h = harness(HEADERS_ON, Ok(None), ScriptedAuthz::allow_all());
    let mut req = Request::get("/metrics").body(()).unwrap();

    let rejection = h.gate.handle(&mut req).await.unwrap_err();

    assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(rejection.message(), "Unauthorized");
    assert_eq!(h.authz.calls.load(Ordering::SeqCst), 0);
    assert!(req.headers().is_empty());
}

#[tokio::test]
async fn authenticator_error_is_reported_as_401() {
    let h = harness(
        HEADERS_ON,
        Err(AuthnError::Internal("token review unreachable".into())),
        ScriptedAuthz::allow_all(),
    );
    let mut req = Request::get("/metrics").body(()).unwrap();

    let rejection = h.gate.handle(&mut req).await.unwrap_err();

    assert_eq!(rejection.kind(), RejectionKind::Unauthenticated);
    assert!(!rejection.message().contains("unreachable"));
    assert_eq!(h.authz.calls.load(Ordering::SeqCst), 0);

    let events = h.trail.events();
    assert_eq!(events[0].outcome(), AuditOutcome::Error);
    assert!(events[0].reason().unwrap().contains("unreachable"));
}

#[tokio::test]
async fn non_resource_request_authorizes_the_path() {
    let h = harness("", Ok(Some(alice())), ScriptedAuthz::allow_all());
    let mut req = Request::post("/metrics?verbose=1").body(()).unwrap();

    let ctx = h.gate.handle(&mut req).await.unwrap();

    assert_eq!(ctx.queries().len(), 1);
    let query = &h.authz.seen.lock()[0];
    assert!(!query.is_resource_request());
    assert_eq!(query.path(), Some("/metrics"));
    assert_eq!(query.verb, "create");
}

#[tokio::test]
async fn static_attributes_ignore_the_query_string() {
    let yaml = "
authorization:
  resourceAttributes:
    namespace: monitoring
    resource: services
    subresource: proxy
    name: prometheus
";
    let h = harness(yaml, Ok(Some(alice())), ScriptedAuthz::allow_all());
    let mut req = Request::get("/?name=other&name=more").body(()).unwrap();

    h.gate.handle(&mut req).await.unwrap();

    let seen = h.authz.seen.lock();
    assert_eq!(seen.len(), 1);
    let target = seen[0].resource_target().unwrap();
    assert_eq!(target.namespace, "monitoring");
    assert_eq!(target.name, "prometheus");
}

#[tokio::test]
async fn end_to_end_single_value_rewrite() {
    let yaml = "
authorization:
  rewrites:
    byQueryParameter:
      name: user
  resourceAttributes:
    resource: pods
    name: '{{.Value}}'
";
    let h = harness(yaml, Ok(Some(alice())), ScriptedAuthz::allow_all());
    let mut req = Request::get("/api/v1/pods?user=alice").body(()).unwrap();

    h.gate.handle(&mut req).await.unwrap();

    let seen = h.authz.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].verb, "get");
    assert_eq!(seen[0].resource(), "pods");
    assert_eq!(seen[0].resource_target().unwrap().name, "alice");
    assert!(req.headers().is_empty());
}

#[tokio::test]
async fn fan_out_checks_every_value_in_order() {
    let h = harness(FAN_OUT, Ok(Some(alice())), ScriptedAuthz::allow_all());
    let mut req = Request::get("/api?user=x&user=y&user=z").body(()).unwrap();

    let ctx = h.gate.handle(&mut req).await.unwrap();

    assert_eq!(h.authz.seen_keys(), ["x", "y", "z"]);
    assert_eq!(ctx.queries().len(), 3);
}

#[tokio::test]
async fn one_denied_value_rejects_and_short_circuits() {
    let authz = ScriptedAuthz::allow_all().answer("y", Ok(Decision::Deny));
    let h = harness(FAN_OUT, Ok(Some(alice())), authz);
    let mut req = Request::get("/api?user=x&user=y&user=z").body(()).unwrap();

    let rejection = h.gate.handle(&mut req).await.unwrap_err();

    assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        rejection.message(),
        "Forbidden (user=alice, verb=get, resource=pods, subresource=)"
    );
    assert_eq!(h.authz.seen_keys(), ["x", "y"]);
    assert!(req.headers().is_empty());
}

#[tokio::test]
async fn no_opinion_is_forbidden() {
    let authz = ScriptedAuthz::allow_all().answer("x", Ok(Decision::NoOpinion));
    let h = harness(FAN_OUT, Ok(Some(alice())), authz);
    let mut req = Request::get("/api?user=x").body(()).unwrap();

    let rejection = h.gate.handle(&mut req).await.unwrap_err();

    assert_eq!(rejection.kind(), RejectionKind::Forbidden);
}

#[tokio::test]
async fn authorizer_error_is_500_and_stops_evaluation() {
    let authz = ScriptedAuthz::allow_all().answer("x", Err(AuthzError::Unavailable("timeout".into())));
    let h = harness(FAN_OUT, Ok(Some(alice())), authz);
    let mut req = Request::delete("/api?user=x&user=y").body(()).unwrap();

    let rejection = h.gate.handle(&mut req).await.unwrap_err();

    assert_eq!(rejection.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        rejection.message(),
        "Authorization error (user=alice, verb=delete, resource=pods, subresource=)"
    );
    assert_eq!(h.authz.calls.load(Ordering::SeqCst), 1);
    assert!(req.headers().is_empty());
}

#[tokio::test]
async fn missing_rewrite_parameter_is_400() {
    let h = harness(FAN_OUT, Ok(Some(alice())), ScriptedAuthz::allow_all());
    let mut req = Request::get("/api?other=x").body(()).unwrap();

    let rejection = h.gate.handle(&mut req).await.unwrap_err();

    assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        rejection.message(),
        "Bad Request. The request or configuration is malformed."
    );
    assert_eq!(h.authz.calls.load(Ordering::SeqCst), 0);
    assert!(req.headers().is_empty());

    let last = h.trail.events().pop().unwrap();
    assert_eq!(last.kind(), AuditEventKind::AttributeResolution);
    assert_eq!(last.outcome(), AuditOutcome::Denied);
}

#[tokio::test]
async fn headers_are_injected_on_success() {
    let h = harness(HEADERS_ON, Ok(Some(alice())), ScriptedAuthz::allow_all());
    let mut req = Request::get("/metrics")
        .header("x-remote-user", "mallory")
        .body(())
        .unwrap();

    h.gate.handle(&mut req).await.unwrap();

    assert_eq!(req.headers()["x-remote-user"], "alice");
    assert_eq!(req.headers()["x-remote-groups"], "a|b");
}

#[tokio::test]
async fn headers_use_configured_names_and_separator() {
    let yaml = "
authentication:
  header:
    enabled: true
    userFieldName: X-Forwarded-User
    groupsFieldName: X-Forwarded-Groups
    groupSeparator: ','
";
    let h = harness(yaml, Ok(Some(alice())), ScriptedAuthz::allow_all());
    let mut req = Request::get("/").body(()).unwrap();

    h.gate.handle(&mut req).await.unwrap();

    assert_eq!(req.headers()["x-forwarded-user"], "alice");
    assert_eq!(req.headers()["x-forwarded-groups"], "a,b");
    assert!(req.headers().get("x-remote-user").is_none());
}

#[tokio::test]
async fn caller_headers_survive_a_rejection() {
    let authz = ScriptedAuthz::default();
    let h = harness(HEADERS_ON, Ok(Some(alice())), authz);
    let mut req = Request::get("/")
        .header("x-remote-user", "mallory")
        .body(())
        .unwrap();

    h.gate.handle(&mut req).await.unwrap_err();

    assert_eq!(req.headers()["x-remote-user"], "mallory");
    assert!(req.headers().get("x-remote-groups").is_none());
}

#[tokio::test]
async fn unmapped_method_still_reaches_the_authorizer() {
    let h = harness("", Ok(Some(alice())), ScriptedAuthz::allow_all());
    let mut req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/healthz")
        .body(())
        .unwrap();

    h.gate.handle(&mut req).await.unwrap();

    assert_eq!(h.authz.seen.lock()[0].verb, "");
}

#[tokio::test]
async fn rejection_renders_a_plain_text_response() {
    let h = harness(HEADERS_ON, Ok(None), ScriptedAuthz::allow_all());
    let mut req = Request::get("/").body(()).unwrap();

    let response = h.gate.handle(&mut req).await.unwrap_err().into_response();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.body(), "Unauthorized");
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
}

#[tokio::test]
async fn gate_is_shared_across_tasks() {
    let h = harness(FAN_OUT, Ok(Some(alice())), ScriptedAuthz::allow_all());
    let gate = Arc::new(h.gate);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let mut req = Request::get(format!("/api?user=u{i}")).body(()).unwrap();
                gate.handle(&mut req).await.map(|ctx| ctx.queries().len())
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), Ok(1));
    }
    assert_eq!(h.authz.calls.load(Ordering::SeqCst), 8);
}
