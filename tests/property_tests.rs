//! Property tests for attribute resolution and gate decisions.

use std::sync::Arc;

use access_gate::attributes::{verb_for, AttributeResolver, AuthorizationQuery};
use access_gate::authn::Authenticator;
use access_gate::authz::{Authorizer, AuthzResponse, Decision};
use access_gate::config::{AuthConfig, AuthzConfig, QueryParameterRewrite, ResourceAttributes, Rewrites};
use access_gate::request::RequestView;
use access_gate::{AccessGate, AuthnError, AuthzError, Identity, RejectionKind};
use async_trait::async_trait;
use http::{Method, Request};
use parking_lot::Mutex;
use proptest::prelude::*;

// Strategy: query-parameter values that need no percent-encoding
fn arb_value() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9-]{0,12}").unwrap()
}

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![
        3 => Just(Decision::Allow),
        1 => Just(Decision::Deny),
        1 => Just(Decision::NoOpinion),
    ]
}

fn rewrite_config() -> AuthzConfig {
    AuthzConfig {
        rewrites: Some(Rewrites {
            by_query_parameter: Some(QueryParameterRewrite {
                name: "v".into(),
            }),
        }),
        resource_attributes: Some(ResourceAttributes {
            resource: "pods".into(),
            name: "{{.Value}}".into(),
            namespace: "ns-{{ Value }}".into(),
            ..Default::default()
        }),
    }
}

fn uri_with_values(values: &[String]) -> String {
    let query: Vec<String> = values.iter().map(|v| format!("v={v}")).collect();
    format!("/api?{}", query.join("&"))
}

struct Alice;

#[async_trait]
impl Authenticator for Alice {
    async fn authenticate(&self, _req: &RequestView<'_>) -> Result<Option<Identity>, AuthnError> {
        Ok(Some(Identity::new("alice")))
    }
}

/// Answers the i-th query with the i-th decision and records the call.
struct Sequence {
    decisions: Vec<Decision>,
    calls: Mutex<usize>,
}

#[async_trait]
impl Authorizer for Sequence {
    async fn authorize(&self, _query: &AuthorizationQuery) -> Result<AuthzResponse, AuthzError> {
        let mut calls = self.calls.lock();
        let decision = self.decisions[*calls];
        *calls += 1;
        Ok(AuthzResponse::new(decision, ""))
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    /// Property: k values of the rewrite parameter yield exactly k queries,
    /// each rendered from the value at the same position.
    #[test]
    fn proptest_fan_out_matches_parameter_values(
        values in prop::collection::vec(arb_value(), 1..8),
    ) {
        let resolver = AttributeResolver::new(&rewrite_config()).unwrap();
        let req = Request::get(uri_with_values(&values)).body(()).unwrap();

        let queries = resolver
            .resolve(&Identity::new("alice"), &RequestView::from_request(&req))
            .unwrap();

        prop_assert_eq!(queries.len(), values.len());
        for (query, value) in queries.iter().zip(&values) {
            let target = query.resource_target().unwrap();
            prop_assert_eq!(&target.name, value);
            prop_assert_eq!(&target.namespace, &format!("ns-{value}"));
            prop_assert_eq!(&target.resource, "pods");
        }
    }

    /// Property: without resource attributes there is exactly one
    /// non-resource query for the request path, whatever the query string.
    #[test]
    fn proptest_non_resource_query_uses_path(
        segment in "[a-z]{1,10}",
        values in prop::collection::vec(arb_value(), 0..4),
    ) {
        let resolver = AttributeResolver::new(&AuthzConfig::default()).unwrap();
        let uri = format!("/{segment}{}", uri_with_values(&values));
        let req = Request::get(uri).body(()).unwrap();

        let queries = resolver
            .resolve(&Identity::new("alice"), &RequestView::from_request(&req))
            .unwrap();

        prop_assert_eq!(queries.len(), 1);
        prop_assert!(!queries[0].is_resource_request());
        let expected = format!("/{segment}/api");
        prop_assert_eq!(queries[0].path(), Some(expected.as_str()));
    }

    /// Property: the gate forwards only if every decision is allow, and stops
    /// at the first refusal.
    #[test]
    fn proptest_all_queries_must_allow(
        decisions in prop::collection::vec(arb_decision(), 1..8),
    ) {
        let values: Vec<String> = (0..decisions.len()).map(|i| format!("n{i}")).collect();
        let authz = Arc::new(Sequence {
            decisions: decisions.clone(),
            calls: Mutex::new(0),
        });
        let config = AuthConfig {
            authorization: rewrite_config(),
            ..Default::default()
        };
        let gate = AccessGate::builder(config, Alice, Arc::clone(&authz)).build().unwrap();
        let mut req = Request::get(uri_with_values(&values)).body(()).unwrap();

        let result = block_on(gate.handle(&mut req));

        match decisions.iter().position(|d| !d.is_allowed()) {
            None => {
                prop_assert!(result.is_ok());
                prop_assert_eq!(*authz.calls.lock(), decisions.len());
            }
            Some(first_refusal) => {
                prop_assert_eq!(result.unwrap_err().kind(), RejectionKind::Forbidden);
                prop_assert_eq!(*authz.calls.lock(), first_refusal + 1);
            }
        }
    }

    /// Property: only the five mapped methods produce a verb.
    #[test]
    fn proptest_unmapped_methods_have_empty_verb(name in "[A-Z]{3,10}") {
        let method = Method::from_bytes(name.as_bytes()).unwrap();
        let expected = match name.as_str() {
            "POST" => "create",
            "GET" => "get",
            "PUT" => "update",
            "PATCH" => "patch",
            "DELETE" => "delete",
            _ => "",
        };
        prop_assert_eq!(verb_for(&method), expected);
    }
}
