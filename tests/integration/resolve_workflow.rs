//! End-to-end trust chain resolution tests.
//!
//! Builds small federations of Ed25519-signed entity statements, resolves
//! them through the public API and checks the resulting chains, metadata
//! and failures.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use oidc_federation::{
    resolve_trust_chain, ConstraintViolation, Ed25519JwsVerifier, EntityId, EntityStatement,
    EntityStatementBuilder, EntityType, FederationError, FederationKey, FixedClock, MemoryFetcher,
    MetadataPolicy, PolicyViolationKind, ResolutionState, ResolveOptions, StatementStore,
    TrustChain, TrustChainConstraints, TrustChainResolver,
};

const NOW: i64 = 1_700_000_000;
const TA: &str = "https://ta.example.org";
const IA: &str = "https://ia.example.org";
const RP: &str = "https://cs.example.com/rp1";

fn id(s: &str) -> EntityId {
    EntityId::parse(s).unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(obj) => obj,
        other => panic!("expected object, got {other}"),
    }
}

// ── Federation fixture ────────────────────────────────────────────────────────

struct Federation {
    fetcher: MemoryFetcher,
    keys: HashMap<String, FederationKey>,
    published: Vec<(EntityId, EntityId, String)>,
}

impl Federation {
    fn new(entities: &[&str]) -> Self {
        Self {
            fetcher: MemoryFetcher::new(),
            keys: entities
                .iter()
                .map(|e| (e.to_string(), FederationKey::generate()))
                .collect(),
            published: Vec::new(),
        }
    }

    fn key(&self, entity: &str) -> &FederationKey {
        &self.keys[entity]
    }

    fn configuration(&self, entity: &str, hints: &[&str]) -> EntityStatementBuilder {
        let mut builder =
            EntityStatementBuilder::configuration(id(entity), self.key(entity).public_jwks())
                .validity(NOW - 60, NOW + 3600)
                .metadata(
                    EntityType::federation_entity(),
                    object(json!({"organization_name": entity})),
                );
        for hint in hints {
            builder = builder.authority_hint(id(hint));
        }
        builder
    }

    fn subordinate(&self, issuer: &str, subject: &str) -> EntityStatementBuilder {
        EntityStatementBuilder::new(id(issuer), id(subject), self.key(subject).public_jwks())
            .validity(NOW - 60, NOW + 3600)
    }

    fn publish(&mut self, issuer: &str, subject: &str, builder: EntityStatementBuilder) {
        let jws = builder.sign(self.key(issuer)).unwrap();
        self.fetcher.insert(&id(issuer), &id(subject), jws.clone());
        self.published.push((id(issuer), id(subject), jws));
    }

    fn publish_configuration(&mut self, entity: &str, hints: &[&str]) {
        let builder = self.configuration(entity, hints);
        self.publish(entity, entity, builder);
    }

    fn publish_subordinate(&mut self, issuer: &str, subject: &str) {
        let builder = self.subordinate(issuer, subject);
        self.publish(issuer, subject, builder);
    }

    fn leaf(&self, hints: &[&str], metadata: Value) -> EntityStatement {
        self.configuration(RP, hints)
            .metadata(EntityType::openid_relying_party(), object(metadata))
            .build()
            .unwrap()
    }

    fn resolver(&self) -> TrustChainResolver<&MemoryFetcher> {
        TrustChainResolver::new(&self.fetcher).with_clock(FixedClock(NOW))
    }

    fn resolve(&self, leaf: &EntityStatement) -> oidc_federation::Result<TrustChain> {
        self.resolver().resolve(
            leaf,
            &id(TA),
            &self.key(TA).public_jwks(),
            &ResolveOptions::default(),
        )
    }
}

fn rp_metadata() -> Value {
    json!({
        "contacts": ["rp_admins@cs.example.com"],
        "redirect_uris": ["https://cs.example.com/rp1"],
        "response_types": ["code"]
    })
}

/// TA <- IA <- RP, with the given policies on the two subordinate
/// statements.
fn federation_with_policies(ta_policy: Option<Value>, ia_policy: Option<Value>) -> Federation {
    let mut fed = Federation::new(&[TA, IA, RP]);
    fed.publish_configuration(TA, &[]);
    fed.publish_configuration(IA, &[TA]);

    let mut ta_about_ia = fed.subordinate(TA, IA);
    if let Some(policy) = ta_policy {
        ta_about_ia = ta_about_ia.metadata_policy(
            EntityType::openid_relying_party(),
            MetadataPolicy::parse(&policy).unwrap(),
        );
    }
    fed.publish(TA, IA, ta_about_ia);

    let mut ia_about_rp = fed.subordinate(IA, RP);
    if let Some(policy) = ia_policy {
        ia_about_rp = ia_about_rp.metadata_policy(
            EntityType::openid_relying_party(),
            MetadataPolicy::parse(&policy).unwrap(),
        );
    }
    fed.publish(IA, RP, ia_about_rp);
    fed
}

fn expected_rp_metadata() -> Value {
    json!({
        "contacts": ["rp_admins@cs.example.com", "helpdesk@example.com"],
        "logo_uri": "https://example.com/logo_small.jpg",
        "policy_uri": "https://example.com/policy.html",
        "tos_uri": "https://example.com/tos.html",
        "redirect_uris": ["https://cs.example.com/rp1"],
        "response_types": ["code"]
    })
}

// ── Successful resolution ─────────────────────────────────────────────────────

#[test]
fn anchor_policy_applied_to_leaf_metadata() {
    let policy = json!({
        "contacts": {"add": ["helpdesk@example.com"]},
        "logo_uri": {
            "one_of": ["https://example.com/logo_small.jpg", "https://example.com/logo_big.jpg"],
            "default": "https://example.com/logo_small.jpg"
        },
        "policy_uri": {"value": "https://example.com/policy.html"},
        "tos_uri": {"value": "https://example.com/tos.html"}
    });
    let fed = federation_with_policies(Some(policy), None);
    let chain = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap();

    assert_eq!(Value::Object(chain.metadata().clone()), expected_rp_metadata());
    assert_eq!(chain.trust_anchor_id(), &id(TA));
    assert_eq!(chain.leaf_id(), &id(RP));
    assert_eq!(chain.entity_path(), vec![&id(TA), &id(IA), &id(RP)]);
    assert_eq!(chain.expires_at(), NOW + 3600);
}

#[test]
fn policies_split_across_levels_merge_to_same_result() {
    let ta_policy = json!({
        "logo_uri": {
            "one_of": ["https://example.com/logo_small.jpg", "https://example.com/logo_big.jpg"]
        },
        "policy_uri": {"value": "https://example.com/policy.html"}
    });
    let ia_policy = json!({
        "contacts": {"add": "helpdesk@example.com"},
        "logo_uri": {"default": "https://example.com/logo_small.jpg"},
        "tos_uri": {"value": "https://example.com/tos.html"}
    });
    let fed = federation_with_policies(Some(ta_policy), Some(ia_policy));
    let chain = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap();

    assert_eq!(Value::Object(chain.metadata().clone()), expected_rp_metadata());
    let logo = chain.effective_policy().get("logo_uri").unwrap();
    assert_eq!(logo.len(), 2);
}

#[test]
fn subordinate_narrows_superior_one_of() {
    let ta_policy = json!({"id_token_signed_response_alg": {"one_of": ["ES256", "EdDSA", "RS256"]}});
    let ia_policy = json!({"id_token_signed_response_alg": {"one_of": ["EdDSA", "PS256"]}});
    let fed = federation_with_policies(Some(ta_policy), Some(ia_policy));

    let mut metadata = rp_metadata();
    metadata["id_token_signed_response_alg"] = json!("RS256");
    let result = fed.resolve(&fed.leaf(&[IA], metadata));
    match result {
        Err(FederationError::Policy(v)) => {
            assert_eq!(v.kind, PolicyViolationKind::ValueNotAllowed);
            assert_eq!(v.parameter, "id_token_signed_response_alg");
        }
        other => panic!("expected policy violation, got {other:?}"),
    }

    let mut metadata = rp_metadata();
    metadata["id_token_signed_response_alg"] = json!("EdDSA");
    assert!(fed.resolve(&fed.leaf(&[IA], metadata)).is_ok());
}

#[test]
fn absent_scopes_left_absent_by_check_only_policy() {
    let policy = json!({
        "scope": {"subset_of": ["openid", "eduperson"], "superset_of": ["openid"]}
    });
    let fed = federation_with_policies(Some(policy), None);
    let chain = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap();
    assert!(!chain.metadata().contains_key("scope"));
}

#[test]
fn absent_scopes_synthesized_from_default() {
    let policy = json!({
        "scope": {
            "subset_of": ["openid", "eduperson"],
            "superset_of": ["openid"],
            "default": ["openid", "eduperson"]
        }
    });
    let fed = federation_with_policies(Some(policy), None);
    let chain = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap();
    assert_eq!(chain.metadata()["scope"], json!(["openid", "eduperson"]));
}

#[test]
fn free_function_matches_resolver() {
    let fed = federation_with_policies(None, None);
    let leaf = fed.leaf(&[IA], rp_metadata());
    let options = ResolveOptions::default().at_time(NOW);

    let chain = resolve_trust_chain(
        &fed.fetcher,
        Ed25519JwsVerifier,
        &leaf,
        &id(TA),
        &fed.key(TA).public_jwks(),
        &options,
    )
    .unwrap();
    assert_eq!(chain.to_json(), fed.resolve(&leaf).unwrap().to_json());
}

#[test]
fn resolution_is_deterministic() {
    let fed = federation_with_policies(
        Some(json!({"contacts": {"add": ["helpdesk@example.com"]}})),
        None,
    );
    let leaf = fed.leaf(&["https://gone.example.org", IA], rp_metadata());

    let first = fed.resolve(&leaf).unwrap();
    let first_requests = fed.fetcher.requests();
    fed.fetcher.clear_requests();
    let second = fed.resolve(&leaf).unwrap();

    assert_eq!(first.statements(), second.statements());
    assert_eq!(first.to_json(), second.to_json());
    assert_eq!(first_requests, fed.fetcher.requests());
}

#[test]
fn resolves_from_statement_store() {
    let fed = federation_with_policies(
        Some(json!({"tos_uri": {"value": "https://example.com/tos.html"}})),
        None,
    );
    let dir = tempfile::tempdir().unwrap();
    let store = StatementStore::new(dir.path()).unwrap();
    for (issuer, subject, jws) in &fed.published {
        store.save_for(issuer, subject, jws).unwrap();
    }
    let leaf_jws = fed
        .configuration(RP, &[IA])
        .metadata(EntityType::openid_relying_party(), object(rp_metadata()))
        .sign(fed.key(RP))
        .unwrap();
    assert_eq!(store.save(&leaf_jws).unwrap(), (id(RP), id(RP)));

    let chain = TrustChainResolver::new(store)
        .with_clock(FixedClock(NOW))
        .resolve_entity(
            &id(RP),
            &id(TA),
            &fed.key(TA).public_jwks(),
            &ResolveOptions::default(),
        )
        .unwrap();
    assert_eq!(chain.len(), 4);
    assert_eq!(chain.metadata()["tos_uri"], "https://example.com/tos.html");
}

#[test]
fn chain_summary_json() {
    let fed = federation_with_policies(
        Some(json!({"policy_uri": {"value": "https://example.com/policy.html"}})),
        None,
    );
    let chain = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap();
    let summary = chain.to_json();

    assert_eq!(summary["trust_anchor"], TA);
    assert_eq!(summary["subject"], RP);
    assert_eq!(summary["entity_type"], "openid_relying_party");
    assert_eq!(summary["path"], json!([TA, IA, RP]));
    assert_eq!(summary["expires_at"], NOW + 3600);
    assert_eq!(
        summary["metadata_policy"],
        json!({"policy_uri": {"value": "https://example.com/policy.html"}})
    );
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[test]
fn conflicting_values_are_terminal() {
    let fed = federation_with_policies(
        Some(json!({"tos_uri": {"value": "https://a.example/tos"}})),
        Some(json!({"tos_uri": {"value": "https://b.example/tos"}})),
    );
    let err = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap_err();
    assert_eq!(err.resolution_state(), ResolutionState::PolicyConflict);
    assert!(matches!(
        err,
        FederationError::Policy(ref v) if v.kind == PolicyViolationKind::ConflictingValue
    ));
}

#[test]
fn essential_parameter_missing() {
    let fed = federation_with_policies(
        Some(json!({"jwks_uri": {"essential": true}})),
        None,
    );
    let err = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap_err();
    assert!(matches!(
        err,
        FederationError::Policy(ref v) if v.kind == PolicyViolationKind::EssentialMissing
    ));
}

#[test]
fn unsupported_critical_policy_operation() {
    let mut fed = federation_with_policies(None, None);
    let statement = fed
        .subordinate(TA, IA)
        .policy_critical("regexp")
        .metadata_policy(
            EntityType::openid_relying_party(),
            MetadataPolicy::parse(&json!({"client_name": {"regexp": "^RP"}})).unwrap(),
        );
    fed.publish(TA, IA, statement);

    let err = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap_err();
    assert!(matches!(
        err,
        FederationError::Policy(ref v)
            if v.kind == PolicyViolationKind::UnsupportedCriticalOperation
    ));
}

#[test]
fn permitted_naming_constraint_miss() {
    let mut fed = federation_with_policies(None, None);
    let statement = fed.subordinate(TA, IA).constraints(
        TrustChainConstraints::unconstrained().with_permitted(vec![id("https://rp.example.org")]),
    );
    fed.publish(TA, IA, statement);

    let err = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap_err();
    assert_eq!(err.resolution_state(), ResolutionState::ConstraintViolation);
    assert!(matches!(
        err,
        FederationError::Constraint(ConstraintViolation::NamingConstraintPermitted { ref entity })
            if entity == &id(RP)
    ));
}

#[test]
fn excluded_naming_constraint_wins_over_permitted() {
    let mut fed = federation_with_policies(None, None);
    let statement = fed.subordinate(TA, IA).constraints(
        TrustChainConstraints::unconstrained()
            .with_permitted(vec![id("https://cs.example.com")])
            .with_excluded(vec![id("https://cs.example.com/rp1")]),
    );
    fed.publish(TA, IA, statement);

    let err = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap_err();
    assert!(matches!(
        err,
        FederationError::Constraint(ConstraintViolation::NamingConstraintExcluded { .. })
    ));
}

#[test]
fn statement_signed_with_wrong_key_rejected() {
    let mut fed = federation_with_policies(None, None);
    let forged = fed
        .subordinate(IA, RP)
        .sign(&FederationKey::generate())
        .unwrap();
    fed.fetcher.insert(&id(IA), &id(RP), forged);
    fed.published.clear();

    let err = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap_err();
    assert_eq!(err.resolution_state(), ResolutionState::SignatureInvalid);
}

#[test]
fn anchor_configuration_must_match_configured_keys() {
    let fed = federation_with_policies(None, None);
    let other_keys = FederationKey::generate().public_jwks();
    let err = fed
        .resolver()
        .resolve(
            &fed.leaf(&[IA], rp_metadata()),
            &id(TA),
            &other_keys,
            &ResolveOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, FederationError::SignatureInvalid(_)));
}

#[test]
fn not_yet_valid_statement_rejected() {
    let mut fed = federation_with_policies(None, None);
    let early = fed.subordinate(TA, IA).validity(NOW + 600, NOW + 3600);
    fed.publish(TA, IA, early);

    let err = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap_err();
    assert!(matches!(err, FederationError::NotYetValid { .. }));
    assert_eq!(err.resolution_state(), ResolutionState::Expired);
}

#[test]
fn missing_critical_claim_rejected() {
    let mut fed = federation_with_policies(None, None);
    let statement = fed.subordinate(IA, RP).critical("jti");
    fed.publish(IA, RP, statement);

    let err = fed.resolve(&fed.leaf(&[IA], rp_metadata())).unwrap_err();
    assert!(matches!(err, FederationError::Parse(ref msg) if msg.contains("jti")));
}

#[test]
fn leaf_without_hints_has_no_path() {
    let fed = federation_with_policies(None, None);
    let err = fed.resolve(&fed.leaf(&[], rp_metadata())).unwrap_err();
    assert!(matches!(err, FederationError::NoTrustPath { .. }));
    assert_eq!(err.resolution_state(), ResolutionState::NoPath);
}
