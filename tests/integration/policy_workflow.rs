//! Metadata policy tests: parsing, merging and applying through the public
//! API.

use serde_json::{json, Map, Value};

use oidc_federation::policy::{OperationKind, ValueList};
use oidc_federation::{
    apply_policy, merge_policies, EntityId, EntityStatementBuilder, EntityType, FederationError,
    FederationKey, MetadataPolicy, MetadataPolicyEngine, PolicyOperation, PolicyViolationKind,
};

fn policy(value: Value) -> MetadataPolicy {
    MetadataPolicy::parse(&value).unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(obj) => obj,
        other => panic!("expected object, got {other}"),
    }
}

fn violation_kind(result: oidc_federation::Result<impl std::fmt::Debug>) -> PolicyViolationKind {
    match result {
        Err(FederationError::Policy(v)) => v.kind,
        other => panic!("expected a policy violation, got {other:?}"),
    }
}

// ── The reference scenario ────────────────────────────────────────────────────

fn example_policy() -> Value {
    json!({
        "contacts": {"add": ["helpdesk@example.com"]},
        "logo_uri": {
            "one_of": ["https://example.com/logo_small.jpg", "https://example.com/logo_big.jpg"],
            "default": "https://example.com/logo_small.jpg"
        },
        "policy_uri": {"value": "https://example.com/policy.html"},
        "tos_uri": {"value": "https://example.com/tos.html"}
    })
}

fn example_metadata() -> Value {
    json!({
        "contacts": ["rp_admins@cs.example.com"],
        "redirect_uris": ["https://cs.example.com/rp1"],
        "response_types": ["code"]
    })
}

#[test]
fn example_policy_applied() {
    let applied = policy(example_policy())
        .apply(&object(example_metadata()))
        .unwrap();

    assert_eq!(
        Value::Object(applied),
        json!({
            "contacts": ["rp_admins@cs.example.com", "helpdesk@example.com"],
            "logo_uri": "https://example.com/logo_small.jpg",
            "policy_uri": "https://example.com/policy.html",
            "tos_uri": "https://example.com/tos.html",
            "redirect_uris": ["https://cs.example.com/rp1"],
            "response_types": ["code"]
        })
    );
}

#[test]
fn example_policy_round_trips() {
    let parsed = policy(example_policy());
    assert_eq!(parsed.to_json(), example_policy());
    assert_eq!(MetadataPolicy::parse_str(&parsed.to_json_string()).unwrap(), parsed);
}

#[test]
fn existing_parameters_keep_their_position() {
    let applied = policy(example_policy())
        .apply(&object(example_metadata()))
        .unwrap();
    let keys: Vec<&str> = applied.keys().map(String::as_str).collect();
    assert_eq!(&keys[..3], &["contacts", "redirect_uris", "response_types"]);
}

// ── Round trips ───────────────────────────────────────────────────────────────

#[test]
fn scalar_and_unknown_configs_round_trip() {
    let raw = json!({
        "contacts": {"add": "helpdesk@example.org", "essential": true},
        "grant_types": {"subset_of": ["authorization_code", "refresh_token"]},
        "client_name": {"regexp": "^Example", "essential": false},
        "jwks_uri": {"value": null}
    });
    let parsed = policy(raw.clone());
    assert_eq!(parsed.to_json(), raw);

    let contacts = parsed.get("contacts").unwrap();
    assert!(contacts.contains(&PolicyOperation::Add(ValueList::scalar(json!(
        "helpdesk@example.org"
    )))));
    let client_name = parsed.get_entry("client_name").unwrap();
    assert_eq!(
        client_name.operation(OperationKind::Unknown).map(|op| op.name()),
        Some("regexp")
    );
}

#[test]
fn malformed_configs_rejected() {
    for bad in [
        json!({"contacts": {"add": {"x": 1}}}),
        json!({"contacts": {"essential": "yes"}}),
        json!({"contacts": ["add"]}),
    ] {
        assert!(MetadataPolicy::parse(&bad).is_err(), "accepted {bad}");
    }
    assert!(matches!(
        MetadataPolicy::parse(&json!(["contacts"])),
        Err(FederationError::Parse(_))
    ));
}

// ── Merge laws ────────────────────────────────────────────────────────────────

#[test]
fn one_of_lists_intersect() {
    let merged = merge_policies(&[
        policy(json!({"alg": {"one_of": ["ES256", "RS256", "EdDSA"]}})),
        policy(json!({"alg": {"one_of": ["EdDSA", "ES256", "PS256"]}})),
    ])
    .unwrap();
    assert_eq!(merged.to_json(), json!({"alg": {"one_of": ["ES256", "EdDSA"]}}));
}

#[test]
fn disjoint_one_of_lists_fail() {
    let result = merge_policies(&[
        policy(json!({"alg": {"one_of": ["ES256"]}})),
        policy(json!({"alg": {"one_of": ["RS256"]}})),
    ]);
    assert_eq!(violation_kind(result), PolicyViolationKind::EmptyIntersection);
}

#[test]
fn add_lists_union_without_duplicates() {
    let merged = merge_policies(&[
        policy(json!({"contacts": {"add": ["a@example.com", "b@example.com"]}})),
        policy(json!({"contacts": {"add": ["b@example.com", "c@example.com"]}})),
    ])
    .unwrap();
    assert_eq!(
        merged.to_json(),
        json!({"contacts": {"add": ["a@example.com", "b@example.com", "c@example.com"]}})
    );
}

#[test]
fn superset_outside_subset_fails() {
    let result = merge_policies(&[
        policy(json!({"scope": {"subset_of": ["openid", "email"]}})),
        policy(json!({"scope": {"superset_of": ["openid", "address"]}})),
    ]);
    assert_eq!(violation_kind(result), PolicyViolationKind::UnsatisfiableSuperset);
}

#[test]
fn subordinate_default_must_satisfy_superior_one_of() {
    let result = merge_policies(&[
        policy(json!({"logo_uri": {"one_of": ["https://a.example/l.png"]}})),
        policy(json!({"logo_uri": {"default": "https://b.example/l.png"}})),
    ]);
    assert_eq!(violation_kind(result), PolicyViolationKind::InconsistentDefault);
}

#[test]
fn fixed_value_must_satisfy_subset_of() {
    let result = merge_policies(&[
        policy(json!({"grant_types": {"subset_of": ["authorization_code"]}})),
        policy(json!({"grant_types": {"value": ["authorization_code", "implicit"]}})),
    ]);
    assert_eq!(violation_kind(result), PolicyViolationKind::ConflictingValue);
}

#[test]
fn essential_combines_with_or() {
    let merged = merge_policies(&[
        policy(json!({"jwks_uri": {"essential": true}})),
        policy(json!({"jwks_uri": {"essential": false}})),
    ])
    .unwrap();
    assert_eq!(merged.to_json(), json!({"jwks_uri": {"essential": true}}));
}

#[test]
fn merge_is_anchor_first_for_default() {
    let merged = merge_policies(&[
        policy(json!({"response_types": {"default": ["code"]}})),
        policy(json!({"response_types": {"default": ["code", "id_token"]}})),
    ])
    .unwrap();
    let applied = apply_policy(&merged, &Map::new()).unwrap();
    assert_eq!(applied["response_types"], json!(["code", "id_token"]));
}

// ── Engine over statements ────────────────────────────────────────────────────

#[test]
fn engine_merges_only_requested_entity_type() {
    let key = FederationKey::generate();
    let ta = EntityId::parse("https://ta.example").unwrap();
    let ia = EntityId::parse("https://ia.example").unwrap();
    let statement = EntityStatementBuilder::new(ta, ia, key.public_jwks())
        .validity(1000, 2000)
        .metadata_policy(
            EntityType::openid_relying_party(),
            policy(json!({"contacts": {"add": ["rp@example.com"]}})),
        )
        .metadata_policy(
            EntityType::openid_provider(),
            policy(json!({"contacts": {"add": ["op@example.com"]}})),
        )
        .build()
        .unwrap();

    let rp = MetadataPolicyEngine::new(EntityType::openid_relying_party())
        .merge(std::slice::from_ref(&statement))
        .unwrap();
    assert_eq!(rp.to_json(), json!({"contacts": {"add": ["rp@example.com"]}}));

    let client = MetadataPolicyEngine::new(EntityType::oauth_client())
        .merge(&[statement])
        .unwrap();
    assert!(client.is_empty());
}

// ── Apply edge cases ──────────────────────────────────────────────────────────

#[test]
fn apply_check_failures() {
    let subset = policy(json!({"grant_types": {"subset_of": ["authorization_code"]}}));
    let metadata = object(json!({"grant_types": ["authorization_code", "implicit"]}));
    assert_eq!(
        violation_kind(subset.apply(&metadata)),
        PolicyViolationKind::ValueNotAllowed
    );

    let superset = policy(json!({"scope": {"superset_of": ["openid"]}}));
    let metadata = object(json!({"scope": ["email"]}));
    assert_eq!(
        violation_kind(superset.apply(&metadata)),
        PolicyViolationKind::MissingRequiredValues
    );

    let add = policy(json!({"client_name": {"add": ["x"]}}));
    let metadata = object(json!({"client_name": "RP"}));
    assert_eq!(
        violation_kind(add.apply(&metadata)),
        PolicyViolationKind::InvalidParameterType
    );
}

#[test]
fn value_null_removes_parameter() {
    let p = policy(json!({"jwks": {"value": null}}));
    let applied = p
        .apply(&object(json!({"jwks": {"keys": []}, "client_name": "RP"})))
        .unwrap();
    assert_eq!(Value::Object(applied), json!({"client_name": "RP"}));
}

#[test]
fn policy_editing() {
    let mut p = MetadataPolicy::new();
    p.put("contacts", PolicyOperation::Add(ValueList::strings(["a@example.com"])));
    p.put("contacts", PolicyOperation::Add(ValueList::strings(["b@example.com"])));
    p.put("contacts", PolicyOperation::Essential(true));
    assert_eq!(
        p.to_json(),
        json!({"contacts": {"add": ["b@example.com"], "essential": true}})
    );

    let removed = p.remove("contacts").unwrap();
    assert_eq!(removed.len(), 2);
    assert!(p.is_empty());
}
