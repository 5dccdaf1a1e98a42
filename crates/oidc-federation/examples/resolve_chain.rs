//! Resolve Chain: build a small federation in memory and resolve a leaf's
//! trust chain to its anchor.
//!
//! Run with:
//!   cargo run --example resolve_chain -p oidc-federation

use oidc_federation::{
    EntityId, EntityStatementBuilder, EntityType, FederationKey, MemoryFetcher, MetadataPolicy,
    ResolveOptions, TrustChainResolver,
};
use serde_json::json;

fn main() {
    let ta_id = EntityId::parse("https://ta.example.org").expect("valid entity id");
    let ia_id = EntityId::parse("https://ia.example.org").expect("valid entity id");
    let rp_id = EntityId::parse("https://cs.example.com/rp1").expect("valid entity id");

    let ta_key = FederationKey::generate();
    let ia_key = FederationKey::generate();
    let rp_key = FederationKey::generate();

    let now = chrono::Utc::now().timestamp();
    let exp = now + 3600;
    let fetcher = MemoryFetcher::new();

    // ── 1. Publish the anchor and intermediate configurations ──────────────
    let org = |name: &str| {
        json!({"organization_name": name})
            .as_object()
            .cloned()
            .unwrap_or_default()
    };
    fetcher.insert_configuration(
        &ta_id,
        EntityStatementBuilder::configuration(ta_id.clone(), ta_key.public_jwks())
            .validity(now, exp)
            .metadata(EntityType::federation_entity(), org("Trust Anchor"))
            .sign(&ta_key)
            .expect("anchor configuration signs"),
    );
    fetcher.insert_configuration(
        &ia_id,
        EntityStatementBuilder::configuration(ia_id.clone(), ia_key.public_jwks())
            .validity(now, exp)
            .metadata(EntityType::federation_entity(), org("Intermediate"))
            .authority_hint(ta_id.clone())
            .sign(&ia_key)
            .expect("intermediate configuration signs"),
    );

    // ── 2. Superiors vouch for their subordinates ──────────────────────────
    //
    // The anchor pins the policy URIs; the intermediate adds a helpdesk
    // contact and narrows the logo choice.
    let anchor_policy = MetadataPolicy::parse(&json!({
        "policy_uri": {"value": "https://example.com/policy.html"},
        "tos_uri": {"value": "https://example.com/tos.html"}
    }))
    .expect("anchor policy parses");
    let intermediate_policy = MetadataPolicy::parse(&json!({
        "contacts": {"add": ["helpdesk@example.com"]},
        "logo_uri": {
            "one_of": ["https://example.com/logo_small.jpg", "https://example.com/logo_big.jpg"],
            "default": "https://example.com/logo_small.jpg"
        }
    }))
    .expect("intermediate policy parses");

    fetcher.insert(
        &ta_id,
        &ia_id,
        EntityStatementBuilder::new(ta_id.clone(), ia_id.clone(), ia_key.public_jwks())
            .validity(now, exp)
            .metadata_policy(EntityType::openid_relying_party(), anchor_policy)
            .sign(&ta_key)
            .expect("anchor statement signs"),
    );
    fetcher.insert(
        &ia_id,
        &rp_id,
        EntityStatementBuilder::new(ia_id.clone(), rp_id.clone(), rp_key.public_jwks())
            .validity(now, exp)
            .metadata_policy(EntityType::openid_relying_party(), intermediate_policy)
            .sign(&ia_key)
            .expect("intermediate statement signs"),
    );

    // ── 3. The relying party publishes its own configuration ───────────────
    let rp_metadata = json!({
        "contacts": ["rp_admins@cs.example.com"],
        "redirect_uris": ["https://cs.example.com/rp1"],
        "response_types": ["code"]
    });
    fetcher.insert_configuration(
        &rp_id,
        EntityStatementBuilder::configuration(rp_id.clone(), rp_key.public_jwks())
            .validity(now, exp)
            .metadata(
                EntityType::openid_relying_party(),
                rp_metadata.as_object().cloned().unwrap_or_default(),
            )
            .authority_hint(ia_id.clone())
            .sign(&rp_key)
            .expect("leaf configuration signs"),
    );

    // ── 4. Resolve ─────────────────────────────────────────────────────────
    let resolver = TrustChainResolver::new(&fetcher);
    let chain = resolver
        .resolve_entity(
            &rp_id,
            &ta_id,
            &ta_key.public_jwks(),
            &ResolveOptions::default(),
        )
        .expect("trust chain resolves");

    println!("Trust chain resolved");
    let path: Vec<String> = chain.entity_path().iter().map(|e| e.to_string()).collect();
    println!("  Path:        {}", path.join(" -> "));
    println!("  Statements:  {}", chain.len());
    println!("  Expires at:  {}", chain.expires_at());
    println!();
    println!("Effective policy:");
    println!("{}", chain.effective_policy().to_json_string());
    println!();
    println!("Resolved metadata:");
    println!(
        "{}",
        serde_json::to_string_pretty(chain.metadata()).expect("metadata serializes")
    );

    // ── 5. A stranger's anchor keys do not verify the chain ────────────────
    let stranger = FederationKey::generate();
    match resolver.resolve_entity(
        &rp_id,
        &ta_id,
        &stranger.public_jwks(),
        &ResolveOptions::default(),
    ) {
        Ok(_) => println!("unexpected: chain resolved under the wrong anchor keys"),
        Err(e) => println!("\nWrong anchor keys rejected: {e}"),
    }
}
