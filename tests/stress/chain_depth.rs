//! Stress tests for long trust chains: hop limits and path length
//! constraints at depth.

use std::collections::HashMap;

use serde_json::json;

use oidc_federation::{
    ConstraintViolation, EntityId, EntityStatement, EntityStatementBuilder, EntityType,
    FederationError, FederationKey, FixedClock, MemoryFetcher, ResolveOptions, TrustChain,
    TrustChainConstraints, TrustChainResolver,
};

const NOW: i64 = 1_700_000_000;
const TA: &str = "https://ta.example";
const RP: &str = "https://rp.example";

fn id(s: &str) -> EntityId {
    EntityId::parse(s).unwrap()
}

fn intermediate(k: usize) -> String {
    format!("https://ia{k}.example")
}

/// TA <- ia{n} <- ... <- ia1 <- RP.
struct LinearFederation {
    depth: usize,
    fetcher: MemoryFetcher,
    keys: HashMap<String, FederationKey>,
}

impl LinearFederation {
    fn new(depth: usize) -> Self {
        let mut entities = vec![TA.to_string(), RP.to_string()];
        entities.extend((1..=depth).map(intermediate));
        let fed = Self {
            depth,
            fetcher: MemoryFetcher::new(),
            keys: entities
                .into_iter()
                .map(|e| (e, FederationKey::generate()))
                .collect(),
        };

        fed.publish_configuration(TA, None);
        for k in 1..=depth {
            let superior = fed.superior_of(&intermediate(k));
            fed.publish_configuration(&intermediate(k), Some(&superior));
        }
        for k in 1..=depth {
            let subject = intermediate(k);
            fed.vouch(&fed.superior_of(&subject), &subject, None);
        }
        fed.vouch(&fed.superior_of(RP), RP, None);
        fed
    }

    fn superior_of(&self, entity: &str) -> String {
        if entity == RP {
            return if self.depth == 0 {
                TA.to_string()
            } else {
                intermediate(1)
            };
        }
        let k: usize = entity
            .trim_start_matches("https://ia")
            .trim_end_matches(".example")
            .parse()
            .unwrap();
        if k == self.depth {
            TA.to_string()
        } else {
            intermediate(k + 1)
        }
    }

    fn publish_configuration(&self, entity: &str, superior: Option<&str>) {
        let key = &self.keys[entity];
        let mut builder = EntityStatementBuilder::configuration(id(entity), key.public_jwks())
            .validity(NOW - 60, NOW + 3600)
            .metadata(
                EntityType::federation_entity(),
                json!({"organization_name": entity}).as_object().unwrap().clone(),
            );
        if let Some(superior) = superior {
            builder = builder.authority_hint(id(superior));
        }
        self.fetcher
            .insert_configuration(&id(entity), builder.sign(key).unwrap());
    }

    fn vouch(&self, issuer: &str, subject: &str, constraints: Option<TrustChainConstraints>) {
        let mut builder = EntityStatementBuilder::new(
            id(issuer),
            id(subject),
            self.keys[subject].public_jwks(),
        )
        .validity(NOW - 60, NOW + 3600);
        if let Some(constraints) = constraints {
            builder = builder.constraints(constraints);
        }
        self.fetcher
            .insert(&id(issuer), &id(subject), builder.sign(&self.keys[issuer]).unwrap());
    }

    fn leaf(&self) -> EntityStatement {
        EntityStatementBuilder::configuration(id(RP), self.keys[RP].public_jwks())
            .validity(NOW - 60, NOW + 3600)
            .metadata(
                EntityType::openid_relying_party(),
                json!({"client_name": "deep RP"}).as_object().unwrap().clone(),
            )
            .authority_hint(id(&self.superior_of(RP)))
            .build()
            .unwrap()
    }

    fn resolve(&self, options: &ResolveOptions) -> oidc_federation::Result<TrustChain> {
        TrustChainResolver::new(&self.fetcher)
            .with_clock(FixedClock(NOW))
            .resolve(&self.leaf(), &id(TA), &self.keys[TA].public_jwks(), options)
    }
}

#[test]
fn stress_deep_chain_resolves() {
    let depth = 8;
    let fed = LinearFederation::new(depth);
    let chain = fed.resolve(&ResolveOptions::default()).unwrap();

    // anchor configuration, depth + 1 subordinate statements, leaf configuration
    assert_eq!(chain.len(), depth + 3);
    let path = chain.entity_path();
    assert_eq!(path.len(), depth + 2);
    assert_eq!(path[0], &id(TA));
    assert_eq!(path[1], &id(&intermediate(depth)));
    assert_eq!(path[depth + 1], &id(RP));
}

#[test]
fn stress_hop_limit_boundary() {
    let depth = 8;
    let fed = LinearFederation::new(depth);

    let exact = ResolveOptions::default().with_max_hops(depth + 2);
    assert!(fed.resolve(&exact).is_ok());

    let short = ResolveOptions::default().with_max_hops(depth + 1);
    let err = fed.resolve(&short).unwrap_err();
    assert!(matches!(err, FederationError::HopLimitExceeded(n) if n == depth + 1));
}

#[test]
fn stress_default_hop_limit_stops_long_chain() {
    let fed = LinearFederation::new(12);
    let err = fed.resolve(&ResolveOptions::default()).unwrap_err();
    assert!(matches!(err, FederationError::HopLimitExceeded(10)));
    assert!(fed
        .resolve(&ResolveOptions::default().with_max_hops(20))
        .is_ok());
}

#[test]
fn stress_path_length_exactly_at_limit() {
    let depth = 6;
    let fed = LinearFederation::new(depth);
    let limit = TrustChainConstraints::unconstrained().with_max_path_length(depth as u32);
    fed.vouch(&intermediate(1), RP, Some(limit));

    assert!(fed.resolve(&ResolveOptions::default()).is_ok());
}

#[test]
fn stress_path_length_one_short() {
    let depth = 6;
    let fed = LinearFederation::new(depth);
    let max = depth as u32 - 1;
    let limit = TrustChainConstraints::unconstrained().with_max_path_length(max);
    fed.vouch(&intermediate(1), RP, Some(limit));

    let err = fed.resolve(&ResolveOptions::default()).unwrap_err();
    match err {
        FederationError::Constraint(ConstraintViolation::MaxPathLengthExceeded { entity, max: m }) => {
            assert_eq!(entity, id(&intermediate(depth)));
            assert_eq!(m, max);
        }
        other => panic!("expected path length violation, got {other:?}"),
    }
}

#[test]
fn stress_tightest_path_length_wins() {
    let depth = 6;
    let fed = LinearFederation::new(depth);
    // Loose near the leaf, tight further up: ia2 has depth - 2 entities
    // above it, one more than allowed.
    fed.vouch(
        &intermediate(1),
        RP,
        Some(TrustChainConstraints::unconstrained().with_max_path_length(100)),
    );
    let tight = depth as u32 - 3;
    fed.vouch(
        &intermediate(3),
        &intermediate(2),
        Some(TrustChainConstraints::unconstrained().with_max_path_length(tight)),
    );

    let err = fed.resolve(&ResolveOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        FederationError::Constraint(ConstraintViolation::MaxPathLengthExceeded { max, .. })
            if max == tight
    ));
}

#[test]
fn stress_naming_constraint_at_anchor_covers_whole_chain() {
    let depth = 5;
    let fed = LinearFederation::new(depth);
    let excluded = TrustChainConstraints::unconstrained().with_excluded(vec![id(&intermediate(2))]);
    fed.vouch(TA, &intermediate(depth), Some(excluded));

    let err = fed.resolve(&ResolveOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        FederationError::Constraint(ConstraintViolation::NamingConstraintExcluded { entity, .. })
            if entity == id(&intermediate(2))
    ));
}

#[test]
fn stress_chain_expiry_is_earliest_statement() {
    let depth = 4;
    let fed = LinearFederation::new(depth);
    let short_lived = EntityStatementBuilder::new(
        id(&intermediate(3)),
        id(&intermediate(2)),
        fed.keys[&intermediate(2)].public_jwks(),
    )
    .validity(NOW - 60, NOW + 120)
    .sign(&fed.keys[&intermediate(3)])
    .unwrap();
    fed.fetcher
        .insert(&id(&intermediate(3)), &id(&intermediate(2)), short_lived);

    let chain = fed.resolve(&ResolveOptions::default()).unwrap();
    assert_eq!(chain.expires_at(), NOW + 120);
    assert_eq!(chain.to_json()["expires_at"], json!(NOW + 120));
}
