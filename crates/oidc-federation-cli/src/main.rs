//! oidc-federation CLI: `fedtrust` command.
//!
//! Generates federation signing keys, signs entity statements into a local
//! statement store, resolves trust chains from that store, and merges or
//! applies metadata policies.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use oidc_federation::builder::DEFAULT_LIFETIME_SECS;
use oidc_federation::crypto::sign_claims;
use oidc_federation::resolve::DEFAULT_MAX_HOPS;
use oidc_federation::{
    merge_policies, Clock, EntityId, EntityStatement, EntityType, FederationKey, JwkSet,
    MetadataPolicy, ResolveOptions, StatementStore, SystemClock, TrustChainResolver,
};

// ── Directory helpers ─────────────────────────────────────────────────────────

fn default_store_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME not set; pass --store or FEDTRUST_STORE")?;
    Ok(PathBuf::from(home).join(".fedtrust"))
}

fn open_store(dir: Option<&Path>) -> Result<StatementStore> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => default_store_dir()?,
    };
    StatementStore::new(&dir)
        .with_context(|| format!("failed to open statement store at {}", dir.display()))
}

// ── File helpers ──────────────────────────────────────────────────────────────

fn read_json(path: &Path) -> Result<Value> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn read_object(path: &Path) -> Result<Map<String, Value>> {
    match read_json(path)? {
        Value::Object(obj) => Ok(obj),
        _ => Err(anyhow!("{} must contain a JSON object", path.display())),
    }
}

fn read_key(path: &Path) -> Result<FederationKey> {
    let encoded = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    FederationKey::from_base64url(&encoded)
        .with_context(|| format!("{} does not hold a signing key", path.display()))
}

fn read_jwks(path: &Path) -> Result<JwkSet> {
    JwkSet::parse(&read_json(path)?)
        .with_context(|| format!("{} does not hold a JWK Set", path.display()))
}

fn write_secret(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions of {}", path.display()))?;
    }
    Ok(())
}

fn to_pretty(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize JSON")
}

// ── Time formatting helpers ───────────────────────────────────────────────────

fn secs_to_datetime(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .unwrap_or(chrono::DateTime::UNIX_EPOCH)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// fedtrust: OpenID Connect Federation trust chains from the command line.
#[derive(Parser, Debug)]
#[command(
    name = "fedtrust",
    about = "OpenID Connect Federation trust chain tool",
    version,
    long_about = "fedtrust: OpenID Connect Federation trust chain tool\n\nSign entity statements, keep them in a local statement store,\nresolve trust chains and evaluate metadata policies."
)]
struct Cli {
    /// Statement store directory (default: ~/.fedtrust)
    #[arg(long, global = true, env = "FEDTRUST_STORE")]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 federation signing key
    Keygen {
        /// File to write the base64url signing key to
        #[arg(long)]
        out: PathBuf,

        /// Also write the public JWK Set to this file
        #[arg(long)]
        jwks_out: Option<PathBuf>,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Print the public JWK Set of a signing key
    Jwks {
        /// Signing key file
        #[arg(long)]
        key: PathBuf,
    },

    /// Sign entity statement claims and add the statement to the store
    Sign {
        /// The issuer's signing key file
        #[arg(long)]
        key: PathBuf,

        /// JSON file with the statement claims; iat and exp default to now
        /// and one day later
        #[arg(long)]
        claims: PathBuf,

        /// Print the signed statement instead of storing it
        #[arg(long)]
        no_store: bool,
    },

    /// Manage the statement store
    Store {
        #[command(subcommand)]
        subcommand: StoreCommands,
    },

    /// Resolve a trust chain for a leaf entity from the store
    Resolve {
        /// Leaf entity identifier
        #[arg(long)]
        leaf: String,

        /// Trust anchor entity identifier
        #[arg(long)]
        anchor: String,

        /// JSON file with the trust anchor's public JWK Set
        #[arg(long)]
        anchor_jwks: PathBuf,

        /// Metadata type to resolve
        #[arg(long, default_value = "openid_relying_party")]
        entity_type: String,

        /// Maximum statements on a path, the leaf configuration included
        #[arg(long, default_value_t = DEFAULT_MAX_HOPS)]
        max_hops: usize,

        /// Evaluate validity at this Unix time instead of now
        #[arg(long)]
        at: Option<i64>,

        /// Print the chain as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge or apply metadata policies
    Policy {
        #[command(subcommand)]
        subcommand: PolicyCommands,
    },
}

#[derive(Subcommand, Debug)]
enum StoreCommands {
    /// Add a signed statement from a file
    Add {
        /// File holding a compact JWS
        file: PathBuf,
    },

    /// List stored statements
    List,

    /// Print a stored statement's claims
    Show {
        #[arg(long)]
        issuer: String,

        #[arg(long)]
        subject: String,
    },

    /// Remove a stored statement
    Remove {
        #[arg(long)]
        issuer: String,

        #[arg(long)]
        subject: String,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyCommands {
    /// Merge policy files, superior first, into one effective policy
    Merge {
        /// Metadata policy JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Apply a policy to a metadata object
    Apply {
        /// Metadata policy JSON file
        #[arg(long)]
        policy: PathBuf,

        /// Metadata JSON file
        #[arg(long)]
        metadata: PathBuf,
    },
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let verbose = cli.verbose;
    let store_dir = cli.store.as_deref();

    let result = match cli.command {
        Commands::Keygen {
            out,
            jwks_out,
            force,
        } => cmd_keygen(&out, jwks_out.as_deref(), force, verbose),
        Commands::Jwks { key } => cmd_jwks(&key),
        Commands::Sign {
            key,
            claims,
            no_store,
        } => cmd_sign(store_dir, &key, &claims, no_store, verbose),
        Commands::Store { subcommand } => match subcommand {
            StoreCommands::Add { file } => cmd_store_add(store_dir, &file),
            StoreCommands::List => cmd_store_list(store_dir, verbose),
            StoreCommands::Show { issuer, subject } => cmd_store_show(store_dir, &issuer, &subject),
            StoreCommands::Remove { issuer, subject } => {
                cmd_store_remove(store_dir, &issuer, &subject)
            }
        },
        Commands::Resolve {
            leaf,
            anchor,
            anchor_jwks,
            entity_type,
            max_hops,
            at,
            json,
        } => {
            let mut options = ResolveOptions::new()
                .with_max_hops(max_hops)
                .with_entity_type(EntityType::new(entity_type));
            if let Some(at) = at {
                options = options.at_time(at);
            }
            cmd_resolve(store_dir, &leaf, &anchor, &anchor_jwks, &options, json)
        }
        Commands::Policy { subcommand } => match subcommand {
            PolicyCommands::Merge { files } => cmd_policy_merge(&files),
            PolicyCommands::Apply { policy, metadata } => cmd_policy_apply(&policy, &metadata),
        },
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `fedtrust keygen --out FILE [--jwks-out FILE] [--force]`
fn cmd_keygen(out: &Path, jwks_out: Option<&Path>, force: bool, verbose: bool) -> Result<()> {
    if out.exists() && !force {
        return Err(anyhow!(
            "key file {} already exists (use --force to overwrite)",
            out.display()
        ));
    }

    let key = FederationKey::generate();
    write_secret(out, &key.to_base64url())?;

    println!("Generated federation key");
    println!("  Key ID: {}", key.kid());
    println!("  File:   {}", out.display());

    if let Some(path) = jwks_out {
        std::fs::write(path, to_pretty(&key.public_jwks().to_json())?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("  JWKS:   {}", path.display());
    }
    if verbose {
        println!("  Public: {}", key.public_jwk().x.unwrap_or_default());
    }
    Ok(())
}

/// `fedtrust jwks --key FILE`
fn cmd_jwks(key: &Path) -> Result<()> {
    let key = read_key(key)?;
    println!("{}", to_pretty(&key.public_jwks().to_json())?);
    Ok(())
}

/// `fedtrust sign --key FILE --claims FILE [--no-store]`
fn cmd_sign(
    store_dir: Option<&Path>,
    key: &Path,
    claims: &Path,
    no_store: bool,
    verbose: bool,
) -> Result<()> {
    let key = read_key(key)?;
    let mut claims = read_object(claims)?;

    let now = SystemClock.now();
    let iat = claims.get("iat").and_then(Value::as_i64).unwrap_or(now);
    claims.entry("iat").or_insert(Value::from(iat));
    claims
        .entry("exp")
        .or_insert(Value::from(iat + DEFAULT_LIFETIME_SECS));

    let statement =
        EntityStatement::from_claims(&Value::Object(claims)).context("invalid statement claims")?;
    statement
        .validate_required_claims()
        .context("invalid statement claims")?;
    if statement.is_self_issued() && statement.keys.find_key(key.kid()).is_none() {
        return Err(anyhow!(
            "entity configuration of {} does not publish the signing key {}",
            statement.subject,
            key.kid()
        ));
    }

    let jws = sign_claims(&statement.to_claims(), &key).context("failed to sign statement")?;

    if no_store {
        println!("{jws}");
        return Ok(());
    }

    let store = open_store(store_dir)?;
    store
        .save_for(&statement.issuer, &statement.subject, &jws)
        .context("failed to store statement")?;

    println!("Signed statement");
    println!("  Issuer:  {}", statement.issuer);
    println!("  Subject: {}", statement.subject);
    println!("  Expires: {}", secs_to_datetime(statement.expires_at));
    if verbose {
        println!("  Key ID:  {}", key.kid());
        println!("  Store:   {}", store.base_dir().display());
    }
    Ok(())
}

/// `fedtrust store add FILE`
fn cmd_store_add(store_dir: Option<&Path>, file: &Path) -> Result<()> {
    let jws = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let store = open_store(store_dir)?;
    let (issuer, subject) = store.save(&jws).context("failed to store statement")?;
    println!("Stored statement by {issuer} about {subject}");
    Ok(())
}

/// `fedtrust store list`
fn cmd_store_list(store_dir: Option<&Path>, verbose: bool) -> Result<()> {
    let store = open_store(store_dir)?;
    let pairs = store.list().context("failed to list statements")?;
    if pairs.is_empty() {
        println!("No statements stored.");
        return Ok(());
    }

    println!("Statements ({}):", pairs.len());
    for (issuer, subject) in &pairs {
        if issuer == subject {
            println!("  {issuer} (configuration)");
        } else {
            println!("  {issuer} -> {subject}");
        }
    }
    if verbose {
        println!("Store: {}", store.base_dir().display());
    }
    Ok(())
}

/// `fedtrust store show --issuer ID --subject ID`
fn cmd_store_show(store_dir: Option<&Path>, issuer: &str, subject: &str) -> Result<()> {
    let issuer = EntityId::parse(issuer)?;
    let subject = EntityId::parse(subject)?;
    let store = open_store(store_dir)?;
    let jws = store
        .load(&issuer, &subject)?
        .ok_or_else(|| anyhow!("no statement by {issuer} about {subject}"))?;
    let claims = oidc_federation::CompactJws::parse(&jws)?.unverified_claims()?;
    println!("{}", to_pretty(&claims)?);
    Ok(())
}

/// `fedtrust store remove --issuer ID --subject ID`
fn cmd_store_remove(store_dir: Option<&Path>, issuer: &str, subject: &str) -> Result<()> {
    let issuer = EntityId::parse(issuer)?;
    let subject = EntityId::parse(subject)?;
    let store = open_store(store_dir)?;
    if !store.remove(&issuer, &subject)? {
        return Err(anyhow!("no statement by {issuer} about {subject}"));
    }
    println!("Removed statement by {issuer} about {subject}");
    Ok(())
}

/// `fedtrust resolve --leaf ID --anchor ID --anchor-jwks FILE`
fn cmd_resolve(
    store_dir: Option<&Path>,
    leaf: &str,
    anchor: &str,
    anchor_jwks: &Path,
    options: &ResolveOptions,
    json: bool,
) -> Result<()> {
    let leaf = EntityId::parse(leaf)?;
    let anchor = EntityId::parse(anchor)?;
    let anchor_keys = read_jwks(anchor_jwks)?;
    let store = open_store(store_dir)?;
    log::debug!(
        "resolving {leaf} against {anchor} from {}",
        store.base_dir().display()
    );

    let chain = TrustChainResolver::new(store)
        .resolve_entity(&leaf, &anchor, &anchor_keys, options)
        .with_context(|| format!("failed to resolve a trust chain for {leaf}"))?;

    if json {
        println!("{}", to_pretty(&chain.to_json())?);
        return Ok(());
    }

    println!("Trust chain resolved");
    println!("  Leaf:        {}", chain.leaf_id());
    println!("  Anchor:      {}", chain.trust_anchor_id());
    println!("  Statements:  {}", chain.len());
    println!("  Expires:     {}", secs_to_datetime(chain.expires_at()));
    println!("  Path:");
    for entity in chain.entity_path() {
        println!("    - {entity}");
    }
    println!("  Metadata ({}):", chain.entity_type());
    println!("{}", to_pretty(&Value::Object(chain.metadata().clone()))?);
    Ok(())
}

/// `fedtrust policy merge FILE...`
fn cmd_policy_merge(files: &[PathBuf]) -> Result<()> {
    let policies = files
        .iter()
        .map(|path| {
            MetadataPolicy::parse(&read_json(path)?)
                .with_context(|| format!("{} is not a metadata policy", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let merged = merge_policies(&policies).context("policies do not merge")?;
    println!("{}", to_pretty(&merged.to_json())?);
    Ok(())
}

/// `fedtrust policy apply --policy FILE --metadata FILE`
fn cmd_policy_apply(policy: &Path, metadata: &Path) -> Result<()> {
    let policy = MetadataPolicy::parse(&read_json(policy)?)
        .with_context(|| format!("{} is not a metadata policy", policy.display()))?;
    let metadata = read_object(metadata)?;
    let applied = policy
        .apply(&metadata)
        .context("metadata violates the policy")?;
    println!("{}", to_pretty(&Value::Object(applied))?);
    Ok(())
}
