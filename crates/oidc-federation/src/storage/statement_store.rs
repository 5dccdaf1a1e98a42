//! Signed statement persistence.
//!
//! Stores raw signed statements as JSON files:
//!
//! ```text
//! {base_dir}/
//! └── statements/
//!     └── {sha256(iss|sub)}.json
//! ```
//!
//! File format:
//! ```json
//! { "version": 1, "issuer": "...", "subject": "...", "jws": "..." }
//! ```
//!
//! The store only files statements by the `iss` and `sub` they claim;
//! signatures are checked by whoever resolves with it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::CompactJws;
use crate::entity::{EntityId, EntityStatement};
use crate::error::{FederationError, FetchError, Result};
use crate::resolve::Fetcher;

const STATEMENT_FILE_VERSION: u32 = 1;

const STATEMENTS_DIR: &str = "statements";

/// Wrapper written to disk for each statement.
#[derive(Debug, Serialize, Deserialize)]
struct StatementFile {
    version: u32,
    issuer: EntityId,
    subject: EntityId,
    jws: String,
}

/// Filesystem-backed store of signed entity statements.
#[derive(Debug, Clone)]
pub struct StatementStore {
    base_dir: PathBuf,
}

impl StatementStore {
    /// Create a store rooted at `base_dir`, creating `statements/`.
    ///
    /// # Errors
    ///
    /// Returns `FederationError::Io` if the directory cannot be created.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(base_dir.join(STATEMENTS_DIR))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Save a signed statement under the `iss` and `sub` it claims.
    pub fn save(&self, raw_jws: &str) -> Result<(EntityId, EntityId)> {
        let claims = CompactJws::parse(raw_jws)?.unverified_claims()?;
        let statement = EntityStatement::from_claims(&claims)?;
        self.save_for(&statement.issuer, &statement.subject, raw_jws)?;
        Ok((statement.issuer, statement.subject))
    }

    /// Save a signed statement under an explicit issuer and subject.
    pub fn save_for(&self, issuer: &EntityId, subject: &EntityId, raw_jws: &str) -> Result<()> {
        let file = StatementFile {
            version: STATEMENT_FILE_VERSION,
            issuer: issuer.clone(),
            subject: subject.clone(),
            jws: raw_jws.trim().to_string(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| FederationError::StorageError(e.to_string()))?;
        std::fs::write(self.statement_path(issuer, subject), json.as_bytes())?;
        log::debug!("stored statement by {issuer} about {subject}");
        Ok(())
    }

    /// Load the statement `issuer` made about `subject`, if stored.
    pub fn load(&self, issuer: &EntityId, subject: &EntityId) -> Result<Option<String>> {
        let path = self.statement_path(issuer, subject);
        if !path.exists() {
            return Ok(None);
        }
        let file = read_file(&path)?;
        if &file.issuer != issuer || &file.subject != subject {
            return Err(FederationError::InvalidFileFormat(format!(
                "{} holds a statement by {} about {}",
                path.display(),
                file.issuer,
                file.subject
            )));
        }
        Ok(Some(file.jws))
    }

    pub fn contains(&self, issuer: &EntityId, subject: &EntityId) -> bool {
        self.statement_path(issuer, subject).exists()
    }

    /// Delete a stored statement. Returns whether it existed.
    pub fn remove(&self, issuer: &EntityId, subject: &EntityId) -> Result<bool> {
        let path = self.statement_path(issuer, subject);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    /// Issuer/subject pairs of every stored statement, sorted.
    pub fn list(&self) -> Result<Vec<(EntityId, EntityId)>> {
        let mut pairs = Vec::new();
        for entry in std::fs::read_dir(self.base_dir.join(STATEMENTS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let file = read_file(&path)?;
            pairs.push((file.issuer, file.subject));
        }
        pairs.sort();
        Ok(pairs)
    }

    fn statement_path(&self, issuer: &EntityId, subject: &EntityId) -> PathBuf {
        let key = format!("{issuer}|{subject}");
        let name = hex::encode(Sha256::digest(key.as_bytes()));
        self.base_dir
            .join(STATEMENTS_DIR)
            .join(format!("{name}.json"))
    }
}

fn read_file(path: &Path) -> Result<StatementFile> {
    let bytes = std::fs::read(path)?;
    let file: StatementFile = serde_json::from_slice(&bytes).map_err(|e| {
        FederationError::InvalidFileFormat(format!(
            "failed to parse statement file {}: {e}",
            path.display()
        ))
    })?;
    if file.version != STATEMENT_FILE_VERSION {
        return Err(FederationError::InvalidFileFormat(format!(
            "unsupported statement file version {} in {}",
            file.version,
            path.display()
        )));
    }
    Ok(file)
}

impl Fetcher for StatementStore {
    fn fetch_statement(
        &self,
        issuer: &EntityId,
        subject: &EntityId,
    ) -> std::result::Result<String, FetchError> {
        match self.load(issuer, subject) {
            Ok(Some(jws)) => Ok(jws),
            Ok(None) => Err(FetchError::NotFound {
                issuer: issuer.clone(),
                subject: subject.clone(),
            }),
            Err(e) => Err(FetchError::Transport(e.to_string())),
        }
    }
}
