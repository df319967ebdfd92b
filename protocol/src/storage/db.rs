//! # AlocDb: Persistent Storage Engine
//!
//! The persistence layer for line-of-credit vaults, built on sled's
//! embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                    | Value                          |
//! |------------|------------------------|--------------------------------|
//! | `vaults`   | vault address (UTF-8)  | versioned vault snapshot       |
//! | `tokens`   | token symbol (UTF-8)   | versioned token ledger         |
//! | `metadata` | key (UTF-8)            | value (bytes)                  |
//!
//! A vault and its token are saved together with one sled transaction
//! across both trees. Either both land on disk or neither does, so a crash
//! can never leave the vault's liquidity out of step with its custody.

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

use super::schema::{decode_record, encode_record, SchemaError, VersionedRecord};
use crate::address::Address;
use crate::token::TokenSnapshot;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("storage transaction aborted")]
    Aborted,
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// AlocDb
// ---------------------------------------------------------------------------

/// Persistent storage for vault snapshots and token ledgers.
///
/// sled is thread-safe, so `AlocDb` is cheap to clone and share.
#[derive(Debug, Clone)]
pub struct AlocDb {
    db: Db,
    vaults: Tree,
    tokens: Tree,
    metadata: Tree,
}

impl AlocDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Ideal for unit tests. No filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let vaults = db.open_tree("vaults")?;
        let tokens = db.open_tree("tokens")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            vaults,
            tokens,
            metadata,
        })
    }

    // -- Vaults -------------------------------------------------------------

    /// Persist a vault snapshot together with the ledger of its asset token.
    pub fn put_vault<T: VersionedRecord>(
        &self,
        vault: &Address,
        snapshot: &T,
        token_symbol: &str,
        token: &TokenSnapshot,
    ) -> DbResult<()> {
        let vault_bytes = encode_record(snapshot)?;
        let token_bytes = encode_record(token)?;

        (&self.vaults, &self.tokens)
            .transaction(|(vaults, tokens)| {
                vaults.insert(vault.as_str().as_bytes(), vault_bytes.as_slice())?;
                tokens.insert(token_symbol.as_bytes(), token_bytes.as_slice())?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => DbError::Sled(e),
                TransactionError::Abort(()) => DbError::Aborted,
            })?;

        self.db.flush()?;
        debug!(%vault, token = token_symbol, "vault snapshot persisted");
        Ok(())
    }

    /// Load a vault snapshot, upgrading older layouts.
    pub fn get_vault<T: VersionedRecord>(&self, vault: &Address) -> DbResult<Option<T>> {
        match self.vaults.get(vault.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Addresses of every stored vault.
    pub fn vault_addresses(&self) -> DbResult<Vec<String>> {
        self.vaults
            .iter()
            .keys()
            .map(|k| {
                let k = k?;
                Ok(String::from_utf8_lossy(&k).into_owned())
            })
            .collect()
    }

    // -- Tokens -------------------------------------------------------------

    /// Load a token ledger by symbol.
    pub fn get_token(&self, symbol: &str) -> DbResult<Option<TokenSnapshot>> {
        match self.tokens.get(symbol.as_bytes())? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    // -- Metadata -----------------------------------------------------------

    pub fn put_metadata(&self, key: &str, value: &[u8]) -> DbResult<()> {
        self.metadata.insert(key.as_bytes(), value)?;
        Ok(())
    }

    pub fn get_metadata(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        Ok(self.metadata.get(key.as_bytes())?.map(|v| v.to_vec()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Assets;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn token_with(holder: &str, amount: u64) -> TokenSnapshot {
        let mut snapshot = TokenSnapshot::default();
        snapshot.balances.insert(addr(holder), Assets::from(amount));
        snapshot.total_supply = Assets::from(amount);
        snapshot
    }

    #[test]
    fn vault_and_token_round_trip() {
        let db = AlocDb::open_temporary().unwrap();
        let token = token_with("alice", 42);
        db.put_vault(&addr("vault-1"), &token_with("bob", 7), "USDC", &token)
            .unwrap();

        let vault: TokenSnapshot = db.get_vault(&addr("vault-1")).unwrap().unwrap();
        assert_eq!(vault.total_supply, Assets::from(7u64));
        assert_eq!(db.get_token("USDC").unwrap().unwrap(), token);
    }

    #[test]
    fn missing_records_are_none() {
        let db = AlocDb::open_temporary().unwrap();
        assert!(db.get_vault::<TokenSnapshot>(&addr("nope")).unwrap().is_none());
        assert!(db.get_token("NOPE").unwrap().is_none());
    }

    #[test]
    fn lists_vault_addresses() {
        let db = AlocDb::open_temporary().unwrap();
        let token = TokenSnapshot::default();
        db.put_vault(&addr("a"), &token, "USDC", &token).unwrap();
        db.put_vault(&addr("b"), &token, "USDC", &token).unwrap();
        assert_eq!(db.vault_addresses().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn metadata_round_trip() {
        let db = AlocDb::open_temporary().unwrap();
        db.put_metadata("schema", b"2").unwrap();
        assert_eq!(db.get_metadata("schema").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = AlocDb::open(dir.path()).unwrap();
            let token = token_with("alice", 1);
            db.put_vault(&addr("v"), &token, "USDC", &token).unwrap();
        }
        let db = AlocDb::open(dir.path()).unwrap();
        assert!(db.get_token("USDC").unwrap().is_some());
    }
}
