//! Store adapter: one sled tree of issuer documents keyed by issuer key
//!
//! Only this module talks to the database. The update primitive is a
//! whole-document replace guarded by compare-and-swap on the exact bytes a
//! mutation loaded, so two interleaved read-modify-write cycles cannot
//! silently lose the first writer's change.
use crate::catalog::Issuer;
use crate::error::{CatalogError, Result};
use sled::Db;
use std::sync::Arc;

pub struct CatalogStore {
    db: Arc<Db>,
}

/// An issuer document together with the raw bytes it was decoded from. The
/// bytes act as the compare-and-swap witness for the eventual replace.
pub struct LoadedIssuer {
    pub issuer: Issuer,
    witness: sled::IVec,
}

impl CatalogStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    pub fn load(&self, key: &str) -> Result<LoadedIssuer> {
        let bytes = self
            .db
            .get(key.as_bytes())?
            .ok_or_else(|| CatalogError::IssuerNotFound(key.to_string()))?;
        let issuer = minicbor::decode(bytes.as_ref())?;

        Ok(LoadedIssuer {
            issuer,
            witness: bytes,
        })
    }

    /// Persists a brand-new issuer document. Fails with `DuplicateKey` if the
    /// key is already taken, including when a concurrent create won the race.
    pub fn insert_new(&self, issuer: &Issuer) -> Result<()> {
        let bytes = minicbor::to_vec(issuer)?;

        self.db
            .compare_and_swap(issuer.key.as_bytes(), None::<&[u8]>, Some(bytes))?
            .map_err(|_| CatalogError::DuplicateKey(issuer.key.clone()))
    }

    /// Replaces the whole document, provided it still holds the bytes that
    /// `prior` was loaded from. A vanished key surfaces `IssuerNotFound`; any
    /// other interleaved write surfaces `ConcurrentUpdate`.
    pub fn replace(&self, prior: &LoadedIssuer, issuer: &Issuer) -> Result<()> {
        let bytes = minicbor::to_vec(issuer)?;

        match self.db.compare_and_swap(
            issuer.key.as_bytes(),
            Some(prior.witness.clone()),
            Some(bytes),
        )? {
            Ok(()) => Ok(()),
            Err(cas) if cas.current.is_none() => {
                Err(CatalogError::IssuerNotFound(issuer.key.clone()))
            }
            Err(_) => Err(CatalogError::ConcurrentUpdate(issuer.key.clone())),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())?
            .map(|_| ())
            .ok_or_else(|| CatalogError::IssuerNotFound(key.to_string()))
    }

    /// Full scan of the tree. The catalog holds tens of issuers, not
    /// millions; listings decode everything and filter in memory.
    pub fn issuers(&self) -> Result<Vec<Issuer>> {
        let mut all = Vec::new();
        for entry in self.db.iter() {
            let (_, bytes) = entry?;
            all.push(minicbor::decode(bytes.as_ref())?);
        }
        Ok(all)
    }
}
