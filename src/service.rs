//! Service layer API for catalog operations
//!
//! Every mutation is one load → modify → validate → replace cycle over a
//! whole issuer document. The validator runs before the store is touched;
//! the replace is compare-and-swap against the bytes the cycle loaded.
use crate::catalog::{
    Issuer, IssuerCategory, IssuerPatch, RateSlab, Scheme, SchemePatch, SlabPatch, TimeStamp,
};
use crate::error::{CatalogError, Result};
use crate::rate::{self, RateRequest, RateResult};
use crate::store::{CatalogStore, LoadedIssuer};
use crate::utils;
use crate::validate::validate_issuer;
use sled::Db;
use std::sync::Arc;
use tracing::{debug, info};

/// Suffix probes (`_1`, `_2`, …) tried when deriving an issuer key before
/// giving up with `KeyGenerationExhausted`.
const MAX_KEY_ATTEMPTS: u32 = 100;

/// What the auth layer decided about the caller before the request got here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Administrator,
    BranchStaff,
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn administrator(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Administrator,
        }
    }
    pub fn branch_staff(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::BranchStaff,
        }
    }

    fn ensure_admin(&self) -> Result<()> {
        match self.role {
            Role::Administrator => Ok(()),
            Role::BranchStaff => Err(CatalogError::NotAuthorized(self.id.clone())),
        }
    }
}

/// Listing row; the full document stays behind `get_issuer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerSummary {
    pub key: String,
    pub display_name: String,
    pub category: IssuerCategory,
    pub scheme_count: usize,
}

/// Draft for issuer creation. Without an explicit key one is derived from the
/// name; schemes may be seeded up front for bulk imports.
#[derive(Debug, Clone)]
pub struct NewIssuer {
    pub key: Option<String>,
    pub name: String,
    pub category: IssuerCategory,
    pub is_active: Option<bool>,
    pub schemes: Vec<Scheme>,
}

impl NewIssuer {
    pub fn new(name: impl Into<String>, category: IssuerCategory) -> Self {
        Self {
            key: None,
            name: name.into(),
            category,
            is_active: None,
            schemes: vec![],
        }
    }
    pub fn set_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
    pub fn set_active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }
    pub fn add_scheme(mut self, scheme: Scheme) -> Self {
        self.schemes.push(scheme);
        self
    }
}

pub struct CatalogService {
    store: CatalogStore,
}

impl CatalogService {
    pub fn new(instance: Arc<Db>) -> Self {
        Self {
            store: CatalogStore::new(instance),
        }
    }

    // READS

    /// Active issuers as summary rows, in key order.
    pub fn list_issuers(&self) -> Result<Vec<IssuerSummary>> {
        Ok(self
            .store
            .issuers()?
            .into_iter()
            .filter(|issuer| issuer.is_active)
            .map(|issuer| IssuerSummary {
                key: issuer.key,
                display_name: issuer.display_name,
                category: issuer.category,
                scheme_count: issuer.schemes.len(),
            })
            .collect())
    }

    pub fn get_issuer(&self, key: &str) -> Result<Issuer> {
        Ok(self.store.load(key)?.issuer)
    }

    /// Schemes of one issuer, active-only unless `include_inactive`.
    pub fn list_schemes(&self, key: &str, include_inactive: bool) -> Result<Vec<Scheme>> {
        let issuer = self.store.load(key)?.issuer;
        Ok(issuer
            .schemes
            .into_iter()
            .filter(|scheme| include_inactive || scheme.is_active)
            .collect())
    }

    pub fn get_scheme(&self, key: &str, scheme_id: &str) -> Result<Scheme> {
        let issuer = self.store.load(key)?.issuer;
        issuer
            .scheme(scheme_id)
            .cloned()
            .ok_or_else(|| CatalogError::SchemeNotFound {
                issuer_key: key.to_string(),
                scheme_id: scheme_id.to_string(),
            })
    }

    /// Prices a deposit request. Pure lookup and computation, no writes.
    pub fn resolve_rate(
        &self,
        key: &str,
        scheme_id: &str,
        request: &RateRequest,
    ) -> Result<RateResult> {
        let issuer = self.store.load(key)?.issuer;
        let result = rate::resolve(&issuer, scheme_id, request)?;
        debug!(
            issuer = %key,
            scheme = %scheme_id,
            slab = %result.slab_id,
            total_rate_pa = result.total_rate_pa,
            "resolved rate"
        );
        Ok(result)
    }

    // ISSUER MUTATIONS

    pub fn create_issuer(&self, caller: &Caller, draft: NewIssuer) -> Result<Issuer> {
        caller.ensure_admin()?;

        let key = match draft.key {
            Some(key) => {
                if self.store.contains(&key)? {
                    return Err(CatalogError::DuplicateKey(key));
                }
                key
            }
            None => self.derive_key(&draft.name)?,
        };

        let mut issuer = Issuer::new(key, draft.name, draft.category);
        issuer.is_active = draft.is_active.unwrap_or(true);
        issuer.schemes = draft.schemes;

        self.check_rules(&issuer)?;
        self.store.insert_new(&issuer)?;
        info!(issuer = %issuer.key, by = %caller.id, "created issuer");
        Ok(issuer)
    }

    /// Shallow-merges `patch` over the stored document. The key is not
    /// patchable; business rules re-run only when the patch replaces the
    /// scheme list, top-level field edits cannot break them.
    pub fn update_issuer(&self, caller: &Caller, key: &str, patch: IssuerPatch) -> Result<Issuer> {
        caller.ensure_admin()?;

        let prior = self.store.load(key)?;
        let mut issuer = prior.issuer.clone();
        let revalidate = patch.touches_schemes();
        patch.apply(&mut issuer);

        if revalidate {
            self.check_rules(&issuer)?;
        }
        issuer.updated_at = TimeStamp::now();
        self.store.replace(&prior, &issuer)?;
        info!(issuer = %key, by = %caller.id, "updated issuer");
        Ok(issuer)
    }

    pub fn delete_issuer(&self, caller: &Caller, key: &str) -> Result<()> {
        caller.ensure_admin()?;
        self.store.remove(key)?;
        info!(issuer = %key, by = %caller.id, "deleted issuer");
        Ok(())
    }

    // SCHEME MUTATIONS

    pub fn add_scheme(&self, caller: &Caller, key: &str, scheme: Scheme) -> Result<Scheme> {
        caller.ensure_admin()?;

        let prior = self.store.load(key)?;
        let mut issuer = prior.issuer.clone();

        let mut scheme = scheme;
        if scheme.scheme_id.is_empty() {
            scheme.scheme_id = utils::new_bech32_id("scheme")?;
        }
        if issuer.scheme(&scheme.scheme_id).is_some() {
            return Err(CatalogError::DuplicateSchemeId(scheme.scheme_id));
        }

        issuer.schemes.push(scheme.clone());
        self.commit(prior, issuer)?;
        info!(issuer = %key, scheme = %scheme.scheme_id, by = %caller.id, "added scheme");
        Ok(scheme)
    }

    pub fn update_scheme(
        &self,
        caller: &Caller,
        key: &str,
        scheme_id: &str,
        patch: SchemePatch,
    ) -> Result<Scheme> {
        caller.ensure_admin()?;

        let prior = self.store.load(key)?;
        let mut issuer = prior.issuer.clone();
        let scheme = issuer
            .scheme_mut(scheme_id)
            .ok_or_else(|| CatalogError::SchemeNotFound {
                issuer_key: key.to_string(),
                scheme_id: scheme_id.to_string(),
            })?;

        patch.apply(scheme);
        if !scheme.is_cumulative {
            // A scheme that ended up non-cumulative has no compounding
            // concept; scrub it from every slab rather than persist junk.
            for slab in &mut scheme.rate_slabs {
                strip_compounding(slab);
            }
        }
        let snapshot = scheme.clone();

        self.commit(prior, issuer)?;
        info!(issuer = %key, scheme = %scheme_id, by = %caller.id, "updated scheme");
        Ok(snapshot)
    }

    pub fn delete_scheme(&self, caller: &Caller, key: &str, scheme_id: &str) -> Result<()> {
        caller.ensure_admin()?;

        let prior = self.store.load(key)?;
        let mut issuer = prior.issuer.clone();

        let before = issuer.schemes.len();
        issuer.schemes.retain(|s| s.scheme_id != scheme_id);
        if issuer.schemes.len() == before {
            return Err(CatalogError::SchemeNotFound {
                issuer_key: key.to_string(),
                scheme_id: scheme_id.to_string(),
            });
        }

        self.commit(prior, issuer)?;
        info!(issuer = %key, scheme = %scheme_id, by = %caller.id, "deleted scheme");
        Ok(())
    }

    // RATE SLAB MUTATIONS

    pub fn add_rate_slab(
        &self,
        caller: &Caller,
        key: &str,
        scheme_id: &str,
        slab: RateSlab,
    ) -> Result<RateSlab> {
        caller.ensure_admin()?;

        let prior = self.store.load(key)?;
        let mut issuer = prior.issuer.clone();
        let scheme = issuer
            .scheme_mut(scheme_id)
            .ok_or_else(|| CatalogError::SchemeNotFound {
                issuer_key: key.to_string(),
                scheme_id: scheme_id.to_string(),
            })?;

        let mut slab = slab;
        if slab.slab_id.is_empty() {
            slab.slab_id = utils::new_bech32_id("slab")?;
        }
        if scheme.slab(&slab.slab_id).is_some() {
            return Err(CatalogError::DuplicateSlabId(slab.slab_id));
        }
        if !scheme.is_cumulative {
            strip_compounding(&mut slab);
        }

        scheme.rate_slabs.push(slab.clone());
        self.commit(prior, issuer)?;
        info!(issuer = %key, scheme = %scheme_id, slab = %slab.slab_id, by = %caller.id, "added rate slab");
        Ok(slab)
    }

    pub fn update_rate_slab(
        &self,
        caller: &Caller,
        key: &str,
        scheme_id: &str,
        slab_id: &str,
        patch: SlabPatch,
    ) -> Result<RateSlab> {
        caller.ensure_admin()?;

        let prior = self.store.load(key)?;
        let mut issuer = prior.issuer.clone();
        let scheme = issuer
            .scheme_mut(scheme_id)
            .ok_or_else(|| CatalogError::SchemeNotFound {
                issuer_key: key.to_string(),
                scheme_id: scheme_id.to_string(),
            })?;

        let cumulative = scheme.is_cumulative;
        let slab = scheme
            .rate_slabs
            .iter_mut()
            .find(|s| s.slab_id == slab_id)
            .ok_or_else(|| CatalogError::SlabNotFound {
                issuer_key: key.to_string(),
                scheme_id: scheme_id.to_string(),
                slab_id: slab_id.to_string(),
            })?;

        patch.apply(slab);
        if !cumulative {
            strip_compounding(slab);
        }
        let snapshot = slab.clone();

        self.commit(prior, issuer)?;
        info!(issuer = %key, scheme = %scheme_id, slab = %slab_id, by = %caller.id, "updated rate slab");
        Ok(snapshot)
    }

    pub fn delete_rate_slab(
        &self,
        caller: &Caller,
        key: &str,
        scheme_id: &str,
        slab_id: &str,
    ) -> Result<()> {
        caller.ensure_admin()?;

        let prior = self.store.load(key)?;
        let mut issuer = prior.issuer.clone();
        let scheme = issuer
            .scheme_mut(scheme_id)
            .ok_or_else(|| CatalogError::SchemeNotFound {
                issuer_key: key.to_string(),
                scheme_id: scheme_id.to_string(),
            })?;

        let before = scheme.rate_slabs.len();
        scheme.rate_slabs.retain(|s| s.slab_id != slab_id);
        if scheme.rate_slabs.len() == before {
            return Err(CatalogError::SlabNotFound {
                issuer_key: key.to_string(),
                scheme_id: scheme_id.to_string(),
                slab_id: slab_id.to_string(),
            });
        }

        self.commit(prior, issuer)?;
        info!(issuer = %key, scheme = %scheme_id, slab = %slab_id, by = %caller.id, "deleted rate slab");
        Ok(())
    }

    // INTERNALS

    /// Validate, stamp and replace. Rejection happens before any write.
    fn commit(&self, prior: LoadedIssuer, mut issuer: Issuer) -> Result<Issuer> {
        self.check_rules(&issuer)?;
        issuer.updated_at = TimeStamp::now();
        self.store.replace(&prior, &issuer)?;
        Ok(issuer)
    }

    fn check_rules(&self, issuer: &Issuer) -> Result<()> {
        let violations = validate_issuer(issuer);
        if violations.is_empty() {
            return Ok(());
        }
        debug!(issuer = %issuer.key, count = violations.len(), "rejected by business rules");
        Err(CatalogError::ValidationFailed(violations))
    }

    /// Base slug, then `_1` … `_{MAX_KEY_ATTEMPTS}` until a free key turns up.
    fn derive_key(&self, name: &str) -> Result<String> {
        let base = utils::slug_key(name);
        if !self.store.contains(&base)? {
            return Ok(base);
        }
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let candidate = format!("{base}_{attempt}");
            if !self.store.contains(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(CatalogError::KeyGenerationExhausted(base))
    }
}

/// Non-cumulative products have no compounding concept. Documented coercion,
/// not a validation failure.
fn strip_compounding(slab: &mut RateSlab) {
    slab.compounding = None;
    slab.effective_yield_pa = None;
}
