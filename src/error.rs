//! Error taxonomy for catalog operations
use crate::catalog::PayoutFrequency;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Every failure a catalog operation can surface, mapped 1:1 to the outcome
/// the caller sees. Store and codec faults are wrapped, never retried here.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("issuer '{0}' not found")]
    IssuerNotFound(String),
    #[error("scheme '{scheme_id}' not found under issuer '{issuer_key}'")]
    SchemeNotFound {
        issuer_key: String,
        scheme_id: String,
    },
    #[error("rate slab '{slab_id}' not found under scheme '{scheme_id}' of issuer '{issuer_key}'")]
    SlabNotFound {
        issuer_key: String,
        scheme_id: String,
        slab_id: String,
    },
    #[error("issuer key '{0}' already exists")]
    DuplicateKey(String),
    #[error("scheme id '{0}' already exists in this issuer")]
    DuplicateSchemeId(String),
    #[error("rate slab id '{0}' already exists in this scheme")]
    DuplicateSlabId(String),
    #[error("business rules violated: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
    #[error("no active rate slab matches tenure {tenure_months} months at {payout_frequency} payout")]
    NoMatchingSlab {
        tenure_months: u32,
        payout_frequency: PayoutFrequency,
    },
    #[error("could not derive a free key from '{0}', supply an explicit key")]
    KeyGenerationExhausted(String),
    #[error("issuer '{0}' was modified concurrently, reload and retry")]
    ConcurrentUpdate(String),
    #[error("caller '{0}' is not an administrator")]
    NotAuthorized(String),
    #[error("identifier generation failed: {0}")]
    IdGeneration(String),
    #[error("storage error: {0}")]
    Store(#[from] sled::Error),
    #[error("document encode failed: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("document decode failed: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

impl CatalogError {
    /// Itemized violation list for `ValidationFailed`, empty otherwise.
    /// Lets an admin UI surface per-field reasons without matching variants.
    pub fn violations(&self) -> &[String] {
        match self {
            CatalogError::ValidationFailed(list) => list,
            _ => &[],
        }
    }
}
