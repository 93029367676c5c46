//! Rate resolution: slab lookup, bonus stacking and effective annual yield
use crate::catalog::{CompoundingFrequency, Issuer, PayoutFrequency};
use crate::error::{CatalogError, Result};

/// A deposit request to price. Bonuses are independent; all three category
/// flags can be granted at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRequest {
    pub tenure_months: u32,
    pub payout_frequency: PayoutFrequency,
    pub senior_citizen: bool,
    pub woman: bool,
    pub renewal: bool,
}

/// Resolved pricing for one request. Plain value, no references back into the
/// catalog: resolution never writes and the result outlives the document.
#[derive(Debug, Clone, PartialEq)]
pub struct RateResult {
    pub scheme_id: String,
    pub slab_id: String,
    pub base_rate_pa: f64,
    pub senior_citizen_bonus_pa: f64,
    pub women_bonus_pa: f64,
    pub renewal_bonus_pa: f64,
    pub total_rate_pa: f64,
    pub compounding: Option<CompoundingFrequency>,
    pub effective_yield_pa: Option<f64>,
}

/// Resolves the effective rate for a deposit request against one issuer.
///
/// Slab selection takes the first slab in stored order whose payout frequency
/// matches, whose inclusive tenure band covers the request and which is
/// active. Slabs are allowed to overlap; stored order is the tie-break.
pub fn resolve(issuer: &Issuer, scheme_id: &str, request: &RateRequest) -> Result<RateResult> {
    let scheme = issuer
        .scheme(scheme_id)
        .ok_or_else(|| CatalogError::SchemeNotFound {
            issuer_key: issuer.key.clone(),
            scheme_id: scheme_id.to_string(),
        })?;

    let slab = scheme
        .rate_slabs
        .iter()
        .find(|s| s.covers(request.tenure_months, request.payout_frequency))
        .ok_or(CatalogError::NoMatchingSlab {
            tenure_months: request.tenure_months,
            payout_frequency: request.payout_frequency,
        })?;

    let senior_citizen_bonus_pa = bonus_pa(scheme.senior_citizen_bonus_bps, request.senior_citizen);
    let women_bonus_pa = bonus_pa(scheme.women_bonus_bps, request.woman);
    let renewal_bonus_pa = bonus_pa(scheme.renewal_bonus_bps, request.renewal);
    let total_rate_pa =
        slab.base_rate_pa + senior_citizen_bonus_pa + women_bonus_pa + renewal_bonus_pa;

    // A precomputed yield on the slab wins; otherwise derive one from the
    // total rate and the compounding frequency. Non-cumulative products have
    // no compounding concept at all.
    let effective_yield_pa = if scheme.is_cumulative {
        match (slab.effective_yield_pa, slab.compounding) {
            (Some(precomputed), _) => Some(round2(precomputed)),
            (None, Some(frequency)) => Some(round2(effective_annual_yield(total_rate_pa, frequency))),
            (None, None) => None,
        }
    } else {
        None
    };

    Ok(RateResult {
        scheme_id: scheme.scheme_id.clone(),
        slab_id: slab.slab_id.clone(),
        base_rate_pa: slab.base_rate_pa,
        senior_citizen_bonus_pa,
        women_bonus_pa,
        renewal_bonus_pa,
        total_rate_pa: round2(total_rate_pa),
        compounding: slab.compounding,
        effective_yield_pa,
    })
}

/// Bonuses are stored in basis points; 100 bps = 1 percentage point.
fn bonus_pa(bps: u32, granted: bool) -> f64 {
    if granted { f64::from(bps) / 100.0 } else { 0.0 }
}

/// Standard compound-interest transform: ((1 + r/n)^n - 1) * 100 where r is
/// the nominal rate as a fraction and n the compounding periods per year.
fn effective_annual_yield(rate_pa: f64, frequency: CompoundingFrequency) -> f64 {
    let r = rate_pa / 100.0;
    let n = frequency.periods_per_year();
    ((1.0 + r / f64::from(n)).powi(n as i32) - 1.0) * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
