//! Catalog document model: issuer, scheme and rate slab types
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// A deposit-taking institution. One issuer is one persisted document; its
/// schemes and their rate slabs are embedded, never stored separately.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Issuer {
    /// Immutable once assigned. Doubles as the storage key.
    #[n(0)]
    pub key: String,
    #[n(1)]
    pub display_name: String,
    #[n(2)]
    pub category: IssuerCategory,
    #[n(3)]
    pub is_active: bool,
    #[n(4)]
    pub schemes: Vec<Scheme>,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
    #[n(6)]
    pub updated_at: TimeStamp<Utc>,
}

/// A fixed-deposit product offered by an issuer.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Scheme {
    /// Unique within the owning issuer, not globally.
    #[n(0)]
    pub scheme_id: String,
    #[n(1)]
    pub is_cumulative: bool,
    /// Allowed payout frequencies. An empty set is tolerated, see validate.rs.
    #[n(2)]
    pub payout_frequencies: Vec<PayoutFrequency>,
    #[n(3)]
    pub min_tenure_months: u32,
    #[n(4)]
    pub max_tenure_months: u32,
    #[n(5)]
    pub premature_withdrawal_allowed: bool,
    #[n(6)]
    pub premature_withdrawal_terms: Option<String>,
    #[n(7)]
    pub senior_citizen_bonus_bps: u32,
    #[n(8)]
    pub women_bonus_bps: u32,
    #[n(9)]
    pub renewal_bonus_bps: u32,
    #[n(10)]
    pub is_active: bool,
    #[n(11)]
    pub rate_slabs: Vec<RateSlab>,
}

/// A tenure/frequency-banded interest rate within a scheme.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct RateSlab {
    /// Unique within the owning scheme.
    #[n(0)]
    pub slab_id: String,
    #[n(1)]
    pub min_tenure_months: u32,
    #[n(2)]
    pub max_tenure_months: u32,
    #[n(3)]
    pub payout_frequency: PayoutFrequency,
    /// Percent per annum, e.g. 7.25 means 7.25%.
    #[n(4)]
    pub base_rate_pa: f64,
    #[n(5)]
    pub is_active: bool,
    /// Only meaningful on cumulative schemes; forced to None otherwise.
    #[n(6)]
    pub compounding: Option<CompoundingFrequency>,
    /// Precomputed effective annual yield, takes precedence over computing one.
    #[n(7)]
    pub effective_yield_pa: Option<f64>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuerCategory {
    #[n(0)]
    Bank,
    #[n(1)]
    Nbfc,
    #[n(2)]
    HousingFinance,
    #[n(3)]
    Corporate,
}

/// How often interest is disbursed. `OnMaturity` is the sentinel that marks a
/// cumulative payout; cumulative schemes accept nothing else.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutFrequency {
    #[n(0)]
    Monthly,
    #[n(1)]
    Quarterly,
    #[n(2)]
    HalfYearly,
    #[n(3)]
    Annually,
    #[n(4)]
    OnMaturity,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundingFrequency {
    #[n(0)]
    Monthly,
    #[n(1)]
    Quarterly,
    #[n(2)]
    HalfYearly,
    #[n(3)]
    Annually,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Issuer {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>, category: IssuerCategory) -> Self {
        let now = TimeStamp::now();
        Self {
            key: key.into(),
            display_name: display_name.into(),
            category,
            is_active: true,
            schemes: vec![],
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn add_scheme(mut self, scheme: Scheme) -> Self {
        self.schemes.push(scheme);
        self
    }

    pub fn scheme(&self, scheme_id: &str) -> Option<&Scheme> {
        self.schemes.iter().find(|s| s.scheme_id == scheme_id)
    }

    pub fn scheme_mut(&mut self, scheme_id: &str) -> Option<&mut Scheme> {
        self.schemes.iter_mut().find(|s| s.scheme_id == scheme_id)
    }
}

impl Scheme {
    /// New non-cumulative scheme with no frequencies, no slabs, zero bonuses.
    pub fn new(scheme_id: impl Into<String>) -> Self {
        Self {
            scheme_id: scheme_id.into(),
            is_cumulative: false,
            payout_frequencies: vec![],
            min_tenure_months: 0,
            max_tenure_months: 0,
            premature_withdrawal_allowed: false,
            premature_withdrawal_terms: None,
            senior_citizen_bonus_bps: 0,
            women_bonus_bps: 0,
            renewal_bonus_bps: 0,
            is_active: true,
            rate_slabs: vec![],
        }
    }
    pub fn set_cumulative(mut self, cumulative: bool) -> Self {
        self.is_cumulative = cumulative;
        self
    }
    pub fn set_payout_frequencies(mut self, frequencies: Vec<PayoutFrequency>) -> Self {
        self.payout_frequencies = frequencies;
        self
    }
    pub fn set_tenure_range(mut self, min_months: u32, max_months: u32) -> Self {
        self.min_tenure_months = min_months;
        self.max_tenure_months = max_months;
        self
    }
    pub fn set_premature_withdrawal(mut self, allowed: bool) -> Self {
        self.premature_withdrawal_allowed = allowed;
        self
    }
    pub fn set_premature_terms(mut self, terms: impl Into<String>) -> Self {
        self.premature_withdrawal_terms = Some(terms.into());
        self
    }
    pub fn set_senior_citizen_bonus_bps(mut self, bps: u32) -> Self {
        self.senior_citizen_bonus_bps = bps;
        self
    }
    pub fn set_women_bonus_bps(mut self, bps: u32) -> Self {
        self.women_bonus_bps = bps;
        self
    }
    pub fn set_renewal_bonus_bps(mut self, bps: u32) -> Self {
        self.renewal_bonus_bps = bps;
        self
    }
    pub fn set_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }
    pub fn add_slab(mut self, slab: RateSlab) -> Self {
        self.rate_slabs.push(slab);
        self
    }

    pub fn slab(&self, slab_id: &str) -> Option<&RateSlab> {
        self.rate_slabs.iter().find(|s| s.slab_id == slab_id)
    }
}

impl RateSlab {
    pub fn new(slab_id: impl Into<String>, payout_frequency: PayoutFrequency) -> Self {
        Self {
            slab_id: slab_id.into(),
            min_tenure_months: 0,
            max_tenure_months: 0,
            payout_frequency,
            base_rate_pa: 0.0,
            is_active: true,
            compounding: None,
            effective_yield_pa: None,
        }
    }
    pub fn set_tenure_range(mut self, min_months: u32, max_months: u32) -> Self {
        self.min_tenure_months = min_months;
        self.max_tenure_months = max_months;
        self
    }
    pub fn set_base_rate_pa(mut self, rate: f64) -> Self {
        self.base_rate_pa = rate;
        self
    }
    pub fn set_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }
    pub fn set_compounding(mut self, frequency: CompoundingFrequency) -> Self {
        self.compounding = Some(frequency);
        self
    }
    pub fn set_effective_yield_pa(mut self, yield_pa: f64) -> Self {
        self.effective_yield_pa = Some(yield_pa);
        self
    }

    /// True when this slab serves `tenure_months` at `frequency`.
    pub fn covers(&self, tenure_months: u32, frequency: PayoutFrequency) -> bool {
        self.is_active
            && self.payout_frequency == frequency
            && self.min_tenure_months <= tenure_months
            && tenure_months <= self.max_tenure_months
    }
}

impl CompoundingFrequency {
    /// Compounding periods per year for the effective-yield transform.
    pub fn periods_per_year(self) -> u32 {
        match self {
            CompoundingFrequency::Monthly => 12,
            CompoundingFrequency::Quarterly => 4,
            CompoundingFrequency::HalfYearly => 2,
            CompoundingFrequency::Annually => 1,
        }
    }
}

impl fmt::Display for PayoutFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayoutFrequency::Monthly => "Monthly",
            PayoutFrequency::Quarterly => "Quarterly",
            PayoutFrequency::HalfYearly => "Half-Yearly",
            PayoutFrequency::Annually => "Annually",
            PayoutFrequency::OnMaturity => "On Maturity",
        })
    }
}

impl fmt::Display for CompoundingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompoundingFrequency::Monthly => "Monthly",
            CompoundingFrequency::Quarterly => "Quarterly",
            CompoundingFrequency::HalfYearly => "Half-Yearly",
            CompoundingFrequency::Annually => "Annually",
        })
    }
}

impl fmt::Display for IssuerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IssuerCategory::Bank => "Bank",
            IssuerCategory::Nbfc => "NBFC",
            IssuerCategory::HousingFinance => "Housing Finance",
            IssuerCategory::Corporate => "Corporate",
        })
    }
}

/// Partial update for issuer top-level fields. The key is deliberately not
/// patchable; replacing `schemes` wholesale is allowed for bulk imports.
#[derive(Debug, Default, Clone)]
pub struct IssuerPatch {
    pub display_name: Option<String>,
    pub category: Option<IssuerCategory>,
    pub is_active: Option<bool>,
    pub schemes: Option<Vec<Scheme>>,
}

impl IssuerPatch {
    pub fn touches_schemes(&self) -> bool {
        self.schemes.is_some()
    }

    pub fn apply(self, issuer: &mut Issuer) {
        if let Some(name) = self.display_name {
            issuer.display_name = name;
        }
        if let Some(category) = self.category {
            issuer.category = category;
        }
        if let Some(active) = self.is_active {
            issuer.is_active = active;
        }
        if let Some(schemes) = self.schemes {
            issuer.schemes = schemes;
        }
    }
}

/// Partial update for a scheme located by id. The id itself is immutable.
#[derive(Debug, Default, Clone)]
pub struct SchemePatch {
    pub is_cumulative: Option<bool>,
    pub payout_frequencies: Option<Vec<PayoutFrequency>>,
    pub min_tenure_months: Option<u32>,
    pub max_tenure_months: Option<u32>,
    pub premature_withdrawal_allowed: Option<bool>,
    pub premature_withdrawal_terms: Option<String>,
    pub senior_citizen_bonus_bps: Option<u32>,
    pub women_bonus_bps: Option<u32>,
    pub renewal_bonus_bps: Option<u32>,
    pub is_active: Option<bool>,
}

impl SchemePatch {
    pub fn apply(self, scheme: &mut Scheme) {
        if let Some(cumulative) = self.is_cumulative {
            scheme.is_cumulative = cumulative;
        }
        if let Some(frequencies) = self.payout_frequencies {
            scheme.payout_frequencies = frequencies;
        }
        if let Some(min) = self.min_tenure_months {
            scheme.min_tenure_months = min;
        }
        if let Some(max) = self.max_tenure_months {
            scheme.max_tenure_months = max;
        }
        if let Some(allowed) = self.premature_withdrawal_allowed {
            scheme.premature_withdrawal_allowed = allowed;
        }
        if let Some(terms) = self.premature_withdrawal_terms {
            scheme.premature_withdrawal_terms = Some(terms);
        }
        if let Some(bps) = self.senior_citizen_bonus_bps {
            scheme.senior_citizen_bonus_bps = bps;
        }
        if let Some(bps) = self.women_bonus_bps {
            scheme.women_bonus_bps = bps;
        }
        if let Some(bps) = self.renewal_bonus_bps {
            scheme.renewal_bonus_bps = bps;
        }
        if let Some(active) = self.is_active {
            scheme.is_active = active;
        }
    }
}

/// Partial update for a rate slab located by id. The id itself is immutable.
#[derive(Debug, Default, Clone)]
pub struct SlabPatch {
    pub min_tenure_months: Option<u32>,
    pub max_tenure_months: Option<u32>,
    pub payout_frequency: Option<PayoutFrequency>,
    pub base_rate_pa: Option<f64>,
    pub is_active: Option<bool>,
    pub compounding: Option<CompoundingFrequency>,
    pub effective_yield_pa: Option<f64>,
}

impl SlabPatch {
    pub fn apply(self, slab: &mut RateSlab) {
        if let Some(min) = self.min_tenure_months {
            slab.min_tenure_months = min;
        }
        if let Some(max) = self.max_tenure_months {
            slab.max_tenure_months = max;
        }
        if let Some(frequency) = self.payout_frequency {
            slab.payout_frequency = frequency;
        }
        if let Some(rate) = self.base_rate_pa {
            slab.base_rate_pa = rate;
        }
        if let Some(active) = self.is_active {
            slab.is_active = active;
        }
        if let Some(frequency) = self.compounding {
            slab.compounding = Some(frequency);
        }
        if let Some(yield_pa) = self.effective_yield_pa {
            slab.effective_yield_pa = Some(yield_pa);
        }
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
