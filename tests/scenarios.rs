use anyhow::Context;
use sled::open;
use std::sync::Arc;

use fd_catalog::catalog::{
    CompoundingFrequency, IssuerCategory, IssuerPatch, PayoutFrequency, RateSlab, Scheme,
    SchemePatch, SlabPatch,
};
use fd_catalog::error::CatalogError;
use fd_catalog::rate::RateRequest;
use fd_catalog::service::{Caller, CatalogService, NewIssuer};

use tempfile::tempdir; // Use for test db cleanup.

fn admin() -> Caller {
    Caller::administrator("admin_ops")
}

fn plain_request(tenure_months: u32, payout_frequency: PayoutFrequency) -> RateRequest {
    RateRequest {
        tenure_months,
        payout_frequency,
        senior_citizen: false,
        woman: false,
        renewal: false,
    }
}

#[test]
fn create_issuer_and_resolve_rate() -> anyhow::Result<()> {
    // Sled uses file-based locking to prevent concurrent access, so only one
    // test can hold the lock at a time. As is good practice in testing create
    // separate databases for each test, on temp for simplified cleanup.
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("create_and_resolve.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    // reset the db for each test run
    db.clear()?;

    let service = CatalogService::new(db);

    let draft = NewIssuer::new("Sunrise Bank", IssuerCategory::Bank).add_scheme(
        Scheme::new("cumulative_growth")
            .set_cumulative(true)
            .set_payout_frequencies(vec![PayoutFrequency::OnMaturity])
            .set_tenure_range(6, 120)
            .set_senior_citizen_bonus_bps(50)
            .set_women_bonus_bps(25)
            .add_slab(
                RateSlab::new("upto_5y", PayoutFrequency::OnMaturity)
                    .set_tenure_range(6, 60)
                    .set_base_rate_pa(6.50)
                    .set_compounding(CompoundingFrequency::Quarterly),
            ),
    );

    let issuer = service
        .create_issuer(&admin(), draft)
        .context("Issuer creation failed: ")?;
    assert_eq!(issuer.key, "sunrise_bank");

    // Both bonuses granted: 6.50 + 0.50 + 0.25 = 7.25% total.
    let result = service.resolve_rate(
        "sunrise_bank",
        "cumulative_growth",
        &RateRequest {
            tenure_months: 24,
            payout_frequency: PayoutFrequency::OnMaturity,
            senior_citizen: true,
            woman: true,
            renewal: false,
        },
    )?;

    assert_eq!(result.slab_id, "upto_5y");
    assert_eq!(result.base_rate_pa, 6.50);
    assert_eq!(result.total_rate_pa, 7.25);
    // Quarterly compounding on 7.25%: (1 + 0.0725/4)^4 - 1 = 7.4497...%
    assert_eq!(result.effective_yield_pa, Some(7.45));

    Ok(())
}

#[test]
fn catalog_round_trips_without_field_loss() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("round_trip.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);

    // Two schemes with two slabs each; reading back must lose nothing.
    let draft = NewIssuer::new("Apex Housing Finance", IssuerCategory::HousingFinance)
        .add_scheme(
            Scheme::new("regular_income")
                .set_payout_frequencies(vec![PayoutFrequency::Monthly, PayoutFrequency::Quarterly])
                .set_tenure_range(12, 60)
                .set_premature_withdrawal(true)
                .set_premature_terms("1% penalty on the applicable card rate")
                .set_renewal_bonus_bps(10)
                .add_slab(
                    RateSlab::new("short", PayoutFrequency::Monthly)
                        .set_tenure_range(12, 24)
                        .set_base_rate_pa(6.80),
                )
                .add_slab(
                    RateSlab::new("long", PayoutFrequency::Quarterly)
                        .set_tenure_range(25, 60)
                        .set_base_rate_pa(7.10),
                ),
        )
        .add_scheme(
            Scheme::new("cumulative_growth")
                .set_cumulative(true)
                .set_payout_frequencies(vec![PayoutFrequency::OnMaturity])
                .set_tenure_range(6, 120)
                .add_slab(
                    RateSlab::new("standard", PayoutFrequency::OnMaturity)
                        .set_tenure_range(6, 120)
                        .set_base_rate_pa(7.40)
                        .set_compounding(CompoundingFrequency::HalfYearly),
                )
                .add_slab(
                    RateSlab::new("special_450d", PayoutFrequency::OnMaturity)
                        .set_tenure_range(15, 15)
                        .set_base_rate_pa(7.85)
                        .set_compounding(CompoundingFrequency::Quarterly)
                        .set_effective_yield_pa(8.08),
                ),
        );

    let created = service
        .create_issuer(&admin(), draft)
        .context("Issuer creation failed: ")?;

    let loaded = service.get_issuer(&created.key)?;
    assert_eq!(created, loaded);
    assert_eq!(loaded.schemes.len(), 2);
    assert_eq!(loaded.schemes[0].rate_slabs.len(), 2);
    assert_eq!(loaded.schemes[1].rate_slabs.len(), 2);

    Ok(())
}

#[test]
fn build_catalog_incrementally() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("incremental.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);
    let caller = admin();

    let issuer = service
        .create_issuer(&caller, NewIssuer::new("Metro Finance", IssuerCategory::Nbfc))
        .context("Issuer creation failed: ")?;

    let scheme = service
        .add_scheme(
            &caller,
            &issuer.key,
            Scheme::new("flexi")
                .set_payout_frequencies(vec![PayoutFrequency::Quarterly])
                .set_tenure_range(6, 60),
        )
        .context("Scheme addition failed: ")?;

    // Two overlapping slabs for the same frequency; the stored order decides.
    service.add_rate_slab(
        &caller,
        &issuer.key,
        &scheme.scheme_id,
        RateSlab::new("first_band", PayoutFrequency::Quarterly)
            .set_tenure_range(6, 36)
            .set_base_rate_pa(6.90),
    )?;
    service.add_rate_slab(
        &caller,
        &issuer.key,
        &scheme.scheme_id,
        RateSlab::new("second_band", PayoutFrequency::Quarterly)
            .set_tenure_range(12, 60)
            .set_base_rate_pa(7.20),
    )?;

    // 18 months matches both bands; first in stored order wins.
    let result = service.resolve_rate(
        &issuer.key,
        &scheme.scheme_id,
        &plain_request(18, PayoutFrequency::Quarterly),
    )?;
    assert_eq!(result.slab_id, "first_band");
    assert_eq!(result.total_rate_pa, 6.90);

    // Outside the first band the second one takes over.
    let result = service.resolve_rate(
        &issuer.key,
        &scheme.scheme_id,
        &plain_request(48, PayoutFrequency::Quarterly),
    )?;
    assert_eq!(result.slab_id, "second_band");

    // No band reaches 70 months.
    let missing = service.resolve_rate(
        &issuer.key,
        &scheme.scheme_id,
        &plain_request(70, PayoutFrequency::Quarterly),
    );
    assert!(matches!(missing, Err(CatalogError::NoMatchingSlab { .. })));

    Ok(())
}

#[test]
fn rejected_mutation_never_reaches_the_store() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("rejected.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);
    let caller = admin();

    let issuer = service.create_issuer(&caller, NewIssuer::new("Unity Bank", IssuerCategory::Bank))?;

    // Inverted tenure range AND missing premature terms: both violations
    // must come back in one itemized list.
    let broken = Scheme::new("broken")
        .set_payout_frequencies(vec![PayoutFrequency::Monthly])
        .set_tenure_range(12, 6)
        .set_premature_withdrawal(true);

    let err = service
        .add_scheme(&caller, &issuer.key, broken)
        .expect_err("invalid scheme must be rejected");

    let violations = err.violations();
    assert_eq!(violations.len(), 2);
    assert!(violations[0].contains("12") && violations[0].contains("6"));
    assert!(violations[1].contains("premature"));

    // The rejected scheme never landed.
    let stored = service.get_issuer(&issuer.key)?;
    assert!(stored.schemes.is_empty());

    Ok(())
}

#[test]
fn derived_keys_step_past_collisions() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("derived_keys.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);
    let caller = admin();

    let first = service.create_issuer(&caller, NewIssuer::new("State  Bank", IssuerCategory::Bank))?;
    assert_eq!(first.key, "state_bank");

    // Same name again: the slug is taken, so the suffix ladder kicks in.
    let second = service.create_issuer(&caller, NewIssuer::new("State Bank", IssuerCategory::Bank))?;
    assert_eq!(second.key, "state_bank_1");

    let third = service.create_issuer(&caller, NewIssuer::new("state bank", IssuerCategory::Bank))?;
    assert_eq!(third.key, "state_bank_2");

    // An explicitly supplied key is used verbatim and collides hard.
    let dup = service.create_issuer(
        &caller,
        NewIssuer::new("Whatever", IssuerCategory::Corporate).set_key("state_bank"),
    );
    assert!(matches!(dup, Err(CatalogError::DuplicateKey(_))));

    Ok(())
}

#[test]
fn non_admin_callers_cannot_mutate() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("authz.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);
    let caller = admin();
    let teller = Caller::branch_staff("branch_teller_7");

    let issuer = service.create_issuer(&caller, NewIssuer::new("Unity Bank", IssuerCategory::Bank))?;

    let denied = service.add_scheme(&teller, &issuer.key, Scheme::new("sneaky"));
    assert!(matches!(denied, Err(CatalogError::NotAuthorized(_))));

    let denied = service.delete_issuer(&teller, &issuer.key);
    assert!(matches!(denied, Err(CatalogError::NotAuthorized(_))));

    // Reads carry no admin precondition.
    assert_eq!(service.list_issuers()?.len(), 1);

    Ok(())
}

#[test]
fn update_and_delete_full_cycle() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("update_delete.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);
    let caller = admin();

    let issuer = service.create_issuer(
        &caller,
        NewIssuer::new("Unity Bank", IssuerCategory::Bank).add_scheme(
            Scheme::new("flexi")
                .set_payout_frequencies(vec![PayoutFrequency::Monthly])
                .set_tenure_range(6, 60)
                .add_slab(
                    RateSlab::new("base", PayoutFrequency::Monthly)
                        .set_tenure_range(6, 60)
                        .set_base_rate_pa(6.25),
                ),
        ),
    )?;

    // Top-level rename; key stays what it was.
    let renamed = service.update_issuer(
        &caller,
        &issuer.key,
        IssuerPatch {
            display_name: Some("Unity Bank Ltd".into()),
            ..IssuerPatch::default()
        },
    )?;
    assert_eq!(renamed.key, issuer.key);
    assert_eq!(renamed.display_name, "Unity Bank Ltd");

    // Widen the scheme's band through a merge patch.
    let widened = service.update_scheme(
        &caller,
        &issuer.key,
        "flexi",
        SchemePatch {
            max_tenure_months: Some(120),
            ..SchemePatch::default()
        },
    )?;
    assert_eq!(widened.min_tenure_months, 6);
    assert_eq!(widened.max_tenure_months, 120);

    service.delete_rate_slab(&caller, &issuer.key, "flexi", "base")?;
    assert!(service.get_scheme(&issuer.key, "flexi")?.rate_slabs.is_empty());

    service.delete_scheme(&caller, &issuer.key, "flexi")?;
    assert!(matches!(
        service.get_scheme(&issuer.key, "flexi"),
        Err(CatalogError::SchemeNotFound { .. })
    ));

    service.delete_issuer(&caller, &issuer.key)?;
    assert!(matches!(
        service.get_issuer(&issuer.key),
        Err(CatalogError::IssuerNotFound(_))
    ));

    Ok(())
}

#[test]
fn non_cumulative_slab_sheds_compounding_on_add() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("coercion.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);
    let caller = admin();

    let issuer = service.create_issuer(
        &caller,
        NewIssuer::new("Unity Bank", IssuerCategory::Bank).add_scheme(
            Scheme::new("payout")
                .set_payout_frequencies(vec![PayoutFrequency::Monthly])
                .set_tenure_range(6, 60),
        ),
    )?;

    // The request smuggles compounding data onto a non-cumulative scheme;
    // the stored slab must carry neither field.
    let stored = service.add_rate_slab(
        &caller,
        &issuer.key,
        "payout",
        RateSlab::new("m", PayoutFrequency::Monthly)
            .set_tenure_range(6, 60)
            .set_base_rate_pa(6.40)
            .set_compounding(CompoundingFrequency::Monthly)
            .set_effective_yield_pa(6.59),
    )?;

    assert_eq!(stored.compounding, None);
    assert_eq!(stored.effective_yield_pa, None);

    let from_store = service.get_scheme(&issuer.key, "payout")?;
    assert_eq!(from_store.rate_slabs[0].compounding, None);
    assert_eq!(from_store.rate_slabs[0].effective_yield_pa, None);

    // Same coercion on the update path.
    let updated = service.update_rate_slab(
        &caller,
        &issuer.key,
        "payout",
        "m",
        SlabPatch {
            compounding: Some(CompoundingFrequency::Quarterly),
            effective_yield_pa: Some(6.56),
            ..SlabPatch::default()
        },
    )?;
    assert_eq!(updated.compounding, None);
    assert_eq!(updated.effective_yield_pa, None);

    Ok(())
}

#[test]
fn key_derivation_gives_up_after_the_attempt_ceiling() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("exhausted_keys.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);
    let caller = admin();

    // Base slug plus suffixes _1 through _100: 101 creations succeed.
    for _ in 0..=100 {
        service.create_issuer(&caller, NewIssuer::new("Crowded Name", IssuerCategory::Nbfc))?;
    }

    let exhausted = service.create_issuer(&caller, NewIssuer::new("Crowded Name", IssuerCategory::Nbfc));
    assert!(matches!(
        exhausted,
        Err(CatalogError::KeyGenerationExhausted(_))
    ));

    Ok(())
}

#[test]
fn listings_filter_inactive_entries() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("listings.db");
    let db = open(db_path)?;
    let db = Arc::new(db);

    db.clear()?;

    let service = CatalogService::new(db);
    let caller = admin();

    service.create_issuer(&caller, NewIssuer::new("Active Bank", IssuerCategory::Bank))?;
    service.create_issuer(
        &caller,
        NewIssuer::new("Dormant Bank", IssuerCategory::Bank).set_active(false),
    )?;

    let summaries = service.list_issuers()?;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].key, "active_bank");

    service.add_scheme(
        &caller,
        "active_bank",
        Scheme::new("live")
            .set_payout_frequencies(vec![PayoutFrequency::Monthly])
            .set_tenure_range(6, 60),
    )?;
    service.add_scheme(
        &caller,
        "active_bank",
        Scheme::new("retired")
            .set_payout_frequencies(vec![PayoutFrequency::Monthly])
            .set_tenure_range(6, 60)
            .set_active(false),
    )?;

    assert_eq!(service.list_schemes("active_bank", false)?.len(), 1);
    assert_eq!(service.list_schemes("active_bank", true)?.len(), 2);

    Ok(())
}
