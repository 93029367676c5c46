//! Business rule validator for issuer documents
//!
//! Rules are declarative predicate+message pairs evaluated uniformly over
//! every scheme and every slab; adding a rule is one entry in a table, not a
//! new branch. The validator never short-circuits: a single scheme can
//! contribute several violations, and the caller gets the full list.
use crate::catalog::{Issuer, PayoutFrequency, RateSlab, Scheme};

type SchemeRule = fn(&Scheme) -> Option<String>;
type SlabRule = fn(&Scheme, &RateSlab) -> Option<String>;

/// Scheme-level rules, checked in this order for every scheme.
const SCHEME_RULES: &[SchemeRule] = &[
    tenure_range_ordered,
    cumulative_pays_only_on_maturity,
    non_cumulative_never_on_maturity,
    premature_terms_present,
];

/// Slab-level rules, checked in this order for every slab of every scheme.
const SLAB_RULES: &[SlabRule] = &[slab_tenure_range_ordered, slab_frequency_allowed];

/// Checks every scheme and slab of the draft against the rule tables.
///
/// An empty result means the draft is acceptable for persistence. Any
/// non-empty result obliges the caller to reject the mutation without
/// touching the store. Positions in the messages are 1-based.
pub fn validate_issuer(issuer: &Issuer) -> Vec<String> {
    let mut violations = Vec::new();

    for (scheme_idx, scheme) in issuer.schemes.iter().enumerate() {
        let scheme_pos = scheme_idx + 1;
        for rule in SCHEME_RULES {
            if let Some(problem) = rule(scheme) {
                violations.push(format!(
                    "scheme {scheme_pos} ('{}'): {problem}",
                    scheme.scheme_id
                ));
            }
        }
        for (slab_idx, slab) in scheme.rate_slabs.iter().enumerate() {
            let slab_pos = slab_idx + 1;
            for rule in SLAB_RULES {
                if let Some(problem) = rule(scheme, slab) {
                    violations.push(format!(
                        "scheme {scheme_pos} slab {slab_pos} ('{}'): {problem}",
                        slab.slab_id
                    ));
                }
            }
        }
    }

    violations
}

fn tenure_range_ordered(scheme: &Scheme) -> Option<String> {
    (scheme.min_tenure_months > scheme.max_tenure_months).then(|| {
        format!(
            "minimum tenure {} months exceeds maximum tenure {} months",
            scheme.min_tenure_months, scheme.max_tenure_months
        )
    })
}

fn cumulative_pays_only_on_maturity(scheme: &Scheme) -> Option<String> {
    if !scheme.is_cumulative {
        return None;
    }
    // An empty allowed set passes vacuously. Deliberate: absence of declared
    // frequencies is not itself a violation.
    scheme
        .payout_frequencies
        .iter()
        .find(|f| **f != PayoutFrequency::OnMaturity)
        .map(|f| {
            format!(
                "cumulative scheme allows '{f}' payout, only '{}' is permitted",
                PayoutFrequency::OnMaturity
            )
        })
}

fn non_cumulative_never_on_maturity(scheme: &Scheme) -> Option<String> {
    if scheme.is_cumulative {
        return None;
    }
    scheme
        .payout_frequencies
        .contains(&PayoutFrequency::OnMaturity)
        .then(|| {
            format!(
                "non-cumulative scheme cannot offer '{}' payout",
                PayoutFrequency::OnMaturity
            )
        })
}

fn premature_terms_present(scheme: &Scheme) -> Option<String> {
    if !scheme.premature_withdrawal_allowed {
        return None;
    }
    match &scheme.premature_withdrawal_terms {
        Some(terms) if !terms.trim().is_empty() => None,
        _ => Some("premature withdrawal is allowed but its terms are blank".into()),
    }
}

fn slab_tenure_range_ordered(_scheme: &Scheme, slab: &RateSlab) -> Option<String> {
    (slab.min_tenure_months > slab.max_tenure_months).then(|| {
        format!(
            "minimum tenure {} months exceeds maximum tenure {} months",
            slab.min_tenure_months, slab.max_tenure_months
        )
    })
}

fn slab_frequency_allowed(scheme: &Scheme, slab: &RateSlab) -> Option<String> {
    // Membership is only checkable once the scheme declares its set; an empty
    // set passes vacuously, same as the scheme-level frequency rules.
    (!scheme.payout_frequencies.is_empty()
        && !scheme.payout_frequencies.contains(&slab.payout_frequency))
    .then(|| {
        format!(
            "payout frequency '{}' is not in the scheme's allowed set",
            slab.payout_frequency
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IssuerCategory, PayoutFrequency as Pf};

    fn issuer_with(scheme: Scheme) -> Issuer {
        Issuer::new("test_bank", "Test Bank", IssuerCategory::Bank).add_scheme(scheme)
    }

    #[test]
    fn clean_issuer_yields_no_violations() {
        let issuer = issuer_with(
            Scheme::new("std")
                .set_payout_frequencies(vec![Pf::Monthly])
                .set_tenure_range(6, 60)
                .add_slab(
                    RateSlab::new("a", Pf::Monthly)
                        .set_tenure_range(6, 60)
                        .set_base_rate_pa(7.0),
                ),
        );

        assert!(validate_issuer(&issuer).is_empty());
    }

    #[test]
    fn one_scheme_can_violate_several_rules_at_once() {
        // Inverted tenure range AND premature terms missing on the same scheme.
        let issuer = issuer_with(
            Scheme::new("broken")
                .set_tenure_range(12, 6)
                .set_premature_withdrawal(true),
        );

        let violations = validate_issuer(&issuer);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("12") && violations[0].contains("6"));
        assert!(violations[1].contains("premature"));
    }

    #[test]
    fn violations_carry_one_based_positions() {
        let issuer = issuer_with(Scheme::new("first").set_tenure_range(1, 12))
            .add_scheme(Scheme::new("second").set_tenure_range(24, 12));

        let violations = validate_issuer(&issuer);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("scheme 2"));
    }
}
