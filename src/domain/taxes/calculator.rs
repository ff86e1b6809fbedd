//! Tax calculation
//!
//! Pure rule matching and folding. Matching rules are ordered by ascending
//! rate and folded left to right; a compound rule's base includes the tax
//! accumulated so far. Inclusive pricing first derives the net amount via
//! the effective combined multiplier, then runs the same fold on the net.

use jiff::Timestamp;
use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::{
    domain::taxes::models::{TaxAssessment, TaxLine, TaxQuery, TaxRuleRecord, TaxTreatment},
    money::round_money,
};

/// Selects the active, time-valid rules matching the query, ordered by
/// ascending rate.
#[must_use]
pub fn matching_rules<'a>(
    rules: &'a [TaxRuleRecord],
    query: &TaxQuery,
    at: Timestamp,
) -> Vec<&'a TaxRuleRecord> {
    let mut matched: Vec<&TaxRuleRecord> = rules
        .iter()
        .filter(|rule| rule_matches(rule, query, at))
        .collect();

    matched.sort_by(|a, b| a.rate.cmp(&b.rate));

    matched
}

fn rule_matches(rule: &TaxRuleRecord, query: &TaxQuery, at: Timestamp) -> bool {
    rule.is_active
        && rule.starts_at.is_none_or(|starts| starts <= at)
        && rule.expires_at.is_none_or(|expires| expires > at)
        && rule.country_code.eq_ignore_ascii_case(&query.country_code)
        && optional_field_matches(rule.state.as_deref(), query.state.as_deref())
        && optional_field_matches(rule.postal_code.as_deref(), query.postal_code.as_deref())
        && optional_field_matches(rule.city.as_deref(), query.city.as_deref())
        && rule.min_amount.is_none_or(|min| query.amount >= min)
        && rule.max_amount.is_none_or(|max| query.amount <= max)
        && rule.applicable_categories.as_ref().is_none_or(|wanted| {
            query
                .category_uuids
                .iter()
                .any(|category| wanted.contains(category))
        })
        && rule.customer_groups.as_ref().is_none_or(|groups| {
            query
                .customer_group
                .as_ref()
                .is_some_and(|group| groups.contains(group))
        })
}

fn optional_field_matches(rule_value: Option<&str>, query_value: Option<&str>) -> bool {
    match rule_value {
        None => true,
        Some(wanted) => query_value.is_some_and(|got| wanted.eq_ignore_ascii_case(got)),
    }
}

/// Computes the assessment for a query under the given treatment.
///
/// Identical inputs always produce identical assessments, which is what
/// makes the result cacheable by its condition tuple.
#[must_use]
pub fn assess(
    rules: &[TaxRuleRecord],
    query: &TaxQuery,
    treatment: TaxTreatment,
    at: Timestamp,
) -> TaxAssessment {
    let matched = matching_rules(rules, query, at);

    if matched.is_empty() {
        return TaxAssessment::zero(query.amount);
    }

    let taxable = match treatment {
        TaxTreatment::Exclusive => query.amount,
        TaxTreatment::Inclusive => {
            // Effective multiplier over one unit, honouring compounding,
            // then net = gross / multiplier.
            let mut accumulated = Decimal::ZERO;

            for rule in &matched {
                let base = if rule.is_compound {
                    Decimal::ONE + accumulated
                } else {
                    Decimal::ONE
                };

                accumulated += base * rule.rate / Decimal::ONE_HUNDRED;
            }

            let multiplier = Decimal::ONE + accumulated;

            if multiplier <= Decimal::ZERO {
                query.amount
            } else {
                query.amount / multiplier
            }
        }
    };

    let mut lines: SmallVec<[TaxLine; 4]> = SmallVec::new();
    let mut running_tax = Decimal::ZERO;

    for rule in matched {
        let base = if rule.is_compound {
            taxable + running_tax
        } else {
            taxable
        };

        let amount = round_money(base * rule.rate / Decimal::ONE_HUNDRED);
        running_tax += amount;

        lines.push(TaxLine {
            rule_uuid: rule.uuid,
            name: rule.name.clone(),
            rate: rule.rate,
            amount,
        });
    }

    let taxable_amount = match treatment {
        TaxTreatment::Exclusive => query.amount,
        TaxTreatment::Inclusive => query.amount - running_tax,
    };

    TaxAssessment {
        total_tax: running_tax,
        taxable_amount,
        lines,
    }
}
