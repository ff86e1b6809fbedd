//! Tax Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::{domain::products::models::CategoryUuid, uuids::TypedUuid};

/// Tax Rule UUID
pub type TaxRuleUuid = TypedUuid<TaxRuleRecord>;

/// One jurisdictional tax rule. All location and scope filters are
/// conjunctive; an unset filter matches everything.
#[derive(Debug, Clone)]
pub struct TaxRuleRecord {
    pub uuid: TaxRuleUuid,
    pub name: String,
    pub country_code: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    /// Percentage, e.g. 20 for 20%.
    pub rate: Decimal,
    /// Compound rules tax the running total including previously applied
    /// tax, modeling tax-on-tax regimes.
    pub is_compound: bool,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub applicable_categories: Option<Vec<CategoryUuid>>,
    pub customer_groups: Option<Vec<String>>,
    pub starts_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New Tax Rule Model
#[derive(Debug, Clone)]
pub struct NewTaxRule {
    pub uuid: TaxRuleUuid,
    pub name: String,
    pub country_code: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub rate: Decimal,
    pub is_compound: bool,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub applicable_categories: Option<Vec<CategoryUuid>>,
    pub customer_groups: Option<Vec<String>>,
    pub starts_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
}

/// The condition tuple a tax assessment is computed (and cached) under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaxQuery {
    pub country_code: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub amount: Decimal,
    pub category_uuids: Vec<CategoryUuid>,
    pub customer_group: Option<String>,
}

impl TaxQuery {
    /// A query with only the mandatory fields set.
    #[must_use]
    pub fn for_amount(country_code: &str, amount: Decimal) -> Self {
        Self {
            country_code: country_code.to_string(),
            state: None,
            postal_code: None,
            city: None,
            amount,
            category_uuids: Vec::new(),
            customer_group: None,
        }
    }
}

/// Whether the queried amount already contains tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxTreatment {
    /// Tax is added on top of the amount.
    Exclusive,
    /// The amount is gross; tax is carved out via the reverse calculation.
    Inclusive,
}

/// One applied rule within an assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxLine {
    pub rule_uuid: TaxRuleUuid,
    pub name: String,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// The result of resolving a [`TaxQuery`]: total tax plus the ordered
/// per-rule breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxAssessment {
    pub total_tax: Decimal,
    /// The amount tax was computed on (net of tax for inclusive pricing).
    pub taxable_amount: Decimal,
    pub lines: SmallVec<[TaxLine; 4]>,
}

impl TaxAssessment {
    /// An assessment with no applicable rules.
    #[must_use]
    pub fn zero(amount: Decimal) -> Self {
        Self {
            total_tax: Decimal::ZERO,
            taxable_amount: amount,
            lines: SmallVec::new(),
        }
    }
}
