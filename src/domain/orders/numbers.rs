//! Order number generation

use jiff::{Timestamp, tz::TimeZone};
use rand::{Rng, distributions::Alphanumeric};

/// A human-facing order reference: `SO-YYYYMMDD-XXXXXX`. Uniqueness is the
/// caller's responsibility (regenerate on collision under the transaction).
pub(crate) fn order_number(at: Timestamp) -> String {
    let date = at.to_zoned(TimeZone::UTC).strftime("%Y%m%d");

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();

    format!("SO-{date}-{suffix}")
}
