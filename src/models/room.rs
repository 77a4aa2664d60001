use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-(room, date) stock. Mutated only by the guarded decrement or by an
/// explicit credit during release/expiry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoomAvailability {
    pub room_id: Uuid,
    pub availability_date: NaiveDate,
    pub available_count: i32,
    pub price_per_night: Decimal,
    pub version: i64,
}

/// Expands a stay into its nightly dates: the half-open range
/// `[check_in, check_out)`, ascending. Check-out day is not a night.
pub fn nightly_dates(check_in: NaiveDate, check_out: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = check_in;
    while current < check_out {
        dates.push(current);
        current = current.succ_opt().expect("date overflow");
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn two_night_stay_excludes_checkout_day() {
        let dates = nightly_dates(date(2026, 2, 1), date(2026, 2, 3));
        assert_eq!(dates, vec![date(2026, 2, 1), date(2026, 2, 2)]);
    }

    #[test]
    fn dates_ascend_across_month_boundary() {
        let dates = nightly_dates(date(2026, 1, 30), date(2026, 2, 2));
        assert_eq!(
            dates,
            vec![date(2026, 1, 30), date(2026, 1, 31), date(2026, 2, 1)]
        );
    }

    #[test]
    fn empty_or_inverted_range_has_no_nights() {
        assert!(nightly_dates(date(2026, 2, 1), date(2026, 2, 1)).is_empty());
        assert!(nightly_dates(date(2026, 2, 3), date(2026, 2, 1)).is_empty());
    }
}
