use chrono::NaiveDate;
use serde_json::Value;

use crate::services::dates::parse_day_opt;

/// One row of the precomputed market-pricing table for a rental address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingDay {
    pub date: NaiveDate,
    pub price_percentile_90: f64,
    pub median_price_booked: f64,
}

/// Market rate for a calendar day: `price_percentile_90` of the first table
/// entry matching the day key, or `0.0` when the table has no entry. Matching
/// is by calendar day, never by raw timestamp equality.
pub fn price_for_date(date: NaiveDate, table: &[PricingDay]) -> f64 {
    table
        .iter()
        .find(|entry| entry.date == date)
        .map(|entry| entry.price_percentile_90)
        .unwrap_or(0.0)
}

/// Build the in-memory pricing table from `daily_pricing` rows. Rows with an
/// unparseable date are dropped; their absence later triggers the manual
/// fallback rather than a hard failure.
pub fn pricing_table_from_rows(rows: &[Value]) -> Vec<PricingDay> {
    rows.iter()
        .filter_map(|row| {
            let obj = row.as_object()?;
            let date = parse_day_opt(obj.get("date")?.as_str()?)?;
            Some(PricingDay {
                date,
                price_percentile_90: obj
                    .get("price_percentile_90")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                median_price_booked: obj
                    .get("median_price_booked")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{price_for_date, pricing_table_from_rows, PricingDay};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    #[test]
    fn returns_percentile_price_or_zero() {
        let table = vec![
            PricingDay {
                date: day(3, 1),
                price_percentile_90: 410.0,
                median_price_booked: 350.0,
            },
            PricingDay {
                date: day(3, 2),
                price_percentile_90: 395.5,
                median_price_booked: 340.0,
            },
        ];
        assert_eq!(price_for_date(day(3, 2), &table), 395.5);
        assert_eq!(price_for_date(day(3, 3), &table), 0.0);
    }

    #[test]
    fn table_rows_normalize_timestamped_dates() {
        let rows = vec![
            json!({
                "date": "2026-03-01",
                "price_percentile_90": 410.0,
                "median_price_booked": 350.0
            }),
            json!({
                // timezone-shifted payload still lands on March 2nd
                "date": "2026-03-02T00:00:00-05:00",
                "price_percentile_90": 395.5,
                "median_price_booked": 340.0
            }),
            json!({ "date": "garbage", "price_percentile_90": 999.0 }),
        ];
        let table = pricing_table_from_rows(&rows);
        assert_eq!(table.len(), 2);
        assert_eq!(price_for_date(day(3, 1), &table), 410.0);
        assert_eq!(price_for_date(day(3, 2), &table), 395.5);
    }
}
