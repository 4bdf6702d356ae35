use chrono::NaiveDate;
use serde::Serialize;

use crate::services::calendar::DateRange;
use crate::services::dates::iter_days;
use crate::services::pricing::{price_for_date, PricingDay};

/// One line item per calendar day of the event span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyAmount {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Valuation context of the rental address, read-only for a booking session.
/// `avarage_value` matches the persisted column name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyPlan {
    pub avarage_value: f64,
    pub is_custom_plan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationWarning {
    /// A day in the range had no market price; the event was switched to
    /// manual valuation and the user must supply a rate and documents.
    PricingGap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub manual_valuation: bool,
    pub rental_amount: f64,
    pub daily_amounts: Vec<DailyAmount>,
    pub warning: Option<ValuationWarning>,
}

/// Re-derive `rental_amount` and `daily_amounts` for the confirmed range.
///
/// Branch priority: manual valuation first, then the custom-plan flat rate,
/// then market pricing. A pricing gap on the market branch forces the mode
/// to manual, zeroes the amount, clears the day lines, and reports a
/// `PricingGap` warning instead of failing silently.
pub fn reconcile(
    range: DateRange,
    plan: &PropertyPlan,
    pricing: &[PricingDay],
    manual_valuation: bool,
    daily_rate: Option<f64>,
) -> Reconciliation {
    let start = range.from;
    let end = range.end();

    if manual_valuation {
        let Some(rate) = daily_rate else {
            return Reconciliation {
                manual_valuation: true,
                rental_amount: 0.0,
                daily_amounts: Vec::new(),
                warning: None,
            };
        };
        return Reconciliation {
            manual_valuation: true,
            warning: None,
            ..uniform_rate(start, end, rate)
        };
    }

    if plan.is_custom_plan {
        return Reconciliation {
            manual_valuation: false,
            warning: None,
            ..uniform_rate(start, end, plan.avarage_value)
        };
    }

    let mut daily_amounts = Vec::with_capacity((end - start).num_days() as usize + 1);
    let mut total = 0.0;
    for day in iter_days(start, end) {
        let price = price_for_date(day, pricing);
        if price <= 0.0 {
            return Reconciliation {
                manual_valuation: true,
                rental_amount: 0.0,
                daily_amounts: Vec::new(),
                warning: Some(ValuationWarning::PricingGap),
            };
        }
        total += price;
        daily_amounts.push(DailyAmount { date: day, amount: price });
    }

    Reconciliation {
        manual_valuation: false,
        rental_amount: total,
        daily_amounts,
        warning: None,
    }
}

/// Recompute for a daily-rate change while in manual mode. Returns `None`
/// when the date range is not fixed yet; the caller keeps the raw rate for
/// later and skips day-line regeneration.
pub fn apply_daily_rate(rate: f64, range: Option<DateRange>) -> Option<Reconciliation> {
    let range = range?;
    Some(Reconciliation {
        manual_valuation: true,
        warning: None,
        ..uniform_rate(range.from, range.end(), rate)
    })
}

fn uniform_rate(start: NaiveDate, end: NaiveDate, rate: f64) -> Reconciliation {
    let daily_amounts: Vec<DailyAmount> = iter_days(start, end)
        .map(|date| DailyAmount { date, amount: rate })
        .collect();
    Reconciliation {
        manual_valuation: false,
        rental_amount: rate * daily_amounts.len() as f64,
        daily_amounts,
        warning: None,
    }
}
