//! Proration engine.
//!
//! Pure, stateless computations over explicit inputs: the handlers load the
//! subscription, plan prices and job counts and pass them in, so every
//! function here can be exercised without a database.
//!
//! Amounts are always non-negative; `ProrationType` carries the direction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;
use crate::services::calendar::{cycle_length_days, days_between, days_remaining_in_month};
use crate::types::{AddOn, BillingCycle, Frequency, ProrationType, ServiceConfiguration};

/// Fixed month length used for the pause daily rate. The surrounding billing
/// flows expect this approximation; do not replace with actual days-in-month.
const PAUSE_MONTH_DAYS: f64 = 30.0;

/// Month length the frequency-impact proportion is scaled against.
const IMPACT_MONTH_DAYS: f64 = 30.0;

// ==========================================================================
// Result types
// ==========================================================================

/// Prorated outcome of a mid-cycle service change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProrationResult {
    pub current_price: f64,
    pub new_price: f64,
    pub price_difference: f64,
    /// Always >= 0; `proration_type` disambiguates direction.
    pub proration_amount: f64,
    pub proration_type: ProrationType,
    pub days_remaining: i64,
    pub total_days_in_cycle: i64,
    pub effective_date: NaiveDate,
    pub service_impact: ServiceImpact,
    pub breakdown: ProrationBreakdown,
}

/// How a change affects the visits actually delivered this cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImpact {
    pub remaining_services: i64,
    pub frequency_change: FrequencyImpact,
    pub add_on_changes: AddOnImpact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyImpact {
    pub current_frequency: Frequency,
    pub new_frequency: Frequency,
    pub current_services_per_month: f64,
    pub new_services_per_month: f64,
    pub service_difference: f64,
    pub additional_services: f64,
    pub removed_services: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnImpact {
    pub added_services: Vec<AddOn>,
    pub removed_services: Vec<AddOn>,
    pub added_cost: f64,
    pub removed_cost: f64,
    pub net_cost_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProrationBreakdown {
    pub current_configuration: ServiceConfiguration,
    pub new_configuration: ServiceConfiguration,
    pub billing_period: BillingPeriodBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPeriodBreakdown {
    pub total_days: i64,
    pub days_remaining: i64,
    pub days_used: i64,
    pub proration_percentage: f64,
}

/// Final billing figures on cancellation. `net_refund` and `final_charges`
/// are mutually exclusive; at most one is positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalBilling {
    pub cancellation_date: NaiveDate,
    pub services_provided: i64,
    pub scheduled_services: i64,
    pub monthly_price: f64,
    pub unused_days: i64,
    pub refund_amount: f64,
    pub outstanding_charges: f64,
    pub net_refund: f64,
    pub final_charges: f64,
}

/// Credit computed for a service pause.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseAdjustments {
    pub pause_start_date: NaiveDate,
    pub pause_end_date: NaiveDate,
    pub pause_days: i64,
    pub skipped_services: i64,
    pub daily_rate: f64,
    pub credit_amount: f64,
    pub applied_to: String,
}

// ==========================================================================
// Core computations
// ==========================================================================

/// Prorate a service change at `effective_date` against the current cycle.
///
/// `remaining_services` is the count of still-scheduled visits between the
/// effective date and the cycle end (loaded by the caller).
pub fn calculate_service_change(
    current: &ServiceConfiguration,
    new: &ServiceConfiguration,
    current_price: f64,
    new_price: f64,
    cycle: &BillingCycle,
    effective_date: NaiveDate,
    remaining_services: i64,
) -> ServiceResult<ProrationResult> {
    let total_days = cycle_length_days(cycle)?;
    let days_remaining = days_between(effective_date, cycle.end);

    let price_difference = new_price - current_price;
    let proration_amount =
        (price_difference * days_remaining as f64 / total_days as f64).abs();
    let proration_type = if price_difference >= 0.0 {
        ProrationType::Charge
    } else {
        ProrationType::Credit
    };

    let service_impact = ServiceImpact {
        remaining_services,
        frequency_change: frequency_impact(current.frequency, new.frequency, effective_date),
        add_on_changes: add_on_impact(&current.add_ons, &new.add_ons, remaining_services),
    };

    Ok(ProrationResult {
        current_price,
        new_price,
        price_difference,
        proration_amount,
        proration_type,
        days_remaining,
        total_days_in_cycle: total_days,
        effective_date,
        service_impact,
        breakdown: ProrationBreakdown {
            current_configuration: current.clone(),
            new_configuration: new.clone(),
            billing_period: BillingPeriodBreakdown {
                total_days,
                days_remaining,
                days_used: total_days - days_remaining,
                proration_percentage: days_remaining as f64 / total_days as f64 * 100.0,
            },
        },
    })
}

/// Day-weighted impact of a frequency change: the per-month visit delta,
/// scaled by how much of the current month remains.
pub fn frequency_impact(
    current: Frequency,
    new: Frequency,
    effective_date: NaiveDate,
) -> FrequencyImpact {
    let current_per_month = current.services_per_month();
    let new_per_month = new.services_per_month();
    let service_difference = new_per_month - current_per_month;

    let days_left = days_remaining_in_month(effective_date) as f64;
    let proportional_change = service_difference * days_left / IMPACT_MONTH_DAYS;

    FrequencyImpact {
        current_frequency: current,
        new_frequency: new,
        current_services_per_month: current_per_month,
        new_services_per_month: new_per_month,
        service_difference,
        additional_services: proportional_change.max(0.0),
        removed_services: (-proportional_change).max(0.0),
    }
}

/// Add-on delta priced over the remaining scheduled visits in the cycle.
pub fn add_on_impact(current: &[AddOn], new: &[AddOn], remaining_services: i64) -> AddOnImpact {
    let added: Vec<AddOn> = new
        .iter()
        .filter(|addon| !current.iter().any(|c| c.id == addon.id))
        .cloned()
        .collect();
    let removed: Vec<AddOn> = current
        .iter()
        .filter(|addon| !new.iter().any(|n| n.id == addon.id))
        .cloned()
        .collect();

    let added_cost: f64 = added.iter().map(|a| a.price * remaining_services as f64).sum();
    let removed_cost: f64 = removed.iter().map(|a| a.price * remaining_services as f64).sum();

    AddOnImpact {
        added_services: added,
        removed_services: removed,
        added_cost,
        removed_cost,
        net_cost_change: added_cost - removed_cost,
    }
}

/// Final billing on cancellation: refund the unused tail of the cycle at the
/// daily rate, then net against outstanding unpaid invoices.
pub fn calculate_final_billing(
    monthly_price: f64,
    cycle: &BillingCycle,
    cancellation_date: NaiveDate,
    services_provided: i64,
    scheduled_services: i64,
    outstanding_charges: f64,
) -> ServiceResult<FinalBilling> {
    let total_days = cycle_length_days(cycle)?;
    let daily_rate = monthly_price / total_days as f64;
    let unused_days = days_between(cancellation_date, cycle.end);
    let refund_amount = (daily_rate * unused_days as f64).max(0.0);

    Ok(FinalBilling {
        cancellation_date,
        services_provided,
        scheduled_services,
        monthly_price,
        unused_days,
        refund_amount,
        outstanding_charges,
        net_refund: (refund_amount - outstanding_charges).max(0.0),
        final_charges: (outstanding_charges - refund_amount).max(0.0),
    })
}

/// Credit for a pause window, at a flat 30-day-month daily rate.
pub fn calculate_pause_adjustments(
    monthly_price: f64,
    pause_start: NaiveDate,
    pause_end: NaiveDate,
    skipped_services: i64,
) -> PauseAdjustments {
    let pause_days = days_between(pause_start, pause_end);
    let daily_rate = monthly_price / PAUSE_MONTH_DAYS;

    PauseAdjustments {
        pause_start_date: pause_start,
        pause_end_date: pause_end,
        pause_days,
        skipped_services,
        daily_rate,
        credit_amount: daily_rate * pause_days as f64,
        applied_to: "next_billing_cycle".to_string(),
    }
}

// ==========================================================================
// Tests
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn config(frequency: Frequency, add_ons: Vec<AddOn>) -> ServiceConfiguration {
        ServiceConfiguration {
            plan_id: Uuid::new_v4(),
            frequency,
            add_ons,
        }
    }

    /// 30-day cycle: June 1 -> July 1.
    fn june_cycle() -> BillingCycle {
        BillingCycle { start: d(2025, 6, 1), end: d(2025, 7, 1) }
    }

    #[test]
    fn test_downgrade_at_midpoint_credits_half_the_difference() {
        // Weekly $35 base -> biweekly: 140 vs 70, 15 of 30 days remaining.
        let current = config(Frequency::Weekly, vec![]);
        let new = config(Frequency::Biweekly, vec![]);

        let result = calculate_service_change(
            &current, &new, 140.0, 70.0, &june_cycle(), d(2025, 6, 16), 2,
        )
        .unwrap();

        assert_eq!(result.days_remaining, 15);
        assert_eq!(result.total_days_in_cycle, 30);
        assert_eq!(result.price_difference, -70.0);
        assert!((result.proration_amount - 35.0).abs() < 1e-9);
        assert_eq!(result.proration_type, ProrationType::Credit);
    }

    #[test]
    fn test_upgrade_is_a_charge() {
        let current = config(Frequency::Biweekly, vec![]);
        let new = config(Frequency::Weekly, vec![]);

        let result = calculate_service_change(
            &current, &new, 70.0, 140.0, &june_cycle(), d(2025, 6, 16), 2,
        )
        .unwrap();

        assert_eq!(result.proration_type, ProrationType::Charge);
        assert!((result.proration_amount - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_price_change_prorates_to_zero() {
        let current = config(Frequency::Weekly, vec![]);
        let new = config(Frequency::Weekly, vec![]);

        let result = calculate_service_change(
            &current, &new, 140.0, 140.0, &june_cycle(), d(2025, 6, 10), 3,
        )
        .unwrap();

        assert_eq!(result.proration_amount, 0.0);
        // Zero difference reports as a (zero) charge.
        assert_eq!(result.proration_type, ProrationType::Charge);
    }

    #[test]
    fn test_proration_amount_never_negative() {
        let current = config(Frequency::Weekly, vec![]);
        let new = config(Frequency::Monthly, vec![]);

        for day in [1, 5, 16, 28] {
            let result = calculate_service_change(
                &current, &new, 140.0, 35.0, &june_cycle(), d(2025, 6, day), 1,
            )
            .unwrap();
            assert!(result.proration_amount >= 0.0);
            assert_eq!(result.proration_type, ProrationType::Credit);
        }
    }

    #[test]
    fn test_zero_length_cycle_is_rejected() {
        let cycle = BillingCycle { start: d(2025, 6, 1), end: d(2025, 6, 1) };
        let cfg = config(Frequency::Weekly, vec![]);

        let err = calculate_service_change(&cfg, &cfg, 140.0, 140.0, &cycle, d(2025, 6, 1), 0)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidBillingCycle(_)));
    }

    #[test]
    fn test_breakdown_percentages() {
        let cfg = config(Frequency::Weekly, vec![]);
        let result = calculate_service_change(
            &cfg, &cfg, 140.0, 140.0, &june_cycle(), d(2025, 6, 16), 2,
        )
        .unwrap();

        let period = &result.breakdown.billing_period;
        assert_eq!(period.days_used, 15);
        assert!((period.proration_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_impact_scaled_by_month_remainder() {
        // Biweekly (2/mo) -> weekly (4/mo) with 15 days left in June:
        // +2 visits × 15/30 = +1 visit.
        let impact = frequency_impact(Frequency::Biweekly, Frequency::Weekly, d(2025, 6, 15));
        assert_eq!(impact.service_difference, 2.0);
        assert!((impact.additional_services - 1.0).abs() < 1e-9);
        assert_eq!(impact.removed_services, 0.0);
    }

    #[test]
    fn test_frequency_impact_downgrade_reports_removed() {
        let impact = frequency_impact(Frequency::Weekly, Frequency::Monthly, d(2025, 6, 15));
        assert_eq!(impact.service_difference, -3.0);
        assert_eq!(impact.additional_services, 0.0);
        assert!((impact.removed_services - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_add_on_impact_prices_over_remaining_visits() {
        let deodorizer = AddOn { id: "deodorizer".into(), price: 5.0 };
        let patrol = AddOn { id: "litter-patrol".into(), price: 8.0 };

        let impact = add_on_impact(
            std::slice::from_ref(&patrol),
            std::slice::from_ref(&deodorizer),
            4,
        );

        assert_eq!(impact.added_services, vec![deodorizer]);
        assert_eq!(impact.removed_services, vec![patrol]);
        assert_eq!(impact.added_cost, 20.0);
        assert_eq!(impact.removed_cost, 32.0);
        assert_eq!(impact.net_cost_change, -12.0);
    }

    #[test]
    fn test_final_billing_refund_only() {
        // $120 over a 30-day cycle, cancelled with 10 days left, nothing owed.
        let billing = calculate_final_billing(
            120.0, &june_cycle(), d(2025, 6, 21), 3, 1, 0.0,
        )
        .unwrap();

        assert_eq!(billing.unused_days, 10);
        assert!((billing.refund_amount - 40.0).abs() < 1e-9);
        assert!((billing.net_refund - 40.0).abs() < 1e-9);
        assert_eq!(billing.final_charges, 0.0);
    }

    #[test]
    fn test_final_billing_outstanding_exceeds_refund() {
        let billing = calculate_final_billing(
            120.0, &june_cycle(), d(2025, 6, 21), 3, 1, 100.0,
        )
        .unwrap();

        assert_eq!(billing.net_refund, 0.0);
        assert!((billing.final_charges - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_final_billing_never_both_positive() {
        for outstanding in [0.0, 10.0, 40.0, 75.0, 200.0] {
            let billing = calculate_final_billing(
                120.0, &june_cycle(), d(2025, 6, 21), 3, 1, outstanding,
            )
            .unwrap();
            assert!(
                !(billing.net_refund > 0.0 && billing.final_charges > 0.0),
                "both positive at outstanding {}",
                outstanding
            );
        }
    }

    #[test]
    fn test_final_billing_zero_cycle_rejected() {
        let cycle = BillingCycle { start: d(2025, 6, 1), end: d(2025, 6, 1) };
        assert!(calculate_final_billing(120.0, &cycle, d(2025, 6, 1), 0, 0, 0.0).is_err());
    }

    #[test]
    fn test_pause_uses_flat_thirty_day_month() {
        // $90/month paused for 10 days: rate is 90/30 regardless of the
        // actual month length.
        let adj = calculate_pause_adjustments(90.0, d(2025, 2, 1), d(2025, 2, 11), 2);
        assert_eq!(adj.pause_days, 10);
        assert!((adj.daily_rate - 3.0).abs() < 1e-9);
        assert!((adj.credit_amount - 30.0).abs() < 1e-9);
        assert_eq!(adj.skipped_services, 2);
        assert_eq!(adj.applied_to, "next_billing_cycle");
    }
}
