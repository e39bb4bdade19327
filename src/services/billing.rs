//! Billing aggregation: next-invoice amount and change previews.
//!
//! Like the proration engine, everything here is a pure function over
//! explicit inputs; handlers load pending changes and credits and pass
//! them in.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::services::proration::ProrationResult;
use crate::types::{PendingChange, ProrationType};

/// Next invoice amount with its composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBillingAmount {
    pub base_price: f64,
    /// Σ pending charges − Σ pending credits (signed).
    pub adjustments: f64,
    pub available_credits: f64,
    /// Clamped at zero: credits never produce a negative invoice.
    pub final_amount: f64,
    pub breakdown: NextBillingBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBillingBreakdown {
    pub base: f64,
    pub proration_charges: f64,
    pub proration_credits: f64,
    pub applied_credits: f64,
}

/// Month-over-month effect of a configuration change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextCycleImpact {
    pub current_monthly_price: f64,
    pub new_monthly_price: f64,
    pub monthly_difference: f64,
    pub percentage_change: f64,
}

/// Annualized effect of a configuration change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualImpact {
    pub current_annual_price: f64,
    pub new_annual_price: f64,
    pub annual_difference: f64,
    pub annual_savings: f64,
    pub additional_annual_cost: f64,
}

/// Full preview returned before a change is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPreview {
    pub immediate_proration: ProrationResult,
    pub next_cycle_impact: NextCycleImpact,
    pub annual_impact: AnnualImpact,
    pub effective_date: NaiveDate,
    pub summary: ChangeSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub immediate_charge: f64,
    pub immediate_credit: f64,
    pub monthly_change: f64,
    pub annual_change: f64,
    pub recommendation: String,
}

/// Combine base price, pending prorations and credits into the next
/// invoice amount. Never negative.
pub fn next_billing_amount(
    base_price: f64,
    pending_changes: &[PendingChange],
    available_credits: f64,
) -> NextBillingAmount {
    let proration_charges: f64 = pending_changes
        .iter()
        .filter(|c| c.proration_type == ProrationType::Charge)
        .map(|c| c.proration_amount)
        .sum();
    let proration_credits: f64 = pending_changes
        .iter()
        .filter(|c| c.proration_type == ProrationType::Credit)
        .map(|c| c.proration_amount)
        .sum();

    let adjustments = proration_charges - proration_credits;
    let final_amount = (base_price + adjustments - available_credits).max(0.0);

    NextBillingAmount {
        base_price,
        adjustments,
        available_credits,
        final_amount,
        breakdown: NextBillingBreakdown {
            base: base_price,
            proration_charges,
            proration_credits,
            applied_credits: available_credits.min(base_price + adjustments),
        },
    }
}

pub fn next_cycle_impact(current_price: f64, new_price: f64) -> NextCycleImpact {
    let monthly_difference = new_price - current_price;
    NextCycleImpact {
        current_monthly_price: current_price,
        new_monthly_price: new_price,
        monthly_difference,
        percentage_change: if current_price > 0.0 {
            monthly_difference / current_price * 100.0
        } else {
            0.0
        },
    }
}

pub fn annual_impact(monthly: &NextCycleImpact) -> AnnualImpact {
    let annual_difference = monthly.monthly_difference * 12.0;
    AnnualImpact {
        current_annual_price: monthly.current_monthly_price * 12.0,
        new_annual_price: monthly.new_monthly_price * 12.0,
        annual_difference,
        annual_savings: (-annual_difference).max(0.0),
        additional_annual_cost: annual_difference.max(0.0),
    }
}

/// Compose immediate proration, monthly delta and annualized delta into a
/// preview with a recommendation keyed on the sign of the annual delta.
pub fn preview_billing_changes(
    immediate_proration: ProrationResult,
    current_price: f64,
    new_price: f64,
    effective_date: NaiveDate,
) -> BillingPreview {
    let monthly = next_cycle_impact(current_price, new_price);
    let annual = annual_impact(&monthly);

    let summary = ChangeSummary {
        immediate_charge: match immediate_proration.proration_type {
            ProrationType::Charge => immediate_proration.proration_amount,
            ProrationType::Credit => 0.0,
        },
        immediate_credit: match immediate_proration.proration_type {
            ProrationType::Credit => immediate_proration.proration_amount,
            ProrationType::Charge => 0.0,
        },
        monthly_change: monthly.monthly_difference,
        annual_change: annual.annual_difference,
        recommendation: recommendation(&annual),
    };

    BillingPreview {
        immediate_proration,
        next_cycle_impact: monthly,
        annual_impact: annual,
        effective_date,
        summary,
    }
}

fn recommendation(annual: &AnnualImpact) -> String {
    if annual.annual_savings > 0.0 {
        format!(
            "This change will save you ${:.2} annually.",
            annual.annual_savings
        )
    } else if annual.additional_annual_cost > 0.0 {
        format!(
            "This upgrade will cost an additional ${:.2} annually but provides enhanced service.",
            annual.additional_annual_cost
        )
    } else {
        "This change will not affect your annual cost.".to_string()
    }
}
