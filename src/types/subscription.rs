//! Subscription and billing types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// How often a yard gets serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    /// Frequencies this worker does not recognize. Accepted at the boundary
    /// and priced with multiplier 1 (fail-soft); counts as 0 visits/month
    /// in impact math, matching the two lookup tables in billing.
    #[serde(other)]
    Other,
}

impl Frequency {
    /// Billing multiplier applied to the plan base price and each add-on.
    pub const fn multiplier(self) -> f64 {
        match self {
            Frequency::Weekly => 4.0,
            Frequency::Biweekly => 2.0,
            Frequency::Monthly => 1.0,
            Frequency::Other => 1.0,
        }
    }

    /// Expected visits per month, used for service-impact math.
    pub const fn services_per_month(self) -> f64 {
        match self {
            Frequency::Weekly => 4.0,
            Frequency::Biweekly => 2.0,
            Frequency::Monthly => 1.0,
            Frequency::Other => 0.0,
        }
    }

}

/// Optional priced service attached to a base plan (deodorizer spray,
/// litter patrol, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOn {
    pub id: String,
    pub price: f64,
}

/// Immutable value describing a billed service level. Superseded, never
/// mutated, when a change request is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfiguration {
    pub plan_id: Uuid,
    pub frequency: Frequency,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
}

/// Service plan (base price before frequency multiplier)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlan {
    pub id: Uuid,
    pub name: String,
    pub base_price: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    CancellationPending,
    Cancelled,
}

/// Subscription entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub client_id: Uuid,
    pub service_configuration: Json<ServiceConfiguration>,
    pub current_period_start: NaiveDate,
    pub current_period_end: NaiveDate,
    pub status: SubscriptionStatus,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The recurring date range a subscription is billed over.
/// Read-only here; the period boundaries are owned by the billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingCycle {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Direction of a prorated adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "proration_type", rename_all = "snake_case")]
pub enum ProrationType {
    Charge,
    Credit,
}

impl ProrationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProrationType::Charge => "charge",
            ProrationType::Credit => "credit",
        }
    }
}

/// Status of a recorded service change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "change_status", rename_all = "snake_case")]
pub enum ChangeStatus {
    Pending,
    Applied,
    Cancelled,
}

/// A recorded service change awaiting the next invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub new_configuration: Json<ServiceConfiguration>,
    pub proration_amount: f64,
    pub proration_type: ProrationType,
    pub effective_date: NaiveDate,
    pub status: ChangeStatus,
    pub created_at: DateTime<Utc>,
}

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Void,
}

/// Invoice entity (totals only; line items live with the payment provider)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub total_amount: f64,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_multipliers() {
        assert_eq!(Frequency::Weekly.multiplier(), 4.0);
        assert_eq!(Frequency::Biweekly.multiplier(), 2.0);
        assert_eq!(Frequency::Monthly.multiplier(), 1.0);
        // Unrecognized frequency is fail-soft: priced as monthly.
        assert_eq!(Frequency::Other.multiplier(), 1.0);
        assert_eq!(Frequency::Other.services_per_month(), 0.0);
    }

    #[test]
    fn test_frequency_unknown_value_deserializes_to_other() {
        let freq: Frequency = serde_json::from_str("\"quarterly\"").unwrap();
        assert_eq!(freq, Frequency::Other);
    }

    #[test]
    fn test_service_configuration_add_ons_default_empty() {
        let json = format!(
            "{{\"planId\":\"{}\",\"frequency\":\"weekly\"}}",
            Uuid::new_v4()
        );
        let config: ServiceConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(config.frequency, Frequency::Weekly);
        assert!(config.add_ons.is_empty());
    }
}
