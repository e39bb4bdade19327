//! Subscription, pending-change and credit queries

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{
    PendingChange, ProrationType, ServiceConfiguration, Subscription, SubscriptionStatus,
};

/// Get a subscription by ID
pub async fn get_subscription(pool: &PgPool, subscription_id: Uuid) -> Result<Option<Subscription>> {
    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT
            id, client_id, service_configuration,
            current_period_start, current_period_end,
            status, stripe_subscription_id, created_at, updated_at
        FROM subscriptions
        WHERE id = $1
        "#,
    )
    .bind(subscription_id)
    .fetch_optional(pool)
    .await?;

    Ok(subscription)
}

/// Update subscription status
pub async fn set_status(
    pool: &PgPool,
    subscription_id: Uuid,
    status: SubscriptionStatus,
) -> Result<()> {
    sqlx::query("UPDATE subscriptions SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status)
        .bind(subscription_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record a prorated service change awaiting the next invoice
pub async fn insert_pending_change(
    pool: &PgPool,
    subscription_id: Uuid,
    new_configuration: &ServiceConfiguration,
    proration_amount: f64,
    proration_type: ProrationType,
    effective_date: NaiveDate,
) -> Result<PendingChange> {
    let change = sqlx::query_as::<_, PendingChange>(
        r#"
        INSERT INTO subscription_changes (
            id, subscription_id, new_configuration,
            proration_amount, proration_type, effective_date, status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', NOW())
        RETURNING
            id, subscription_id, new_configuration,
            proration_amount, proration_type, effective_date, status, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subscription_id)
    .bind(Json(new_configuration))
    .bind(proration_amount)
    .bind(proration_type)
    .bind(effective_date)
    .fetch_one(pool)
    .await?;

    Ok(change)
}

/// Pending (not yet invoiced) changes for a subscription
pub async fn get_pending_changes(
    pool: &PgPool,
    subscription_id: Uuid,
) -> Result<Vec<PendingChange>> {
    let changes = sqlx::query_as::<_, PendingChange>(
        r#"
        SELECT
            id, subscription_id, new_configuration,
            proration_amount, proration_type, effective_date, status, created_at
        FROM subscription_changes
        WHERE subscription_id = $1 AND status = 'pending'
        ORDER BY created_at ASC
        "#,
    )
    .bind(subscription_id)
    .fetch_all(pool)
    .await?;

    Ok(changes)
}

/// Sum of unapplied credits for a subscription
pub async fn get_available_credits(pool: &PgPool, subscription_id: Uuid) -> Result<f64> {
    let total: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT SUM(amount)
        FROM subscription_credits
        WHERE subscription_id = $1 AND applied = FALSE
        "#,
    )
    .bind(subscription_id)
    .fetch_one(pool)
    .await?;

    Ok(total.unwrap_or(0.0))
}

/// Record a credit (e.g. from a pause) to apply on the next invoice
pub async fn insert_credit(
    pool: &PgPool,
    subscription_id: Uuid,
    amount: f64,
    reason: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO subscription_credits (id, subscription_id, amount, reason, applied, created_at)
        VALUES ($1, $2, $3, $4, FALSE, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subscription_id)
    .bind(amount)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(())
}
