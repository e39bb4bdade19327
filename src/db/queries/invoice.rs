//! Invoice queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Invoice;

/// Unpaid invoices for a subscription (draft and open)
pub async fn get_unpaid_invoices(pool: &PgPool, subscription_id: Uuid) -> Result<Vec<Invoice>> {
    let invoices = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, subscription_id, total_amount, status, due_date, created_at
        FROM invoices
        WHERE subscription_id = $1 AND status IN ('draft', 'open')
        ORDER BY created_at ASC
        "#,
    )
    .bind(subscription_id)
    .fetch_all(pool)
    .await?;

    Ok(invoices)
}

/// Sum of unpaid invoice totals for a subscription
pub async fn outstanding_charges(pool: &PgPool, subscription_id: Uuid) -> Result<f64> {
    let invoices = get_unpaid_invoices(pool, subscription_id).await?;
    Ok(invoices.iter().map(|i| i.total_amount).sum())
}
