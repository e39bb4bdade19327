//! Service plan queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::ServicePlan;

/// Get a service plan by ID
pub async fn get_plan(pool: &PgPool, plan_id: Uuid) -> Result<Option<ServicePlan>> {
    let plan = sqlx::query_as::<_, ServicePlan>(
        r#"
        SELECT id, name, base_price, active, created_at, updated_at
        FROM service_plans
        WHERE id = $1
        "#,
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;

    Ok(plan)
}
