//! Route and field technician queries

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{FieldTechnician, Route};

/// Get a field technician by ID
pub async fn get_technician(pool: &PgPool, field_tech_id: Uuid) -> Result<Option<FieldTechnician>> {
    let tech = sqlx::query_as::<_, FieldTechnician>(
        r#"
        SELECT id, name, email, current_lat, current_lng, active, created_at, updated_at
        FROM field_technicians
        WHERE id = $1
        "#,
    )
    .bind(field_tech_id)
    .fetch_optional(pool)
    .await?;

    Ok(tech)
}

/// Persist an optimized route for a technician and date.
/// A technician has at most one route per day, so replanning overwrites.
pub async fn save_route(
    pool: &PgPool,
    field_tech_id: Uuid,
    route_date: NaiveDate,
    optimized_order: &[Uuid],
    total_distance_miles: i64,
    estimated_duration_minutes: i64,
) -> Result<Route> {
    let route = sqlx::query_as::<_, Route>(
        r#"
        INSERT INTO routes (
            id, field_tech_id, route_date, optimized_order,
            total_distance_miles, estimated_duration_minutes, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, 'planned', NOW(), NOW())
        ON CONFLICT (field_tech_id, route_date) DO UPDATE SET
            optimized_order = EXCLUDED.optimized_order,
            total_distance_miles = EXCLUDED.total_distance_miles,
            estimated_duration_minutes = EXCLUDED.estimated_duration_minutes,
            status = 'planned',
            updated_at = NOW()
        RETURNING
            id, field_tech_id, route_date, optimized_order,
            total_distance_miles, estimated_duration_minutes, status, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(field_tech_id)
    .bind(route_date)
    .bind(Json(optimized_order))
    .bind(total_distance_miles)
    .bind(estimated_duration_minutes)
    .fetch_one(pool)
    .await?;

    Ok(route)
}

/// Get a route by ID
pub async fn get_route(pool: &PgPool, route_id: Uuid) -> Result<Option<Route>> {
    let route = sqlx::query_as::<_, Route>(
        r#"
        SELECT
            id, field_tech_id, route_date, optimized_order,
            total_distance_miles, estimated_duration_minutes, status, created_at, updated_at
        FROM routes
        WHERE id = $1
        "#,
    )
    .bind(route_id)
    .fetch_optional(pool)
    .await?;

    Ok(route)
}

/// Today's route for a technician, if one has been planned
pub async fn get_route_by_tech_and_date(
    pool: &PgPool,
    field_tech_id: Uuid,
    route_date: NaiveDate,
) -> Result<Option<Route>> {
    let route = sqlx::query_as::<_, Route>(
        r#"
        SELECT
            id, field_tech_id, route_date, optimized_order,
            total_distance_miles, estimated_duration_minutes, status, created_at, updated_at
        FROM routes
        WHERE field_tech_id = $1 AND route_date = $2
        "#,
    )
    .bind(field_tech_id)
    .bind(route_date)
    .fetch_optional(pool)
    .await?;

    Ok(route)
}

/// Replace the stop order and totals of an existing route
pub async fn update_route_order(
    pool: &PgPool,
    route_id: Uuid,
    optimized_order: &[Uuid],
    total_distance_miles: i64,
    estimated_duration_minutes: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE routes SET
            optimized_order = $1,
            total_distance_miles = $2,
            estimated_duration_minutes = $3,
            updated_at = NOW()
        WHERE id = $4
        "#,
    )
    .bind(Json(optimized_order))
    .bind(total_distance_miles)
    .bind(estimated_duration_minutes)
    .bind(route_id)
    .execute(pool)
    .await?;

    Ok(())
}
