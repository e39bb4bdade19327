//! Job queries

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Job;

const JOB_COLUMNS: &str = r#"
        id, client_id, subscription_id, field_tech_id,
        scheduled_date, job_type, status, estimated_duration_minutes,
        lat, lng, created_at, updated_at
"#;

/// Count still-scheduled visits for a subscription in a date window
pub async fn count_scheduled_services(
    pool: &PgPool,
    subscription_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM jobs
        WHERE subscription_id = $1
          AND status = 'scheduled'
          AND scheduled_date >= $2
          AND scheduled_date <= $3
        "#,
    )
    .bind(subscription_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Count completed visits for a subscription in a date window
pub async fn count_completed_services(
    pool: &PgPool,
    subscription_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM jobs
        WHERE subscription_id = $1
          AND status = 'completed'
          AND scheduled_date >= $2
          AND scheduled_date <= $3
        "#,
    )
    .bind(subscription_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Jobs assigned to a technician for a given day (scheduled only)
pub async fn get_jobs_by_tech_and_date(
    pool: &PgPool,
    field_tech_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<Job>> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM jobs \
         WHERE field_tech_id = $1 AND scheduled_date = $2 AND status = 'scheduled' \
         ORDER BY created_at ASC"
    );

    let jobs = sqlx::query_as::<_, Job>(&sql)
        .bind(field_tech_id)
        .bind(date)
        .fetch_all(pool)
        .await?;

    Ok(jobs)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<Job>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");

    let job = sqlx::query_as::<_, Job>(&sql)
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    Ok(job)
}

/// Jobs by explicit id set, in the order returned by the database.
/// Callers that need a specific order must re-sort.
pub async fn get_jobs_by_ids(pool: &PgPool, job_ids: &[Uuid]) -> Result<Vec<Job>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ANY($1)");

    let jobs = sqlx::query_as::<_, Job>(&sql)
        .bind(job_ids)
        .fetch_all(pool)
        .await?;

    Ok(jobs)
}
