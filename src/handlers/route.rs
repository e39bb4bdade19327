//! Route handlers for NATS messages
//!
//! Planning loads the technician and their jobs, runs the ordering over a
//! distance matrix from the configured provider, and persists the result.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::error::{ServiceError, ServiceResult};
use crate::services::maps::{Directions, DistanceProvider};
use crate::services::route_optimizer::optimize_route;
use crate::types::{
    Coordinates, ErrorResponse, FieldTechnician, Job, JobStatus, NextJobRequest, Request, Route,
    RouteOptimizeRequest, RouteReoptimizeRequest, RouteStop, SuccessResponse,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoutePlanResponse {
    route: Route,
    stops: Vec<RouteStop>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NextJobResponse {
    route_complete: bool,
    next_job: Option<Job>,
    directions: Option<Directions>,
    estimated_arrival_minutes: Option<i64>,
}

impl NextJobResponse {
    fn complete() -> Self {
        Self {
            route_complete: true,
            next_job: None,
            directions: None,
            estimated_arrival_minutes: None,
        }
    }
}

fn technician_start(tech: &FieldTechnician) -> ServiceResult<Coordinates> {
    tech.current_location().ok_or_else(|| {
        ServiceError::not_found(format!("current location for technician {}", tech.id))
    })
}

/// Jobs with coordinates become stops; the rest are excluded with a warning.
fn stops_from_jobs(jobs: &[Job]) -> Vec<RouteStop> {
    jobs.iter()
        .filter_map(|job| {
            let stop = RouteStop::from_job(job);
            if stop.is_none() {
                warn!("Skipping job {} without coordinates", job.id);
            }
            stop
        })
        .collect()
}

async fn plan_route(
    pool: &PgPool,
    provider: &dyn DistanceProvider,
    payload: &RouteOptimizeRequest,
) -> ServiceResult<RoutePlanResponse> {
    let tech = queries::route::get_technician(pool, payload.field_tech_id)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("technician {}", payload.field_tech_id))
        })?;
    let start = technician_start(&tech)?;

    let jobs = match &payload.job_ids {
        Some(ids) => queries::job::get_jobs_by_ids(pool, ids).await?,
        None => queries::job::get_jobs_by_tech_and_date(pool, tech.id, payload.date).await?,
    };
    let stops = stops_from_jobs(&jobs);

    let optimized = optimize_route(provider, start, stops).await?;
    let route = queries::route::save_route(
        pool,
        tech.id,
        payload.date,
        &optimized.job_ids(),
        optimized.total_distance_miles,
        optimized.estimated_duration_minutes,
    )
    .await?;

    info!(
        "Planned route {} for technician {}: {} stops, {} mi",
        route.id,
        tech.id,
        optimized.stops.len(),
        optimized.total_distance_miles
    );

    Ok(RoutePlanResponse {
        route,
        stops: optimized.stops,
    })
}

/// Handle route.optimize messages
pub async fn handle_optimize(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    provider: Arc<dyn DistanceProvider>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.optimize message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RouteOptimizeRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match plan_route(&pool, provider.as_ref(), &request.payload).await {
            Ok(planned) => {
                let response = SuccessResponse::new(request.id, planned);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to plan route: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Re-run the ordering over the still-scheduled jobs of an existing route
/// from the technician's current position, replacing the stored order.
async fn reoptimize_route(
    pool: &PgPool,
    provider: &dyn DistanceProvider,
    payload: &RouteReoptimizeRequest,
) -> ServiceResult<RoutePlanResponse> {
    let route = queries::route::get_route(pool, payload.route_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("route {}", payload.route_id)))?;

    let tech = queries::route::get_technician(pool, route.field_tech_id)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("technician {}", route.field_tech_id))
        })?;
    let start = technician_start(&tech)?;

    let mut jobs = queries::job::get_jobs_by_ids(pool, &route.optimized_order.0).await?;
    jobs.retain(|j| j.status == JobStatus::Scheduled);
    let stops = stops_from_jobs(&jobs);

    let optimized = optimize_route(provider, start, stops).await?;
    queries::route::update_route_order(
        pool,
        route.id,
        &optimized.job_ids(),
        optimized.total_distance_miles,
        optimized.estimated_duration_minutes,
    )
    .await?;

    let updated = queries::route::get_route(pool, route.id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("route {}", route.id)))?;

    info!(
        "Reoptimized route {}: {} remaining stops",
        updated.id,
        optimized.stops.len()
    );

    Ok(RoutePlanResponse {
        route: updated,
        stops: optimized.stops,
    })
}

/// Handle route.reoptimize messages
pub async fn handle_reoptimize(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    provider: Arc<dyn DistanceProvider>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.reoptimize message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RouteReoptimizeRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match reoptimize_route(&pool, provider.as_ref(), &request.payload).await {
            Ok(planned) => {
                let response = SuccessResponse::new(request.id, planned);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to reoptimize route: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Next stop on today's route with turn-by-turn directions.
///
/// An unknown `current_job_id` (e.g. a job dropped by reoptimization) starts
/// over from the first stop rather than failing.
async fn next_job(
    pool: &PgPool,
    provider: &dyn DistanceProvider,
    payload: &NextJobRequest,
) -> ServiceResult<NextJobResponse> {
    let tech = queries::route::get_technician(pool, payload.field_tech_id)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("technician {}", payload.field_tech_id))
        })?;
    let start = technician_start(&tech)?;

    let today = chrono::Utc::now().date_naive();
    let route = queries::route::get_route_by_tech_and_date(pool, tech.id, today)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("route for technician {} on {}", tech.id, today))
        })?;

    let order = &route.optimized_order.0;
    let next_id = match payload.current_job_id {
        Some(current) => match order.iter().position(|&id| id == current) {
            Some(pos) => order.get(pos + 1).copied(),
            None => order.first().copied(),
        },
        None => order.first().copied(),
    };

    let Some(job_id) = next_id else {
        return Ok(NextJobResponse::complete());
    };

    let job = queries::job::get_job(pool, job_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("job {}", job_id)))?;
    let destination = job
        .location()
        .ok_or_else(|| ServiceError::not_found(format!("coordinates for job {}", job_id)))?;

    let directions = provider.directions(start, destination).await?;
    let estimated_arrival_minutes = (directions.duration_seconds as f64 / 60.0).round() as i64;

    Ok(NextJobResponse {
        route_complete: false,
        next_job: Some(job),
        directions: Some(directions),
        estimated_arrival_minutes: Some(estimated_arrival_minutes),
    })
}

/// Handle route.next-job messages
pub async fn handle_next_job(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    provider: Arc<dyn DistanceProvider>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.next-job message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<NextJobRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match next_job(&pool, provider.as_ref(), &request.payload).await {
            Ok(next) => {
                let response = SuccessResponse::new(request.id, next);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to find next job: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
