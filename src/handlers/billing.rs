//! Billing handlers for NATS messages
//!
//! Handlers load subscriptions, plan prices and job counts, then defer the
//! arithmetic to the pure functions in `services::billing` and
//! `services::proration`.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::error::{ServiceError, ServiceResult};
use crate::services::billing::{self, BillingPreview, NextBillingAmount};
use crate::services::calendar::billing_cycle_of;
use crate::services::payments::PaymentGateway;
use crate::services::pricing::monthly_price_for;
use crate::services::proration::{
    calculate_final_billing, calculate_pause_adjustments, calculate_service_change, FinalBilling,
    PauseAdjustments,
};
use crate::types::{
    ErrorResponse, FinalBillingRequest, NextBillingRequest, PauseRequest, PendingChange, Request,
    ServiceChangeRequest, SubscriptionStatus, SuccessResponse,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeAppliedResponse {
    change: PendingChange,
    preview: BillingPreview,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PauseResponse {
    adjustments: PauseAdjustments,
    status: SubscriptionStatus,
}

/// Compute the full change preview for a subscription.
async fn preview_change(
    pool: &PgPool,
    payload: &ServiceChangeRequest,
) -> ServiceResult<BillingPreview> {
    let subscription = queries::subscription::get_subscription(pool, payload.subscription_id)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("subscription {}", payload.subscription_id))
        })?;

    let current_config = &subscription.service_configuration.0;
    let current_price = monthly_price_for(pool, current_config).await?;
    let new_price = monthly_price_for(pool, &payload.new_configuration).await?;

    let cycle = billing_cycle_of(&subscription);
    let remaining_services = queries::job::count_scheduled_services(
        pool,
        subscription.id,
        payload.effective_date,
        cycle.end,
    )
    .await?;

    let proration = calculate_service_change(
        current_config,
        &payload.new_configuration,
        current_price,
        new_price,
        &cycle,
        payload.effective_date,
        remaining_services,
    )?;

    Ok(billing::preview_billing_changes(
        proration,
        current_price,
        new_price,
        payload.effective_date,
    ))
}

/// Handle billing.change.preview messages
pub async fn handle_change_preview(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received billing.change.preview message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ServiceChangeRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match preview_change(&pool, &request.payload).await {
            Ok(preview) => {
                let response = SuccessResponse::new(request.id, preview);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to preview service change: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Preview the change, then record it for the next invoice.
async fn apply_change(
    pool: &PgPool,
    payload: &ServiceChangeRequest,
) -> ServiceResult<ChangeAppliedResponse> {
    let preview = preview_change(pool, payload).await?;

    let change = queries::subscription::insert_pending_change(
        pool,
        payload.subscription_id,
        &payload.new_configuration,
        preview.immediate_proration.proration_amount,
        preview.immediate_proration.proration_type,
        payload.effective_date,
    )
    .await?;

    info!(
        "Recorded {} of ${:.2} for subscription {}",
        change.proration_type.as_str(),
        change.proration_amount,
        payload.subscription_id
    );

    Ok(ChangeAppliedResponse { change, preview })
}

/// Handle billing.change.apply messages
pub async fn handle_change_apply(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received billing.change.apply message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ServiceChangeRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match apply_change(&pool, &request.payload).await {
            Ok(applied) => {
                let response = SuccessResponse::new(request.id, applied);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to apply service change: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

async fn next_billing(pool: &PgPool, subscription_id: Uuid) -> ServiceResult<NextBillingAmount> {
    let subscription = queries::subscription::get_subscription(pool, subscription_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("subscription {}", subscription_id)))?;

    let base_price = monthly_price_for(pool, &subscription.service_configuration.0).await?;
    let pending = queries::subscription::get_pending_changes(pool, subscription_id).await?;
    let credits = queries::subscription::get_available_credits(pool, subscription_id).await?;

    Ok(billing::next_billing_amount(base_price, &pending, credits))
}

/// Handle billing.next messages
pub async fn handle_next_billing(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received billing.next message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<NextBillingRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match next_billing(&pool, request.payload.subscription_id).await {
            Ok(amount) => {
                let response = SuccessResponse::new(request.id, amount);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to compute next billing amount: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

async fn final_billing(
    pool: &PgPool,
    payload: &FinalBillingRequest,
) -> ServiceResult<FinalBilling> {
    let subscription = queries::subscription::get_subscription(pool, payload.subscription_id)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("subscription {}", payload.subscription_id))
        })?;

    let monthly_price = monthly_price_for(pool, &subscription.service_configuration.0).await?;
    let cycle = billing_cycle_of(&subscription);

    let services_provided = queries::job::count_completed_services(
        pool,
        subscription.id,
        cycle.start,
        payload.cancellation_date,
    )
    .await?;
    let scheduled_services = queries::job::count_scheduled_services(
        pool,
        subscription.id,
        payload.cancellation_date,
        cycle.end,
    )
    .await?;
    let outstanding = queries::invoice::outstanding_charges(pool, subscription.id).await?;

    calculate_final_billing(
        monthly_price,
        &cycle,
        payload.cancellation_date,
        services_provided,
        scheduled_services,
        outstanding,
    )
}

/// Handle billing.final messages
pub async fn handle_final_billing(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received billing.final message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<FinalBillingRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match final_billing(&pool, &request.payload).await {
            Ok(billing) => {
                let response = SuccessResponse::new(request.id, billing);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to compute final billing: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Compute the pause credit, record it, pause the provider subscription
/// (best effort) and mark the subscription paused.
async fn pause_subscription(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    payload: &PauseRequest,
) -> ServiceResult<PauseResponse> {
    let subscription = queries::subscription::get_subscription(pool, payload.subscription_id)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("subscription {}", payload.subscription_id))
        })?;

    let monthly_price = monthly_price_for(pool, &subscription.service_configuration.0).await?;
    let skipped_services = queries::job::count_scheduled_services(
        pool,
        subscription.id,
        payload.pause_start_date,
        payload.pause_end_date,
    )
    .await?;

    let adjustments = calculate_pause_adjustments(
        monthly_price,
        payload.pause_start_date,
        payload.pause_end_date,
        skipped_services,
    );

    queries::subscription::insert_credit(
        pool,
        subscription.id,
        adjustments.credit_amount,
        "service_pause",
    )
    .await?;

    // Provider pause is best effort: the credit is already recorded locally
    // and the collection pause can be retried out of band.
    if let Some(ref stripe_ref) = subscription.stripe_subscription_id {
        if let Err(e) = gateway.pause_subscription(stripe_ref).await {
            warn!(
                "Failed to pause provider subscription {}: {}",
                stripe_ref, e
            );
        }
    }

    queries::subscription::set_status(pool, subscription.id, SubscriptionStatus::Paused).await?;

    info!(
        "Paused subscription {} ({} days, ${:.2} credit)",
        subscription.id, adjustments.pause_days, adjustments.credit_amount
    );

    Ok(PauseResponse {
        adjustments,
        status: SubscriptionStatus::Paused,
    })
}

/// Handle billing.pause messages
pub async fn handle_pause(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received billing.pause message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<PauseRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match pause_subscription(&pool, gateway.as_ref(), &request.payload).await {
            Ok(paused) => {
                let response = SuccessResponse::new(request.id, paused);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to pause subscription: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
