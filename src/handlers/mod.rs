//! NATS message handlers

pub mod billing;
pub mod ping;
pub mod route;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::maps::{create_distance_provider, DistanceProvider};
use crate::services::payments::{create_payment_gateway, PaymentGateway};

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    // Shared provider clients
    let distance_provider: Arc<dyn DistanceProvider> =
        Arc::from(create_distance_provider(config.google_maps()));
    info!("Distance provider initialized: {}", distance_provider.name());

    let payment_gateway: Arc<dyn PaymentGateway> =
        Arc::from(create_payment_gateway(config.stripe()));
    info!("Payment gateway initialized: {}", payment_gateway.name());

    // Subscribe to all subjects
    let ping_sub = client.subscribe("scoopunit.ping").await?;
    let change_preview_sub = client.subscribe("scoopunit.billing.change.preview").await?;
    let change_apply_sub = client.subscribe("scoopunit.billing.change.apply").await?;
    let next_billing_sub = client.subscribe("scoopunit.billing.next").await?;
    let final_billing_sub = client.subscribe("scoopunit.billing.final").await?;
    let pause_sub = client.subscribe("scoopunit.billing.pause").await?;
    let route_optimize_sub = client.subscribe("scoopunit.route.optimize").await?;
    let route_reoptimize_sub = client.subscribe("scoopunit.route.reoptimize").await?;
    let next_job_sub = client.subscribe("scoopunit.route.next-job").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_ping = client.clone();
    let client_change_preview = client.clone();
    let client_change_apply = client.clone();
    let client_next_billing = client.clone();
    let client_final_billing = client.clone();
    let client_pause = client.clone();
    let client_route_optimize = client.clone();
    let client_route_reoptimize = client.clone();
    let client_next_job = client.clone();

    let pool_change_preview = pool.clone();
    let pool_change_apply = pool.clone();
    let pool_next_billing = pool.clone();
    let pool_final_billing = pool.clone();
    let pool_pause = pool.clone();
    let pool_route_optimize = pool.clone();
    let pool_route_reoptimize = pool.clone();
    let pool_next_job = pool.clone();

    let gateway_pause = Arc::clone(&payment_gateway);
    let provider_optimize = Arc::clone(&distance_provider);
    let provider_reoptimize = Arc::clone(&distance_provider);
    let provider_next_job = Arc::clone(&distance_provider);

    let ping_handle = tokio::spawn(async move {
        if let Err(e) = ping::handle_ping(client_ping, ping_sub).await {
            error!("Ping handler error: {}", e);
        }
    });

    let change_preview_handle = tokio::spawn(async move {
        if let Err(e) =
            billing::handle_change_preview(client_change_preview, change_preview_sub, pool_change_preview).await
        {
            error!("Change preview handler error: {}", e);
        }
    });

    let change_apply_handle = tokio::spawn(async move {
        if let Err(e) =
            billing::handle_change_apply(client_change_apply, change_apply_sub, pool_change_apply).await
        {
            error!("Change apply handler error: {}", e);
        }
    });

    let next_billing_handle = tokio::spawn(async move {
        if let Err(e) =
            billing::handle_next_billing(client_next_billing, next_billing_sub, pool_next_billing).await
        {
            error!("Next billing handler error: {}", e);
        }
    });

    let final_billing_handle = tokio::spawn(async move {
        if let Err(e) =
            billing::handle_final_billing(client_final_billing, final_billing_sub, pool_final_billing).await
        {
            error!("Final billing handler error: {}", e);
        }
    });

    let pause_handle = tokio::spawn(async move {
        if let Err(e) =
            billing::handle_pause(client_pause, pause_sub, pool_pause, gateway_pause).await
        {
            error!("Pause handler error: {}", e);
        }
    });

    let route_optimize_handle = tokio::spawn(async move {
        if let Err(e) = route::handle_optimize(
            client_route_optimize,
            route_optimize_sub,
            pool_route_optimize,
            provider_optimize,
        )
        .await
        {
            error!("Route optimize handler error: {}", e);
        }
    });

    let route_reoptimize_handle = tokio::spawn(async move {
        if let Err(e) = route::handle_reoptimize(
            client_route_reoptimize,
            route_reoptimize_sub,
            pool_route_reoptimize,
            provider_reoptimize,
        )
        .await
        {
            error!("Route reoptimize handler error: {}", e);
        }
    });

    let next_job_handle = tokio::spawn(async move {
        if let Err(e) =
            route::handle_next_job(client_next_job, next_job_sub, pool_next_job, provider_next_job).await
        {
            error!("Next job handler error: {}", e);
        }
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = change_preview_handle => {
            error!("Change preview handler finished: {:?}", result);
        }
        result = change_apply_handle => {
            error!("Change apply handler finished: {:?}", result);
        }
        result = next_billing_handle => {
            error!("Next billing handler finished: {:?}", result);
        }
        result = final_billing_handle => {
            error!("Final billing handler finished: {:?}", result);
        }
        result = pause_handle => {
            error!("Pause handler finished: {:?}", result);
        }
        result = route_optimize_handle => {
            error!("Route optimize handler finished: {:?}", result);
        }
        result = route_reoptimize_handle => {
            error!("Route reoptimize handler finished: {:?}", result);
        }
        result = next_job_handle => {
            error!("Next job handler finished: {:?}", result);
        }
    }

    Ok(())
}
