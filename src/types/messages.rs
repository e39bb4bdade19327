//! NATS message types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ServiceConfiguration;

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> Request<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

// ==========================================================================
// Billing payloads
// ==========================================================================

/// Preview or apply a service change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceChangeRequest {
    pub subscription_id: Uuid,
    pub new_configuration: ServiceConfiguration,
    pub effective_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBillingRequest {
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalBillingRequest {
    pub subscription_id: Uuid,
    pub cancellation_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseRequest {
    pub subscription_id: Uuid,
    pub pause_start_date: NaiveDate,
    pub pause_end_date: NaiveDate,
}

// ==========================================================================
// Route payloads
// ==========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptimizeRequest {
    pub field_tech_id: Uuid,
    pub date: NaiveDate,
    /// Optional explicit job set; defaults to the tech's jobs for `date`.
    #[serde(default)]
    pub job_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReoptimizeRequest {
    pub route_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextJobRequest {
    pub field_tech_id: Uuid,
    #[serde(default)]
    pub current_job_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_assigns_fresh_id() {
        let payload = NextBillingRequest { subscription_id: Uuid::new_v4() };
        let request = Request::new(payload.clone());
        assert_ne!(request.id, Uuid::nil());
        assert_eq!(request.payload.subscription_id, payload.subscription_id);

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("payload").and_then(|p| p.get("subscriptionId")).is_some());
    }

    #[test]
    fn test_success_response_echoes_request_id() {
        let request = Request::new(NextBillingRequest { subscription_id: Uuid::new_v4() });
        let response = SuccessResponse::new(request.id, 42);
        assert_eq!(response.id, request.id);
    }
}
