//! Route and technician types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Coordinates, RouteStop};

/// Route status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "route_status", rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    InProgress,
    Completed,
}

/// A persisted day route for one technician.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub field_tech_id: Uuid,
    pub route_date: NaiveDate,
    /// Job ids in visiting order.
    pub optimized_order: Json<Vec<Uuid>>,
    pub total_distance_miles: i64,
    pub estimated_duration_minutes: i64,
    pub status: RouteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a route optimization run. Created per request and handed to
/// the persistence layer; never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedRoute {
    pub stops: Vec<RouteStop>,
    pub total_distance_miles: i64,
    pub estimated_duration_minutes: i64,
}

impl OptimizedRoute {
    /// Terminal case for an empty stop set: empty order, zero totals.
    pub fn empty() -> Self {
        Self {
            stops: vec![],
            total_distance_miles: 0,
            estimated_duration_minutes: 0,
        }
    }

    pub fn job_ids(&self) -> Vec<Uuid> {
        self.stops.iter().map(|s| s.job_id).collect()
    }
}

/// Field technician entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FieldTechnician {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FieldTechnician {
    pub fn current_location(&self) -> Option<Coordinates> {
        match (self.current_lat, self.current_lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}
