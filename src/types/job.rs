//! Job types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinates;

/// Default on-site duration when a job has no explicit estimate.
pub const DEFAULT_JOB_DURATION_MINUTES: i32 = 30;

/// Job type (drives route priority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
pub enum JobType {
    /// Same-day callout (e.g. yard must be clear before an event)
    Emergency,
    /// First visit for a new client, usually a heavier cleanup
    Initial,
    /// Regular scheduled visit
    Recurring,
}

impl JobType {
    /// Route priority: 1 = emergency, 2 = initial, 3 = normal.
    /// Priorities 1-2 are always routed before priority 3.
    pub const fn priority(self) -> u8 {
        match self {
            JobType::Emergency => 1,
            JobType::Initial => 2,
            JobType::Recurring => 3,
        }
    }
}

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    InProgress,
    Completed,
    Skipped,
    Cancelled,
}

/// A scheduled service visit. Coordinates are denormalized from the client
/// record at scheduling time so route planning never joins through clients.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub client_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub field_tech_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub job_type: JobType,
    pub status: JobStatus,
    pub estimated_duration_minutes: Option<i32>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn location(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// A stop fed into route ordering. Built from a `Job` with known coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub job_id: Uuid,
    pub location: Coordinates,
    pub estimated_duration_minutes: i32,
    /// 1 = emergency, 2 = initial, 3 = normal
    pub priority: u8,
}

impl RouteStop {
    /// Returns `None` when the job has no usable coordinates; such jobs are
    /// excluded from the route (with a warning) rather than routed to (0, 0).
    /// A negative duration estimate is treated as absent.
    pub fn from_job(job: &Job) -> Option<Self> {
        let location = job.location()?;
        Some(Self {
            job_id: job.id,
            location,
            estimated_duration_minutes: job
                .estimated_duration_minutes
                .filter(|&minutes| minutes >= 0)
                .unwrap_or(DEFAULT_JOB_DURATION_MINUTES),
            priority: job.job_type.priority(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(job_type: JobType, lat: Option<f64>, lng: Option<f64>) -> Job {
        Job {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            subscription_id: None,
            field_tech_id: None,
            scheduled_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            job_type,
            status: JobStatus::Scheduled,
            estimated_duration_minutes: None,
            lat,
            lng,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(JobType::Emergency.priority(), 1);
        assert_eq!(JobType::Initial.priority(), 2);
        assert_eq!(JobType::Recurring.priority(), 3);
    }

    #[test]
    fn test_route_stop_requires_coordinates() {
        assert!(RouteStop::from_job(&job(JobType::Recurring, None, None)).is_none());
        assert!(RouteStop::from_job(&job(JobType::Recurring, Some(47.6), None)).is_none());

        let stop = RouteStop::from_job(&job(JobType::Emergency, Some(47.6), Some(-122.3))).unwrap();
        assert_eq!(stop.priority, 1);
        assert_eq!(stop.estimated_duration_minutes, DEFAULT_JOB_DURATION_MINUTES);
    }

    #[test]
    fn test_route_stop_negative_duration_falls_back_to_default() {
        let mut bad = job(JobType::Recurring, Some(47.6), Some(-122.3));
        bad.estimated_duration_minutes = Some(-30);

        let stop = RouteStop::from_job(&bad).unwrap();
        assert_eq!(stop.estimated_duration_minutes, DEFAULT_JOB_DURATION_MINUTES);

        let mut ok = job(JobType::Recurring, Some(47.6), Some(-122.3));
        ok.estimated_duration_minutes = Some(0);
        assert_eq!(RouteStop::from_job(&ok).unwrap().estimated_duration_minutes, 0);
    }
}
