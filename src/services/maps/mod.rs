//! Distance/duration matrices and directions from an external mapping
//! provider.
//!
//! Uses Google Maps in production, a haversine-based mock otherwise.

mod google;

pub use google::{GoogleMapsClient, GoogleMapsConfig};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::services::geo::haversine_distance;
use crate::types::Coordinates;

/// One origin→destination leg of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixLeg {
    pub distance_meters: u64,
    pub duration_seconds: u64,
}

impl MatrixLeg {
    pub const ZERO: MatrixLeg = MatrixLeg { distance_meters: 0, duration_seconds: 0 };
}

/// Square matrix over `{start} ∪ stops`; index 0 is the start location.
///
/// Cells the provider failed to resolve stay `None`. Consulting such a cell
/// is an `IncompleteDistanceData` error. A defaulted 0 would make that stop
/// spuriously "nearest".
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    cells: Vec<Vec<Option<MatrixLeg>>>,
    size: usize,
}

impl DistanceMatrix {
    pub fn empty() -> Self {
        Self { cells: vec![], size: 0 }
    }

    /// New matrix with a zero diagonal and every other cell unresolved.
    pub fn new(size: usize) -> Self {
        let mut cells = vec![vec![None; size]; size];
        for (i, row) in cells.iter_mut().enumerate() {
            row[i] = Some(MatrixLeg::ZERO);
        }
        Self { cells, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set(&mut self, from: usize, to: usize, leg: MatrixLeg) {
        self.cells[from][to] = Some(leg);
    }

    /// Leg from `from` to `to`, failing on unresolved cells.
    pub fn leg(&self, from: usize, to: usize) -> ServiceResult<MatrixLeg> {
        self.cells[from][to].ok_or_else(|| {
            ServiceError::IncompleteDistanceData(format!(
                "no usable matrix cell {} -> {}",
                from, to
            ))
        })
    }
}

/// A single navigation step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionStep {
    pub instruction: String,
    pub distance_meters: u64,
    pub duration_seconds: u64,
}

/// Directions between two points.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Directions {
    pub distance_meters: u64,
    pub duration_seconds: u64,
    pub steps: Vec<DirectionStep>,
    pub polyline: Option<String>,
}

/// Mapping provider abstraction (Google Maps, mock, ...).
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    /// Full distance/duration matrix for a list of locations.
    /// First location is the technician's start position by convention.
    async fn distance_matrix(&self, locations: &[Coordinates]) -> ServiceResult<DistanceMatrix>;

    /// Driving directions between two points.
    async fn directions(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> ServiceResult<Directions>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Mock provider for tests and keyless development.
/// Estimates road distance as haversine × coefficient.
pub struct MockDistanceProvider {
    road_coefficient: f64,
    average_speed_kmh: f64,
}

impl Default for MockDistanceProvider {
    fn default() -> Self {
        Self {
            road_coefficient: 1.3,
            average_speed_kmh: 40.0,
        }
    }
}

impl MockDistanceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self { road_coefficient, average_speed_kmh }
    }

    fn leg(&self, from: &Coordinates, to: &Coordinates) -> MatrixLeg {
        let straight_line_km = haversine_distance(from, to);
        let road_km = straight_line_km * self.road_coefficient;
        MatrixLeg {
            distance_meters: (road_km * 1000.0) as u64,
            duration_seconds: (road_km / self.average_speed_kmh * 3600.0) as u64,
        }
    }
}

#[async_trait]
impl DistanceProvider for MockDistanceProvider {
    async fn distance_matrix(&self, locations: &[Coordinates]) -> ServiceResult<DistanceMatrix> {
        let n = locations.len();
        if n == 0 {
            return Ok(DistanceMatrix::empty());
        }

        let mut matrix = DistanceMatrix::new(n);
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    matrix.set(i, j, self.leg(&locations[i], &locations[j]));
                }
            }
        }
        Ok(matrix)
    }

    async fn directions(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> ServiceResult<Directions> {
        let leg = self.leg(&origin, &destination);
        Ok(Directions {
            distance_meters: leg.distance_meters,
            duration_seconds: leg.duration_seconds,
            steps: vec![DirectionStep {
                instruction: "Drive to destination".to_string(),
                distance_meters: leg.distance_meters,
                duration_seconds: leg.duration_seconds,
            }],
            polyline: None,
        })
    }

    fn name(&self) -> &str {
        "MockDistance"
    }
}

/// Create the distance provider from configuration. No API key configured
/// means the mock, which is what tests and local development want.
pub fn create_distance_provider(config: Option<GoogleMapsConfig>) -> Box<dyn DistanceProvider> {
    match config {
        Some(cfg) => {
            info!("Using Google Maps distance provider at {}", cfg.base_url);
            Box::new(GoogleMapsClient::new(cfg))
        }
        None => {
            info!("Using mock distance provider (GOOGLE_MAPS_API_KEY not configured)");
            Box::new(MockDistanceProvider::new())
        }
    }
}
