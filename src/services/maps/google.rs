//! Google Maps client (Distance Matrix + Directions APIs)
//!
//! https://developers.google.com/maps/documentation/distance-matrix
//! https://developers.google.com/maps/documentation/directions

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::types::Coordinates;

use super::{Directions, DirectionStep, DistanceMatrix, DistanceProvider, MatrixLeg};

/// Per-request element limit on each side of a Distance Matrix call.
const MATRIX_BATCH_SIZE: usize = 10;

/// Google Maps client configuration
#[derive(Debug, Clone)]
pub struct GoogleMapsConfig {
    pub api_key: String,
    /// Base URL, overridable for tests (e.g. a local stub server).
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl GoogleMapsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://maps.googleapis.com".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Google Maps HTTP client
pub struct GoogleMapsClient {
    client: Client,
    config: GoogleMapsConfig,
}

/// One block of matrix cells fetched by a single API call.
struct MatrixBlock {
    row_offset: usize,
    col_offset: usize,
    cells: Vec<Vec<Option<MatrixLeg>>>,
}

impl GoogleMapsClient {
    pub fn new(config: GoogleMapsConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Fetch one origins×destinations block of the matrix.
    async fn fetch_block(
        &self,
        origins: &[String],
        destinations: &[String],
        row_offset: usize,
        col_offset: usize,
    ) -> ServiceResult<MatrixBlock> {
        let url = format!("{}/maps/api/distancematrix/json", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("origins", origins.join("|").as_str()),
                ("destinations", destinations.join("|").as_str()),
                ("units", "metric"),
                ("mode", "driving"),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::upstream(anyhow!(e).context("distance matrix request failed")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(anyhow!(
                "distance matrix returned {}: {}",
                status,
                body
            )));
        }

        let matrix_response: MatrixResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::upstream(anyhow!(e).context("failed to parse distance matrix response")))?;

        if matrix_response.status != "OK" {
            return Err(ServiceError::upstream(anyhow!(
                "distance matrix status {}",
                matrix_response.status
            )));
        }

        let cells = matrix_response
            .rows
            .iter()
            .enumerate()
            .map(|(oi, row)| {
                row.elements
                    .iter()
                    .enumerate()
                    .map(|(di, element)| {
                        let leg = element_to_leg(element);
                        if leg.is_none() {
                            warn!(
                                "No usable matrix cell {} -> {} (status {})",
                                row_offset + oi,
                                col_offset + di,
                                element.status
                            );
                        }
                        leg
                    })
                    .collect()
            })
            .collect();

        Ok(MatrixBlock { row_offset, col_offset, cells })
    }
}

#[async_trait]
impl DistanceProvider for GoogleMapsClient {
    async fn distance_matrix(&self, locations: &[Coordinates]) -> ServiceResult<DistanceMatrix> {
        let n = locations.len();

        if n == 0 {
            return Ok(DistanceMatrix::empty());
        }
        if n == 1 {
            return Ok(DistanceMatrix::new(1));
        }

        let coords: Vec<String> = locations
            .iter()
            .map(|c| format!("{},{}", c.lat, c.lng))
            .collect();

        // One request per origins×destinations block within the API limit.
        // Blocks write disjoint cells, so they can be dispatched together;
        // ordering must not start until every block has landed.
        let requests: Vec<_> = block_spans(n)
            .into_iter()
            .map(|(rows, cols)| {
                self.fetch_block(&coords[rows.clone()], &coords[cols.clone()], rows.start, cols.start)
            })
            .collect();

        debug!(
            "Requesting distance matrix from Google Maps: {} locations, {} blocks",
            n,
            requests.len()
        );

        let blocks = futures::future::try_join_all(requests).await?;

        Ok(merge_blocks(n, blocks))
    }

    async fn directions(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> ServiceResult<Directions> {
        let url = format!("{}/maps/api/directions/json", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("origin", format!("{},{}", origin.lat, origin.lng).as_str()),
                ("destination", format!("{},{}", destination.lat, destination.lng).as_str()),
                ("mode", "driving"),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::upstream(anyhow!(e).context("directions request failed")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(anyhow!(
                "directions returned {}: {}",
                status,
                body
            )));
        }

        let directions_response: DirectionsResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::upstream(anyhow!(e).context("failed to parse directions response")))?;

        if directions_response.status != "OK" {
            return Err(ServiceError::upstream(anyhow!(
                "directions status {}",
                directions_response.status
            )));
        }

        let route = directions_response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::upstream(anyhow!("directions returned no routes")))?;
        let leg = route
            .legs
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::upstream(anyhow!("directions route has no legs")))?;

        Ok(Directions {
            distance_meters: leg.distance.value,
            duration_seconds: leg.duration.value,
            steps: leg
                .steps
                .into_iter()
                .map(|s| DirectionStep {
                    instruction: s.html_instructions.unwrap_or_default(),
                    distance_meters: s.distance.value,
                    duration_seconds: s.duration.value,
                })
                .collect(),
            polyline: route.overview_polyline.map(|p| p.points),
        })
    }

    fn name(&self) -> &str {
        "GoogleMaps"
    }
}

/// Origin/destination index spans covered by each block request for `n`
/// locations. Together the spans tile the full n×n matrix.
fn block_spans(n: usize) -> Vec<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < n {
        let i_end = (i + MATRIX_BATCH_SIZE).min(n);
        let mut j = 0;
        while j < n {
            let j_end = (j + MATRIX_BATCH_SIZE).min(n);
            spans.push((i..i_end, j..j_end));
            j = j_end;
        }
        i = i_end;
    }
    spans
}

/// Assemble fetched blocks into the full matrix. Blocks cover disjoint
/// cells; cells a block left unresolved stay unresolved.
fn merge_blocks(n: usize, blocks: Vec<MatrixBlock>) -> DistanceMatrix {
    let mut matrix = DistanceMatrix::new(n);
    for block in blocks {
        for (oi, row) in block.cells.iter().enumerate() {
            for (di, cell) in row.iter().enumerate() {
                if let Some(leg) = cell {
                    matrix.set(block.row_offset + oi, block.col_offset + di, *leg);
                }
            }
        }
    }
    matrix
}

/// A cell maps to a leg only when the API resolved it; anything else stays
/// unresolved and surfaces as `IncompleteDistanceData` downstream.
fn element_to_leg(element: &MatrixElement) -> Option<MatrixLeg> {
    if element.status != "OK" {
        return None;
    }
    match (&element.distance, &element.duration) {
        (Some(distance), Some(duration)) => Some(MatrixLeg {
            distance_meters: distance.value,
            duration_seconds: duration.value,
        }),
        _ => None,
    }
}

// Google Maps API types

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<ValueField>,
    duration: Option<ValueField>,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    /// Meters for distances, seconds for durations.
    value: u64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
    overview_polyline: Option<Polyline>,
}

#[derive(Debug, Deserialize)]
struct Polyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    distance: ValueField,
    duration: ValueField,
    steps: Vec<DirectionsStep>,
}

#[derive(Debug, Deserialize)]
struct DirectionsStep {
    html_instructions: Option<String>,
    distance: ValueField,
    duration: ValueField,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = GoogleMapsConfig::new("test-key");
        assert_eq!(config.base_url, "https://maps.googleapis.com");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_element_to_leg_ok() {
        let element = MatrixElement {
            status: "OK".to_string(),
            distance: Some(ValueField { value: 5230 }),
            duration: Some(ValueField { value: 480 }),
        };
        assert_eq!(
            element_to_leg(&element),
            Some(MatrixLeg { distance_meters: 5230, duration_seconds: 480 })
        );
    }

    #[test]
    fn test_element_to_leg_failed_status_is_unresolved() {
        let element = MatrixElement {
            status: "ZERO_RESULTS".to_string(),
            distance: None,
            duration: None,
        };
        assert_eq!(element_to_leg(&element), None);
    }

    #[test]
    fn test_element_to_leg_ok_without_values_is_unresolved() {
        // OK status with a missing field must not become a 0 leg.
        let element = MatrixElement {
            status: "OK".to_string(),
            distance: Some(ValueField { value: 5230 }),
            duration: None,
        };
        assert_eq!(element_to_leg(&element), None);
    }

    #[test]
    fn test_matrix_response_parses() {
        let body = r#"{
            "status": "OK",
            "rows": [
                {"elements": [
                    {"status": "OK", "distance": {"value": 0}, "duration": {"value": 0}},
                    {"status": "NOT_FOUND"}
                ]}
            ]
        }"#;
        let parsed: MatrixResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, "OK");
        assert_eq!(parsed.rows[0].elements.len(), 2);
        assert_eq!(parsed.rows[0].elements[1].status, "NOT_FOUND");
    }

    #[test]
    fn test_block_spans_single_block_up_to_batch_size() {
        assert_eq!(block_spans(1), vec![(0..1, 0..1)]);
        assert_eq!(block_spans(10), vec![(0..10, 0..10)]);
    }

    #[test]
    fn test_block_spans_tile_above_batch_size() {
        // 11 locations: a 10×10 block plus the three remainder strips.
        assert_eq!(
            block_spans(11),
            vec![(0..10, 0..10), (0..10, 10..11), (10..11, 0..10), (10..11, 10..11)]
        );

        // 21 locations: 3×3 blocks, every cell covered exactly once.
        let spans = block_spans(21);
        assert_eq!(spans.len(), 9);
        let mut covered = vec![vec![0u8; 21]; 21];
        for (rows, cols) in spans {
            for from in rows {
                for to in cols.clone() {
                    covered[from][to] += 1;
                }
            }
        }
        assert!(covered.iter().flatten().all(|&count| count == 1));
    }

    /// Leg value that encodes its own (from, to) position.
    fn tagged_leg(from: usize, to: usize) -> MatrixLeg {
        MatrixLeg {
            distance_meters: (from * 100 + to) as u64,
            duration_seconds: (from + to) as u64,
        }
    }

    #[test]
    fn test_merge_blocks_places_every_cell_at_its_offset() {
        let n = 11;
        let blocks: Vec<MatrixBlock> = block_spans(n)
            .into_iter()
            .map(|(rows, cols)| MatrixBlock {
                row_offset: rows.start,
                col_offset: cols.start,
                cells: rows
                    .map(|from| cols.clone().map(|to| Some(tagged_leg(from, to))).collect())
                    .collect(),
            })
            .collect();

        let matrix = merge_blocks(n, blocks);
        assert_eq!(matrix.size(), n);
        for from in 0..n {
            for to in 0..n {
                assert_eq!(matrix.leg(from, to).unwrap(), tagged_leg(from, to));
            }
        }
    }

    #[test]
    fn test_merge_blocks_keeps_unresolved_cells_unresolved() {
        let block = MatrixBlock {
            row_offset: 0,
            col_offset: 0,
            cells: vec![
                vec![Some(MatrixLeg::ZERO), None],
                vec![Some(tagged_leg(1, 0)), Some(MatrixLeg::ZERO)],
            ],
        };

        let matrix = merge_blocks(2, vec![block]);
        assert!(matrix.leg(1, 0).is_ok());
        assert!(matrix.leg(0, 1).is_err());
    }

    #[tokio::test]
    #[ignore = "Requires a Google Maps API key"]
    async fn test_google_matrix_integration() {
        let key = std::env::var("GOOGLE_MAPS_API_KEY").unwrap();
        let client = GoogleMapsClient::new(GoogleMapsConfig::new(key));

        let locations = vec![
            Coordinates { lat: 47.6062, lng: -122.3321 }, // Seattle
            Coordinates { lat: 47.2529, lng: -122.4443 }, // Tacoma
        ];

        let matrix = client.distance_matrix(&locations).await.unwrap();
        assert_eq!(matrix.size(), 2);

        // Seattle to Tacoma is ~55 km by road
        let km = matrix.leg(0, 1).unwrap().distance_meters as f64 / 1000.0;
        assert!(km > 40.0 && km < 75.0, "got {} km", km);
    }
}
