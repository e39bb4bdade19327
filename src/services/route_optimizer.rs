//! Route ordering: priority-first, then greedy nearest neighbor.
//!
//! The ordering and totals are pure functions over a `DistanceMatrix`
//! (matrix index 0 is the technician's start position, stop `i` sits at
//! matrix index `i + 1`); `optimize_route` composes them with a
//! `DistanceProvider`. The output is deterministic: priority ties and
//! equal-distance candidates resolve to input order.

use tracing::debug;

use crate::error::ServiceResult;
use crate::services::maps::{DistanceMatrix, DistanceProvider};
use crate::types::{Coordinates, OptimizedRoute, RouteStop};

const METERS_TO_MILES: f64 = 0.000621371;

/// Aggregate totals for an ordered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTotals {
    pub total_distance_miles: i64,
    pub estimated_duration_minutes: i64,
}

/// Order stops: emergency (1) and initial (2) visits first, ascending by
/// priority with input order breaking ties, then the rest by repeatedly
/// walking to the nearest unvisited stop.
///
/// Returns indices into `stops`. Any unresolved matrix cell consulted
/// during the walk fails the whole ordering.
pub fn order_stops(stops: &[RouteStop], matrix: &DistanceMatrix) -> ServiceResult<Vec<usize>> {
    let n = stops.len();
    if n == 0 {
        return Ok(vec![]);
    }

    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    // Matrix index of the current position; 0 = start location.
    let mut current = 0usize;

    // Priority phase. sort_by_key is stable, so input order breaks ties.
    let mut priority_stops: Vec<usize> = (0..n).filter(|&i| stops[i].priority <= 2).collect();
    priority_stops.sort_by_key(|&i| stops[i].priority);
    for i in priority_stops {
        order.push(i);
        visited[i] = true;
        current = i + 1;
    }

    // Nearest-neighbor phase. Strict `<` keeps the first-seen stop on ties.
    while order.len() < n {
        let mut nearest: Option<(usize, u64)> = None;
        for (i, stop_visited) in visited.iter().enumerate() {
            if *stop_visited {
                continue;
            }
            let leg = matrix.leg(current, i + 1)?;
            match nearest {
                Some((_, best)) if leg.distance_meters >= best => {}
                _ => nearest = Some((i, leg.distance_meters)),
            }
        }

        // The loop condition guarantees an unvisited stop exists.
        let (next, _) = nearest.expect("unvisited stop remains");
        order.push(next);
        visited[next] = true;
        current = next + 1;
    }

    Ok(order)
}

/// Sum consecutive legs plus per-stop service time into integer miles and
/// minutes.
pub fn route_totals(
    stops: &[RouteStop],
    order: &[usize],
    matrix: &DistanceMatrix,
) -> ServiceResult<RouteTotals> {
    let mut total_meters: u64 = 0;
    let mut total_seconds: u64 = 0;
    let mut current = 0usize;

    for &i in order {
        let leg = matrix.leg(current, i + 1)?;
        total_meters += leg.distance_meters;
        total_seconds += leg.duration_seconds;
        // Negative estimates are rejected when stops are built; clamp here
        // too so a hand-built stop cannot wrap the sum.
        total_seconds += stops[i].estimated_duration_minutes.max(0) as u64 * 60;
        current = i + 1;
    }

    Ok(RouteTotals {
        total_distance_miles: (total_meters as f64 * METERS_TO_MILES).round() as i64,
        estimated_duration_minutes: (total_seconds as f64 / 60.0).round() as i64,
    })
}

/// Build the matrix over `{start} ∪ stops`, order the stops, and compute
/// totals. Empty stop set returns an empty route with zero totals.
pub async fn optimize_route(
    provider: &dyn DistanceProvider,
    start: Coordinates,
    stops: Vec<RouteStop>,
) -> ServiceResult<OptimizedRoute> {
    if stops.is_empty() {
        return Ok(OptimizedRoute::empty());
    }

    let mut locations = Vec::with_capacity(stops.len() + 1);
    locations.push(start);
    locations.extend(stops.iter().map(|s| s.location));

    let matrix = provider.distance_matrix(&locations).await?;
    let order = order_stops(&stops, &matrix)?;
    let totals = route_totals(&stops, &order, &matrix)?;

    debug!(
        "Optimized route: {} stops, {} mi, {} min",
        stops.len(),
        totals.total_distance_miles,
        totals.estimated_duration_minutes
    );

    Ok(OptimizedRoute {
        stops: order.into_iter().map(|i| stops[i].clone()).collect(),
        total_distance_miles: totals.total_distance_miles,
        estimated_duration_minutes: totals.estimated_duration_minutes,
    })
}

// ==========================================================================
// Tests
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::services::maps::{MatrixLeg, MockDistanceProvider};
    use uuid::Uuid;

    fn stop(priority: u8, minutes: i32) -> RouteStop {
        RouteStop {
            job_id: Uuid::new_v4(),
            location: Coordinates { lat: 47.6, lng: -122.3 },
            estimated_duration_minutes: minutes,
            priority,
        }
    }

    /// Matrix where every leg has the given distance and a 60 s duration.
    fn uniform_matrix(size: usize, distance: u64) -> DistanceMatrix {
        let mut matrix = DistanceMatrix::new(size);
        for i in 0..size {
            for j in 0..size {
                if i != j {
                    matrix.set(i, j, MatrixLeg { distance_meters: distance, duration_seconds: 60 });
                }
            }
        }
        matrix
    }

    #[test]
    fn test_empty_stop_list_orders_to_empty() {
        let order = order_stops(&[], &DistanceMatrix::empty()).unwrap();
        assert!(order.is_empty());
    }

    #[test]
    fn test_priority_stops_first_then_input_order() {
        // Priorities [3, 1, 3], all equidistant: priority 1 first, then
        // the two priority-3 stops in input order.
        let stops = vec![stop(3, 30), stop(1, 30), stop(3, 30)];
        let matrix = uniform_matrix(4, 1000);

        let order = order_stops(&stops, &matrix).unwrap();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_priority_one_before_priority_two() {
        let stops = vec![stop(2, 30), stop(3, 30), stop(1, 30)];
        let matrix = uniform_matrix(4, 1000);

        let order = order_stops(&stops, &matrix).unwrap();
        assert_eq!(&order[..2], &[2, 0]);
    }

    #[test]
    fn test_all_priority_stops_precede_normal_stops() {
        let stops = vec![stop(3, 30), stop(2, 30), stop(3, 30), stop(1, 30), stop(2, 30)];
        let matrix = uniform_matrix(6, 500);

        let order = order_stops(&stops, &matrix).unwrap();
        let first_normal = order.iter().position(|&i| stops[i].priority == 3).unwrap();
        assert!(order[..first_normal].iter().all(|&i| stops[i].priority <= 2));
        assert!(order[first_normal..].iter().all(|&i| stops[i].priority == 3));
        // Equal-priority ties keep input order.
        assert_eq!(order, vec![3, 1, 4, 0, 2]);
    }

    #[test]
    fn test_nearest_neighbor_walk() {
        // Start at 0; stop A (idx 0) is far, stop B (idx 1) is near, and
        // from B the walk continues to A.
        let stops = vec![stop(3, 0), stop(3, 0)];
        let mut matrix = DistanceMatrix::new(3);
        matrix.set(0, 1, MatrixLeg { distance_meters: 5000, duration_seconds: 300 });
        matrix.set(0, 2, MatrixLeg { distance_meters: 1000, duration_seconds: 100 });
        matrix.set(2, 1, MatrixLeg { distance_meters: 1500, duration_seconds: 150 });
        matrix.set(1, 2, MatrixLeg { distance_meters: 1500, duration_seconds: 150 });

        let order = order_stops(&stops, &matrix).unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let stops = vec![stop(3, 10), stop(1, 20), stop(3, 15), stop(2, 5)];
        let matrix = uniform_matrix(5, 2000);

        let first = order_stops(&stops, &matrix).unwrap();
        let second = order_stops(&stops, &matrix).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_cell_fails_ordering() {
        let stops = vec![stop(3, 30), stop(3, 30)];
        let mut matrix = DistanceMatrix::new(3);
        matrix.set(0, 1, MatrixLeg { distance_meters: 1000, duration_seconds: 100 });
        // 0 -> 2 unresolved: ranking must fail, not treat it as 0 m.

        let err = order_stops(&stops, &matrix).unwrap_err();
        assert!(matches!(err, ServiceError::IncompleteDistanceData(_)));
    }

    #[test]
    fn test_totals_convert_to_miles_and_minutes() {
        // Two legs of 8046.7 m (~5 mi each), 600 s travel each, stops of
        // 30 and 15 minutes on site.
        let stops = vec![stop(3, 30), stop(3, 15)];
        let mut matrix = DistanceMatrix::new(3);
        matrix.set(0, 1, MatrixLeg { distance_meters: 8047, duration_seconds: 600 });
        matrix.set(1, 2, MatrixLeg { distance_meters: 8047, duration_seconds: 600 });

        let totals = route_totals(&stops, &[0, 1], &matrix).unwrap();
        assert_eq!(totals.total_distance_miles, 10);
        // 2×10 min travel + 45 min on site
        assert_eq!(totals.estimated_duration_minutes, 65);
    }

    #[test]
    fn test_totals_ignore_negative_stop_duration() {
        // A stop carrying a negative estimate must not wrap the duration sum.
        let stops = vec![stop(3, -30)];
        let mut matrix = DistanceMatrix::new(2);
        matrix.set(0, 1, MatrixLeg { distance_meters: 8047, duration_seconds: 600 });

        let totals = route_totals(&stops, &[0], &matrix).unwrap();
        assert_eq!(totals.total_distance_miles, 5);
        assert_eq!(totals.estimated_duration_minutes, 10);
    }

    #[tokio::test]
    async fn test_optimize_route_empty_terminal_case() {
        let provider = MockDistanceProvider::new();
        let start = Coordinates { lat: 47.6, lng: -122.3 };

        let route = optimize_route(&provider, start, vec![]).await.unwrap();
        assert!(route.stops.is_empty());
        assert_eq!(route.total_distance_miles, 0);
        assert_eq!(route.estimated_duration_minutes, 0);
    }

    #[tokio::test]
    async fn test_optimize_route_with_mock_provider() {
        let provider = MockDistanceProvider::new();
        let start = Coordinates { lat: 47.6062, lng: -122.3321 };

        let near = RouteStop {
            job_id: Uuid::new_v4(),
            location: Coordinates { lat: 47.6101, lng: -122.2015 }, // Bellevue
            estimated_duration_minutes: 30,
            priority: 3,
        };
        let far = RouteStop {
            job_id: Uuid::new_v4(),
            location: Coordinates { lat: 47.2529, lng: -122.4443 }, // Tacoma
            estimated_duration_minutes: 30,
            priority: 3,
        };

        let route = optimize_route(&provider, start, vec![far.clone(), near.clone()])
            .await
            .unwrap();

        assert_eq!(route.stops.len(), 2);
        assert_eq!(route.stops[0].job_id, near.job_id);
        assert_eq!(route.stops[1].job_id, far.job_id);
        assert!(route.total_distance_miles > 0);
        assert!(route.estimated_duration_minutes >= 60);
    }

    #[tokio::test]
    async fn test_optimize_route_emergency_first_even_when_far() {
        let provider = MockDistanceProvider::new();
        let start = Coordinates { lat: 47.6062, lng: -122.3321 };

        let near_normal = RouteStop {
            job_id: Uuid::new_v4(),
            location: Coordinates { lat: 47.6101, lng: -122.2015 },
            estimated_duration_minutes: 30,
            priority: 3,
        };
        let far_emergency = RouteStop {
            job_id: Uuid::new_v4(),
            location: Coordinates { lat: 47.2529, lng: -122.4443 },
            estimated_duration_minutes: 45,
            priority: 1,
        };

        let route = optimize_route(
            &provider,
            start,
            vec![near_normal.clone(), far_emergency.clone()],
        )
        .await
        .unwrap();

        assert_eq!(route.stops[0].job_id, far_emergency.job_id);
    }
}
