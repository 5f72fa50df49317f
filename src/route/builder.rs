//! Leg construction with mode switching.
//!
//! The builder walks consecutive waypoint pairs keeping a `car_position`
//! pointer — the spot where the vehicle currently waits. Each hop first
//! tries a direct car route; if the engine cannot route there, or routes
//! to a snapped endpoint beyond the arrival tolerance (off-road target),
//! the hop becomes a drive to the nearest access point plus a walk. The
//! vehicle stays parked at the access point, so the next hop departs
//! from there, not from the walked-to destination.

use tracing::{debug, warn};

use crate::engines::routing::{RouteSolver, SolvedRoute};
use crate::error::PlanError;
use crate::geo;
use crate::spatial::SpatialStore;
use crate::types::{Coord, RouteLeg, TravelMode};

/// Longitude offset applied when the spatial store cannot supply an
/// access point. Keeps the pipeline progressing under degraded
/// conditions; the resulting legs are logged.
const FALLBACK_AP_OFFSET_DEG: f64 = 0.01;

pub struct RouteBuilder<'a> {
    solver: &'a dyn RouteSolver,
    spatial: &'a dyn SpatialStore,
    arrival_tolerance_m: f64,
}

impl<'a> RouteBuilder<'a> {
    pub fn new(
        solver: &'a dyn RouteSolver,
        spatial: &'a dyn SpatialStore,
        arrival_tolerance_m: f64,
    ) -> Self {
        Self { solver, spatial, arrival_tolerance_m }
    }

    /// Build the leg sequence for an ordered point list (origin,
    /// waypoints, optionally origin again). Fewer than two points yield
    /// no legs.
    pub async fn build_legs(&self, points: &[Coord]) -> Result<Vec<RouteLeg>, PlanError> {
        let mut legs = Vec::new();
        if points.len() < 2 {
            return Ok(legs);
        }

        let mut car_position = points[0];

        for &dst in &points[1..] {
            if let Some(route) = self.solver.solve(TravelMode::Car, car_position, dst).await? {
                if self.arrives_at(&route.geometry, dst) {
                    legs.push(make_leg(TravelMode::Car, car_position, dst, Some(route)));
                    car_position = dst;
                    continue;
                }
                warn!(
                    dst_lat = dst.lat,
                    dst_lon = dst.lon,
                    tolerance_m = self.arrival_tolerance_m,
                    "Car route snapped beyond arrival tolerance, switching to access point"
                );
            } else {
                debug!(
                    dst_lat = dst.lat,
                    dst_lon = dst.lon,
                    "No direct car route, switching to access point"
                );
            }

            let ap = self.resolve_access_point(dst).await;

            // The drive to the access point is recorded even when the
            // engine returns nothing — a degenerate zero-length leg keeps
            // leg/segment parity intact.
            let to_ap = self.solver.solve(TravelMode::Car, car_position, ap).await?;
            if to_ap.is_none() {
                warn!(
                    ap_lat = ap.lat,
                    ap_lon = ap.lon,
                    "Drive to access point failed, recording degenerate car leg"
                );
            }
            legs.push(make_leg(TravelMode::Car, car_position, ap, to_ap));
            car_position = ap;

            let on_foot = self.solver.solve(TravelMode::Foot, ap, dst).await?;
            if on_foot.is_none() {
                warn!(
                    dst_lat = dst.lat,
                    dst_lon = dst.lon,
                    "Foot route to destination failed, recording degenerate foot leg"
                );
            }
            legs.push(make_leg(TravelMode::Foot, ap, dst, on_foot));
            // The vehicle waits at the access point; the walker returns to
            // it before the next hop.
        }

        Ok(legs)
    }

    /// Arrival tolerance check: the routed geometry must actually end
    /// near the intended destination, not at a snapped road point.
    fn arrives_at(&self, geometry: &[[f64; 2]], dst: Coord) -> bool {
        match geometry.last() {
            Some(&end) => {
                geo::haversine_m(Coord::from_lonlat(end), dst) <= self.arrival_tolerance_m
            }
            None => false,
        }
    }

    async fn resolve_access_point(&self, dst: Coord) -> Coord {
        match self.spatial.nearest_access_point(dst).await {
            Ok(Some(ap)) => ap,
            Ok(None) => {
                warn!("No access point found, falling back to eastward offset");
                Coord::new(dst.lat, dst.lon + FALLBACK_AP_OFFSET_DEG)
            }
            Err(e) => {
                warn!(error = %e, "Access point lookup failed, falling back to eastward offset");
                Coord::new(dst.lat, dst.lon + FALLBACK_AP_OFFSET_DEG)
            }
        }
    }
}

fn make_leg(mode: TravelMode, from: Coord, to: Coord, route: Option<SolvedRoute>) -> RouteLeg {
    match route {
        Some(r) => RouteLeg {
            mode,
            from: Some(from),
            to: Some(to),
            distance_m: r.distance_m,
            duration_s: r.duration_s,
            geometry: r.geometry,
        },
        None => RouteLeg {
            mode,
            from: Some(from),
            to: Some(to),
            distance_m: 0.0,
            duration_s: 0.0,
            geometry: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::EARTH_RADIUS_M;
    use crate::spatial::PoiHit;
    use crate::types::{Language, SpotRef};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted solver: answers car requests from a queue, foot requests
    /// always succeed with a straight line.
    struct FakeSolver {
        car_results: Mutex<Vec<Option<SolvedRoute>>>,
    }

    impl FakeSolver {
        fn new(car_results: Vec<Option<SolvedRoute>>) -> Self {
            Self { car_results: Mutex::new(car_results) }
        }
    }

    fn line(from: Coord, to: Coord) -> SolvedRoute {
        SolvedRoute {
            distance_m: geo::haversine_m(from, to),
            duration_s: 60.0,
            geometry: vec![from.to_lonlat(), to.to_lonlat()],
        }
    }

    #[async_trait]
    impl RouteSolver for FakeSolver {
        async fn solve(
            &self,
            mode: TravelMode,
            from: Coord,
            to: Coord,
        ) -> Result<Option<SolvedRoute>, PlanError> {
            match mode {
                TravelMode::Car => {
                    let mut q = self.car_results.lock().unwrap();
                    if q.is_empty() {
                        Ok(Some(line(from, to)))
                    } else {
                        Ok(q.remove(0))
                    }
                }
                TravelMode::Foot => Ok(Some(line(from, to))),
            }
        }
    }

    struct FakeSpatial {
        access_point: Option<Coord>,
    }

    #[async_trait]
    impl SpatialStore for FakeSpatial {
        async fn resolve_spots(
            &self,
            _ids: &[String],
            _language: Language,
        ) -> Result<HashMap<String, SpotRef>, PlanError> {
            Ok(HashMap::new())
        }

        async fn nearest_access_point(&self, _around: Coord) -> Result<Option<Coord>, PlanError> {
            Ok(self.access_point)
        }

        async fn pois_near_route(
            &self,
            _car: Option<&geojson::Geometry>,
            _foot: Option<&geojson::Geometry>,
            _car_m: f64,
            _foot_m: f64,
        ) -> Result<Vec<PoiHit>, PlanError> {
            Ok(Vec::new())
        }
    }

    /// A point `meters` east of `from` along the equator-adjacent
    /// latitude, so haversine distances are exact to float precision.
    fn east_of(from: Coord, meters: f64) -> Coord {
        let dlon = (meters / (EARTH_RADIUS_M * from.lat.to_radians().cos())).to_degrees();
        Coord::new(from.lat, from.lon + dlon)
    }

    #[tokio::test]
    async fn drivable_loop_yields_car_legs_only() {
        let solver = FakeSolver::new(Vec::new());
        let spatial = FakeSpatial { access_point: None };
        let builder = RouteBuilder::new(&solver, &spatial, 50.0);

        let origin = Coord::new(39.2, 139.9);
        let points = vec![
            origin,
            Coord::new(39.21, 139.91),
            Coord::new(39.22, 139.92),
            Coord::new(39.23, 139.93),
            origin,
        ];
        let legs = builder.build_legs(&points).await.unwrap();

        assert_eq!(legs.len(), 4);
        assert!(legs.iter().all(|l| l.mode == TravelMode::Car));
        // Chain continuity: each leg departs where the previous arrived.
        for pair in legs.windows(2) {
            assert_eq!(pair[0].to.unwrap(), pair[1].from.unwrap());
        }
    }

    #[tokio::test]
    async fn single_waypoint_round_trip_has_out_and_back_legs() {
        let solver = FakeSolver::new(Vec::new());
        let spatial = FakeSpatial { access_point: None };
        let builder = RouteBuilder::new(&solver, &spatial, 50.0);

        let origin = Coord::new(39.2, 139.9);
        let stop = Coord::new(39.21, 139.91);
        let legs = builder.build_legs(&[origin, stop, origin]).await.unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].to.unwrap(), stop);
        assert_eq!(legs[1].to.unwrap(), origin);
    }

    #[tokio::test]
    async fn snapped_endpoint_within_tolerance_is_accepted() {
        let origin = Coord::new(39.2, 139.9);
        let falls = Coord::new(39.25, 139.95);
        // The engine snaps to a road point just inside the tolerance.
        let near_falls = east_of(falls, 49.9);
        let solver = FakeSolver::new(vec![Some(SolvedRoute {
            distance_m: 5000.0,
            duration_s: 400.0,
            geometry: vec![origin.to_lonlat(), near_falls.to_lonlat()],
        })]);
        let spatial = FakeSpatial { access_point: None };
        let builder = RouteBuilder::new(&solver, &spatial, 50.0);

        let legs = builder.build_legs(&[origin, falls]).await.unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].mode, TravelMode::Car);
    }

    #[tokio::test]
    async fn snapped_endpoint_beyond_tolerance_triggers_access_point_switch() {
        let origin = Coord::new(39.2, 139.9);
        let falls = Coord::new(39.25, 139.95);
        let ap = Coord::new(39.248, 139.94);
        let snapped = east_of(falls, 50.001);
        let solver = FakeSolver::new(vec![
            // Direct attempt: snapped 50.001m away -> rejected.
            Some(SolvedRoute {
                distance_m: 5000.0,
                duration_s: 400.0,
                geometry: vec![origin.to_lonlat(), snapped.to_lonlat()],
            }),
            // Drive to the access point succeeds.
            Some(line(origin, ap)),
        ]);
        let spatial = FakeSpatial { access_point: Some(ap) };
        let builder = RouteBuilder::new(&solver, &spatial, 50.0);

        let legs = builder.build_legs(&[origin, falls]).await.unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].mode, TravelMode::Car);
        assert_eq!(legs[0].to.unwrap(), ap);
        assert_eq!(legs[1].mode, TravelMode::Foot);
        assert_eq!(legs[1].from.unwrap(), ap);
        assert_eq!(legs[1].to.unwrap(), falls);
    }

    #[tokio::test]
    async fn next_hop_departs_from_access_point_not_destination() {
        let origin = Coord::new(39.2, 139.9);
        let falls = Coord::new(39.25, 139.95);
        let ap = Coord::new(39.248, 139.94);
        let solver = FakeSolver::new(vec![
            None,                    // direct to falls: no route
            Some(line(origin, ap)),  // drive to AP
            // remaining car requests succeed (return to origin)
        ]);
        let spatial = FakeSpatial { access_point: Some(ap) };
        let builder = RouteBuilder::new(&solver, &spatial, 50.0);

        let legs = builder.build_legs(&[origin, falls, origin]).await.unwrap();
        // car(origin->AP), foot(AP->falls), car(AP->origin)
        assert_eq!(legs.len(), 3);
        assert_eq!(legs[2].mode, TravelMode::Car);
        assert_eq!(legs[2].from.unwrap(), ap);
        assert_eq!(legs[2].to.unwrap(), origin);
    }

    #[tokio::test]
    async fn failed_drive_to_access_point_records_degenerate_leg() {
        let origin = Coord::new(39.2, 139.9);
        let falls = Coord::new(39.25, 139.95);
        let ap = Coord::new(39.248, 139.94);
        let solver = FakeSolver::new(vec![None, None]);
        let spatial = FakeSpatial { access_point: Some(ap) };
        let builder = RouteBuilder::new(&solver, &spatial, 50.0);

        let legs = builder.build_legs(&[origin, falls]).await.unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].mode, TravelMode::Car);
        assert_eq!(legs[0].distance_m, 0.0);
        assert!(legs[0].geometry.is_empty());
        assert_eq!(legs[1].mode, TravelMode::Foot);
    }

    #[tokio::test]
    async fn missing_access_point_falls_back_to_eastward_offset() {
        let origin = Coord::new(39.2, 139.9);
        let falls = Coord::new(39.25, 139.95);
        let solver = FakeSolver::new(vec![None]);
        let spatial = FakeSpatial { access_point: None };
        let builder = RouteBuilder::new(&solver, &spatial, 50.0);

        let legs = builder.build_legs(&[origin, falls]).await.unwrap();
        assert_eq!(legs.len(), 2);
        let ap = legs[0].to.unwrap();
        assert_eq!(ap.lat, falls.lat);
        assert!((ap.lon - (falls.lon + 0.01)).abs() < 1e-12);
    }
}
