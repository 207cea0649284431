// libs/emergency-cell/src/services/ranking.rs
use tracing::debug;

use shared_config::LocatorConfig;

use crate::models::{split_display_name, Coordinate, HospitalCandidate, PlaceRecord, RankedHospitalList};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates, haversine formula.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos() * to.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Turns raw place records into the list shown to the user.
#[derive(Debug, Clone)]
pub struct DistanceRanker {
    config: LocatorConfig,
}

impl DistanceRanker {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn rank(&self, origin: Coordinate, places: Vec<PlaceRecord>) -> RankedHospitalList {
        let considered = places.len();

        let mut ranked: Vec<HospitalCandidate> = places
            .into_iter()
            .map(|place| {
                let distance = round_to_hundredths(haversine_km(origin, place.location));
                HospitalCandidate::from_place(place, distance)
            })
            // NaN distances fail this comparison and are dropped as well.
            .filter(|candidate| candidate.distance_km <= self.config.search_radius_km)
            .collect();

        // Vec::sort_by is stable: equal distances keep service order.
        ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        let within_radius = ranked.len();
        ranked.truncate(self.config.max_results.saturating_sub(1));

        let mut hospitals = Vec::with_capacity(ranked.len() + 1);
        hospitals.push(self.synthetic_candidate(origin));
        hospitals.extend(ranked);

        debug!(
            "Ranked {} places: {} within {} km, returning {}",
            considered,
            within_radius,
            self.config.search_radius_km,
            hospitals.len()
        );

        RankedHospitalList { origin, hospitals }
    }

    fn synthetic_candidate(&self, origin: Coordinate) -> HospitalCandidate {
        let provider = &self.config.synthetic_provider;
        let (display_name, address) = split_display_name(&provider.display_name);

        HospitalCandidate {
            display_name,
            address,
            location: origin.offset(provider.offset_deg),
            distance_km: provider.distance_km,
            synthetic: true,
        }
    }
}
