// libs/emergency-cell/src/services/locator.rs
use tracing::{info, instrument, warn};

use shared_config::AppConfig;

use crate::models::{LocatorError, PositionOptions, RankedHospitalList, SearchError};
use crate::services::geolocation::GeolocationProvider;
use crate::services::ranking::DistanceRanker;
use crate::services::search::ProximitySearchClient;

/// Geolocate, search, rank. Any failure ends the attempt with no partial list.
pub struct HospitalLocatorService {
    search: ProximitySearchClient,
    ranker: DistanceRanker,
    options: PositionOptions,
}

impl HospitalLocatorService {
    pub fn new(config: &AppConfig) -> Result<Self, SearchError> {
        Ok(Self {
            search: ProximitySearchClient::new(config)?,
            ranker: DistanceRanker::new(config.locator.clone()),
            options: PositionOptions { high_accuracy: true },
        })
    }

    pub fn ranker(&self) -> &DistanceRanker {
        &self.ranker
    }

    #[instrument(skip_all)]
    pub async fn locate(&self, provider: &dyn GeolocationProvider) -> Result<RankedHospitalList, LocatorError> {
        let origin = provider.current_position(self.options).await.map_err(|e| {
            warn!("Geolocation failed, skipping hospital search: {}", e);
            LocatorError::LocationUnavailable(e)
        })?;

        let places = self.search.search_hospitals(origin).await?;
        let ranked = self.ranker.rank(origin, places);

        info!(
            "Located {} hospitals near ({:.4}, {:.4})",
            ranked.len(),
            origin.latitude,
            origin.longitude
        );
        Ok(ranked)
    }
}
