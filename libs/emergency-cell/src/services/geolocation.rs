// libs/emergency-cell/src/services/geolocation.rs
use async_trait::async_trait;
use tracing::debug;

use crate::models::{Coordinate, GeolocationError, LocateRequest, PositionOptions};

/// Supplies a single current position. No continuous tracking.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self, options: PositionOptions) -> Result<Coordinate, GeolocationError>;
}

/// Position obtained by the client and reported to the server with the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedPosition {
    outcome: Result<Coordinate, GeolocationError>,
}

impl ReportedPosition {
    pub fn fix(coordinate: Coordinate) -> Self {
        Self { outcome: Ok(coordinate) }
    }

    pub fn failed(error: GeolocationError) -> Self {
        Self { outcome: Err(error) }
    }
}

impl From<LocateRequest> for ReportedPosition {
    fn from(request: LocateRequest) -> Self {
        if let Some(kind) = request.error {
            return Self::failed(kind.into());
        }

        match (request.latitude, request.longitude) {
            (Some(latitude), Some(longitude)) => {
                let coordinate = Coordinate::new(latitude, longitude);
                if coordinate.is_valid() {
                    Self::fix(coordinate)
                } else {
                    Self::failed(GeolocationError::PositionUnavailable)
                }
            }
            _ => Self::failed(GeolocationError::PositionUnavailable),
        }
    }
}

#[async_trait]
impl GeolocationProvider for ReportedPosition {
    async fn current_position(&self, options: PositionOptions) -> Result<Coordinate, GeolocationError> {
        debug!("Using client-reported position (high_accuracy={})", options.high_accuracy);
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionErrorKind;

    #[tokio::test]
    async fn reported_error_wins_over_coordinates() {
        let request = LocateRequest {
            latitude: Some(12.0),
            longitude: Some(77.0),
            error: Some(PositionErrorKind::PermissionDenied),
        };
        let provider = ReportedPosition::from(request);
        assert_eq!(
            provider.current_position(PositionOptions::default()).await,
            Err(GeolocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn missing_longitude_is_position_unavailable() {
        let request = LocateRequest {
            latitude: Some(12.0),
            ..Default::default()
        };
        let provider = ReportedPosition::from(request);
        assert_eq!(
            provider.current_position(PositionOptions::default()).await,
            Err(GeolocationError::PositionUnavailable)
        );
    }

    #[tokio::test]
    async fn out_of_range_latitude_is_rejected() {
        let request = LocateRequest {
            latitude: Some(120.0),
            longitude: Some(10.0),
            error: None,
        };
        let provider = ReportedPosition::from(request);
        assert!(provider.current_position(PositionOptions::default()).await.is_err());
    }
}
