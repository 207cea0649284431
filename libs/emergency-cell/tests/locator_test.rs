use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use mockall::mock;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use emergency_cell::models::{Coordinate, GeolocationError, LocatorError, PositionOptions, SearchError};
use emergency_cell::services::{
    DispatchSettings, GeolocationProvider, HospitalLocatorService, SessionStore, VirtualScheduler,
};
use shared_config::AppConfig;
use shared_utils::test_utils::{places_east_of, TestConfig};

mock! {
    pub Geolocation {}

    #[async_trait]
    impl GeolocationProvider for Geolocation {
        async fn current_position(&self, options: PositionOptions) -> Result<Coordinate, GeolocationError>;
    }
}

const ORIGIN: Coordinate = Coordinate {
    latitude: 12.97,
    longitude: 77.59,
};

fn fix_at(origin: Coordinate) -> MockGeolocation {
    let mut geolocation = MockGeolocation::new();
    geolocation
        .expect_current_position()
        .withf(|options| options.high_accuracy)
        .times(1)
        .returning(move |_| Ok(origin));
    geolocation
}

fn failing_with(error: GeolocationError) -> MockGeolocation {
    let mut geolocation = MockGeolocation::new();
    geolocation
        .expect_current_position()
        .times(1)
        .returning(move |_| Err(error.clone()));
    geolocation
}

fn config_for(server: &MockServer) -> AppConfig {
    TestConfig::with_search_url(server.uri()).to_app_config()
}

fn session_store(config: &AppConfig) -> SessionStore {
    let settings = DispatchSettings::new(&config.dispatch, &config.locator);
    SessionStore::new(Arc::new(VirtualScheduler::new()), settings, config.session_idle_timeout)
}

async fn mount_places(server: &MockServer, offsets: &[f64]) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(places_east_of(ORIGIN.latitude, ORIGIN.longitude, offsets)),
        )
        .mount(server)
        .await;
}

// ==============================================================================
// LOCATOR PIPELINE
// ==============================================================================

#[tokio::test]
async fn test_locate_ranks_search_results_behind_synthetic_provider() {
    let server = MockServer::start().await;
    mount_places(&server, &[0.01, 0.005, 0.05]).await;

    let locator = HospitalLocatorService::new(&config_for(&server)).unwrap();
    let list = assert_ok!(locator.locate(&fix_at(ORIGIN)).await);

    assert_eq!(list.origin, ORIGIN);
    assert_eq!(list.len(), 3);

    let synthetic = list.synthetic().expect("synthetic provider");
    assert_eq!(synthetic.display_name, "ResQMed Hospital");
    assert_eq!(synthetic.location, ORIGIN.offset(0.001));

    let names: Vec<&str> = list.ranked().iter().map(|h| h.display_name.as_str()).collect();
    assert_eq!(names, vec!["Hospital 1", "Hospital 0"]);
}

#[tokio::test]
async fn test_denied_permission_skips_the_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let locator = HospitalLocatorService::new(&config_for(&server)).unwrap();
    let result = locator
        .locate(&failing_with(GeolocationError::PermissionDenied))
        .await;

    assert_matches!(
        result,
        Err(LocatorError::LocationUnavailable(GeolocationError::PermissionDenied))
    );
}

#[tokio::test]
async fn test_search_failure_yields_no_partial_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let locator = HospitalLocatorService::new(&config_for(&server)).unwrap();
    let result = locator.locate(&fix_at(ORIGIN)).await;

    assert_matches!(
        result,
        Err(LocatorError::SearchFailed(SearchError::Status { status: 500, .. }))
    );
}

// ==============================================================================
// SESSION LOOKUPS
// ==============================================================================

#[tokio::test]
async fn test_session_stores_list_and_clears_it_after_failed_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(places_east_of(ORIGIN.latitude, ORIGIN.longitude, &[0.01])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let locator = HospitalLocatorService::new(&config).unwrap();
    let store = session_store(&config);
    let session = store.create().await;

    assert!(session.hospitals().await.is_none());

    let list = session.locate(&locator, &fix_at(ORIGIN)).await.unwrap();
    assert_eq!(session.hospitals().await, Some(list));

    let retry = session.locate(&locator, &fix_at(ORIGIN)).await;
    assert_matches!(retry, Err(LocatorError::SearchFailed(_)));
    assert!(session.hospitals().await.is_none());
}

#[tokio::test]
async fn test_concurrent_lookup_on_same_session_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(places_east_of(ORIGIN.latitude, ORIGIN.longitude, &[0.01]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let locator = HospitalLocatorService::new(&config).unwrap();
    let store = session_store(&config);
    let session = store.create().await;

    let first_fix = fix_at(ORIGIN);
    let second_fix = MockGeolocation::new();
    let (first, second) = tokio::join!(
        session.locate(&locator, &first_fix),
        session.locate(&locator, &second_fix),
    );

    assert_eq!(assert_ok!(first).len(), 2);
    assert_matches!(second, Err(LocatorError::LookupInProgress));
}

#[tokio::test]
async fn test_lookups_on_different_sessions_run_independently() {
    let server = MockServer::start().await;
    mount_places(&server, &[0.01]).await;

    let config = config_for(&server);
    let locator = HospitalLocatorService::new(&config).unwrap();
    let store = session_store(&config);
    let (a, b) = (store.create().await, store.create().await);

    let (fix_a, fix_b) = (fix_at(ORIGIN), fix_at(ORIGIN));
    let (first, second) = tokio::join!(a.locate(&locator, &fix_a), b.locate(&locator, &fix_b));

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(store.len().await, 2);
}
