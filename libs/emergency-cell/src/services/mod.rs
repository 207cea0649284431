pub mod dispatch;
pub mod geolocation;
pub mod locator;
pub mod ranking;
pub mod scheduler;
pub mod search;
pub mod session;

pub use dispatch::{eta_minutes, DispatchSettings, DispatchStateMachine};
pub use geolocation::{GeolocationProvider, ReportedPosition};
pub use locator::HospitalLocatorService;
pub use ranking::{haversine_km, round_to_hundredths, DistanceRanker, EARTH_RADIUS_KM};
pub use scheduler::{RepeatingTask, Scheduler, TimerId, TimerTask, TokioScheduler, VirtualScheduler};
pub use search::{viewbox_for, ProximitySearchClient};
pub use session::{EmergencySession, SessionStore};
