// libs/emergency-cell/src/services/dispatch.rs
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use shared_config::{DispatchConfig, LocatorConfig};

use crate::models::{
    split_display_name, DispatchAction, DispatchError, DispatchRequest, DispatchSnapshot, DispatchState,
};
use crate::services::scheduler::{lock, Scheduler, TimerId};

/// Minutes needed to cover `distance_km` at `speed_kmh`, rounded up.
pub fn eta_minutes(distance_km: f64, speed_kmh: f64) -> u32 {
    if speed_kmh.is_nan() || speed_kmh <= 0.0 || !distance_km.is_finite() {
        return 0;
    }
    ((distance_km * 60.0) / speed_kmh).ceil().max(0.0) as u32
}

/// Everything the machine needs besides the scheduler, resolved once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub acceptance_delay: Duration,
    pub status_period: Duration,
    pub status_messages: Vec<String>,
    pub provider_name: String,
    pub attending_physician: String,
    pub eta_minutes: u32,
    pub volunteer_name: String,
    pub volunteer_eta_minutes: u32,
}

impl DispatchSettings {
    pub fn new(dispatch: &DispatchConfig, locator: &LocatorConfig) -> Self {
        let provider = &locator.synthetic_provider;
        let (provider_name, _) = split_display_name(&provider.display_name);

        Self {
            acceptance_delay: dispatch.acceptance_delay,
            status_period: dispatch.status_period,
            status_messages: dispatch.status_messages.clone(),
            provider_name,
            attending_physician: provider.attending_physician.clone(),
            eta_minutes: eta_minutes(provider.distance_km, locator.average_speed_kmh),
            volunteer_name: dispatch.volunteer_name.clone(),
            volunteer_eta_minutes: dispatch.volunteer_eta_minutes,
        }
    }
}

struct DispatchCore {
    request: DispatchRequest,
    status_index: usize,
    acceptance_timer: Option<TimerId>,
    ticker: Option<TimerId>,
    last_failure: Option<String>,
    revision: u64,
}

struct DispatchShared {
    scheduler: Arc<dyn Scheduler>,
    settings: DispatchSettings,
    core: Mutex<DispatchCore>,
    updates: watch::Sender<DispatchSnapshot>,
}

/// Emergency-request lifecycle for one session:
/// `Idle -> Searching -> Accepted <-> VolunteerOffered`, `Accepted -> Idle`.
///
/// Searching rotates the status message every `status_period` and is accepted
/// after `acceptance_delay`. Timer callbacks hold only a weak reference and are
/// tagged with the episode they were scheduled for, so a late callback never
/// touches a newer or dismissed request.
pub struct DispatchStateMachine {
    shared: Arc<DispatchShared>,
}

impl DispatchStateMachine {
    pub fn new(scheduler: Arc<dyn Scheduler>, settings: DispatchSettings) -> Self {
        let core = DispatchCore {
            request: DispatchRequest::idle(0),
            status_index: 0,
            acceptance_timer: None,
            ticker: None,
            last_failure: None,
            revision: 0,
        };
        let (updates, _) = watch::channel(build_snapshot(&core, &settings));

        Self {
            shared: Arc::new(DispatchShared {
                scheduler,
                settings,
                core: Mutex::new(core),
                updates,
            }),
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.shared.settings
    }

    pub fn state(&self) -> DispatchState {
        lock(&self.shared.core).request.state
    }

    pub fn request(&self) -> DispatchRequest {
        lock(&self.shared.core).request.clone()
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        let core = lock(&self.shared.core);
        build_snapshot(&core, &self.shared.settings)
    }

    pub fn subscribe(&self) -> watch::Receiver<DispatchSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Issue a new request. An active request is cancelled and replaced.
    pub fn request_help(&self) -> DispatchSnapshot {
        let shared = &self.shared;
        let mut core = lock(&shared.core);

        if core.request.state != DispatchState::Idle {
            warn!(
                "Replacing active emergency request (episode {}, state {})",
                core.request.episode, core.request.state
            );
            shared.cancel_timers(&mut core);
        }

        let episode = core.request.episode + 1;
        core.request = DispatchRequest {
            state: DispatchState::Searching,
            created_at: Some(shared.scheduler.now()),
            episode,
        };
        core.status_index = 0;
        core.last_failure = None;

        let weak = Arc::downgrade(shared);
        core.ticker = Some(shared.scheduler.schedule_repeating(
            shared.settings.status_period,
            Box::new(move || with_shared(&weak, |s| s.rotate_status(episode))),
        ));

        let weak = Arc::downgrade(shared);
        core.acceptance_timer = Some(shared.scheduler.schedule_once(
            shared.settings.acceptance_delay,
            Box::new(move || with_shared(&weak, |s| s.accept(episode))),
        ));

        info!("Emergency request {} issued, searching for responders", episode);
        shared.publish(&mut core)
    }

    pub fn select_volunteer(&self) -> Result<DispatchSnapshot, DispatchError> {
        self.shared.transition(
            DispatchAction::SelectVolunteer,
            DispatchState::Accepted,
            DispatchState::VolunteerOffered,
        )
    }

    pub fn back(&self) -> Result<DispatchSnapshot, DispatchError> {
        self.shared
            .transition(DispatchAction::Back, DispatchState::VolunteerOffered, DispatchState::Accepted)
    }

    pub fn dismiss(&self) -> Result<DispatchSnapshot, DispatchError> {
        self.shared
            .transition(DispatchAction::Dismiss, DispatchState::Accepted, DispatchState::Idle)
    }

    /// Abort a request that is still searching, e.g. when a real confirmation
    /// backend reports that no responder is available.
    pub fn report_failure(&self, reason: impl Into<String>) -> Result<DispatchSnapshot, DispatchError> {
        let reason = reason.into();
        let shared = &self.shared;
        let mut core = lock(&shared.core);

        if core.request.state != DispatchState::Searching {
            return Err(shared.reject(&core, DispatchAction::ReportFailure));
        }

        shared.cancel_timers(&mut core);
        warn!("Emergency request {} failed: {}", core.request.episode, reason);
        core.request = DispatchRequest::idle(core.request.episode);
        core.status_index = 0;
        core.last_failure = Some(reason);
        Ok(shared.publish(&mut core))
    }

    /// Cancel every pending timer and return to `Idle`. Safe to call in any state.
    pub fn teardown(&self) {
        let shared = &self.shared;
        let mut core = lock(&shared.core);

        shared.cancel_timers(&mut core);
        if core.request.state != DispatchState::Idle {
            debug!("Tearing down emergency request {}", core.request.episode);
            core.request = DispatchRequest::idle(core.request.episode);
            core.status_index = 0;
            shared.publish(&mut core);
        }
    }
}

impl Drop for DispatchStateMachine {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn with_shared(weak: &Weak<DispatchShared>, f: impl FnOnce(&DispatchShared)) {
    if let Some(shared) = weak.upgrade() {
        f(&shared);
    }
}

impl DispatchShared {
    fn rotate_status(&self, episode: u64) {
        let mut core = lock(&self.core);
        if core.request.episode != episode || core.request.state != DispatchState::Searching {
            return;
        }

        let count = self.settings.status_messages.len().max(1);
        core.status_index = (core.status_index + 1) % count;
        debug!("Emergency request {} status message {}", episode, core.status_index);
        self.publish(&mut core);
    }

    fn accept(&self, episode: u64) {
        let mut core = lock(&self.core);
        // A stale callback must not forget the timer of the episode that replaced it.
        if core.request.episode != episode || core.request.state != DispatchState::Searching {
            return;
        }

        core.acceptance_timer = None;
        if let Some(ticker) = core.ticker.take() {
            self.scheduler.cancel(ticker);
        }
        core.request.state = DispatchState::Accepted;

        info!(
            "Emergency request {} accepted by {} (ETA {} min)",
            episode, self.settings.provider_name, self.settings.eta_minutes
        );
        self.publish(&mut core);
    }

    fn transition(
        &self,
        action: DispatchAction,
        from: DispatchState,
        to: DispatchState,
    ) -> Result<DispatchSnapshot, DispatchError> {
        let mut core = lock(&self.core);
        if core.request.state != from {
            return Err(self.reject(&core, action));
        }

        if to == DispatchState::Idle {
            core.request = DispatchRequest::idle(core.request.episode);
            core.status_index = 0;
        } else {
            core.request.state = to;
        }

        info!("Emergency request {}: {} -> {} ({})", core.request.episode, from, to, action);
        Ok(self.publish(&mut core))
    }

    fn reject(&self, core: &DispatchCore, action: DispatchAction) -> DispatchError {
        warn!("Rejected {} while {}", action, core.request.state);
        DispatchError::InvalidTransition {
            from: core.request.state,
            action,
        }
    }

    fn cancel_timers(&self, core: &mut DispatchCore) {
        if let Some(ticker) = core.ticker.take() {
            self.scheduler.cancel(ticker);
        }
        if let Some(timer) = core.acceptance_timer.take() {
            self.scheduler.cancel(timer);
        }
    }

    fn publish(&self, core: &mut DispatchCore) -> DispatchSnapshot {
        core.revision += 1;
        let snapshot = build_snapshot(core, &self.settings);
        self.updates.send_replace(snapshot.clone());
        snapshot
    }
}

fn build_snapshot(core: &DispatchCore, settings: &DispatchSettings) -> DispatchSnapshot {
    let state = core.request.state;
    let accepted = matches!(state, DispatchState::Accepted | DispatchState::VolunteerOffered);
    let volunteer = state == DispatchState::VolunteerOffered;

    DispatchSnapshot {
        state,
        created_at: core.request.created_at,
        status_message: (state == DispatchState::Searching)
            .then(|| settings.status_messages.get(core.status_index).cloned())
            .flatten(),
        eta_minutes: accepted.then_some(settings.eta_minutes),
        provider_name: accepted.then(|| settings.provider_name.clone()),
        attending_physician: accepted.then(|| settings.attending_physician.clone()),
        volunteer_name: volunteer.then(|| settings.volunteer_name.clone()),
        volunteer_eta_minutes: volunteer.then_some(settings.volunteer_eta_minutes),
        last_failure: core.last_failure.clone(),
        revision: core.revision,
    }
}
