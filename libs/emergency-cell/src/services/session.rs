// libs/emergency-cell/src/services/session.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{DispatchError, LocatorError, RankedHospitalList};
use crate::services::dispatch::{DispatchSettings, DispatchStateMachine};
use crate::services::geolocation::GeolocationProvider;
use crate::services::locator::HospitalLocatorService;
use crate::services::scheduler::{lock, Scheduler};

/// State for one user's emergency flow: the latest hospital list and the dispatch request.
pub struct EmergencySession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    last_seen: SyncMutex<DateTime<Utc>>,
    hospitals: RwLock<Option<RankedHospitalList>>,
    lookup: Mutex<()>,
    dispatch: DispatchStateMachine,
}

impl std::fmt::Debug for EmergencySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergencySession")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl EmergencySession {
    pub fn new(id: Uuid, created_at: DateTime<Utc>, dispatch: DispatchStateMachine) -> Self {
        Self {
            id,
            created_at,
            last_seen: SyncMutex::new(created_at),
            hospitals: RwLock::new(None),
            lookup: Mutex::new(()),
            dispatch,
        }
    }

    /// Run a lookup and replace the stored list. Only one lookup per session may be in flight.
    pub async fn locate(
        &self,
        locator: &HospitalLocatorService,
        provider: &dyn GeolocationProvider,
    ) -> Result<RankedHospitalList, LocatorError> {
        let _in_flight = self.lookup.try_lock().map_err(|_| LocatorError::LookupInProgress)?;

        match locator.locate(provider).await {
            Ok(list) => {
                *self.hospitals.write().await = Some(list.clone());
                Ok(list)
            }
            Err(e) => {
                *self.hospitals.write().await = None;
                Err(e)
            }
        }
    }

    pub async fn hospitals(&self) -> Option<RankedHospitalList> {
        self.hospitals.read().await.clone()
    }

    pub fn dispatch(&self) -> &DispatchStateMachine {
        &self.dispatch
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        *lock(&self.last_seen)
    }

    pub fn touch(&self, now: DateTime<Utc>) {
        let mut last_seen = lock(&self.last_seen);
        if now > *last_seen {
            *last_seen = now;
        }
    }

    fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        (now - self.last_seen())
            .to_std()
            .map(|idle| idle >= timeout)
            .unwrap_or(false)
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<EmergencySession>>>,
    scheduler: Arc<dyn Scheduler>,
    settings: DispatchSettings,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(scheduler: Arc<dyn Scheduler>, settings: DispatchSettings, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            scheduler,
            settings,
            idle_timeout,
        }
    }

    /// Create a session. Sessions idle past the timeout are evicted first.
    pub async fn create(&self) -> Arc<EmergencySession> {
        self.evict_idle().await;

        let id = Uuid::new_v4();
        let dispatch = DispatchStateMachine::new(self.scheduler.clone(), self.settings.clone());
        let session = Arc::new(EmergencySession::new(id, self.scheduler.now(), dispatch));

        self.sessions.write().await.insert(id, session.clone());
        info!("Created emergency session {}", id);
        session
    }

    /// Look up a session and mark it as seen.
    pub async fn get(&self, id: Uuid) -> Result<Arc<EmergencySession>, DispatchError> {
        let session = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DispatchError::SessionNotFound)?;

        session.touch(self.scheduler.now());
        Ok(session)
    }

    /// Drop every session not seen within the idle timeout and cancel its timers.
    pub async fn evict_idle(&self) -> usize {
        let now = self.scheduler.now();
        let mut sessions = self.sessions.write().await;

        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|session| session.is_idle(now, self.idle_timeout))
            .map(|session| session.id)
            .collect();

        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                session.dispatch().teardown();
                debug!("Evicted idle emergency session {}", id);
            }
        }

        if !expired.is_empty() {
            info!("Evicted {} idle emergency sessions", expired.len());
        }
        expired.len()
    }

    /// Remove a session and cancel its pending timers.
    pub async fn remove(&self, id: Uuid) -> Result<(), DispatchError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(DispatchError::SessionNotFound)?;

        session.dispatch().teardown();
        debug!("Removed emergency session {}", id);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
