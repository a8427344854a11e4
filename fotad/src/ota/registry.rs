//! Session table keyed by device and update kind

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use crate::lwm2m::DeviceId;
use crate::ota::kind::UpdateKind;
use crate::ota::session::UpdateSession;

/// Session handle; the mutex serializes every mutation of one session
pub type SessionHandle = Arc<Mutex<UpdateSession>>;

/// Registry of update sessions.
///
/// The table lock is only held for lookups. Work on a session happens under
/// that session's own lock, so sessions of different devices never contend.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<(DeviceId, UpdateKind), SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a session
    pub fn get(&self, device: &DeviceId, kind: UpdateKind) -> Option<SessionHandle> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(&(device.clone(), kind)).cloned()
    }

    /// Get a session, creating it on first use
    pub fn get_or_create(&self, device: &DeviceId, kind: UpdateKind) -> SessionHandle {
        if let Some(session) = self.get(device, kind) {
            return session;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry((device.clone(), kind))
            .or_insert_with(|| Arc::new(Mutex::new(UpdateSession::new(kind))))
            .clone()
    }

    /// Remove every session of a device
    pub fn remove_device(&self, device: &DeviceId) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|(id, _), _| id != device);
        before - sessions.len()
    }

    /// Snapshot of all session handles
    pub fn all(&self) -> Vec<((DeviceId, UpdateKind), SessionHandle)> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .iter()
            .map(|(key, session)| (key.clone(), session.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
