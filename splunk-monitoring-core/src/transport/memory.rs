//! In-memory transport

use std::sync::{Mutex, MutexGuard};

use crate::error::Result;
use crate::event::Event;

use super::{Transport, TransportSettings};

/// Keeps every event it is handed, in order.
#[derive(Debug)]
pub struct MemoryTransport {
    settings: TransportSettings,
    events: Mutex<Vec<Event>>,
}

impl MemoryTransport {
    /// Settings this transport was configured with
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return the recorded events
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn configure(settings: &TransportSettings) -> Result<Self> {
        Ok(Self {
            settings: settings.clone(),
            events: Mutex::new(Vec::new()),
        })
    }

    fn send_event(&self, event: Event) {
        self.lock().push(event);
    }
}
