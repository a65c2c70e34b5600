// Last-request-wins bookkeeping for work that runs off the caller's thread.
// Each request takes a ticket; only the newest ticket's result is kept

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Current(T),
    /// A newer request was issued while this one was in flight.
    Superseded,
}

impl<T> Outcome<T> {
    pub fn current(self) -> Option<T> {
        match self {
            Outcome::Current(value) => Some(value),
            Outcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Outcome::Superseded)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LatestRequest {
    generation: Arc<AtomicU64>,
}

impl LatestRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding every ticket handed out before.
    pub fn begin(&self) -> Ticket {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            id,
            generation: Arc::clone(&self.generation),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ticket {
    id: u64,
    generation: Arc<AtomicU64>,
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }

    pub fn finish<T>(&self, value: T) -> Outcome<T> {
        if self.is_current() {
            Outcome::Current(value)
        } else {
            Outcome::Superseded
        }
    }
}
