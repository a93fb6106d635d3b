use std::sync::{Arc, Mutex};

use crate::balance::strategy::Strategy;
use crate::balance::worker::Worker;
use crate::error::DispatchError;

/// Hands items to workers in turn, wrapping after the last one.
///
/// The cursor is read and advanced under one mutex, so concurrent dispatchers
/// never pick the same slot of the rotation twice.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send + 'static> Strategy<T> for RoundRobin {
    fn select(&self, pool: &[Arc<Worker<T>>], _item: &T) -> Result<usize, DispatchError> {
        if pool.is_empty() {
            return Err(DispatchError::NoWorkers);
        }
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let picked = *cursor % pool.len();
        *cursor = (picked + 1) % pool.len();
        Ok(picked)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
