use std::sync::Arc;

use crate::balance::strategy::Strategy;
use crate::balance::worker::Worker;
use crate::error::DispatchError;

/// Picks the worker with the smallest queue depth.
///
/// Ties go to the worker assigned longest ago; workers never assigned sort
/// first, then the lowest index wins. Depths are read on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastLoaded;

impl LeastLoaded {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Send + 'static> Strategy<T> for LeastLoaded {
    fn select(&self, pool: &[Arc<Worker<T>>], _item: &T) -> Result<usize, DispatchError> {
        pool.iter()
            .enumerate()
            .min_by_key(|(_, w)| (w.depth(), w.last_assigned()))
            .map(|(idx, _)| idx)
            .ok_or(DispatchError::NoWorkers)
    }

    fn name(&self) -> &'static str {
        "least_loaded"
    }
}
