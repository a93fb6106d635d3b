//! # Worker selection strategies.
//!
//! A [`Strategy`] picks the index of the worker that receives the next item.
//! The pool slice is fixed for the broker's lifetime, so strategies iterate
//! it without locking; any mutable selection state (a cursor, a key map) is
//! guarded by one mutex owned by the strategy instance.
//!
//! | Strategy                          | Picks                                              |
//! |-----------------------------------|----------------------------------------------------|
//! | [`RoundRobin`](super::RoundRobin)   | next worker after the previous pick, wrapping      |
//! | [`LeastLoaded`](super::LeastLoaded) | smallest depth, then oldest `last_assigned`       |
//! | [`KeyGrouping`](super::KeyGrouping) | the worker that first received the item's key      |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::balance::least_loaded::LeastLoaded;
use crate::balance::round_robin::RoundRobin;
use crate::balance::worker::Worker;
use crate::error::DispatchError;

/// Selection policy over a worker pool.
pub trait Strategy<T>: Send + Sync + 'static {
    /// Returns the index of the chosen worker in `pool`.
    ///
    /// Callers guarantee `pool` is not empty.
    fn select(&self, pool: &[Arc<Worker<T>>], item: &T) -> Result<usize, DispatchError>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Strategies constructible from a configuration string.
///
/// Key grouping needs a key function and is built directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    LeastLoaded,
}

impl StrategyKind {
    /// Builds a fresh strategy instance.
    pub fn build<T: Send + 'static>(&self) -> Box<dyn Strategy<T>> {
        match self {
            StrategyKind::RoundRobin => Box::new(RoundRobin::new()),
            StrategyKind::LeastLoaded => Box::new(LeastLoaded::new()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::RoundRobin => write!(f, "round_robin"),
            StrategyKind::LeastLoaded => write!(f, "least_loaded"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "round_robin" | "roundrobin" => Ok(StrategyKind::RoundRobin),
            "least_loaded" | "leastloaded" => Ok(StrategyKind::LeastLoaded),
            other => Err(format!("unknown load balancing strategy: {other}")),
        }
    }
}
