//! Long-running services.
//!
//! ## Contents
//! - [`ServiceTask`] state machine around one work loop, with [`LifecycleHooks`]
//! - [`Service`] the work loop contract; [`ServiceFn`] builds one from a closure
//! - [`PeriodicService`] run an action, pause, repeat
//! - [`BalancedService`] buffered intake feeding a [`LoadBalancingBroker`](crate::LoadBalancingBroker)
//! - [`ScheduledService`] a [`JobScheduler`](crate::JobScheduler) with periodic job reload
//! - [`BackgroundService`] prioritized queues plus idle-time production
//! - [`ServiceRegistry`] class identifier → constructor
//!
//! ```text
//! ServiceRegistry::build(settings) ──► ServiceTask { Service } ──start(token)──► work loop(ServiceContext)
//! ```

mod background;
mod balanced;
mod context;
mod hooks;
mod periodic;
mod registry;
mod scheduled;
mod status;
mod task;
mod work_loop;

pub use background::{BackgroundHandler, BackgroundService};
pub use balanced::BalancedService;
pub use context::ServiceContext;
pub use hooks::{HookContext, LifecycleHook, LifecycleHooks, LifecyclePhase};
pub use periodic::PeriodicService;
pub use registry::ServiceRegistry;
pub use scheduled::{JobProvider, JobProviderFn, ScheduledService};
pub use status::ServiceStatus;
pub use task::ServiceTask;
pub use work_loop::{Service, ServiceFn, ServiceRef};
