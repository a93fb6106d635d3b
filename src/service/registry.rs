//! # Service registry: class identifier → constructor.
//!
//! Applications register one factory per class identifier, then resolve
//! [`ServiceSettings`] records into ready-to-start [`ServiceTask`]s.
//!
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use taskloom::{
//!     ActionFn, Bus, PeriodicService, ServiceRef, ServiceRegistry, ServiceSettings, TaskError,
//! };
//!
//! let mut registry = ServiceRegistry::new(Bus::default());
//! registry.register("heartbeat", |settings: &ServiceSettings| {
//!     let beat = ActionFn::arc("beat", |_token: CancellationToken| async {
//!         Ok::<_, TaskError>(())
//!     });
//!     let svc: ServiceRef = Arc::new(PeriodicService::from_settings(beat, settings));
//!     Ok(svc)
//! });
//!
//! let settings = ServiceSettings {
//!     name: "hb".into(),
//!     class_identifier: "heartbeat".into(),
//!     ..ServiceSettings::default()
//! };
//! let task = registry.build(&settings).unwrap();
//! assert_eq!(task.name(), "hb");
//! ```

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{Config, ServiceSettings};
use crate::error::RegistryError;
use crate::events::Bus;
use crate::service::task::ServiceTask;
use crate::service::work_loop::ServiceRef;

type Factory = Box<dyn Fn(&ServiceSettings) -> Result<ServiceRef, RegistryError> + Send + Sync>;

/// Explicit registry of service constructors.
pub struct ServiceRegistry {
    factories: HashMap<String, Factory>,
    bus: Bus,
    grace: Duration,
}

impl ServiceRegistry {
    pub fn new(bus: Bus) -> Self {
        Self {
            factories: HashMap::new(),
            bus,
            grace: Config::default().grace,
        }
    }

    /// Stop grace given to every built task.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Registers (or replaces) the factory for `class`.
    pub fn register<F>(&mut self, class: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ServiceSettings) -> Result<ServiceRef, RegistryError> + Send + Sync + 'static,
    {
        self.factories.insert(class.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Registered class identifiers, sorted.
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    /// Resolves `settings.class_identifier` and wraps the service in a task.
    pub fn build(&self, settings: &ServiceSettings) -> Result<ServiceTask, RegistryError> {
        let factory = self
            .factories
            .get(&settings.class_identifier)
            .ok_or_else(|| RegistryError::UnknownClass {
                class: settings.class_identifier.clone(),
            })?;
        let service = factory(settings)?;
        tracing::debug!(
            service = %settings.name,
            class = %settings.class_identifier,
            "service resolved"
        );
        Ok(ServiceTask::new(settings.name.as_str(), service, self.bus.clone()).with_grace(self.grace))
    }

    /// Builds every record; stops at the first failure.
    pub fn build_all<'a>(
        &self,
        settings: impl IntoIterator<Item = &'a ServiceSettings>,
    ) -> Result<Vec<ServiceTask>, RegistryError> {
        settings.into_iter().map(|s| self.build(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::service::context::ServiceContext;
    use crate::service::work_loop::ServiceFn;

    fn registry() -> ServiceRegistry {
        let mut registry = ServiceRegistry::new(Bus::new(8));
        registry
            .register("noop", |_s: &ServiceSettings| {
                let svc: ServiceRef =
                    ServiceFn::arc(|_ctx: ServiceContext| async { Ok::<_, TaskError>(()) });
                Ok(svc)
            })
            .register("picky", |s: &ServiceSettings| {
                if s.number_of_workers == 0 {
                    return Err(RegistryError::Construction {
                        class: s.class_identifier.clone(),
                        reason: "needs at least one worker".into(),
                    });
                }
                Ok(ServiceFn::arc(|_ctx: ServiceContext| async { Ok::<_, TaskError>(()) }) as ServiceRef)
            });
        registry
    }

    fn settings(name: &str, class: &str) -> ServiceSettings {
        ServiceSettings {
            name: name.into(),
            class_identifier: class.into(),
            ..ServiceSettings::default()
        }
    }

    #[test]
    fn unknown_class_is_reported() {
        let err = registry().build(&settings("x", "missing")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownClass {
                class: "missing".into()
            }
        );
    }

    #[test]
    fn factory_errors_pass_through() {
        let mut s = settings("p", "picky");
        s.number_of_workers = 0;
        assert!(matches!(
            registry().build(&s),
            Err(RegistryError::Construction { .. })
        ));
    }

    #[test]
    fn builds_named_tasks() {
        let registry = registry();
        assert_eq!(registry.classes(), vec!["noop", "picky"]);

        let all = [settings("a", "noop"), settings("b", "picky")];
        let tasks = registry.build_all(&all).unwrap();
        let names: Vec<_> = tasks.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
