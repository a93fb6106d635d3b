use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to an action.
pub type ActionRef = Arc<dyn Action>;

/// One unit of repeated work.
///
/// `token` is cancelled when the owning service stops; long actions should
/// watch it and return [`TaskError::Canceled`].
///
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use taskloom::{Action, TaskError};
///
/// struct Purge {
///     table: String,
/// }
///
/// #[async_trait]
/// impl Action for Purge {
///     fn name(&self) -> &str {
///         &self.table
///     }
///
///     async fn run(&self, token: CancellationToken) -> Result<(), TaskError> {
///         if token.is_cancelled() {
///             return Err(TaskError::Canceled);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run(&self, token: CancellationToken) -> Result<(), TaskError>;
}
