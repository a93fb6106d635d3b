//! # Subscriber that forwards events to `tracing`.
//!
//! [`LogWriter`] is the logging collaborator of the runtime: it writes every
//! event it receives at the level derived from the event's
//! [`Severity`](crate::Severity), with the event metadata as structured fields.
//!
//! `Fatal` has no `tracing` level of its own; it is written at `ERROR` with
//! `fatal = true`.
//!
//! ```text
//! [service_failed] name=ingest correlation=… reason="execution failed: db down"
//! [dispatch_failed] name=ingest worker=2 reason="worker 2 is closed"
//! [job_completed] name=nightly-report result=SUCCESS
//! ```

use async_trait::async_trait;

use crate::events::{Event, Severity};
use crate::subscribers::Subscribe;

/// Forwards runtime events to the installed `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

macro_rules! emit {
    ($level:ident, $ev:expr, $($extra:tt)*) => {
        tracing::$level!(
            seq = $ev.seq,
            name = $ev.name.as_deref(),
            reason = $ev.reason.as_deref(),
            worker = $ev.worker,
            result = $ev.result.map(tracing::field::display),
            delay_ms = $ev.delay_ms,
            correlation = $ev.correlation.map(tracing::field::display),
            $($extra)*
            "[{}]",
            $ev.kind.as_label()
        )
    };
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, ev: &Event) {
        match ev.severity() {
            Severity::Debug => emit!(debug, ev,),
            Severity::Information => emit!(info, ev,),
            Severity::Warning => emit!(warn, ev,),
            Severity::Error => emit!(error, ev,),
            Severity::Fatal => emit!(error, ev, fatal = true,),
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
