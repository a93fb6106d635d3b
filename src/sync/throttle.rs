//! Minimum spacing between consecutive hand-offs.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Spaces successive releases at least `delay` apart.
///
/// The first call to [`Throttle::ready`] returns immediately.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    /// Waits until the next release is allowed; `false` if `token` fired first.
    pub async fn ready(&mut self, token: &CancellationToken) -> bool {
        if let Some(last) = self.last {
            let due = last + self.delay;
            tokio::select! {
                _ = token.cancelled() => return false,
                _ = tokio::time::sleep_until(due) => {}
            }
        }
        self.last = Some(Instant::now());
        true
    }

    /// Like [`Throttle::ready`] but never gives up.
    pub async fn ready_uncancellable(&mut self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.delay).await;
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn releases_are_spaced() {
        let mut throttle = Throttle::new(Duration::from_millis(100));
        let token = CancellationToken::new();
        let start = Instant::now();

        assert!(throttle.ready(&token).await);
        assert!(throttle.ready(&token).await);
        assert!(throttle.ready(&token).await);

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_reports_false() {
        let mut throttle = Throttle::new(Duration::from_secs(60));
        let token = CancellationToken::new();
        assert!(throttle.ready(&token).await);

        token.cancel();
        assert!(!throttle.ready(&token).await);
    }
}
