use crate::models::Identity;
use crate::provider::IdentityProvider;
use crate::settings::StabilizationSettings;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// Waits for the provider's local session cache to finish restoring
///
/// Reading the current identity right after startup can race with the
/// provider restoring a persisted session, which shows up as a false "nobody
/// signed in". This waits on the provider's ready signal, then polls on a
/// fixed interval until a non-anonymous identity appears or the budget runs out.
#[derive(Clone)]
pub struct StabilizationWaiter {
    provider: Arc<dyn IdentityProvider>,
    poll_interval: Duration,
}

impl StabilizationWaiter {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: &StabilizationSettings) -> Self {
        Self {
            provider,
            poll_interval: settings.poll_interval(),
        }
    }

    /// Returns as soon as a non-anonymous identity is current, or whatever the
    /// provider reports (possibly `None` or anonymous) once `max_wait` elapses
    pub async fn wait_for_settled_identity(&self, max_wait: Duration) -> Option<Identity> {
        let deadline = Instant::now() + max_wait;

        match timeout(max_wait, self.provider.ready()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Identity provider failed to restore its session: {e}"),
            Err(_) => debug!("Provider ready signal still pending after {max_wait:?}"),
        }

        loop {
            let current = self.provider.current_identity();
            if current.as_ref().is_some_and(|identity| !identity.is_anonymous) {
                return current;
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "Stabilization budget of {max_wait:?} exhausted (identity present: {})",
                    current.is_some()
                );
                return current;
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
