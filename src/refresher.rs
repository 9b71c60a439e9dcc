//! Periodic Wyze token refresh
//!
//! Runs beside the listener. Every interval it trades the current refresh
//! token for a new pair and swaps it into the shared [`Session`]. A failed
//! refresh is logged and the old pair stays in place until the next tick.

use crate::shutdown;
use crate::wyze::{DeviceApi, Session, WyzeError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, Instrument};

pub struct SessionRefresher {
    api: Arc<dyn DeviceApi>,
    session: Session,
    interval: Duration,
}

impl SessionRefresher {
    pub fn new(api: Arc<dyn DeviceApi>, session: Session, interval: Duration) -> Self {
        Self {
            api,
            session,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Perform one refresh and replace the session's token pair
    pub async fn refresh_once(&self) -> Result<(), WyzeError> {
        let current = self.session.refresh_token();
        let tokens = self.api.refresh_token(&current).await?;
        self.session.replace(tokens);
        Ok(())
    }

    /// Refresh every interval until shutdown
    ///
    /// The first refresh happens one full interval after start.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Started Wyze session refresher (every {}s)",
            self.interval.as_secs()
        );

        let mut refreshes: u64 = 0;
        while shutdown::interruptible_sleep(&mut shutdown_rx, self.interval).await {
            refreshes += 1;
            let span = crate::lifecycle_span!(event = "session_refresh", refresh = refreshes);
            async {
                info!("Refreshing Wyze API token...");
                match self.refresh_once().await {
                    Ok(()) => info!("Wyze API token refreshed"),
                    Err(e) => error!("Failed to refresh Wyze API token: {}", e),
                }
            }
            .instrument(span)
            .await;
        }

        info!("Session refresher stopped");
    }
}
