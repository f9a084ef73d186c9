//! Volume deletion with bounded retry on transient store failures.

use tokio::time::{Instant, sleep};
use tracing::{info, instrument, warn};

use crate::backend::{InstanceDirectory, VolumeStore};
use crate::error::VolumeError;
use crate::volume::VolumeStatus;

use super::VolumeOrchestrator;

impl<S, I> VolumeOrchestrator<S, I>
where
    S: VolumeStore,
    I: InstanceDirectory,
{
    /// Deletes a volume, retrying transient failures under the configured
    /// policy. Deleting an absent volume succeeds.
    ///
    /// # Errors
    ///
    /// See [`VolumeOrchestrator::delete_volume_until`].
    pub async fn delete_volume(&self, volume_id: &str) -> Result<(), VolumeError> {
        self.delete_volume_until(volume_id, None).await
    }

    /// Deletes a volume, giving up before any backoff wait that would end
    /// past `deadline`. An in-flight call is never abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::VolumeInUse`] for attached volumes,
    /// [`VolumeError::RetriesExhausted`] or [`VolumeError::DeadlineExceeded`]
    /// when transient failures persist, and [`VolumeError::Store`] for any
    /// other transport failure.
    #[instrument(skip(self), fields(zone = %self.zone()))]
    pub async fn delete_volume_until(
        &self,
        volume_id: &str,
        deadline: Option<Instant>,
    ) -> Result<(), VolumeError> {
        let existing = match self.require_volume("delete volume", volume_id).await {
            Ok(volume) => volume,
            Err(VolumeError::VolumeNotFound { .. }) => {
                info!("volume already absent");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if existing.status == VolumeStatus::InUse {
            return Err(VolumeError::VolumeInUse {
                volume_id: volume_id.to_owned(),
                instance_id: existing
                    .attached_instance()
                    .map(str::to_owned)
                    .unwrap_or_default(),
            });
        }

        let ids = [volume_id.to_owned()];
        let max_attempts = self.retry.attempts();
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let err = match self.store.delete_volumes(&ids).await {
                Ok(()) => {
                    info!(attempt, "volume deleted");
                    return Ok(());
                }
                Err(err) => err,
            };

            if err.is_business() {
                warn!(attempt, error = %err, "store rejected delete; treating volume as deleted");
                return Ok(());
            }
            if !err.is_retryable() {
                return Err(self.store_error("delete volume", volume_id, err));
            }
            if attempt >= max_attempts {
                return Err(VolumeError::RetriesExhausted {
                    volume_id: volume_id.to_owned(),
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.retry.delay_after(attempt);
            let past_deadline = deadline.is_some_and(|limit| {
                Instant::now()
                    .checked_add(delay)
                    .is_none_or(|wake| wake > limit)
            });
            if past_deadline {
                return Err(VolumeError::DeadlineExceeded {
                    volume_id: volume_id.to_owned(),
                    attempts: attempt,
                    last: err,
                });
            }
            warn!(attempt, delay_secs = delay.as_secs(), error = %err, "delete volume failed; retrying");
            sleep(delay).await;
        }
    }
}
