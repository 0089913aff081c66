//! Broadcast dispatcher: fan one message out to many identities.
//!
//! Deliveries run on a bounded worker pool (semaphore-gated JoinSet) so
//! the gateway's own rate limits are respected. Each target is isolated:
//! a failing identity never prevents delivery to the others. Transient
//! failures get a small number of retries with doubling backoff;
//! permanent failures are recorded once. Cancellation is coarse -- no new
//! deliveries are scheduled, in-flight ones finish.

use surveyor_types::error::DeliveryError;
use surveyor_types::identity::Identity;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use std::sync::Arc;
use std::time::Duration;

use crate::gateway::MessagingGateway;

/// Fan-out tuning knobs.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Maximum concurrent deliveries.
    pub workers: usize,
    /// Retries after the first attempt, transient failures only.
    pub max_retries: u32,
    /// Base backoff, doubled per retry.
    pub backoff: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Per-run outcome accounting, returned to the admin caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: Vec<Identity>,
    pub failed: Vec<(Identity, String)>,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.sent.len() + self.failed.len()
    }
}

/// Deliver `message` to every identity in `targets`.
///
/// The report lists sent and failed identities sorted by identity so the
/// outcome is stable regardless of completion order.
pub async fn broadcast<G>(
    gateway: Arc<G>,
    message: String,
    targets: Vec<Identity>,
    config: BroadcastConfig,
    cancel: CancellationToken,
) -> BroadcastReport
where
    G: MessagingGateway + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let message = Arc::new(message);
    let mut tasks: JoinSet<(Identity, Result<(), String>)> = JoinSet::new();

    let total = targets.len();
    for identity in targets {
        // Coarse cancellation: stop scheduling, let in-flight finish.
        if cancel.is_cancelled() {
            warn!(%identity, "broadcast cancelled before scheduling");
            break;
        }
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let gateway = gateway.clone();
        let message = message.clone();
        let max_retries = config.max_retries;
        let backoff = config.backoff;

        tasks.spawn(async move {
            let _permit = permit;
            let result = deliver_with_retry(&*gateway, identity, &message, max_retries, backoff)
                .await;
            (identity, result)
        });
    }

    let mut report = BroadcastReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((identity, Ok(()))) => report.sent.push(identity),
            Ok((identity, Err(reason))) => report.failed.push((identity, reason)),
            Err(e) => warn!(error = %e, "broadcast worker panicked"),
        }
    }

    report.sent.sort();
    report.failed.sort_by_key(|(identity, _)| *identity);

    info!(
        total,
        sent = report.sent.len(),
        failed = report.failed.len(),
        "broadcast finished"
    );
    report
}

/// One target's delivery loop: retry transients, record permanents once.
async fn deliver_with_retry<G: MessagingGateway>(
    gateway: &G,
    identity: Identity,
    message: &str,
    max_retries: u32,
    backoff: Duration,
) -> Result<(), String> {
    let mut delay = backoff;
    for attempt in 0..=max_retries {
        match gateway.notify(identity, message).await {
            Ok(()) => return Ok(()),
            Err(DeliveryError::Permanent(reason)) => {
                debug!(%identity, %reason, "permanent delivery failure");
                return Err(reason);
            }
            Err(DeliveryError::Transient(reason)) => {
                if attempt == max_retries {
                    return Err(reason);
                }
                debug!(%identity, %reason, attempt, "transient delivery failure, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
    unreachable!("retry loop always returns")
}
