use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::SessionEvent;
use crate::{
    db::HistoryStore,
    estimates::EstimateSelector,
    models::EstimateResult,
    sensor::SampleReceiver,
    settings::SettingsStore,
    shake::{ShakeDetector, ShakeEdgeTracker, ShakeState},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const PERSIST_ATTEMPTS: u32 = 3;
pub const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Collaborators shared by the session loop.
#[derive(Clone)]
pub struct SessionContext {
    pub selector: EstimateSelector,
    pub settings: Arc<SettingsStore>,
    pub events: broadcast::Sender<SessionEvent>,
    pub persist_tx: mpsc::UnboundedSender<EstimateResult>,
}

/// Runs the detector over the sample stream until cancelled or the stream
/// ends. Owns the detector, so no locking is needed around it.
pub async fn session_loop(
    mut samples: SampleReceiver,
    ctx: SessionContext,
    cancel_token: CancellationToken,
    mut monitor_rx: watch::Receiver<bool>,
) -> Result<()> {
    let mut detector = ShakeDetector::new();
    let mut tracker = ShakeEdgeTracker::new();

    if *monitor_rx.borrow_and_update() {
        detector.start_monitoring();
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("session loop shutting down");
                break;
            }
            changed = monitor_rx.changed() => {
                if changed.is_err() {
                    log_warn!("session controller dropped; stopping session loop");
                    break;
                }
                let monitoring = *monitor_rx.borrow_and_update();
                apply_monitoring(&mut detector, &mut tracker, monitoring);
            }
            sample = samples.recv() => {
                let Some(sample) = sample else {
                    log_info!("sensor stream ended");
                    break;
                };

                let Some(state) = detector.process_sample(&sample) else {
                    continue;
                };
                let _ = ctx.events.send(SessionEvent::ShakeStateChanged(state));

                if let Some(finished) = tracker.observe(&state) {
                    if let Err(err) = finish_shake(&ctx, finished) {
                        log_error!("estimate selection failed: {err:#}");
                        return Err(err);
                    }
                    detector.reset();
                }
            }
        }
    }

    Ok(())
}

fn apply_monitoring(detector: &mut ShakeDetector, tracker: &mut ShakeEdgeTracker, monitoring: bool) {
    if monitoring == detector.is_monitoring() {
        return;
    }

    if monitoring {
        detector.start_monitoring();
        log_info!("shake monitoring resumed");
    } else {
        detector.stop_monitoring();
        if tracker.in_episode() {
            log_info!("shake monitoring paused mid-shake; episode dropped");
        }
        detector.reset();
        tracker.clear();
    }
}

fn finish_shake(ctx: &SessionContext, finished: ShakeState) -> Result<()> {
    let requested = ctx.settings.selected_mode();
    let result = ctx
        .selector
        .generate(finished.intensity, finished.duration, requested)
        .context("failed to select an estimate")?;

    log_info!(
        "shake ended: intensity={:.2} duration={}ms mode={} -> '{}'",
        result.intensity,
        result.duration_ms,
        result.mode,
        result.text
    );

    let _ = ctx.events.send(SessionEvent::EstimateReady(result.clone()));
    if ctx.persist_tx.send(result).is_err() {
        log_warn!("history writer is gone; estimate not saved");
    }
    Ok(())
}

/// Appends estimates to history in the order they were produced. A failed
/// append is retried, then logged and dropped.
pub async fn persist_worker(
    mut results: mpsc::UnboundedReceiver<EstimateResult>,
    history: Arc<dyn HistoryStore>,
    settings: Arc<SettingsStore>,
) {
    while let Some(result) = results.recv().await {
        let max_entries = settings.max_history_size();
        let mut attempt = 1;
        loop {
            match history.append(&result, max_entries).await {
                Ok(()) => {
                    log_debug!("saved estimate {} to history", result.id);
                    break;
                }
                Err(err) if attempt < PERSIST_ATTEMPTS => {
                    log_warn!(
                        "history append failed (attempt {}/{}): {err:#}",
                        attempt,
                        PERSIST_ATTEMPTS
                    );
                    attempt += 1;
                    tokio::time::sleep(PERSIST_RETRY_DELAY).await;
                }
                Err(err) => {
                    log_error!("dropping estimate {} after {} attempts: {err:#}", result.id, attempt);
                    break;
                }
            }
        }
    }
}
