use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::{
    loop_worker::{persist_worker, session_loop, SessionContext},
    SessionEvent,
};
use crate::{
    db::HistoryStore,
    estimates::EstimateSelector,
    models::{EstimateResult, Mode},
    sensor::SensorSource,
    settings::SettingsStore,
};

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Wires a sensor to the detector, turns finished shakes into estimates and
/// hands them to history and to event subscribers.
pub struct SessionCoordinator {
    selector: EstimateSelector,
    settings: Arc<SettingsStore>,
    history: Arc<dyn HistoryStore>,
    events: broadcast::Sender<SessionEvent>,
    monitor_tx: watch::Sender<bool>,
    sensor: Option<Box<dyn SensorSource>>,
    handle: Option<JoinHandle<Result<()>>>,
    persist_handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SessionCoordinator {
    pub fn new(
        selector: EstimateSelector,
        settings: Arc<SettingsStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (monitor_tx, _) = watch::channel(true);

        Self {
            selector,
            settings,
            history,
            events,
            monitor_tx,
            sensor: None,
            handle: None,
            persist_handle: None,
            cancel_token: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Pause or resume shake detection. Pausing drops any shake in progress.
    pub fn set_monitoring(&self, monitoring: bool) {
        self.monitor_tx.send_replace(monitoring);
    }

    pub fn is_monitoring(&self) -> bool {
        *self.monitor_tx.borrow()
    }

    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || settings.set_selected_mode(mode))
            .await
            .context("settings writer join failed")?
    }

    /// Change the history cap and prune right away.
    pub async fn update_max_history_size(&self, max_history_size: u32) -> Result<u64> {
        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || settings.set_max_history_size(max_history_size))
            .await
            .context("settings writer join failed")??;
        let removed = self.history.prune(max_history_size).await?;
        if removed > 0 {
            info!("Pruned {removed} estimates after history cap changed to {max_history_size}");
        }
        Ok(removed)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<EstimateResult>> {
        self.history.query(limit).await
    }

    pub async fn start(&mut self, mut sensor: Box<dyn SensorSource>) -> Result<()> {
        if self.handle.is_some() {
            bail!("session already running");
        }

        if !sensor.is_supported() {
            warn!("No accelerometer available; shakes will not be detected");
            self.sensor = Some(sensor);
            return Ok(());
        }

        let (sample_tx, sample_rx) = mpsc::unbounded_channel();
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();

        sensor.start(sample_tx).context("failed to start sensor")?;

        let persist_handle = tokio::spawn(persist_worker(
            persist_rx,
            Arc::clone(&self.history),
            Arc::clone(&self.settings),
        ));

        let ctx = SessionContext {
            selector: self.selector.clone(),
            settings: Arc::clone(&self.settings),
            events: self.events.clone(),
            persist_tx,
        };
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(session_loop(
            sample_rx,
            ctx,
            cancel_token.clone(),
            self.monitor_tx.subscribe(),
        ));

        self.sensor = Some(sensor);
        self.handle = Some(handle);
        self.persist_handle = Some(persist_handle);
        self.cancel_token = Some(cancel_token);
        info!("Shake session started");
        Ok(())
    }

    /// Wait for the session loop to finish on its own, which happens when the
    /// sensor stream ends or selection hits a configuration error.
    pub async fn wait(&mut self) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };

        let outcome = handle.await;
        self.handle = None;
        outcome.map_err(|err| anyhow!("session loop task failed: {err}"))?
    }

    /// Stop the sensor and the loop, then let pending history writes finish.
    /// Shutdown always runs to the end; the first failure is returned.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let sensor_result = match self.sensor.take() {
            Some(mut sensor) => sensor.stop().await.context("failed to stop sensor"),
            None => Ok(()),
        };
        if let Err(err) = &sensor_result {
            warn!("{err:#}");
        }

        let loop_result = match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|err| anyhow!("session loop task failed: {err}"))
                .and_then(|result| result),
            None => Ok(()),
        };

        let persist_result = match self.persist_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|err| anyhow!("history writer task failed: {err}")),
            None => Ok(()),
        };

        info!("Shake session stopped");
        sensor_result.and(loop_result).and(persist_result)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::{
        db::Database,
        estimates::{EstimatePools, Tier},
        sensor::{Phase, SimulatedSensor, UnsupportedSensor},
        settings::Settings,
    };

    struct Fixture {
        _dir: TempDir,
        settings: Arc<SettingsStore>,
        history: Arc<Database>,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
        let history = Arc::new(Database::open_in_memory().unwrap());
        Fixture {
            _dir: dir,
            settings,
            history,
        }
    }

    fn coordinator(fixture: &Fixture) -> SessionCoordinator {
        SessionCoordinator::new(
            EstimateSelector::default(),
            Arc::clone(&fixture.settings),
            fixture.history.clone() as Arc<dyn HistoryStore>,
        )
    }

    fn shake(duration_ms: u64, peak_g: f64) -> Phase {
        Phase::Shake {
            duration: Duration::from_millis(duration_ms),
            peak_g,
        }
    }

    fn rest(duration_ms: u64) -> Phase {
        Phase::Rest(Duration::from_millis(duration_ms))
    }

    fn collect_estimates(
        mut rx: broadcast::Receiver<SessionEvent>,
    ) -> JoinHandle<Vec<EstimateResult>> {
        tokio::spawn(async move {
            let mut estimates = Vec::new();
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::EstimateReady(result)) => estimates.push(result),
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
            estimates
        })
    }

    async fn run_pattern(coordinator: &mut SessionCoordinator, pattern: Vec<Phase>) {
        let sensor = SimulatedSensor::new(pattern, 50).unpaced();
        coordinator.start(Box::new(sensor)).await.unwrap();
        coordinator.wait().await.unwrap();
        coordinator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn each_finished_shake_yields_one_saved_estimate() {
        let fixture = fixture();
        let mut coordinator = coordinator(&fixture);
        let collector = collect_estimates(coordinator.subscribe());

        run_pattern(
            &mut coordinator,
            vec![rest(200), shake(1000, 3.0), rest(200), shake(16_100, 2.5), rest(200)],
        )
        .await;
        drop(coordinator);
        let estimates = collector.await.unwrap();

        assert_eq!(estimates.len(), 2);

        let first = &estimates[0];
        assert_eq!(first.mode, Mode::Work);
        assert_eq!(first.duration_ms, 980);
        assert!((first.intensity - (10f64.sqrt() - 1.0) / 4.0).abs() < 1e-9);
        let pools = EstimatePools::builtin();
        assert!(pools.pool(Mode::Work, Tier::Hard).contains(&first.text));

        let second = &estimates[1];
        assert_eq!(second.mode, Mode::Humorous);
        assert!(second.duration_ms > 15_000);
        assert!(pools.pool(Mode::Humorous, Tier::Single).contains(&second.text));

        let saved = fixture.history.query(10).await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].id, second.id);
        assert_eq!(saved[1].id, first.id);
    }

    #[tokio::test]
    async fn selected_mode_comes_from_settings() {
        let fixture = fixture();
        fixture
            .settings
            .save(Settings {
                selected_mode: Mode::Generic,
                max_history_size: 10,
            })
            .unwrap();
        let mut coordinator = coordinator(&fixture);

        run_pattern(&mut coordinator, vec![shake(400, 2.5), rest(100)]).await;

        let saved = fixture.history.query(10).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].mode, Mode::Generic);
        let pools = EstimatePools::builtin();
        assert!(pools.pool(Mode::Generic, Tier::Gentle).contains(&saved[0].text));
    }

    #[tokio::test]
    async fn shake_without_an_end_produces_nothing() {
        let fixture = fixture();
        let mut coordinator = coordinator(&fixture);

        run_pattern(&mut coordinator, vec![rest(100), shake(500, 3.0)]).await;

        assert_eq!(fixture.history.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn paused_monitoring_ignores_shakes() {
        let fixture = fixture();
        let mut coordinator = coordinator(&fixture);
        coordinator.set_monitoring(false);
        assert!(!coordinator.is_monitoring());

        run_pattern(&mut coordinator, vec![shake(500, 3.0), rest(100)]).await;

        assert_eq!(fixture.history.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn history_respects_the_cap() {
        let fixture = fixture();
        fixture.settings.set_max_history_size(2).unwrap();
        let mut coordinator = coordinator(&fixture);

        let mut pattern = Vec::new();
        for _ in 0..4 {
            pattern.push(shake(200, 3.0));
            pattern.push(rest(100));
        }
        run_pattern(&mut coordinator, pattern).await;

        assert_eq!(fixture.history.count().await.unwrap(), 2);
        assert_eq!(coordinator.update_max_history_size(1).await.unwrap(), 1);
        assert_eq!(coordinator.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsupported_sensor_is_not_an_error() {
        let fixture = fixture();
        let mut coordinator = coordinator(&fixture);

        coordinator.start(Box::new(UnsupportedSensor)).await.unwrap();
        assert!(!coordinator.is_running());
        coordinator.wait().await.unwrap();
        coordinator.stop().await.unwrap();
    }

    struct FailingHistory {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl HistoryStore for FailingHistory {
        async fn append(&self, _result: &EstimateResult, _max_entries: u32) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("disk full"))
        }

        async fn query(&self, _limit: i64) -> Result<Vec<EstimateResult>> {
            Ok(Vec::new())
        }

        async fn clear(&self) -> Result<()> {
            Ok(())
        }

        async fn count(&self) -> Result<u64> {
            Ok(0)
        }

        async fn prune(&self, _max_entries: u32) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn failing_history_does_not_stop_detection() {
        let fixture = fixture();
        let history = Arc::new(FailingHistory {
            attempts: AtomicUsize::new(0),
        });
        let mut coordinator = SessionCoordinator::new(
            EstimateSelector::default(),
            Arc::clone(&fixture.settings),
            history.clone() as Arc<dyn HistoryStore>,
        );
        let collector = collect_estimates(coordinator.subscribe());

        run_pattern(
            &mut coordinator,
            vec![shake(200, 3.0), rest(100), shake(200, 3.0), rest(100)],
        )
        .await;
        drop(coordinator);

        assert_eq!(collector.await.unwrap().len(), 2);
        assert_eq!(
            history.attempts.load(Ordering::SeqCst),
            2 * crate::session::loop_worker::PERSIST_ATTEMPTS as usize
        );
    }

    struct BrokenStopSensor {
        inner: SimulatedSensor,
    }

    #[async_trait]
    impl SensorSource for BrokenStopSensor {
        fn is_supported(&self) -> bool {
            true
        }

        fn start(&mut self, tx: crate::sensor::SampleSender) -> Result<()> {
            self.inner.start(tx)
        }

        async fn stop(&mut self) -> Result<()> {
            self.inner.stop().await?;
            Err(anyhow!("sensor task panicked"))
        }
    }

    #[tokio::test]
    async fn sensor_stop_failure_still_drains_history() {
        let fixture = fixture();
        let mut coordinator = coordinator(&fixture);
        let sensor = BrokenStopSensor {
            inner: SimulatedSensor::new(vec![shake(300, 3.0), rest(100)], 50).unpaced(),
        };

        coordinator.start(Box::new(sensor)).await.unwrap();
        coordinator.wait().await.unwrap();
        let stopped = coordinator.stop().await;

        assert!(stopped.is_err());
        assert!(!coordinator.is_running());
        assert_eq!(fixture.history.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mode_changes_are_saved() {
        let fixture = fixture();
        let coordinator = coordinator(&fixture);

        coordinator.set_mode(Mode::Generic).await.unwrap();
        assert_eq!(fixture.settings.selected_mode(), Mode::Generic);
        assert!(coordinator.set_mode(Mode::Humorous).await.is_err());
        assert_eq!(fixture.settings.selected_mode(), Mode::Generic);
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let fixture = fixture();
        let mut coordinator = coordinator(&fixture);
        let sensor = SimulatedSensor::new(vec![rest(100)], 50);

        coordinator.start(Box::new(sensor)).await.unwrap();
        let second = SimulatedSensor::new(vec![rest(100)], 50);
        assert!(coordinator.start(Box::new(second)).await.is_err());
        coordinator.stop().await.unwrap();
    }
}
