// Refresh controller - Polling loop gluing a snapshot source to a chart
use crate::application::chart_renderer::ChartRenderer;
use crate::application::projection::{SampleProjection, SeriesProjection};
use crate::application::snapshot_source::{NumericSnapshot, SnapshotSource};
use crate::domain::chart::{ChartKind, ChartViewport};
use crate::domain::error::TelemetryError;
use crate::domain::sample::{Sample, SampleBuffer};
use crate::domain::series::SeriesDescriptor;
use crate::domain::surface::Surface;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

/// Receives every error that made a tick skip its update.
pub type TickErrorHook = Arc<dyn Fn(&TelemetryError) + Send + Sync>;

/// Default policy: log and carry on. Backend failures are `warn`, local
/// faults are `error`.
pub fn logging_hook(chart_id: impl Into<String>) -> TickErrorHook {
    let chart_id = chart_id.into();
    Arc::new(move |err: &TelemetryError| {
        if err.is_external() {
            tracing::warn!("Chart {}: tick skipped: {}", chart_id, err);
        } else {
            tracing::error!("Chart {}: tick rejected: {}", chart_id, err);
        }
    })
}

/// Counted by what a tick did to the buffer: `applied` pushed a sample,
/// `primed` only seeded rate counters, `skipped` left the buffer untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub applied: u64,
    pub primed: u64,
    pub skipped: u64,
}

struct Pipeline {
    chart_id: String,
    buffer: SampleBuffer,
    projection: SampleProjection,
    renderer: ChartRenderer,
    surface: Option<Box<dyn Surface>>,
    viewport: Option<ChartViewport>,
    stats: TickStats,
}

impl Pipeline {
    fn ingest(&mut self, snapshot: &NumericSnapshot, timestamp_ms: i64) -> Result<(), TelemetryError> {
        let projected = self
            .projection
            .project(snapshot, timestamp_ms)
            .inspect_err(|_| self.stats.skipped += 1)?;
        let Some(sample) = projected else {
            self.stats.primed += 1;
            tracing::debug!("Chart {}: counters primed, waiting for next snapshot", self.chart_id);
            return Ok(());
        };

        self.buffer
            .push(sample)
            .inspect_err(|_| self.stats.skipped += 1)?;
        self.stats.applied += 1;
        tracing::debug!(
            "Chart {}: {} of {} samples buffered",
            self.chart_id,
            self.buffer.len(),
            self.buffer.capacity()
        );
        self.redraw()
    }

    fn redraw(&mut self) -> Result<(), TelemetryError> {
        let (Some(surface), Some(viewport)) = (self.surface.as_mut(), self.viewport.as_ref()) else {
            return Ok(());
        };
        self.renderer.draw(&self.buffer, viewport, &mut **surface)
    }
}

/// Shared view of one chart's buffer and surface. Cheap to clone; the
/// hosting view uses it to read history and push resizes while the
/// controller owns the timer.
#[derive(Clone)]
pub struct ChartHandle {
    pipeline: Arc<Mutex<Pipeline>>,
}

impl ChartHandle {
    fn lock(&self) -> MutexGuard<'_, Pipeline> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn chart_id(&self) -> String {
        self.lock().chart_id.clone()
    }

    pub fn kind(&self) -> ChartKind {
        self.lock().renderer.kind()
    }

    pub fn series(&self) -> Vec<SeriesDescriptor> {
        self.lock().renderer.series().to_vec()
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock().buffer.snapshot()
    }

    pub fn stats(&self) -> TickStats {
        self.lock().stats
    }

    pub fn viewport(&self) -> Option<ChartViewport> {
        self.lock().viewport
    }

    /// Install the surface to draw on and redraw right away.
    pub fn attach_surface(
        &self,
        surface: Box<dyn Surface>,
        viewport: ChartViewport,
    ) -> Result<(), TelemetryError> {
        viewport.validate()?;
        let mut pipeline = self.lock();
        pipeline.surface = Some(surface);
        pipeline.viewport = Some(viewport);
        pipeline.redraw()
    }

    /// Keep the current surface, draw at new dimensions.
    pub fn resize(&self, viewport: ChartViewport) -> Result<(), TelemetryError> {
        viewport.validate()?;
        let mut pipeline = self.lock();
        pipeline.viewport = Some(viewport);
        pipeline.redraw()
    }

    pub fn redraw(&self) -> Result<(), TelemetryError> {
        self.lock().redraw()
    }

    /// Project, buffer and draw one snapshot as a single step.
    pub fn ingest(&self, snapshot: &NumericSnapshot, timestamp_ms: i64) -> Result<(), TelemetryError> {
        self.lock().ingest(snapshot, timestamp_ms)
    }

    /// Drop the history and any rate counters, then redraw the empty chart.
    pub fn clear_history(&self) -> Result<(), TelemetryError> {
        let mut pipeline = self.lock();
        pipeline.buffer.clear();
        pipeline.projection.reset();
        tracing::info!("Chart {}: history cleared", pipeline.chart_id);
        pipeline.redraw()
    }

    fn record_skip(&self) {
        self.lock().stats.skipped += 1;
    }

    /// Swap the series set. History and counter state are dropped because old
    /// samples no longer match the new shape.
    pub fn reconfigure_series(
        &self,
        series: Vec<SeriesDescriptor>,
        projections: Vec<SeriesProjection>,
    ) -> Result<(), TelemetryError> {
        if series.len() != projections.len() {
            return Err(TelemetryError::Config(format!(
                "{} series descriptors but {} projections",
                series.len(),
                projections.len()
            )));
        }

        let mut pipeline = self.lock();
        validate_gauge(pipeline.renderer.kind(), series.len())?;
        pipeline.buffer.reset(series.len());
        pipeline.projection = SampleProjection::new(projections);
        pipeline.renderer = pipeline.renderer.clone().with_series(series);
        pipeline.redraw()
    }
}

fn validate_gauge(kind: ChartKind, series_count: usize) -> Result<(), TelemetryError> {
    match kind {
        ChartKind::Gauge { series } if series >= series_count => Err(TelemetryError::Config(format!(
            "gauge reads series {series} but the chart has {series_count}"
        ))),
        _ => Ok(()),
    }
}

/// A scheduled timer. Dropping the session cancels the timer and every tick
/// still waiting on its fetch.
pub struct RefreshSession {
    task: JoinHandle<()>,
    interval: Duration,
}

impl RefreshSession {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RefreshSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Idle/Running state machine around one chart. Construct on mount, `start`
/// when the view becomes visible, `stop` (or drop) when it goes away.
pub struct RefreshController {
    handle: ChartHandle,
    source: Arc<dyn SnapshotSource>,
    on_tick_error: TickErrorHook,
    session: Option<RefreshSession>,
}

impl RefreshController {
    pub fn new(
        chart_id: impl Into<String>,
        buffer: SampleBuffer,
        projection: SampleProjection,
        renderer: ChartRenderer,
        source: Arc<dyn SnapshotSource>,
    ) -> Result<Self, TelemetryError> {
        let chart_id = chart_id.into();
        let series_count = renderer.series().len();

        if projection.series_count() != series_count || buffer.series_count() != series_count {
            return Err(TelemetryError::Config(format!(
                "chart {}: {} series, {} projections, buffer of {}",
                chart_id,
                series_count,
                projection.series_count(),
                buffer.series_count()
            )));
        }
        validate_gauge(renderer.kind(), series_count)?;

        let on_tick_error = logging_hook(chart_id.clone());
        let pipeline = Pipeline {
            chart_id,
            buffer,
            projection,
            renderer,
            surface: None,
            viewport: None,
            stats: TickStats::default(),
        };

        Ok(Self {
            handle: ChartHandle {
                pipeline: Arc::new(Mutex::new(pipeline)),
            },
            source,
            on_tick_error,
            session: None,
        })
    }

    pub fn with_tick_error_hook(mut self, hook: TickErrorHook) -> Self {
        self.on_tick_error = hook;
        self
    }

    pub fn handle(&self) -> ChartHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(RefreshSession::is_active)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.session.as_ref().map(RefreshSession::interval)
    }

    /// Tick once now, then every `interval`. Must be called inside a Tokio
    /// runtime. Starting a running controller does nothing.
    pub fn start(&mut self, interval: Duration) -> Result<(), TelemetryError> {
        if interval.is_zero() {
            return Err(TelemetryError::InvalidInterval);
        }
        if self.is_running() {
            tracing::debug!("Chart {} already polling", self.handle.chart_id());
            return Ok(());
        }

        let task = tokio::spawn(poll_loop(
            self.handle.clone(),
            self.source.clone(),
            self.on_tick_error.clone(),
            interval,
        ));
        self.session = Some(RefreshSession { task, interval });

        tracing::info!(
            "Chart {} polling {} every {:?}",
            self.handle.chart_id(),
            self.source.describe(),
            interval
        );
        Ok(())
    }

    /// Cancel the timer and any in-flight tick. Stopping an idle controller
    /// does nothing.
    pub fn stop(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("Chart {} stopped", self.handle.chart_id());
        }
    }

    pub fn attach_surface(
        &self,
        surface: Box<dyn Surface>,
        viewport: ChartViewport,
    ) -> Result<(), TelemetryError> {
        self.handle.attach_surface(surface, viewport)
    }

    pub fn resize(&self, viewport: ChartViewport) -> Result<(), TelemetryError> {
        self.handle.resize(viewport)
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.handle.snapshot()
    }
}

// Ticks are spawned rather than awaited so a slow fetch never holds back the
// schedule. Overlapping ticks apply their samples in arrival order.
async fn poll_loop(
    handle: ChartHandle,
    source: Arc<dyn SnapshotSource>,
    on_tick_error: TickErrorHook,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                in_flight.spawn(tick(handle.clone(), source.clone(), on_tick_error.clone()));
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        tracing::error!("Chart {}: tick panicked: {}", handle.chart_id(), err);
                    }
                }
            }
        }
    }
}

async fn tick(handle: ChartHandle, source: Arc<dyn SnapshotSource>, on_tick_error: TickErrorHook) {
    let outcome = match source.fetch_snapshot().await {
        Ok(snapshot) => handle.ingest(&snapshot, chrono::Utc::now().timestamp_millis()),
        Err(err) => {
            handle.record_skip();
            Err(err)
        }
    };

    if let Err(err) = outcome {
        on_tick_error(&err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::surface::Frame;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    /// Answers call `n` with `{"value": n}`, optionally late or failing.
    #[derive(Default)]
    struct ScriptedSource {
        calls: AtomicUsize,
        failures: Vec<usize>,
        delays: HashMap<usize, Duration>,
        payloads: HashMap<usize, NumericSnapshot>,
    }

    impl ScriptedSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch_snapshot(&self) -> Result<NumericSnapshot, TelemetryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(&call) {
                sleep(*delay).await;
            }
            if self.failures.contains(&call) {
                return Err(TelemetryError::FetchFailure(format!("call {call} refused")));
            }
            Ok(self
                .payloads
                .get(&call)
                .cloned()
                .unwrap_or_else(|| json!({ "value": call })))
        }
    }

    /// Surface the test can still inspect after handing it to the controller.
    #[derive(Clone, Default)]
    struct SharedFrame(Arc<Mutex<Frame>>);

    impl Surface for SharedFrame {
        fn submit(&mut self, command: crate::domain::surface::DrawCommand) {
            self.0.lock().unwrap().submit(command);
        }

        fn present(&mut self) {
            self.0.lock().unwrap().present();
        }
    }

    fn controller(source: Arc<ScriptedSource>) -> RefreshController {
        RefreshController::new(
            "test",
            SampleBuffer::new(NonZeroUsize::new(60).unwrap(), 1),
            SampleProjection::new(vec![SeriesProjection::new("/value")]),
            ChartRenderer::new(ChartKind::Line, vec![SeriesDescriptor::line("value", "cyan")]),
            source,
        )
        .unwrap()
    }

    fn values(controller: &RefreshController) -> Vec<f64> {
        controller.snapshot().iter().map(|s| s.values[0]).collect()
    }

    const SECOND: Duration = Duration::from_secs(1);

    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_ticks_immediately_and_twice_is_one_timer() {
        let source = Arc::new(ScriptedSource::default());
        let mut controller = controller(source.clone());

        controller.start(SECOND).unwrap();
        controller.start(SECOND).unwrap();
        assert!(controller.is_running());

        settle().await;
        assert_eq!(values(&controller), vec![0.0]);

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(source.calls(), 4);
        assert_eq!(values(&controller), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer_and_is_idempotent() {
        let source = Arc::new(ScriptedSource::default());
        let mut controller = controller(source.clone());

        controller.stop();
        controller.start(SECOND).unwrap();
        settle().await;

        controller.stop();
        controller.stop();
        assert!(!controller.is_running());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls(), 1);

        controller.start(SECOND).unwrap();
        settle().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_skips_tick_without_stopping_loop() {
        let source = Arc::new(ScriptedSource {
            failures: vec![1],
            ..Default::default()
        });
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = errors.clone();
        let mut controller = controller(source.clone()).with_tick_error_hook(Arc::new(move |err: &TelemetryError| {
            assert!(err.is_external());
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        controller.start(SECOND).unwrap();
        settle().await;
        assert_eq!(values(&controller), vec![0.0]);

        sleep(SECOND).await;
        assert_eq!(values(&controller), vec![0.0]);
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        sleep(SECOND).await;
        assert_eq!(values(&controller), vec![0.0, 2.0]);
        assert_eq!(
            controller.handle().stats(),
            TickStats {
                applied: 2,
                primed: 0,
                skipped: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_projection_error_leaves_history_untouched() {
        let source = Arc::new(ScriptedSource {
            payloads: HashMap::from([(1, json!({ "value": "offline" }))]),
            ..Default::default()
        });
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        let mut controller = controller(source).with_tick_error_hook(Arc::new(move |err: &TelemetryError| {
            seen.lock().unwrap().push(err.clone());
        }));

        controller.start(SECOND).unwrap();
        sleep(Duration::from_millis(2010)).await;

        assert_eq!(values(&controller), vec![0.0, 2.0]);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TelemetryError::Projection(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_lands_in_arrival_order() {
        let source = Arc::new(ScriptedSource {
            delays: HashMap::from([(0, Duration::from_millis(2500))]),
            ..Default::default()
        });
        let mut controller = controller(source);

        controller.start(SECOND).unwrap();
        sleep(Duration::from_millis(2600)).await;

        assert_eq!(values(&controller), vec![1.0, 2.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_fetch() {
        let source = Arc::new(ScriptedSource {
            delays: HashMap::from([(0, Duration::from_secs(3))]),
            ..Default::default()
        });
        let mut controller = controller(source);

        controller.start(Duration::from_secs(10)).unwrap();
        settle().await;
        controller.stop();

        sleep(Duration::from_secs(5)).await;
        assert!(controller.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_controller_stops_polling() {
        let source = Arc::new(ScriptedSource::default());
        let mut controller = controller(source.clone());
        controller.start(SECOND).unwrap();
        settle().await;

        drop(controller);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_applied_tick_redraws_attached_surface() {
        let source = Arc::new(ScriptedSource {
            failures: vec![1],
            ..Default::default()
        });
        let mut controller = controller(source);
        let frame = SharedFrame::default();

        controller
            .attach_surface(Box::new(frame.clone()), ChartViewport::new(200.0, 100.0))
            .unwrap();
        assert_eq!(frame.0.lock().unwrap().presented, 1);

        controller.start(SECOND).unwrap();
        sleep(Duration::from_millis(2010)).await;
        assert_eq!(frame.0.lock().unwrap().presented, 3);

        controller.resize(ChartViewport::new(400.0, 100.0)).unwrap();
        let frame = frame.0.lock().unwrap();
        assert_eq!(frame.presented, 4);
        let (points, _) = frame.polylines().next().unwrap();
        assert_eq!(points.last().unwrap().x, 400.0);
    }

    #[test]
    fn test_attach_rejects_invalid_viewport() {
        let controller = controller(Arc::new(ScriptedSource::default()));
        let frame = SharedFrame::default();

        let result = controller.attach_surface(Box::new(frame.clone()), ChartViewport::new(-1.0, 10.0));
        assert!(matches!(result, Err(TelemetryError::InvalidViewport(_))));
        assert!(controller.handle().viewport().is_none());
        assert_eq!(frame.0.lock().unwrap().presented, 0);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut controller = controller(Arc::new(ScriptedSource::default()));
        assert_eq!(controller.start(Duration::ZERO), Err(TelemetryError::InvalidInterval));
        assert!(!controller.is_running());
    }

    #[test]
    fn test_series_count_mismatch_is_rejected() {
        let result = RefreshController::new(
            "bad",
            SampleBuffer::new(NonZeroUsize::new(10).unwrap(), 2),
            SampleProjection::new(vec![SeriesProjection::new("/a")]),
            ChartRenderer::new(ChartKind::Line, vec![SeriesDescriptor::line("a", "cyan")]),
            Arc::new(ScriptedSource::default()),
        );
        assert!(matches!(result, Err(TelemetryError::Config(_))));
    }

    #[test]
    fn test_reconfigure_series_clears_history() {
        let controller = controller(Arc::new(ScriptedSource::default()));
        let handle = controller.handle();
        handle.ingest(&json!({ "value": 4 }), 0).unwrap();
        assert_eq!(handle.snapshot().len(), 1);

        handle
            .reconfigure_series(
                vec![SeriesDescriptor::line("rx", "download"), SeriesDescriptor::line("tx", "upload")],
                vec![SeriesProjection::new("/rx"), SeriesProjection::new("/tx")],
            )
            .unwrap();
        assert!(handle.snapshot().is_empty());

        handle.ingest(&json!({ "rx": 1, "tx": 2 }), 1).unwrap();
        assert_eq!(handle.snapshot()[0].values, vec![1.0, 2.0]);
        assert_eq!(handle.series().len(), 2);
    }

    fn rate_controller() -> RefreshController {
        RefreshController::new(
            "rate",
            SampleBuffer::new(NonZeroUsize::new(10).unwrap(), 1),
            SampleProjection::new(vec![SeriesProjection::new("/rx").as_rate()]),
            ChartRenderer::new(ChartKind::Line, vec![SeriesDescriptor::line("rx", "download")]),
            Arc::new(ScriptedSource::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_stats_follow_what_reached_the_buffer() {
        let handle = rate_controller().handle();

        handle.ingest(&json!({ "rx": 100 }), 0).unwrap();
        assert_eq!(handle.stats(), TickStats { applied: 0, primed: 1, skipped: 0 });
        assert!(handle.snapshot().is_empty());

        handle.ingest(&json!({ "rx": 300 }), 2000).unwrap();
        assert!(handle.ingest(&json!({ "rx": "n/a" }), 4000).is_err());
        assert_eq!(handle.stats(), TickStats { applied: 1, primed: 1, skipped: 1 });
        assert_eq!(handle.snapshot()[0].values, vec![100.0]);
    }

    #[test]
    fn test_clear_history_resets_counters_and_redraws() {
        let controller = rate_controller();
        let handle = controller.handle();
        let frame = SharedFrame::default();
        controller
            .attach_surface(Box::new(frame.clone()), ChartViewport::new(200.0, 100.0))
            .unwrap();

        handle.ingest(&json!({ "rx": 100 }), 0).unwrap();
        handle.ingest(&json!({ "rx": 300 }), 1000).unwrap();
        assert_eq!(handle.snapshot().len(), 1);

        handle.clear_history().unwrap();
        assert!(handle.snapshot().is_empty());
        assert!(frame.0.lock().unwrap().texts().any(|t| t == "No data"));

        // the next snapshot only primes the counters again
        handle.ingest(&json!({ "rx": 900 }), 2000).unwrap();
        assert!(handle.snapshot().is_empty());
        assert_eq!(handle.stats().primed, 2);
    }
}
