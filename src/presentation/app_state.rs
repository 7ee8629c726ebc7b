// Application state for HTTP handlers
use crate::application::refresh_controller::{ChartHandle, RefreshController, logging_hook};
use crate::domain::error::TelemetryError;
use crate::infrastructure::config::{ChartConfig, DashboardConfig};
use crate::infrastructure::http_source::HttpSnapshotSource;
use crate::infrastructure::svg_surface::SvgSurface;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// One mounted chart: its controller plus what the handlers read.
pub struct ChartEntry {
    pub title: String,
    pub handle: ChartHandle,
    pub frames: watch::Receiver<String>,
    pub interval: Duration,
    controller: Mutex<RefreshController>,
}

impl ChartEntry {
    pub fn from_config(
        config: &ChartConfig,
        vars: &std::collections::HashMap<String, String>,
    ) -> Result<Self, TelemetryError> {
        config.validate()?;

        let source = Arc::new(HttpSnapshotSource::from_config(&config.source, vars)?);
        let controller = RefreshController::new(
            config.id.clone(),
            config.buffer()?,
            config.projection(),
            config.renderer()?,
            source,
        )?
        .with_tick_error_hook(logging_hook(config.id.clone()));

        let (surface, frames) = SvgSurface::new();
        controller.attach_surface(Box::new(surface), config.viewport())?;

        Ok(Self {
            title: config.title.clone(),
            handle: controller.handle(),
            frames,
            interval: config.interval()?,
            controller: Mutex::new(controller),
        })
    }

    pub async fn is_running(&self) -> bool {
        self.controller.lock().await.is_running()
    }

    pub async fn start(&self) -> Result<(), TelemetryError> {
        self.controller.lock().await.start(self.interval)
    }

    pub async fn stop(&self) {
        self.controller.lock().await.stop();
    }
}

pub struct AppState {
    pub charts: BTreeMap<String, ChartEntry>,
}

impl AppState {
    pub fn from_config(config: &DashboardConfig) -> Result<Self, TelemetryError> {
        config.validate()?;

        let mut charts = BTreeMap::new();
        for chart in &config.charts {
            let entry = ChartEntry::from_config(chart, &config.vars)?;
            tracing::info!(
                "Mounted chart {} ({}, {} series)",
                chart.id,
                entry.handle.kind().name(),
                entry.handle.series().len()
            );
            charts.insert(chart.id.clone(), entry);
        }

        Ok(Self { charts })
    }

    pub fn chart(&self, id: &str) -> Option<&ChartEntry> {
        self.charts.get(id)
    }

    pub async fn start_all(&self) -> Result<(), TelemetryError> {
        for entry in self.charts.values() {
            entry.start().await?;
        }
        Ok(())
    }

    pub async fn stop_all(&self) {
        for entry in self.charts.values() {
            entry.stop().await;
        }
    }
}
