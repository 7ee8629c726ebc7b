// HTTP request handlers
use crate::application::refresh_controller::TickStats;
use crate::domain::error::TelemetryError;
use crate::infrastructure::chunked_frames::stream_from_watch;
use crate::infrastructure::http_response::{accepts_brotli, svg_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ChartSummary {
    pub id: String,
    pub title: String,
    pub kind: &'static str,
    pub running: bool,
    pub interval_seconds: u64,
    pub samples: usize,
    pub ticks: TickStats,
}

#[derive(Debug, Deserialize)]
pub struct ViewportRequest {
    pub width: f64,
    pub height: f64,
}

fn not_found(id: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("unknown chart {id}")).into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List all mounted charts
pub async fn list_charts(State(state): State<Arc<AppState>>) -> Json<Vec<ChartSummary>> {
    let mut charts = Vec::with_capacity(state.charts.len());
    for (id, entry) in &state.charts {
        charts.push(ChartSummary {
            id: id.clone(),
            title: entry.title.clone(),
            kind: entry.handle.kind().name(),
            running: entry.is_running().await,
            interval_seconds: entry.interval.as_secs(),
            samples: entry.handle.snapshot().len(),
            ticks: entry.handle.stats(),
        });
    }
    Json(charts)
}

/// Latest drawn frame of one chart as SVG
pub async fn chart_svg(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(entry) = state.chart(&id) else {
        return not_found(&id);
    };

    let mut svg = entry.frames.borrow().clone();
    if svg.is_empty() {
        if let Err(e) = entry.handle.redraw() {
            tracing::error!("Chart {}: redraw failed: {}", id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        svg = entry.frames.borrow().clone();
    }

    match svg_response(svg, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Buffered samples of one chart, oldest first
pub async fn chart_samples(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.chart(&id) {
        Some(entry) => Json(entry.handle.snapshot()).into_response(),
        None => not_found(&id),
    }
}

/// Forget a chart's history; the empty chart is redrawn right away
pub async fn clear_samples(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let Some(entry) = state.chart(&id) else {
        return not_found(&id);
    };

    match entry.handle.clear_history() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::error!("Chart {}: clearing history failed: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Stream every frame of one chart as it is drawn (length-prefixed chunks)
pub async fn stream_chart(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(entry) = state.chart(&id) else {
        return not_found(&id);
    };

    tracing::debug!("Streaming frames of chart {}", id);
    stream_from_watch(entry.frames.clone(), accepts_brotli(&headers))
        .await
        .into_response()
}

/// Resize a chart; the next frame is drawn at the new dimensions right away
pub async fn resize_chart(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ViewportRequest>,
) -> Response {
    let Some(entry) = state.chart(&id) else {
        return not_found(&id);
    };
    let Some(current) = entry.handle.viewport() else {
        return StatusCode::CONFLICT.into_response();
    };

    match entry
        .handle
        .resize(current.resized(request.width, request.height))
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ TelemetryError::InvalidViewport(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("Chart {}: resize failed: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::parse_dashboard_config;
    use axum::body::to_bytes;

    const DASHBOARD: &str = r#"
[[charts]]
id = "traffic"
title = "Traffic"
width = 400
height = 160

[charts.source]
url = "http://127.0.0.1:9/api/traffic"

[[charts.series]]
name = "Down"
pointer = "/rx"
"#;

    fn state() -> Arc<AppState> {
        let config = parse_dashboard_config(DASHBOARD).unwrap();
        Arc::new(AppState::from_config(&config).unwrap())
    }

    #[tokio::test]
    async fn test_list_charts_reports_idle_chart() {
        let Json(charts) = list_charts(State(state())).await;
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].id, "traffic");
        assert_eq!(charts[0].kind, "line");
        assert!(!charts[0].running);
        assert_eq!(charts[0].samples, 0);
    }

    #[tokio::test]
    async fn test_chart_svg_serves_latest_frame() {
        let state = state();
        let handle = &state.chart("traffic").unwrap().handle;
        handle.ingest(&serde_json::json!({ "rx": 2048 }), 1_000).unwrap();
        handle.ingest(&serde_json::json!({ "rx": 512 }), 6_000).unwrap();

        let response = chart_svg(Path("traffic".to_string()), HeaderMap::new(), State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let svg = String::from_utf8(body.to_vec()).unwrap();
        assert!(svg.contains("<polyline"));
        assert!(!svg.contains("No data"));
    }

    #[tokio::test]
    async fn test_clear_samples_empties_history() {
        let state = state();
        let entry = state.chart("traffic").unwrap();
        entry.handle.ingest(&serde_json::json!({ "rx": 10 }), 0).unwrap();

        let response = clear_samples(Path("traffic".to_string()), State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(entry.handle.snapshot().is_empty());
        assert!(entry.frames.borrow().contains("No data"));
    }

    #[tokio::test]
    async fn test_unknown_chart_is_not_found() {
        let response = chart_samples(Path("nope".to_string()), State(state())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resize_validates_dimensions() {
        let state = state();

        let response = resize_chart(
            Path("traffic".to_string()),
            State(state.clone()),
            Json(ViewportRequest {
                width: 800.0,
                height: 300.0,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(state.chart("traffic").unwrap().frames.borrow().contains(r#"width="800""#));

        let response = resize_chart(
            Path("traffic".to_string()),
            State(state),
            Json(ViewportRequest {
                width: 0.0,
                height: 300.0,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
