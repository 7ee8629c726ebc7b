// HTTP snapshot source - JSON documents from router backend endpoints
use crate::application::snapshot_source::{NumericSnapshot, SnapshotSource};
use crate::domain::error::TelemetryError;
use crate::infrastructure::config::{prepare_template, SourceConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    body: Option<serde_json::Value>,
}

impl HttpSnapshotSource {
    pub fn new(
        url: String,
        timeout: Duration,
        token: Option<String>,
        body: Option<serde_json::Value>,
    ) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token,
            body,
        })
    }

    pub fn from_config(
        config: &SourceConfig,
        vars: &HashMap<String, String>,
    ) -> Result<Self, TelemetryError> {
        let url = prepare_template(&config.url, vars);
        let body = config
            .body
            .as_ref()
            .map(|body| substitute_strings(body, vars));

        Self::new(
            url,
            Duration::from_millis(config.timeout_ms),
            config.token.clone(),
            body,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let request = match &self.body {
            Some(body) => self.client.post(&self.url).json(body),
            None => self.client.get(&self.url),
        };

        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }
}

/// Apply template variables to every string inside a JSON body.
fn substitute_strings(value: &serde_json::Value, vars: &HashMap<String, String>) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::String(s) => Value::String(prepare_template(s, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_strings(v, vars)).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), substitute_strings(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch_snapshot(&self) -> Result<NumericSnapshot, TelemetryError> {
        tracing::debug!("Fetching snapshot from {}", self.url);

        let response = self
            .request()
            .send()
            .await
            .map_err(|e| TelemetryError::FetchFailure(format!("request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::FetchFailure(format!(
                "{} answered {}: {}",
                self.url, status, body
            )));
        }

        response
            .json::<NumericSnapshot>()
            .await
            .map_err(|e| TelemetryError::FetchFailure(format!("invalid JSON from {}: {}", self.url, e)))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> HashMap<String, String> {
        HashMap::from([("iface".to_string(), "wan".to_string())])
    }

    #[test]
    fn test_body_strings_are_templated() {
        let body = json!({
            "method": "call",
            "params": ["network.interface.${iface}", "status", { "depth": 1 }]
        });

        let result = substitute_strings(&body, &vars());
        assert_eq!(
            result,
            json!({
                "method": "call",
                "params": ["network.interface.wan", "status", { "depth": 1 }]
            })
        );
    }

    #[test]
    fn test_from_config_applies_vars_and_trims_url() {
        let config = SourceConfig {
            url: "http://router/stats/${iface}/".to_string(),
            timeout_ms: 250,
            token: None,
            body: None,
        };

        let source = HttpSnapshotSource::from_config(&config, &vars()).unwrap();
        assert_eq!(source.url(), "http://router/stats/wan");
        assert_eq!(source.describe(), "http://router/stats/wan");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_fetch_failure() {
        let source = HttpSnapshotSource::new(
            "http://127.0.0.1:9/never".to_string(),
            Duration::from_millis(200),
            None,
            None,
        )
        .unwrap();

        let err = source.fetch_snapshot().await.unwrap_err();
        assert!(err.is_external());
    }
}
