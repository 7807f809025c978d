use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use tracing::{debug, warn};

use qw_core::config::FeedConfig;
use qw_core::error::FetchError;
use qw_core::event::{Event, RawFeature};
use qw_core::feed::{FeedSource, FeedWindow};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("quakewatch/", env!("CARGO_PKG_VERSION"));

/// Wire shape of the feed response. Features are kept as raw JSON values so
/// one undecodable record drops alone instead of failing the whole batch.
#[derive(Debug, Deserialize)]
struct FeedDocument {
    #[serde(default)]
    features: Vec<serde_json::Value>,
}

/// HTTP client for a USGS FDSN-style event feed. Holds no long-lived
/// resource beyond the pooled `reqwest` client; performs no retry.
pub struct UsgsFeedClient {
    client: reqwest::Client,
    config: FeedConfig,
}

impl UsgsFeedClient {
    pub fn new(config: FeedConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| FetchError::Request {
                message: err.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn query(&self, window: &FeedWindow) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("format", "geojson".to_string()),
            (
                "starttime",
                window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "endtime",
                window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("orderby", "time-asc".to_string()),
        ];
        if let Some(min_magnitude) = self.config.min_magnitude {
            query.push(("minmagnitude", min_magnitude.to_string()));
        }
        query
    }
}

#[async_trait]
impl FeedSource for UsgsFeedClient {
    async fn fetch(&self, window: &FeedWindow) -> Result<Vec<Event>, FetchError> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&self.query(window))
            .send()
            .await
            .map_err(|err| FetchError::Request {
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|err| FetchError::Request {
            message: err.to_string(),
        })?;
        let document: FeedDocument =
            serde_json::from_str(&body).map_err(|err| FetchError::Decode {
                message: err.to_string(),
            })?;

        Ok(normalize_features(document.features))
    }
}

/// Maps raw features to events, dropping malformed ones individually.
fn normalize_features(features: Vec<serde_json::Value>) -> Vec<Event> {
    let mut events = Vec::with_capacity(features.len());
    let mut dropped = 0usize;
    for value in features {
        let normalized = serde_json::from_value::<RawFeature>(value)
            .map_err(|err| qw_core::error::MalformedRecord::Undecodable {
                message: err.to_string(),
            })
            .and_then(Event::try_from);
        match normalized {
            Ok(event) => events.push(event),
            Err(err) => {
                dropped += 1;
                debug!(error = %err, "dropping malformed feature");
            }
        }
    }
    if dropped > 0 {
        warn!(dropped, "dropped malformed features from batch");
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn document(json: &str) -> FeedDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn malformed_features_drop_individually() {
        let doc = document(
            r#"{
                "features": [
                    {"id": "a1", "properties": {"time": 1700000000000, "mag": 4.5},
                     "geometry": {"coordinates": [-122.5, 37.8, 8.2]}},
                    {"properties": {"time": 1700000000000}},
                    {"id": "a2", "properties": {"mag": 1.0}},
                    {"id": "a3", "properties": null},
                    {"id": "a4", "properties": {"time": 1700000001000}}
                ]
            }"#,
        );

        let events = normalize_features(doc.features);
        let ids: Vec<&str> = events.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a4"]);
    }

    #[test]
    fn empty_feature_list_yields_no_events() {
        let doc = document(r#"{"features": []}"#);
        assert!(normalize_features(doc.features).is_empty());
    }

    #[test]
    fn missing_features_key_yields_no_events() {
        let doc = document(r#"{"metadata": {"count": 0}}"#);
        assert!(normalize_features(doc.features).is_empty());
    }

    #[test]
    fn magnitude_stays_unset_when_feed_omits_it() {
        let doc = document(
            r#"{
                "features": [
                    {"id": "a1", "properties": {"time": 1700000000000, "mag": 4.5}},
                    {"id": "a2", "properties": {"time": 1700000001000}}
                ]
            }"#,
        );

        let events = normalize_features(doc.features);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].magnitude, Some(4.5));
        assert_eq!(events[1].magnitude, None);
    }

    #[test]
    fn query_encodes_window_and_filter() {
        let client = UsgsFeedClient::new(FeedConfig {
            endpoint: qw_core::config::DEFAULT_FEED_URL.to_string(),
            min_magnitude: Some(2.5),
        })
        .unwrap();
        let window = FeedWindow {
            start: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 1, 12, 5, 0).unwrap(),
        };

        let query = client.query(&window);
        assert!(query.contains(&("format", "geojson".to_string())));
        assert!(query.contains(&("starttime", "2025-06-01T12:00:00Z".to_string())));
        assert!(query.contains(&("endtime", "2025-06-01T12:05:00Z".to_string())));
        assert!(query.contains(&("orderby", "time-asc".to_string())));
        assert!(query.contains(&("minmagnitude", "2.5".to_string())));
    }

    #[test]
    fn query_omits_filter_when_unset() {
        let client = UsgsFeedClient::new(FeedConfig::default()).unwrap();
        let window = FeedWindow {
            start: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 1, 12, 5, 0).unwrap(),
        };

        let query = client.query(&window);
        assert!(!query.iter().any(|(key, _)| *key == "minmagnitude"));
    }
}
