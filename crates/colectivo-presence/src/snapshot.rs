//! One-shot fetch of the counterparts already present when a session connects.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::identity::Credential;
use crate::protocol::{CounterpartRecord, DriverPresence, PassengerPresence, Role};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("snapshot request was not authorized")]
    Unauthorized,

    #[error("snapshot request returned status {0}")]
    Status(u16),

    #[error("snapshot response has no '{0}' list")]
    MissingField(String),

    #[error("snapshot response could not be decoded: {0}")]
    Decode(String),
}

/// Source of the current presence lists, independent of the realtime stream.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn waiting_passengers(&self) -> Result<Vec<PassengerPresence>, SnapshotError>;
    async fn active_drivers(&self) -> Result<Vec<DriverPresence>, SnapshotError>;
}

/// Fetch the records an actor of role `observer` is interested in.
pub async fn fetch_for(
    source: &dyn SnapshotSource,
    observer: Role,
) -> Result<Vec<CounterpartRecord>, SnapshotError> {
    Ok(match observer.counterpart() {
        Role::Passenger => source
            .waiting_passengers()
            .await?
            .into_iter()
            .map(CounterpartRecord::from)
            .collect(),
        Role::Driver => source
            .active_drivers()
            .await?
            .into_iter()
            .map(CounterpartRecord::from)
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// Reads `GET {base}/passengers/waiting` and `GET {base}/drivers/active`.
///
/// Responses may be a bare JSON array or an object wrapping the array under
/// `passengers` / `drivers`. Entries that fail to decode are skipped.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    base_url: String,
    credential: Credential,
}

impl HttpSnapshotSource {
    pub fn new(
        base_url: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, SnapshotError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
    ) -> Result<Vec<T>, SnapshotError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Fetching presence snapshot");

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.credential.token())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SnapshotError::Unauthorized);
        }
        if !status.is_success() {
            return Err(SnapshotError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response.json().await?;
        let items = match body {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(mut map) => match map.remove(key) {
                Some(serde_json::Value::Array(items)) => items,
                _ => return Err(SnapshotError::MissingField(key.to_string())),
            },
            other => {
                return Err(SnapshotError::Decode(format!(
                    "expected an array or object, got {other}"
                )))
            }
        };

        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<T>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(url = %url, error = %e, "Skipping malformed snapshot entry");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn waiting_passengers(&self) -> Result<Vec<PassengerPresence>, SnapshotError> {
        self.get_list("passengers/waiting", "passengers").await
    }

    async fn active_drivers(&self) -> Result<Vec<DriverPresence>, SnapshotError> {
        self.get_list("drivers/active", "drivers").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn source(url: &str) -> HttpSnapshotSource {
        HttpSnapshotSource::new(
            format!("{url}/"),
            Credential::new("tok-123"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn wrapped_passenger_list() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/passengers/waiting")
            .match_header("authorization", "Bearer tok-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"passengers": [
                    {"id": "p1", "username": "ana", "location": {"latitude": -33.44, "longitude": -70.66}},
                    {"id": "p2", "username": "beto"}
                ]}"#,
            )
            .create_async()
            .await;

        let passengers = source(&server.url()).waiting_passengers().await.unwrap();
        assert_eq!(passengers.len(), 1);
        assert_eq!(passengers[0].id, "p1");
    }

    #[tokio::test]
    async fn bare_driver_array() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/drivers/active")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id": "d1", "username": "carla",
                     "location": {"latitude": -33.5, "longitude": -70.7},
                     "availableSeats": 3}]"#,
            )
            .create_async()
            .await;

        let records = fetch_for(&source(&server.url()), Role::Passenger)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].role(), Role::Driver);
    }

    #[tokio::test]
    async fn unauthorized_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/passengers/waiting")
            .with_status(401)
            .create_async()
            .await;

        let err = source(&server.url()).waiting_passengers().await.unwrap_err();
        assert!(matches!(err, SnapshotError::Unauthorized));
    }

    #[tokio::test]
    async fn server_error_is_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/drivers/active")
            .with_status(503)
            .create_async()
            .await;

        let err = source(&server.url()).active_drivers().await.unwrap_err();
        assert!(matches!(err, SnapshotError::Status(503)));
    }

    #[tokio::test]
    async fn wrong_wrapper_key_is_missing_field() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/drivers/active")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        let err = source(&server.url()).active_drivers().await.unwrap_err();
        assert!(matches!(err, SnapshotError::MissingField(ref key) if key == "drivers"));
    }
}
