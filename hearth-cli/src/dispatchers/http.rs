use std::time::Duration;

use async_trait::async_trait;

use hearth_core::command::{CommandReply, HubCommand};
use hearth_core::config::HearthConfig;
use hearth_core::dispatch::{DispatchError, Dispatcher, SnapshotSource};
use hearth_core::model::HubSnapshot;

/// Talks to a real hub over its JSON command and status endpoints.
pub struct HttpDispatcher {
    client: reqwest::Client,
    command_url: String,
    status_url: String,
}

impl HttpDispatcher {
    pub fn new(config: &HearthConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.hub.timeout_ms))
            .build()
            .map_err(|e| DispatchError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            command_url: config.command_url(),
            status_url: config.status_url(),
        })
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, command: HubCommand) -> Result<CommandReply, DispatchError> {
        let response = self
            .client
            .post(&self.command_url)
            .json(&command.request())
            .send()
            .await
            .map_err(|e| DispatchError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                code: status.as_u16(),
            });
        }

        response
            .json::<CommandReply>()
            .await
            .map_err(|e| DispatchError::BadPayload {
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SnapshotSource for HttpDispatcher {
    async fn fetch_snapshot(&self) -> Result<HubSnapshot, DispatchError> {
        let response = self
            .client
            .get(&self.status_url)
            .send()
            .await
            .map_err(|e| DispatchError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                code: status.as_u16(),
            });
        }

        response
            .json::<HubSnapshot>()
            .await
            .map_err(|e| DispatchError::BadPayload {
                message: e.to_string(),
            })
    }
}
