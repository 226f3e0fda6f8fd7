//! IPC server exposing the refresh rate engine to out-of-process collaborators.
//!
//! Commands arrive as newline-delimited JSON over a Unix Domain Socket; each
//! command gets exactly one JSON line back.

use crate::metrics::{MetricsCollector, MetricsResponse};
use crate::policy::Policy;
use crate::refresh_rate::{ConfigGroup, ConfigId, RefreshRate};
use crate::refresh_rate_configs::RefreshRateConfigs;
use crate::selector::LayerRequirement;
use serde::{Deserialize, Serialize};

#[cfg(unix)]
use crate::error::IpcError;
#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::sync::Arc;
#[cfg(unix)]
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

/// Default socket path for IPC communication.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/refresh-rate-policy.sock";

/// Commands that can be received via IPC.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "command")]
pub enum IpcCommand {
    SetPolicy {
        default_config_id: ConfigId,
        min_fps: f32,
        max_fps: f32,
    },
    GetPolicy,
    GetRefreshRates,
    SelectRefreshRate {
        layers: Vec<LayerRequirement>,
        #[serde(default)]
        group_aware: bool,
    },
    SetCurrentConfig {
        config_id: ConfigId,
    },
    GetStatus,
}

/// Wire form of a refresh rate.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RefreshRateResponse {
    pub config_id: ConfigId,
    pub config_group: ConfigGroup,
    pub vsync_period: i64,
    pub name: String,
    pub fps: f32,
}

impl From<&RefreshRate> for RefreshRateResponse {
    fn from(rate: &RefreshRate) -> Self {
        Self {
            config_id: rate.config_id,
            config_group: rate.config_group,
            vsync_period: rate.vsync_period,
            name: rate.name.clone(),
            fps: rate.fps,
        }
    }
}

/// Status response sent to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusResponse {
    pub current: RefreshRateResponse,
    pub policy: Policy,
    pub available: Vec<RefreshRateResponse>,
    pub device_min: RefreshRateResponse,
    pub device_max: RefreshRateResponse,
    pub metrics: MetricsResponse,
}

/// Shared daemon state accessible by the IPC server.
pub struct DaemonState {
    pub configs: RefreshRateConfigs,
    pub metrics: MetricsCollector,
}

impl DaemonState {
    pub fn new(configs: RefreshRateConfigs) -> Self {
        Self {
            configs,
            metrics: MetricsCollector::new(),
        }
    }

    /// Get the current status as a StatusResponse.
    pub fn get_status(&self) -> StatusResponse {
        StatusResponse {
            current: self.configs.get_current_refresh_rate().into(),
            policy: self.configs.get_policy(),
            available: self
                .configs
                .get_available_refresh_rates()
                .into_iter()
                .map(RefreshRateResponse::from)
                .collect(),
            device_min: self.configs.get_min_refresh_rate().into(),
            device_max: self.configs.get_max_refresh_rate().into(),
            metrics: self.metrics.get_metrics(),
        }
    }
}

/// Handle a single IPC command and return the response.
pub fn handle_command(command: IpcCommand, state: &DaemonState) -> serde_json::Value {
    match command {
        IpcCommand::SetPolicy {
            default_config_id,
            min_fps,
            max_fps,
        } => {
            let outcome = state
                .configs
                .set_policy(default_config_id, min_fps, max_fps);
            state.metrics.record_policy_update(&outcome);
            match outcome {
                Ok(changed) => {
                    tracing::info!(
                        "Policy set via IPC: default={}, min_fps={}, max_fps={}, changed={}",
                        default_config_id,
                        min_fps,
                        max_fps,
                        changed
                    );
                    serde_json::json!({ "success": true, "policy_changed": changed })
                }
                Err(e) => serde_json::json!({ "success": false, "error": e.to_string() }),
            }
        }

        IpcCommand::GetPolicy => to_response(&state.configs.get_policy()),

        IpcCommand::GetRefreshRates => {
            let rates: Vec<RefreshRateResponse> = state
                .configs
                .get_all_refresh_rates()
                .values()
                .map(RefreshRateResponse::from)
                .collect();
            to_response(&rates)
        }

        IpcCommand::SelectRefreshRate {
            layers,
            group_aware,
        } => {
            let chosen = if group_aware {
                state.configs.get_refresh_rate_for_content_v2(&layers)
            } else {
                state.configs.get_refresh_rate_for_content(&layers)
            };
            state.metrics.record_selection();
            to_response(&RefreshRateResponse::from(chosen))
        }

        IpcCommand::SetCurrentConfig { config_id } => {
            match state.configs.set_current_config_id(config_id) {
                Ok(previous) => {
                    let current = state.configs.get_refresh_rate_from_config_id(config_id);
                    if let Ok(current) = current {
                        if previous.config_id != current.config_id {
                            state.metrics.record_mode_change(previous.fps, current.fps);
                        }
                    }
                    serde_json::json!({
                        "success": true,
                        "allowed": state.configs.is_config_allowed(config_id)
                    })
                }
                Err(e) => serde_json::json!({ "success": false, "error": e.to_string() }),
            }
        }

        IpcCommand::GetStatus => to_response(&state.get_status()),
    }
}

fn to_response<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        serde_json::json!({
            "error": format!("Failed to serialize response: {}", e)
        })
    })
}

/// Unix Domain Socket server for IPC.
#[cfg(unix)]
pub struct IpcServer {
    /// Path to the Unix socket
    socket_path: PathBuf,
    /// Unix listener for incoming connections
    listener: UnixListener,
}

#[cfg(unix)]
impl IpcServer {
    /// Bind a new server at `path`, replacing any stale socket file.
    pub async fn new(path: &str) -> Result<Self, IpcError> {
        let socket_path = PathBuf::from(path);

        Self::cleanup_socket(&socket_path)?;

        let listener = UnixListener::bind(&socket_path).map_err(|e| IpcError::SocketBindFailed {
            path: path.to_string(),
            source: e,
        })?;

        Ok(Self {
            socket_path,
            listener,
        })
    }

    fn cleanup_socket(path: &Path) -> Result<(), IpcError> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| IpcError::SocketBindFailed {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections forever, one task per client.
    pub async fn run(&self, state: Arc<DaemonState>) -> Result<(), IpcError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, state).await {
                            tracing::warn!("Error handling IPC connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Error accepting IPC connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(stream: UnixStream, state: Arc<DaemonState>) -> Result<(), IpcError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        while reader.read_line(&mut line).await? > 0 {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                line.clear();
                continue;
            }

            let response = match serde_json::from_str::<IpcCommand>(trimmed) {
                Ok(command) => handle_command(command, &state),
                Err(e) => {
                    let err = IpcError::InvalidCommand(e.to_string());
                    serde_json::json!({ "error": err.to_string() })
                }
            };

            let response_str = serde_json::to_string(&response)?;
            writer.write_all(response_str.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;

            line.clear();
        }

        Ok(())
    }
}

#[cfg(unix)]
impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
