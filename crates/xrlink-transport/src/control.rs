//! TCP JSON control channel
//!
//! One request per connection: connect, write a JSON object, half-close the
//! write side, read until the peer closes, parse one JSON object back.
//! Failures never surface as `Err`; they come back as
//! `{"status": "error", "message": ...}` so callers handle a single shape.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use xrlink_core::{XrlinkError, XrlinkResult};

/// Default bound on one control exchange
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a display-parameter push
pub const DEFAULT_DISPLAY_PARAMS_TIMEOUT: Duration = Duration::from_secs(3);

/// Commands understood by the streaming host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlRequest {
    StartStream {
        ip: String,
        port: u16,
        quality: u8,
        width: u32,
        height: u32,
    },
    StopStream,
    StartRecord {
        path: String,
        /// Without extension; the host de-duplicates existing names
        filename: String,
    },
    StopRecord,
    GetStatus,
    /// Ask the host to forward display parameters to the headset
    SetStereoParams {
        target_ip: String,
        target_port: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focus: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quad: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zoom: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        add_focus: Option<bool>,
    },
    Quit,
}

impl ControlRequest {
    pub fn set_stereo_params(
        target_ip: impl Into<String>,
        target_port: u16,
        params: &DisplayParams,
    ) -> Self {
        ControlRequest::SetStereoParams {
            target_ip: target_ip.into(),
            target_port,
            focus: params.focus,
            quad: params.quad,
            zoom: params.zoom,
            add_focus: params.add_focus,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            ControlRequest::StartStream { .. } => "start_stream",
            ControlRequest::StopStream => "stop_stream",
            ControlRequest::StartRecord { .. } => "start_record",
            ControlRequest::StopRecord => "stop_record",
            ControlRequest::GetStatus => "get_status",
            ControlRequest::SetStereoParams { .. } => "set_stereo_params",
            ControlRequest::Quit => "quit",
        }
    }
}

/// Host reply; fields beyond `status` and `message` land in `extra`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ControlResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Boolean field that the host may encode as `true` or `"true"`
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

/// Client for the streaming host's control port
#[derive(Debug, Clone)]
pub struct ControlClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_CONTROL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send one request and wait for the reply
    pub async fn send(&self, request: &ControlRequest) -> ControlResponse {
        match self.try_send(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(action = request.action(), error = %e, "control request failed");
                ControlResponse::error(error_message(e))
            }
        }
    }

    async fn try_send(&self, request: &ControlRequest) -> XrlinkResult<ControlResponse> {
        let body = serde_json::to_vec(request).map_err(|e| XrlinkError::ControlError(e.to_string()))?;
        let reply = exchange(self.addr, &body, self.timeout).await?;
        if reply.is_empty() {
            return Err(XrlinkError::ControlError("Empty response".into()));
        }
        serde_json::from_str(&reply).map_err(|e| XrlinkError::ControlError(e.to_string()))
    }

    pub async fn start_stream(
        &self,
        ip: impl Into<String>,
        port: u16,
        quality: u8,
        width: u32,
        height: u32,
    ) -> ControlResponse {
        self.send(&ControlRequest::StartStream {
            ip: ip.into(),
            port,
            quality,
            width,
            height,
        })
        .await
    }

    pub async fn stop_stream(&self) -> ControlResponse {
        self.send(&ControlRequest::StopStream).await
    }

    pub async fn start_record(
        &self,
        path: impl Into<String>,
        filename: impl Into<String>,
    ) -> ControlResponse {
        self.send(&ControlRequest::StartRecord {
            path: path.into(),
            filename: filename.into(),
        })
        .await
    }

    pub async fn stop_record(&self) -> ControlResponse {
        self.send(&ControlRequest::StopRecord).await
    }

    pub async fn get_status(&self) -> ControlResponse {
        self.send(&ControlRequest::GetStatus).await
    }

    pub async fn set_stereo_params(
        &self,
        target_ip: impl Into<String>,
        target_port: u16,
        params: &DisplayParams,
    ) -> ControlResponse {
        self.send(&ControlRequest::set_stereo_params(target_ip, target_port, params))
            .await
    }

    pub async fn quit(&self) -> ControlResponse {
        self.send(&ControlRequest::Quit).await
    }
}

/// Headset display parameters; unset fields are left out of the message
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayParams {
    /// Stereo disparity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<f32>,
    /// Screen distance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quad: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f32>,
    #[serde(default, rename = "addFocus", skip_serializing_if = "Option::is_none")]
    pub add_focus: Option<bool>,
}

/// Push display parameters straight to the headset.
///
/// Writes the JSON object plus a newline, half-closes, and returns the first
/// line of the reply parsed as JSON. A silent peer counts as success.
pub async fn push_display_params(
    addr: SocketAddr,
    params: &DisplayParams,
    timeout: Duration,
) -> Value {
    match try_push_display_params(addr, params, timeout).await {
        Ok(value) => value,
        Err(e) => {
            debug!(addr = %addr, error = %e, "display parameter push failed");
            json!({ "status": "error", "message": error_message(e) })
        }
    }
}

async fn try_push_display_params(
    addr: SocketAddr,
    params: &DisplayParams,
    timeout: Duration,
) -> XrlinkResult<Value> {
    let mut body = serde_json::to_vec(params).map_err(|e| XrlinkError::ControlError(e.to_string()))?;
    body.push(b'\n');

    let reply = exchange(addr, &body, timeout).await?;
    let line = reply.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(json!({ "status": "ok" }));
    }
    serde_json::from_str(line).map_err(|e| XrlinkError::ControlError(format!("bad reply: {}", e)))
}

/// Write `body`, half-close, read to EOF; the whole exchange is bounded
async fn exchange(addr: SocketAddr, body: &[u8], timeout: Duration) -> XrlinkResult<String> {
    let io = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(body).await?;
        stream.shutdown().await?;

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;
        Ok::<_, io::Error>(String::from_utf8_lossy(&reply).trim().to_string())
    };

    match tokio::time::timeout(timeout, io).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            Err(XrlinkError::ControlError("Connection refused".into()))
        }
        Ok(Err(e)) => Err(XrlinkError::ControlError(e.to_string())),
        Err(_) => Err(XrlinkError::ControlError("Connection timeout".into())),
    }
}

fn error_message(e: XrlinkError) -> String {
    match e {
        XrlinkError::ControlError(message) => message,
        other => other.to_string(),
    }
}
