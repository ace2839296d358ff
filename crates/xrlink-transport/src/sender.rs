//! Frame sender (host → device)
//!
//! `submit` drops a raw frame into a single slot and returns immediately. A
//! background task takes whatever is newest, encodes it, splits it into
//! fragments, and writes one datagram per fragment. Frames that arrive while
//! the task is busy overwrite each other; only the latest is ever encoded.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use xrlink_core::{
    XrlinkError, XrlinkResult, DEFAULT_MAX_PAYLOAD, DEFAULT_POLL_INTERVAL,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_VIDEO_PORT, FRAGMENT_HEADER_SIZE,
};
use xrlink_video::{encode_frame, Frame, FrameEncoder, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};
use xrlink_wire::fragment;

use crate::slot::LatestSlot;
use crate::socket::{bind_udp, BufferSizes};
use crate::stats::{SenderCounters, SenderStats};

/// Largest UDP payload over IPv4
const MAX_DATAGRAM: usize = 65_507;

/// Frame sender configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Device address
    pub target: SocketAddr,
    /// Frames are scaled to this size before encoding
    pub width: u32,
    pub height: u32,
    /// Fragment payload bytes, excluding the 8-byte header
    pub max_payload: usize,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Kernel send buffer (SO_SNDBUF)
    pub send_buffer_size: usize,
    /// Connect the socket to `target` on open
    pub connect: bool,
    /// Bound on each wait for a new frame
    pub poll_interval: Duration,
    /// Bound on joining the worker in `close`
    pub shutdown_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_VIDEO_PORT)),
            width: 1280,
            height: 480,
            max_payload: DEFAULT_MAX_PAYLOAD,
            jpeg_quality: 50,
            send_buffer_size: 4 * 1024 * 1024,
            connect: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl SenderConfig {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn with_connect(mut self, connect: bool) -> Self {
        self.connect = connect;
        self
    }

    pub fn validate(&self) -> XrlinkResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(XrlinkError::InvalidConfig(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.max_payload == 0 || self.max_payload + FRAGMENT_HEADER_SIZE > MAX_DATAGRAM {
            return Err(XrlinkError::InvalidConfig(format!(
                "max_payload must be in 1..={}, got {}",
                MAX_DATAGRAM - FRAGMENT_HEADER_SIZE,
                self.max_payload
            )));
        }
        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&self.jpeg_quality) {
            return Err(XrlinkError::InvalidConfig(format!(
                "jpeg_quality must be in {}..={}, got {}",
                MIN_JPEG_QUALITY, MAX_JPEG_QUALITY, self.jpeg_quality
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(XrlinkError::InvalidConfig("poll_interval must be non-zero".into()));
        }
        Ok(())
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SenderState {
    socket: Option<Arc<UdpSocket>>,
    worker: Option<Worker>,
}

/// Drop-oldest JPEG frame sender over UDP
pub struct FrameSender {
    config: SenderConfig,
    encoder: Arc<dyn FrameEncoder>,
    slot: Arc<LatestSlot<Frame>>,
    counters: Arc<SenderCounters>,
    connected: Arc<AtomicBool>,
    state: Mutex<SenderState>,
}

impl FrameSender {
    pub fn new(config: SenderConfig, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self {
            config,
            encoder,
            slot: Arc::new(LatestSlot::new()),
            counters: Arc::new(SenderCounters::default()),
            connected: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(SenderState::default()),
        }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().socket.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Local address of the socket, once open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state
            .lock()
            .socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
    }

    pub fn stats(&self) -> SenderStats {
        self.counters.snapshot()
    }

    /// Create the socket and start the worker. Idempotent.
    pub async fn open(&self) -> XrlinkResult<()> {
        if self.is_open() {
            return Ok(());
        }
        self.config.validate()?;

        let bind_addr = match self.config.target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, 0)),
        };
        let socket = Arc::new(bind_udp(
            bind_addr,
            BufferSizes {
                send: Some(self.config.send_buffer_size),
                recv: None,
            },
        )?);
        // a failed connect leaves the sender closed
        if self.config.connect {
            socket.connect(self.config.target).await?;
        }

        let cancel = CancellationToken::new();
        let ctx = WorkerContext {
            socket: Arc::clone(&socket),
            encoder: Arc::clone(&self.encoder),
            slot: Arc::clone(&self.slot),
            counters: Arc::clone(&self.counters),
            connected: Arc::clone(&self.connected),
            config: self.config.clone(),
        };

        {
            let mut state = self.state.lock();
            if state.socket.is_some() {
                // lost a race with a concurrent open
                return Ok(());
            }
            self.connected.store(self.config.connect, Ordering::Release);
            let handle = tokio::spawn(run_worker(ctx, cancel.clone()));
            state.socket = Some(socket);
            state.worker = Some(Worker { cancel, handle });
        }

        info!(
            target = %self.config.target,
            encoder = self.encoder.name(),
            width = self.config.width,
            height = self.config.height,
            connected = self.config.connect,
            "frame sender opened"
        );
        Ok(())
    }

    /// Fix the peer so sends omit explicit addressing
    pub async fn connect(&self) -> XrlinkResult<()> {
        let socket = self.state.lock().socket.clone().ok_or(XrlinkError::NotOpen)?;
        socket.connect(self.config.target).await?;
        self.connected.store(true, Ordering::Release);
        debug!(target = %self.config.target, "frame sender connected");
        Ok(())
    }

    /// Hand a frame to the worker without waiting.
    ///
    /// A frame still pending from an earlier call is dropped in favor of this
    /// one.
    pub fn submit(&self, frame: Frame) -> XrlinkResult<()> {
        if !self.is_open() {
            return Err(XrlinkError::NotOpen);
        }
        self.counters.submitted.incr();
        if self.slot.put(frame).is_some() {
            self.counters.replaced.incr();
            trace!("pending frame replaced");
        }
        Ok(())
    }

    /// Stop the worker and release the socket. Idempotent; fine before `open`.
    pub async fn close(&self) {
        let worker = {
            let mut state = self.state.lock();
            state.socket = None;
            state.worker.take()
        };
        self.connected.store(false, Ordering::Release);
        self.slot.clear();

        let Some(mut worker) = worker else {
            return;
        };
        worker.cancel.cancel();
        match tokio::time::timeout(self.config.shutdown_timeout, &mut worker.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "frame sender worker ended abnormally"),
            Err(_) => {
                warn!(timeout = ?self.config.shutdown_timeout, "frame sender worker did not stop in time");
                worker.handle.abort();
            }
        }
        info!(stats = ?self.stats(), "frame sender closed");
    }
}

impl Drop for FrameSender {
    fn drop(&mut self) {
        if let Some(worker) = self.state.get_mut().worker.take() {
            worker.cancel.cancel();
        }
    }
}

struct WorkerContext {
    socket: Arc<UdpSocket>,
    encoder: Arc<dyn FrameEncoder>,
    slot: Arc<LatestSlot<Frame>>,
    counters: Arc<SenderCounters>,
    connected: Arc<AtomicBool>,
    config: SenderConfig,
}

async fn run_worker(ctx: WorkerContext, cancel: CancellationToken) {
    let mut frame_id: u32 = 0;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = ctx.slot.wait_take(ctx.config.poll_interval) => frame,
        };
        let Some(frame) = frame else {
            continue;
        };

        let encoder = Arc::clone(&ctx.encoder);
        let (width, height, quality) = (ctx.config.width, ctx.config.height, ctx.config.jpeg_quality);
        let encoded = tokio::task::spawn_blocking(move || {
            encode_frame(encoder.as_ref(), frame, width, height, quality)
        })
        .await;

        let data = match encoded {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                ctx.counters.encode_failures.incr();
                debug!(error = %e, "frame skipped");
                continue;
            }
            Err(e) => {
                ctx.counters.encode_failures.incr();
                warn!(error = %e, "encode task failed");
                continue;
            }
        };
        ctx.counters.encoded.incr();

        if cancel.is_cancelled() {
            break;
        }

        let id = frame_id;
        frame_id = frame_id.wrapping_add(1);

        let fragments = match fragment(&data, id, ctx.config.max_payload) {
            Ok(fragments) => fragments,
            Err(e) => {
                debug!(frame_id = id, error = %e, "frame skipped");
                continue;
            }
        };

        let connected = ctx.connected.load(Ordering::Acquire);
        for frag in &fragments {
            let datagram = frag.to_datagram();
            let result = if connected {
                ctx.socket.send(&datagram).await
            } else {
                ctx.socket.send_to(&datagram, ctx.config.target).await
            };
            match result {
                Ok(_) => ctx.counters.fragments_sent.incr(),
                Err(e) => {
                    ctx.counters.send_errors.incr();
                    debug!(
                        frame_id = id,
                        fragment = frag.header.fragment_index,
                        error = %e,
                        "fragment send failed"
                    );
                }
            }
        }
        ctx.counters.frames_sent.incr();
        trace!(frame_id = id, bytes = data.len(), fragments = fragments.len(), "frame sent");
    }

    debug!("frame sender worker stopped");
}
