//! Pose receiver (device → host)
//!
//! Two tasks share one socket:
//! - keep-alive: writes a short probe to the device every interval so NAT and
//!   the device's session state stay open even when no pose is flowing
//! - receive: reads datagrams with a bounded wait and overwrites a single
//!   "latest packet" slot
//!
//! [`PoseReceiver::get`] reads that slot and never blocks.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use xrlink_core::{
    XrlinkError, XrlinkResult, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_POSE_PORT,
    DEFAULT_RECV_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, KEEPALIVE_PAYLOAD, POSE_PACKET_SIZE,
};
use xrlink_wire::{PosePacket, PosePacketCodec};

use crate::slot::LatestSlot;
use crate::socket::{bind_udp, BufferSizes};
use crate::stats::{ArrivalStats, ArrivalSummary, ReceiverCounters, ReceiverStats};

/// Read buffer; larger than any valid datagram so oversized ones are read
/// whole and then rejected
const RECV_BUF_LEN: usize = 8192;

/// Pose receiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Device address that keep-alive probes go to
    pub peer: SocketAddr,
    /// Local UDP port to bind
    pub local_port: u16,
    /// Exact pose datagram size
    pub buffer_size: usize,
    /// Kernel receive buffer (SO_RCVBUF)
    pub recv_buffer_size: usize,
    pub keepalive_interval: Duration,
    /// Bound on each socket read
    pub recv_timeout: Duration,
    pub keepalive_payload: Vec<u8>,
    /// Bound on joining the tasks in `close`
    pub shutdown_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            peer: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_POSE_PORT)),
            local_port: DEFAULT_POSE_PORT,
            buffer_size: POSE_PACKET_SIZE,
            recv_buffer_size: 1024 * 1024,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            keepalive_payload: KEEPALIVE_PAYLOAD.to_vec(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ReceiverConfig {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            ..Default::default()
        }
    }

    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn validate(&self) -> XrlinkResult<()> {
        PosePacketCodec::new(self.buffer_size)?;
        if self.keepalive_interval.is_zero() {
            return Err(XrlinkError::InvalidConfig(
                "keepalive_interval must be non-zero".into(),
            ));
        }
        if self.recv_timeout.is_zero() {
            return Err(XrlinkError::InvalidConfig("recv_timeout must be non-zero".into()));
        }
        if self.keepalive_payload.is_empty() {
            return Err(XrlinkError::InvalidConfig(
                "keepalive_payload must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
struct ReceiverState {
    socket: Option<Arc<UdpSocket>>,
    cancel: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

/// Latest-wins pose datagram receiver
pub struct PoseReceiver {
    config: ReceiverConfig,
    codec: PosePacketCodec,
    slot: Arc<LatestSlot<Bytes>>,
    counters: Arc<ReceiverCounters>,
    arrivals: Arc<Mutex<ArrivalStats>>,
    state: Mutex<ReceiverState>,
}

impl PoseReceiver {
    pub fn new(config: ReceiverConfig) -> XrlinkResult<Self> {
        config.validate()?;
        let codec = PosePacketCodec::new(config.buffer_size)?;
        Ok(Self {
            config,
            codec,
            slot: Arc::new(LatestSlot::new()),
            counters: Arc::new(ReceiverCounters::default()),
            arrivals: Arc::new(Mutex::new(ArrivalStats::new())),
            state: Mutex::new(ReceiverState::default()),
        })
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().socket.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state
            .lock()
            .socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
    }

    pub fn stats(&self) -> ReceiverStats {
        self.counters.snapshot()
    }

    /// Timing of recent arrivals, once at least three datagrams came in
    pub fn arrival_summary(&self) -> Option<ArrivalSummary> {
        self.arrivals.lock().summary()
    }

    /// Bind the local port and start the keep-alive and receive tasks.
    /// Idempotent.
    pub async fn connect(&self) -> XrlinkResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let bind_addr = match self.config.peer {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.local_port)),
            SocketAddr::V6(_) => {
                SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, self.config.local_port))
            }
        };
        let socket = Arc::new(bind_udp(
            bind_addr,
            BufferSizes {
                send: None,
                recv: Some(self.config.recv_buffer_size),
            },
        )?);

        let mut state = self.state.lock();
        if state.socket.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let keepalive = tokio::spawn(run_keepalive(
            Arc::clone(&socket),
            self.config.peer,
            self.config.keepalive_payload.clone(),
            self.config.keepalive_interval,
            Arc::clone(&self.counters),
            cancel.clone(),
        ));
        let receive = tokio::spawn(run_receive(
            ReceiveContext {
                socket: Arc::clone(&socket),
                codec: self.codec,
                slot: Arc::clone(&self.slot),
                counters: Arc::clone(&self.counters),
                arrivals: Arc::clone(&self.arrivals),
                recv_timeout: self.config.recv_timeout,
            },
            cancel.clone(),
        ));

        info!(
            local = ?socket.local_addr().ok(),
            peer = %self.config.peer,
            "pose receiver connected"
        );
        state.socket = Some(socket);
        state.cancel = Some(cancel);
        state.tasks = vec![keepalive, receive];
        Ok(())
    }

    /// Latest raw datagram, if any arrived. Does not consume it.
    pub fn get(&self) -> XrlinkResult<Option<Bytes>> {
        if !self.is_connected() {
            return Err(XrlinkError::NotConnected);
        }
        Ok(self.slot.latest())
    }

    /// Latest datagram decoded; `None` if nothing arrived or it was not a pose
    pub fn latest_packet(&self) -> XrlinkResult<Option<PosePacket>> {
        Ok(self.get()?.and_then(|raw| self.codec.decode(&raw)))
    }

    /// Stop both tasks and release the socket. Idempotent; fine before
    /// `connect`.
    pub async fn close(&self) {
        let (cancel, tasks) = {
            let mut state = self.state.lock();
            state.socket = None;
            (state.cancel.take(), std::mem::take(&mut state.tasks))
        };
        self.slot.clear();

        let Some(cancel) = cancel else {
            return;
        };
        cancel.cancel();

        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;
        for mut task in tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "pose receiver task ended abnormally"),
                Err(_) => {
                    warn!("pose receiver task did not stop in time");
                    task.abort();
                }
            }
        }
        info!(stats = ?self.stats(), "pose receiver closed");
    }
}

impl Drop for PoseReceiver {
    fn drop(&mut self) {
        if let Some(cancel) = self.state.get_mut().cancel.take() {
            cancel.cancel();
        }
    }
}

async fn run_keepalive(
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    payload: Vec<u8>,
    every: Duration,
    counters: Arc<ReceiverCounters>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match socket.send_to(&payload, peer).await {
            Ok(_) => counters.keepalives_sent.incr(),
            Err(e) => {
                counters.keepalive_errors.incr();
                trace!(peer = %peer, error = %e, "keep-alive send failed");
            }
        }
    }
    debug!("keep-alive task stopped");
}

struct ReceiveContext {
    socket: Arc<UdpSocket>,
    codec: PosePacketCodec,
    slot: Arc<LatestSlot<Bytes>>,
    counters: Arc<ReceiverCounters>,
    arrivals: Arc<Mutex<ArrivalStats>>,
    recv_timeout: Duration,
}

async fn run_receive(ctx: ReceiveContext, cancel: CancellationToken) {
    let mut buf = vec![0u8; RECV_BUF_LEN];

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            r = tokio::time::timeout(ctx.recv_timeout, ctx.socket.recv_from(&mut buf)) => r,
        };

        match result {
            // idle; loop to re-check the stop signal
            Err(_) => continue,
            Ok(Ok((len, from))) => {
                let raw = Bytes::copy_from_slice(&buf[..len]);
                ctx.counters.datagrams.incr();
                if ctx.codec.is_valid(&raw) {
                    ctx.counters.accepted.incr();
                    ctx.arrivals.lock().record(Instant::now());
                } else {
                    ctx.counters.rejected.incr();
                    trace!(from = %from, len, "non-pose datagram");
                }
                ctx.slot.put(raw);
            }
            Ok(Err(e)) => {
                // e.g. ICMP port unreachable surfacing from a keep-alive
                ctx.counters.recv_errors.incr();
                trace!(error = %e, "receive failed");
            }
        }
    }
    debug!("receive task stopped");
}
