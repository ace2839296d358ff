//! XRLink Bridge
//!
//! Receives headset hand poses, retargets one hand onto the 7-DOF robotic
//! hand at 50 Hz, and logs the resulting actuator angles. Optionally streams
//! a synthetic stereo test pattern back to the headset so the video path can
//! be checked without a camera.

mod args;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use xrlink_core::XrlinkResult;
use xrlink_pose::{recover_packet, retarget, AxisConversion, ChainMode, JOINT_NAMES};
use xrlink_transport::{FrameSender, LatencyEstimator, PoseReceiver, ReceiverConfig, SenderConfig};
use xrlink_video::{select_encoder, stereo_test_pattern};

use crate::args::{Args, Command, USAGE};

const RETARGET_PERIOD: Duration = Duration::from_millis(20);
const PATTERN_PERIOD: Duration = Duration::from_millis(33);
const REPORT_PERIOD: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    run(args).await?;
    Ok(())
}

async fn run(args: Args) -> XrlinkResult<()> {
    let receiver = PoseReceiver::new(ReceiverConfig::new(args.peer).with_local_port(args.port))?;
    receiver.connect().await?;

    let cancel = CancellationToken::new();
    let sender = match args.stream_to {
        Some(target) => {
            let config = SenderConfig::new(target).with_quality(args.quality);
            let sender = Arc::new(FrameSender::new(config, select_encoder(Vec::new())));
            sender.open().await?;
            tokio::spawn(stream_pattern(Arc::clone(&sender), cancel.clone()));
            Some(sender)
        }
        None => None,
    };

    info!(peer = %args.peer, port = args.port, hand = %args.hand, "bridge running, ctrl-c to stop");

    tokio::select! {
        _ = retarget_loop(&receiver, &args) => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "could not listen for ctrl-c");
            }
        }
    }

    info!("shutting down");
    cancel.cancel();
    if let Some(sender) = sender {
        sender.close().await;
    }
    receiver.close().await;
    Ok(())
}

async fn retarget_loop(receiver: &PoseReceiver, args: &Args) {
    let conv = AxisConversion::device_to_robot();
    let mut latency = LatencyEstimator::new();
    let mut last_timestamp = None;
    let mut processed = 0u64;
    let mut last_report = tokio::time::Instant::now();

    let mut ticker = tokio::time::interval(RETARGET_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match receiver.latest_packet() {
            Ok(Some(packet)) if last_timestamp != Some(packet.timestamp) => {
                last_timestamp = Some(packet.timestamp);
                processed += 1;

                let tracked = recover_packet(&packet, ChainMode::Relative, &conv);
                let joints = retarget(tracked.hand(args.hand), args.hand);
                let degrees = joints.degrees();
                debug!(
                    thumb_base = degrees[0],
                    thumb_tip = degrees[1],
                    index = degrees[2],
                    middle = degrees[3],
                    ring = degrees[4],
                    little = degrees[5],
                    "retargeted"
                );

                let latency_ms = latency.observe(packet.timestamp, unix_now()) * 1000.0;
                if last_report.elapsed() >= REPORT_PERIOD {
                    last_report = tokio::time::Instant::now();
                    let angles: Vec<String> = JOINT_NAMES
                        .iter()
                        .zip(joints.normalized.iter())
                        .map(|(name, n)| format!("{}={:.2}", name, n))
                        .collect();
                    let timing = receiver.arrival_summary();
                    info!(
                        processed,
                        latency_ms = %format!("{:.2}", latency_ms),
                        mean_interval_ms = ?timing.map(|t| t.mean_interval.as_secs_f64() * 1000.0),
                        jitter_ms = ?timing.map(|t| t.jitter.as_secs_f64() * 1000.0),
                        max_jitter_ms = ?timing.map(|t| t.max_jitter.as_secs_f64() * 1000.0),
                        "{}",
                        angles.join(" ")
                    );
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "pose receiver unavailable");
                return;
            }
        }
    }
}

async fn stream_pattern(sender: Arc<FrameSender>, cancel: CancellationToken) {
    let (width, height) = (sender.config().width, sender.config().height);
    let mut ticker = tokio::time::interval(PATTERN_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let frame = match stereo_test_pattern(width, height, tick) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "test pattern unavailable");
                break;
            }
        };
        tick = tick.wrapping_add(1);
        if let Err(e) = sender.submit(frame) {
            debug!(error = %e, "test pattern stream stopped");
            break;
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
