//! Command-line arguments

use std::net::SocketAddr;

use xrlink_core::{XrlinkError, XrlinkResult, DEFAULT_POSE_PORT};
use xrlink_pose::Handedness;

pub const USAGE: &str = "\
usage: xrlink-bridge --peer <ip:port> [options]

  --peer <ip:port>       headset address for keep-alive probes (required)
  --port <n>             local UDP port for pose datagrams (default 9001)
  --hand <left|right>    hand to retarget (default right)
  --stream-to <ip:port>  also stream a synthetic stereo test pattern
  --quality <1-100>      JPEG quality for the test stream (default 50)
  -h, --help             print this help

Log verbosity follows RUST_LOG (default: info).";

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub peer: SocketAddr,
    pub port: u16,
    pub hand: Handedness,
    pub stream_to: Option<SocketAddr>,
    pub quality: u8,
}

/// What the command line asked for
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Args),
    Help,
}

impl Args {
    /// Parse everything after the program name
    pub fn parse<I>(args: I) -> XrlinkResult<Command>
    where
        I: IntoIterator<Item = String>,
    {
        let mut peer = None;
        let mut port = DEFAULT_POSE_PORT;
        let mut hand = Handedness::Right;
        let mut stream_to = None;
        let mut quality = 50u8;

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "-h" | "--help" => return Ok(Command::Help),
                "--peer" => peer = Some(parse_value(&flag, args.next())?),
                "--port" => port = parse_value(&flag, args.next())?,
                "--hand" => hand = parse_value(&flag, args.next())?,
                "--stream-to" => stream_to = Some(parse_value(&flag, args.next())?),
                "--quality" => quality = parse_value(&flag, args.next())?,
                other => {
                    return Err(XrlinkError::InvalidConfig(format!(
                        "unknown argument '{}'",
                        other
                    )))
                }
            }
        }

        let peer = peer.ok_or_else(|| XrlinkError::InvalidConfig("--peer is required".into()))?;
        Ok(Command::Run(Args {
            peer,
            port,
            hand,
            stream_to,
            quality,
        }))
    }
}

fn parse_value<T>(flag: &str, value: Option<String>) -> XrlinkResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = value.ok_or_else(|| XrlinkError::InvalidConfig(format!("{} needs a value", flag)))?;
    value
        .parse()
        .map_err(|e| XrlinkError::InvalidConfig(format!("{} '{}': {}", flag, value, e)))
}
