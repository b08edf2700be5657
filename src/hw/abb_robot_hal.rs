//! Driver for an ABB controller running the text-over-TCP motion server.
//!
//! Requests are `"<code> <args...> #"`, answered with `"<code> <ok> ... #"` once the
//! controller has finished executing them.

use std::io;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

use log::{debug, error, info, trace};

use crate::config::RobotConfig;
use crate::geometry::Pose;
use crate::robot_hal::{MotionError, RobotHal};

const TERMINATOR: u8 = b'#';

pub struct AbbRobotHal {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    address: String,
    /// Set once a reply went missing or could not be framed; replies may now lag requests.
    desynced: bool,
}

impl AbbRobotHal {
    const PING: &'static str = "00 #";
    const CLOSE: &'static str = "99 #";

    pub fn connect(config: &RobotConfig) -> Result<Self, MotionError> {
        let addr = config.address.to_socket_addrs()?.next().ok_or_else(|| {
            MotionError::Fault(format!("{} did not resolve to any address", config.address))
        })?;
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout())?;
        stream.set_read_timeout(Some(config.io_timeout()))?;
        stream.set_write_timeout(Some(config.io_timeout()))?;
        stream.set_nodelay(true)?;

        let mut me = Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            address: config.address.clone(),
            desynced: false,
        };
        me.send(AbbRobotHal::PING)?;
        info!("Connected to robot controller at {}", me.address);
        Ok(me)
    }

    fn send(&mut self, command: &str) -> Result<String, MotionError> {
        if self.desynced {
            return Err(MotionError::Fault("robot link desynchronized".to_owned()));
        }
        let result = self.exchange(command);
        if let Err(e @ (MotionError::Io(_) | MotionError::MalformedReply(_))) = &result {
            error!("Robot link to {} lost sync on `{command}`: {e}", self.address);
            self.desynced = true;
        }
        result
    }

    fn exchange(&mut self, command: &str) -> Result<String, MotionError> {
        trace!("-> {command}");
        self.writer.write_all(command.as_bytes())?;

        let mut buf = Vec::new();
        self.reader.read_until(TERMINATOR, &mut buf)?;
        if buf.last() != Some(&TERMINATOR) {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "controller closed the connection").into());
        }
        let reply = String::from_utf8_lossy(&buf).trim().to_owned();
        trace!("<- {reply}");
        check_reply(command, &reply)?;
        Ok(reply)
    }
}

impl RobotHal for AbbRobotHal {
    fn move_to(&mut self, pose: &Pose) -> Result<(), MotionError> {
        let command = format_cartesian(pose);
        debug!("move_to: {command}");
        self.send(&command)?;
        Ok(())
    }
}

impl Drop for AbbRobotHal {
    fn drop(&mut self) {
        // The server hangs up on close without answering.
        if self.desynced {
            return;
        }
        if let Err(e) = self.writer.write_all(AbbRobotHal::CLOSE.as_bytes()) {
            debug!("Closing robot link to {}: {e}", self.address);
        }
    }
}

/// Fixed width so the server's tokenizer never sees exponent notation.
pub fn format_cartesian(pose: &Pose) -> String {
    let p = pose.position;
    let q = pose.orientation;
    format!(
        "01 {:+08.1} {:+08.1} {:+08.1} {:+08.5} {:+08.5} {:+08.5} {:+08.5} #",
        p.x, p.y, p.z, q.w, q.x, q.y, q.z)
}

fn check_reply(command: &str, reply: &str) -> Result<(), MotionError> {
    let mut fields = reply.split_whitespace();
    let (code, ok) = match (fields.next(), fields.next()) {
        (Some(code), Some(ok)) => (code, ok),
        _ => return Err(MotionError::MalformedReply(reply.to_owned())),
    };

    let sent_code = command.split_whitespace().next().and_then(|c| c.parse::<u32>().ok());
    let echoed_code = code.parse::<u32>().ok();
    if echoed_code.is_none() || echoed_code != sent_code {
        return Err(MotionError::MalformedReply(reply.to_owned()));
    }
    if ok != "1" {
        return Err(MotionError::Rejected {
            command: command.to_owned(),
            reply: reply.to_owned(),
        });
    }
    Ok(())
}
