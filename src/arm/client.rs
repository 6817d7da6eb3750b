//! Text wire protocol to the arm controller's data line.
//!
//! Each request is one CR-LF terminated line `<opcode> [x y z]`, coordinates
//! written with three decimals. The controller answers each request with one
//! line starting with `OK`; blank lines in between are skipped.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::{Arm, ArmError, Point};

const OP_MOVE: u8 = 0;
const OP_MOVE_STRAIGHT: u8 = 1;
const OP_BREAK: u8 = 2;

/// Arm client over a serial port.
pub type SerialArm = ArmClient<serial2_tokio::SerialPort>;

/// Wire protocol client over any duplex byte stream.
pub struct ArmClient<T> {
    io: BufReader<T>,
    position: Point,
    line: String,
}

impl SerialArm {
    /// Opens the controller's data line.
    pub fn open(port: &str, baud: u32) -> Result<Self, ArmError> {
        tracing::info!("Opening {} at {} baud", port, baud);
        let serial = serial2_tokio::SerialPort::open(port, baud)?;
        Ok(ArmClient::new(serial))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ArmClient<T> {
    pub fn new(io: T) -> Self {
        Self {
            io: BufReader::new(io),
            position: Point::default(),
            line: String::new(),
        }
    }

    /// Unwraps the underlying stream.
    pub fn into_inner(self) -> T {
        self.io.into_inner()
    }

    async fn request(&mut self, opcode: u8, target: Option<Point>) -> Result<String, ArmError> {
        let command = match target {
            Some(p) => format!("{} {:.3} {:.3} {:.3}\r\n", opcode, p.x, p.y, p.z),
            None => format!("{}\r\n", opcode),
        };
        tracing::debug!("arm TX: {}", command.trim_end());
        self.io.write_all(command.as_bytes()).await?;
        self.io.flush().await?;
        self.read_reply().await
    }

    /// Reads the next non-blank reply line.
    async fn read_reply(&mut self) -> Result<String, ArmError> {
        loop {
            self.line.clear();
            if self.io.read_line(&mut self.line).await? == 0 {
                return Err(ArmError::Disconnected);
            }
            let reply = self.line.trim();
            if !reply.is_empty() {
                tracing::debug!("arm RX: {}", reply);
                return Ok(reply.to_string());
            }
        }
    }

    async fn motion(&mut self, opcode: u8, target: Point) -> Result<(), ArmError> {
        let reply = self.request(opcode, Some(target)).await?;
        if !reply.starts_with("OK") {
            return Err(ArmError::Rejected { reply });
        }
        self.position = target;
        Ok(())
    }
}

fn parse_position(reply: &str) -> Option<Point> {
    let mut fields = reply.split_whitespace();
    if fields.next()? != "OK" {
        return None;
    }
    let mut coord = || fields.next()?.parse::<f64>().ok().filter(|v| v.is_finite());
    let point = Point::new(coord()?, coord()?, coord()?);
    match fields.next() {
        Some(_) => None,
        None => Some(point),
    }
}

#[async_trait]
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Arm for ArmClient<T> {
    async fn move_to(&mut self, target: Point) -> Result<(), ArmError> {
        self.motion(OP_MOVE, target).await
    }

    async fn move_straight(&mut self, target: Point) -> Result<(), ArmError> {
        self.motion(OP_MOVE_STRAIGHT, target).await
    }

    async fn resync(&mut self) -> Result<Point, ArmError> {
        let reply = self.request(OP_BREAK, None).await?;
        if !reply.starts_with("OK") {
            return Err(ArmError::Rejected { reply });
        }
        let point = parse_position(&reply).ok_or(ArmError::MalformedReply { reply })?;
        self.position = point;
        Ok(point)
    }

    fn position(&self) -> Point {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("OK 1.5 -2 300.250"), Some(Point::new(1.5, -2.0, 300.25)));
        assert_eq!(parse_position("OK 1 2"), None);
        assert_eq!(parse_position("OK 1 2 3 4"), None);
        assert_eq!(parse_position("OK a b c"), None);
        assert_eq!(parse_position("ERR 1 2 3"), None);
    }
}
