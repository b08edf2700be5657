use std::io;
use std::io::Write;
use std::time::Duration;

use log::info;
use serialport::SerialPort;

use crate::config::GripperConfig;
use crate::gripper_hal::GripperLink;

pub struct SerialGripperLink {
    port: Box<dyn SerialPort>,
}

impl SerialGripperLink {
    const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn open(config: &GripperConfig) -> serialport::Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(SerialGripperLink::WRITE_TIMEOUT)
            .open()?;
        info!("Gripper serial port {} open at {} baud", config.port, config.baud_rate);
        Ok(Self { port })
    }
}

impl GripperLink for SerialGripperLink {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }
}
