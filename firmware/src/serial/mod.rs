//! Byte queues between the UART task and the control loop.
//!
//! The UART task owns the peripheral; the control task only sees the two
//! bounded channels through [`ChannelSerial`], which satisfies the
//! non-blocking [`SerialLink`] contract the controller expects.

#![allow(dead_code)]

use embassy_sync::channel::{Channel, Receiver, Sender};
use rover_core::actuators::SerialLink;

use crate::status;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type SerialMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type SerialMutex = NoopRawMutex;

/// Depth of each byte channel.
pub const SERIAL_QUEUE_DEPTH: usize = 64;

pub type ByteChannel = Channel<SerialMutex, u8, SERIAL_QUEUE_DEPTH>;
pub type ByteSender<'a> = Sender<'a, SerialMutex, u8, SERIAL_QUEUE_DEPTH>;
pub type ByteReceiver<'a> = Receiver<'a, SerialMutex, u8, SERIAL_QUEUE_DEPTH>;

/// Both directions of the companion-computer link.
pub struct SerialQueues {
    rx: ByteChannel,
    tx: ByteChannel,
}

impl SerialQueues {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: Channel::new(),
            tx: Channel::new(),
        }
    }

    /// Producer side used by the UART reader.
    pub fn rx_sender(&self) -> ByteSender<'_> {
        self.rx.sender()
    }

    /// Consumer side used by the UART writer.
    pub fn tx_receiver(&self) -> ByteReceiver<'_> {
        self.tx.receiver()
    }

    /// Control-loop view of the link.
    pub fn link(&self) -> ChannelSerial<'_> {
        ChannelSerial {
            rx: self.rx.receiver(),
            tx: self.tx.sender(),
        }
    }
}

impl Default for SerialQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// [`SerialLink`] backed by the byte channels.
pub struct ChannelSerial<'a> {
    rx: ByteReceiver<'a>,
    tx: ByteSender<'a>,
}

impl SerialLink for ChannelSerial<'_> {
    fn try_read_byte(&mut self) -> Option<u8> {
        self.rx.try_receive().ok()
    }

    fn write_byte(&mut self, byte: u8) {
        if self.tx.try_send(byte).is_err() {
            status::record_tx_dropped();
        }
    }
}

/// Pushes received bytes toward the control loop, counting the ones that do
/// not fit. Returns the number accepted.
pub fn forward_received(sender: &ByteSender<'_>, bytes: &[u8]) -> usize {
    let mut accepted = 0;
    for &byte in bytes {
        if sender.try_send(byte).is_ok() {
            accepted += 1;
        } else {
            status::record_rx_overflow();
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use rover_core::actuators::NoopActuators;
    use rover_core::capture::CaptureSnapshot;
    use rover_core::control::RoverController;

    use super::*;

    #[test]
    fn link_reads_what_uart_forwards() {
        let queues = SerialQueues::new();
        let sender = queues.rx_sender();
        assert_eq!(forward_received(&sender, b"aL"), 2);

        let mut link = queues.link();
        assert_eq!(link.try_read_byte(), Some(b'a'));
        assert_eq!(link.try_read_byte(), Some(b'L'));
        assert_eq!(link.try_read_byte(), None);
    }

    #[test]
    fn full_rx_queue_drops_and_counts() {
        let queues = SerialQueues::new();
        let sender = queues.rx_sender();
        let before = status::snapshot().rx_overflow;

        let burst = [b'x'; SERIAL_QUEUE_DEPTH + 3];
        assert_eq!(forward_received(&sender, &burst), SERIAL_QUEUE_DEPTH);
        assert!(status::snapshot().rx_overflow >= before + 3);
    }

    #[test]
    fn status_bytes_reach_uart_writer() {
        let queues = SerialQueues::new();
        let mut link = queues.link();
        link.write_bytes(b"an");

        let writer = queues.tx_receiver();
        assert_eq!(writer.try_receive().ok(), Some(b'a'));
        assert_eq!(writer.try_receive().ok(), Some(b'n'));
    }

    #[test]
    fn one_tick_empties_a_full_rx_queue() {
        let queues = SerialQueues::new();
        let sender = queues.rx_sender();
        let mut burst = [b'z'; SERIAL_QUEUE_DEPTH];
        burst[SERIAL_QUEUE_DEPTH - 2..].copy_from_slice(b"aL");
        assert_eq!(forward_received(&sender, &burst), SERIAL_QUEUE_DEPTH);

        let mut controller = RoverController::default();
        let mut link = queues.link();
        let report = controller.tick(
            10,
            CaptureSnapshot::uniform(1500),
            &mut link,
            &mut NoopActuators::new(),
        );

        assert_eq!(report.bytes_drained, SERIAL_QUEUE_DEPTH);
        assert_eq!(link.try_read_byte(), None);
        assert_eq!(report.frame.steering_angle, 135);

        // Only the notification goes out; nothing queues behind it.
        let writer = queues.tx_receiver();
        assert_eq!(writer.try_receive().ok(), Some(b'a'));
        assert!(writer.try_receive().is_err());
    }
}
