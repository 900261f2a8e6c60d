//! Hardware seams of the driver: a half-duplex uart bus and a one-shot timer.
//!
//! Implementations wrap the actual peripheral registers. Interrupt service
//! routines do not call into this crate; they queue [UartEvent]s which the
//! driver drains through [DmxUartBus::poll_event] and
//! [DmxOneShotTimer::poll_expired].

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmxUartDriverError<E> {
    /// The request timed out.
    /// **Important:** If you implement a driver make sure this error gets raised instead
    /// of a driver specific error.
    TimeoutError,
    /// A driver specific error.
    DriverError(E),
}

impl<E: core::fmt::Display> core::fmt::Display for DmxUartDriverError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DmxUartDriverError::TimeoutError => write!(f, "timeout error occurred"),
            DmxUartDriverError::DriverError(error) => error.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Display + core::fmt::Debug> std::error::Error for DmxUartDriverError<E> {}

impl<E> From<E> for DmxUartDriverError<E> {
    fn from(value: E) -> Self {
        Self::DriverError(value)
    }
}

/// Which half of the transceiver drives the differential pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineDirection {
    Transmit,
    Receive,
}

/// Level events reported by the uart hardware, in the order they happened.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartEvent {
    /// Bytes are waiting in the receive fifo.
    RxAvailable,
    /// The transmit fifo and shift register have fully drained.
    TxComplete,
    /// A break condition was seen on the line.
    BreakDetected,
    /// A character had an invalid stop bit.
    FramingError,
}

/// Access to the uart of a dmx port. It has to communicate at 250000 baud
/// with 8N2 framing and must report break and framing conditions with
/// microsecond-level promptness.
pub trait DmxUartBus {
    type DriverError;

    /// Write bytes into the transmit fifo, blocking until all are accepted
    /// (not necessarily shifted out). Returns the number of bytes written.
    fn write(&mut self, buffer: &[u8]) -> Result<usize, DmxUartDriverError<Self::DriverError>>;

    /// Read whatever the receive fifo holds without blocking.
    /// Returns the number of bytes actually read.
    fn read_available(
        &mut self,
        buffer: &mut [u8],
    ) -> Result<usize, DmxUartDriverError<Self::DriverError>>;

    /// Discard both fifos.
    fn flush(&mut self) -> Result<(), DmxUartDriverError<Self::DriverError>>;

    /// Switch the transceiver's driver-enable line.
    fn set_direction(
        &mut self,
        direction: LineDirection,
    ) -> Result<(), DmxUartDriverError<Self::DriverError>>;

    /// Hold the line in the break (low) condition or release it to mark.
    /// The duration of the pulse is paced by the timing source.
    fn set_break(&mut self, enable: bool) -> Result<(), DmxUartDriverError<Self::DriverError>>;

    /// Block until the transmitter has fully drained or the timeout expires.
    fn wait_idle(&mut self, timeout_us: u32)
        -> Result<(), DmxUartDriverError<Self::DriverError>>;

    /// Take the oldest pending level event, if any. Drivers queue these from
    /// their interrupt service routine.
    fn poll_event(&mut self) -> Result<Option<UartEvent>, DmxUartDriverError<Self::DriverError>>;
}

/// A one-shot timer with microsecond resolution, used to pace the break, the
/// mark-after-break, the receive idle gap and the response window.
pub trait DmxOneShotTimer {
    /// Start (or restart) the timer. A previously armed shot is discarded.
    fn arm_one_shot(&mut self, duration_us: u32);

    /// Stop the timer without firing.
    fn cancel(&mut self);

    /// True exactly once after an armed shot has elapsed.
    fn poll_expired(&mut self) -> bool;
}
