//! A logical bus instance: one frame buffer, one line state machine and the
//! hardware pair that backs them.

use crate::consts::{BREAK_MICROS, INTER_SLOT_IDLE_MICROS, MAB_MICROS, RDM_RESPONSE_TIMEOUT_MICROS};
use crate::dmx_uart_driver::{
    DmxOneShotTimer, DmxUartBus, DmxUartDriverError, LineDirection, UartEvent,
};
use crate::frame_buffer::{DmxFrame, FrameBuffer};
use crate::line_state::{
    LineAction, LineError, LineEvent, LineNotification, LineState, LineStateMachine,
};
use crate::rdm_data::RdmDeserializationError;
use crate::unique_identifier::UniqueIdentifier;
use log::{debug, trace};

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmxError<E> {
    /// There were fewer bytes written to the uart than there should have been.
    UartOverflow,
    /// Nothing was received inside the expected window.
    TimeoutError,
    /// A framing error or break-in-data was detected on the line.
    BusError,
    /// Raised when an RDM package could not be deserialized.
    DeserializationError(RdmDeserializationError),
    /// An error raised by the uart driver.
    DriverError(E),
}

impl<E: core::fmt::Display> core::fmt::Display for DmxError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DmxError::UartOverflow => write!(f, "uart overflowed"),
            DmxError::TimeoutError => write!(f, "request timed out"),
            DmxError::BusError => write!(f, "bus error on the line"),
            DmxError::DeserializationError(error) => error.fmt(f),
            DmxError::DriverError(error) => error.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Display + core::fmt::Debug> std::error::Error for DmxError<E> {}

impl<E> From<DmxUartDriverError<E>> for DmxError<E> {
    fn from(value: DmxUartDriverError<E>) -> Self {
        match value {
            DmxUartDriverError::TimeoutError => Self::TimeoutError,
            DmxUartDriverError::DriverError(driver_error) => Self::DriverError(driver_error),
        }
    }
}

impl<E> From<RdmDeserializationError> for DmxError<E> {
    fn from(value: RdmDeserializationError) -> Self {
        Self::DeserializationError(value)
    }
}

/// Wire pacing of a port. The defaults satisfy both E1.11 and the tighter
/// E1.20 turnaround windows.
#[derive(Debug, Copy, Clone)]
pub struct DmxPortConfig {
    pub break_us: u32,
    pub mab_us: u32,
    /// How long to wait for the first byte of a response.
    pub response_timeout_us: u32,
    /// Receive gap after which a frame is considered complete.
    pub inter_slot_idle_us: u32,
}

impl Default for DmxPortConfig {
    fn default() -> Self {
        Self {
            break_us: BREAK_MICROS,
            mab_us: MAB_MICROS,
            response_timeout_us: RDM_RESPONSE_TIMEOUT_MICROS,
            inter_slot_idle_us: INTER_SLOT_IDLE_MICROS,
        }
    }
}

/// One port of a device. All line traffic of the port funnels through this
/// object; the exclusive borrow is what serializes callers against the
/// event-driven line layer.
pub struct DmxPort<B: DmxUartBus, T: DmxOneShotTimer> {
    bus: B,
    timer: T,
    config: DmxPortConfig,
    port_id: u8,
    uid: UniqueIdentifier,
    frame: FrameBuffer,
    machine: LineStateMachine,
}

impl<B: DmxUartBus, T: DmxOneShotTimer> DmxPort<B, T> {
    /// Creates a port. The port uid is derived from the binding uid by
    /// xor-ing the last octet with the port index.
    pub fn new(
        bus: B,
        timer: T,
        port_index: u8,
        binding_uid: UniqueIdentifier,
        config: DmxPortConfig,
    ) -> Self {
        Self {
            bus,
            timer,
            config,
            port_id: port_index,
            uid: binding_uid.for_port(port_index),
            frame: FrameBuffer::new(),
            machine: LineStateMachine::new(),
        }
    }

    pub fn uid(&self) -> UniqueIdentifier {
        self.uid
    }

    pub fn port_id(&self) -> u8 {
        self.port_id
    }

    pub fn line_state(&self) -> LineState {
        self.machine.state()
    }

    /// Get a reference to the underlying bus driver.
    pub fn get_bus(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Stages dmx data slots without touching the wire. Slot numbering is
    /// zero-based over the data slots; the start code is staged separately.
    pub fn write_slots(&mut self, offset: usize, data: &[u8]) -> usize {
        self.frame.write_slots(offset, data)
    }

    /// True if the slot was written since the last staged frame was cleared.
    pub fn slot_is_written(&self, slot: usize) -> bool {
        self.frame.slot_is_written(slot)
    }

    /// Sends the staged frame with the given start code.
    pub fn send_staged(&mut self, start_code: u8) -> Result<(), DmxError<B::DriverError>> {
        self.frame.set_start_code(start_code);
        self.transmit(false)?;
        self.frame.clear_written_slots();
        Ok(())
    }

    /// Sends a complete frame, start code included.
    pub fn send_frame(
        &mut self,
        frame: &[u8],
        expect_response: bool,
    ) -> Result<(), DmxError<B::DriverError>> {
        self.frame.load_frame(frame);
        self.transmit(expect_response)
    }

    /// Sends bytes without a leading break, the framing of a discovery
    /// response.
    pub fn send_frame_no_break(&mut self, frame: &[u8]) -> Result<(), DmxError<B::DriverError>> {
        self.ensure_idle();
        self.frame.load_frame(frame);

        let action = self.machine.begin_send_no_break();
        self.bus.set_direction(LineDirection::Transmit)?;
        self.perform(action)?;
        self.run_to_send_complete()
    }

    /// Receives one frame. Returns a timeout error if nothing arrives inside
    /// the response window and a bus error on framing trouble, which during
    /// discovery means a collision.
    pub fn receive_frame(&mut self) -> Result<DmxFrame, DmxError<B::DriverError>> {
        match self.machine.state() {
            // line turnaround after a request already put us here
            LineState::RxWait | LineState::RxSlots => {},
            LineState::Idle => {
                let action = self.machine.begin_receive(true);
                self.perform(action)?;
            },
            other => {
                debug!("receive from stale line state {:?}", other);
                self.reset_line()?;
                let action = self.machine.begin_receive(true);
                self.perform(action)?;
            },
        }

        loop {
            match self.pump()? {
                Some(LineNotification::FrameReceived) => {
                    self.timer.cancel();
                    self.machine.finish_receive();
                    return Ok(self.frame.take_frame());
                },
                Some(LineNotification::FrameRestarted) => {
                    // the machine keeps collecting the follow-up frame
                    return Ok(self.frame.take_frame());
                },
                Some(LineNotification::LineError(LineError::Timeout)) => {
                    self.machine.acknowledge_error();
                    return Err(DmxError::TimeoutError);
                },
                Some(LineNotification::LineError(LineError::BusError)) => {
                    self.machine.acknowledge_error();
                    return Err(DmxError::BusError);
                },
                Some(LineNotification::SendComplete) | None => {},
            }
        }
    }

    /// Blocks until the transmitter is drained.
    pub fn wait_sent(&mut self, timeout_us: u32) -> Result<(), DmxError<B::DriverError>> {
        Ok(self.bus.wait_idle(timeout_us)?)
    }

    /// Drops anything in flight and returns the line to idle.
    pub fn reset_line(&mut self) -> Result<(), DmxError<B::DriverError>> {
        self.timer.cancel();
        self.bus.flush()?;
        self.machine.reset();
        self.frame.begin_rx();
        Ok(())
    }

    fn ensure_idle(&mut self) {
        if self.machine.state() != LineState::Idle {
            self.timer.cancel();
            self.machine.reset();
        }
    }

    fn transmit(&mut self, expect_response: bool) -> Result<(), DmxError<B::DriverError>> {
        self.ensure_idle();

        let action = self.machine.begin_send(expect_response);
        self.perform(action)?;
        self.run_to_send_complete()
    }

    fn run_to_send_complete(&mut self) -> Result<(), DmxError<B::DriverError>> {
        loop {
            match self.pump()? {
                Some(LineNotification::SendComplete) => {
                    self.timer.cancel();
                    let action = self.machine.finish_send();
                    self.perform(action)?;
                    return Ok(());
                },
                Some(LineNotification::LineError(LineError::Timeout)) => {
                    self.machine.acknowledge_error();
                    return Err(DmxError::TimeoutError);
                },
                Some(LineNotification::LineError(LineError::BusError)) => {
                    self.machine.acknowledge_error();
                    return Err(DmxError::BusError);
                },
                Some(_) | None => {},
            }
        }
    }

    /// Feeds the next pending hardware event into the machine and executes
    /// the resulting action.
    fn pump(&mut self) -> Result<Option<LineNotification>, DmxError<B::DriverError>> {
        let event = if self.timer.poll_expired() {
            LineEvent::TimerExpired
        } else {
            match self.bus.poll_event()? {
                Some(UartEvent::TxComplete) => LineEvent::TxComplete,
                Some(UartEvent::BreakDetected) => LineEvent::BreakDetected,
                Some(UartEvent::FramingError) => LineEvent::FramingError,
                Some(UartEvent::RxAvailable) => {
                    let mut chunk = [0u8; 64];
                    let mut buffer_full = self.frame.is_full();
                    loop {
                        let read = self.bus.read_available(&mut chunk)?;
                        if read == 0 {
                            break;
                        }
                        let taken = self.frame.push_rx(&chunk[..read]);
                        trace!("rx {} bytes ({} taken)", read, taken);
                        if taken < read {
                            buffer_full = true;
                            break;
                        }
                        buffer_full = self.frame.is_full();
                    }
                    LineEvent::RxData { buffer_full }
                },
                None => return Ok(None),
            }
        };

        let step = self.machine.on_event(event);
        self.perform(step.action)?;
        Ok(step.notification)
    }

    fn perform(&mut self, action: LineAction) -> Result<(), DmxError<B::DriverError>> {
        match action {
            LineAction::None => {},
            LineAction::StartBreak => {
                self.bus.set_direction(LineDirection::Transmit)?;
                self.bus.set_break(true)?;
                self.timer.arm_one_shot(self.config.break_us);
            },
            LineAction::EndBreak => {
                self.bus.set_break(false)?;
                self.timer.arm_one_shot(self.config.mab_us);
            },
            LineAction::WriteSlots => {
                let frame = self.frame.as_slice();
                let written = self.bus.write(frame)?;
                if written != frame.len() {
                    return Err(DmxError::UartOverflow);
                }
            },
            LineAction::EnterReceive { timed } => {
                self.bus.set_direction(LineDirection::Receive)?;
                self.frame.begin_rx();
                if timed {
                    self.timer.arm_one_shot(self.config.response_timeout_us);
                }
            },
            LineAction::ArmIdleGap => {
                self.timer.arm_one_shot(self.config.inter_slot_idle_us);
            },
        }

        Ok(())
    }
}
