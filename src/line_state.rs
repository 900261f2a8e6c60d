//! The line-level state machine of a port.
//!
//! The machine is pure: events go in, actions come out, and all bus and
//! timer access stays with the port that runs it. Interrupt context only
//! ever produces events, so the machine can be stepped from a single
//! critical section without ever blocking inside it.

use log::warn;

/// The line states of a port. A port is in exactly one of these at any time.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineState {
    Idle,
    /// Driving the break pulse.
    TxBreak,
    /// Driving the mark-after-break.
    TxMab,
    /// Slots are draining out of the fifo.
    TxSlots,
    /// The last slot has left the shift register.
    TxDone,
    /// Listening, nothing received yet.
    RxWait,
    /// A frame is coming in.
    RxSlots,
    /// A complete frame is waiting to be taken.
    RxDone,
    /// A bus error or timeout; holds until acknowledged.
    Error,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineEvent {
    /// The armed one-shot elapsed.
    TimerExpired,
    /// The transmitter has fully drained.
    TxComplete,
    /// Receive data was appended to the frame buffer.
    RxData { buffer_full: bool },
    /// A break was seen on the line.
    BreakDetected,
    /// A malformed character was seen on the line.
    FramingError,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Nothing arrived inside the expected window.
    Timeout,
    /// Framing error on the wire.
    BusError,
}

/// What the port has to do to the hardware after a step.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LineAction {
    None,
    /// Direction to transmit, break condition on, break timer armed.
    StartBreak,
    /// Break condition off, mark-after-break timer armed.
    EndBreak,
    /// Write the staged frame into the transmit fifo.
    WriteSlots,
    /// Direction to receive; arm the response-timeout timer if timed.
    EnterReceive { timed: bool },
    /// (Re)arm the inter-slot idle timer.
    ArmIdleGap,
}

/// What a step means to the layer above.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LineNotification {
    /// The staged frame is fully on the wire.
    SendComplete,
    /// A complete frame is in the buffer.
    FrameReceived,
    /// A break cut the current frame short: the buffer holds a complete
    /// frame and a new one is already arriving.
    FrameRestarted,
    LineError(LineError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineStep {
    pub action: LineAction,
    pub notification: Option<LineNotification>,
}

impl LineStep {
    const IGNORED: LineStep = LineStep {
        action: LineAction::None,
        notification: None,
    };

    fn act(action: LineAction) -> Self {
        Self {
            action,
            notification: None,
        }
    }

    fn notify(notification: LineNotification) -> Self {
        Self {
            action: LineAction::None,
            notification: Some(notification),
        }
    }

    fn act_and_notify(action: LineAction, notification: LineNotification) -> Self {
        Self {
            action,
            notification: Some(notification),
        }
    }
}

#[derive(Debug)]
pub struct LineStateMachine {
    state: LineState,
    expect_response: bool,
}

impl LineStateMachine {
    pub const fn new() -> Self {
        Self {
            state: LineState::Idle,
            expect_response: false,
        }
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    /// Starts a transmission with the usual break and mark-after-break.
    /// Only valid from idle.
    pub fn begin_send(&mut self, expect_response: bool) -> LineAction {
        debug_assert_eq!(self.state, LineState::Idle);
        self.state = LineState::TxBreak;
        self.expect_response = expect_response;

        LineAction::StartBreak
    }

    /// Starts a transmission without a break, used for discovery responses.
    pub fn begin_send_no_break(&mut self) -> LineAction {
        debug_assert_eq!(self.state, LineState::Idle);
        self.state = LineState::TxSlots;
        self.expect_response = false;

        LineAction::WriteSlots
    }

    /// Starts listening. With `timed` the response window is armed and its
    /// expiry is an error; without it the machine waits indefinitely.
    pub fn begin_receive(&mut self, timed: bool) -> LineAction {
        debug_assert_eq!(self.state, LineState::Idle);
        self.state = LineState::RxWait;

        LineAction::EnterReceive { timed }
    }

    /// Leaves the terminal send state, turning the line around if a
    /// response is expected.
    pub fn finish_send(&mut self) -> LineAction {
        debug_assert_eq!(self.state, LineState::TxDone);

        if self.expect_response {
            self.state = LineState::RxWait;
            LineAction::EnterReceive { timed: true }
        } else {
            self.state = LineState::Idle;
            LineAction::None
        }
    }

    /// Leaves the terminal receive state after the frame has been taken.
    pub fn finish_receive(&mut self) {
        debug_assert_eq!(self.state, LineState::RxDone);
        self.state = LineState::Idle;
    }

    /// Clears an error after the caller was notified.
    pub fn acknowledge_error(&mut self) {
        debug_assert_eq!(self.state, LineState::Error);
        self.state = LineState::Idle;
    }

    /// Drops whatever was in flight. Used when a caller abandons a
    /// transaction or resynchronizes the line.
    pub fn reset(&mut self) {
        if self.state != LineState::Idle {
            warn!("line machine reset from {:?}", self.state);
        }
        self.state = LineState::Idle;
        self.expect_response = false;
    }

    pub fn on_event(&mut self, event: LineEvent) -> LineStep {
        match self.state {
            LineState::TxBreak => match event {
                LineEvent::TimerExpired => {
                    self.state = LineState::TxMab;
                    LineStep::act(LineAction::EndBreak)
                },
                _ => LineStep::IGNORED,
            },
            LineState::TxMab => match event {
                LineEvent::TimerExpired => {
                    self.state = LineState::TxSlots;
                    LineStep::act(LineAction::WriteSlots)
                },
                _ => LineStep::IGNORED,
            },
            LineState::TxSlots => match event {
                LineEvent::TxComplete => {
                    self.state = LineState::TxDone;
                    LineStep::notify(LineNotification::SendComplete)
                },
                // receive events are meaningless while we drive the line
                _ => LineStep::IGNORED,
            },
            LineState::RxWait => match event {
                LineEvent::RxData { buffer_full: false } | LineEvent::BreakDetected => {
                    self.state = LineState::RxSlots;
                    LineStep::act(LineAction::ArmIdleGap)
                },
                LineEvent::RxData { buffer_full: true } => {
                    self.state = LineState::RxDone;
                    LineStep::notify(LineNotification::FrameReceived)
                },
                LineEvent::TimerExpired => {
                    self.state = LineState::Error;
                    LineStep::notify(LineNotification::LineError(LineError::Timeout))
                },
                LineEvent::FramingError => {
                    self.state = LineState::Error;
                    LineStep::notify(LineNotification::LineError(LineError::BusError))
                },
                LineEvent::TxComplete => LineStep::IGNORED,
            },
            LineState::RxSlots => match event {
                LineEvent::RxData { buffer_full: false } => LineStep::act(LineAction::ArmIdleGap),
                LineEvent::RxData { buffer_full: true } | LineEvent::TimerExpired => {
                    self.state = LineState::RxDone;
                    LineStep::notify(LineNotification::FrameReceived)
                },
                LineEvent::BreakDetected => LineStep::act_and_notify(
                    LineAction::ArmIdleGap,
                    LineNotification::FrameRestarted,
                ),
                LineEvent::FramingError => {
                    self.state = LineState::Error;
                    LineStep::notify(LineNotification::LineError(LineError::BusError))
                },
                LineEvent::TxComplete => LineStep::IGNORED,
            },
            // terminal and error states hold until the port moves on
            LineState::Idle | LineState::TxDone | LineState::RxDone | LineState::Error => {
                LineStep::IGNORED
            },
        }
    }
}

impl Default for LineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_walks_break_mab_slots() {
        let mut machine = LineStateMachine::new();
        assert_eq!(machine.begin_send(false), LineAction::StartBreak);
        assert_eq!(machine.state(), LineState::TxBreak);

        assert_eq!(
            machine.on_event(LineEvent::TimerExpired).action,
            LineAction::EndBreak
        );
        assert_eq!(machine.state(), LineState::TxMab);

        assert_eq!(
            machine.on_event(LineEvent::TimerExpired).action,
            LineAction::WriteSlots
        );
        assert_eq!(machine.state(), LineState::TxSlots);

        let step = machine.on_event(LineEvent::TxComplete);
        assert_eq!(step.notification, Some(LineNotification::SendComplete));
        assert_eq!(machine.state(), LineState::TxDone);

        assert_eq!(machine.finish_send(), LineAction::None);
        assert_eq!(machine.state(), LineState::Idle);
    }

    #[test]
    fn send_turns_line_around_when_response_expected() {
        let mut machine = LineStateMachine::new();
        machine.begin_send(true);
        machine.on_event(LineEvent::TimerExpired);
        machine.on_event(LineEvent::TimerExpired);
        machine.on_event(LineEvent::TxComplete);

        assert_eq!(machine.finish_send(), LineAction::EnterReceive { timed: true });
        assert_eq!(machine.state(), LineState::RxWait);
    }

    #[test]
    fn receive_completes_on_idle_gap() {
        let mut machine = LineStateMachine::new();
        machine.begin_receive(true);

        assert_eq!(
            machine.on_event(LineEvent::RxData { buffer_full: false }).action,
            LineAction::ArmIdleGap
        );
        assert_eq!(machine.state(), LineState::RxSlots);

        let step = machine.on_event(LineEvent::TimerExpired);
        assert_eq!(step.notification, Some(LineNotification::FrameReceived));
        assert_eq!(machine.state(), LineState::RxDone);

        machine.finish_receive();
        assert_eq!(machine.state(), LineState::Idle);
    }

    #[test]
    fn receive_times_out_when_nothing_arrives() {
        let mut machine = LineStateMachine::new();
        machine.begin_receive(true);

        let step = machine.on_event(LineEvent::TimerExpired);
        assert_eq!(
            step.notification,
            Some(LineNotification::LineError(LineError::Timeout))
        );
        assert_eq!(machine.state(), LineState::Error);

        machine.acknowledge_error();
        assert_eq!(machine.state(), LineState::Idle);
    }

    #[test]
    fn break_in_data_restarts_the_frame() {
        let mut machine = LineStateMachine::new();
        machine.begin_receive(false);
        machine.on_event(LineEvent::RxData { buffer_full: false });

        let step = machine.on_event(LineEvent::BreakDetected);
        assert_eq!(step.notification, Some(LineNotification::FrameRestarted));
        assert_eq!(step.action, LineAction::ArmIdleGap);
        assert_eq!(machine.state(), LineState::RxSlots);
    }

    #[test]
    fn rx_events_are_ignored_while_transmitting() {
        let mut machine = LineStateMachine::new();
        machine.begin_send(false);

        assert_eq!(
            machine.on_event(LineEvent::RxData { buffer_full: false }),
            LineStep::IGNORED
        );
        assert_eq!(machine.on_event(LineEvent::BreakDetected), LineStep::IGNORED);
        assert_eq!(machine.state(), LineState::TxBreak);
    }

    #[test]
    fn framing_error_is_a_bus_error() {
        let mut machine = LineStateMachine::new();
        machine.begin_receive(true);
        machine.on_event(LineEvent::RxData { buffer_full: false });

        let step = machine.on_event(LineEvent::FramingError);
        assert_eq!(
            step.notification,
            Some(LineNotification::LineError(LineError::BusError))
        );
        assert_eq!(machine.state(), LineState::Error);
    }

    #[test]
    fn full_buffer_completes_the_frame() {
        let mut machine = LineStateMachine::new();
        machine.begin_receive(false);
        machine.on_event(LineEvent::RxData { buffer_full: false });

        let step = machine.on_event(LineEvent::RxData { buffer_full: true });
        assert_eq!(step.notification, Some(LineNotification::FrameReceived));
        assert_eq!(machine.state(), LineState::RxDone);
    }
}
