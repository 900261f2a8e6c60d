#![allow(dead_code)]
//! A scripted uart bus and timer pair the tests drive the driver with.
//!
//! Time is simulated: the one-shot "fires" as soon as no queued event or
//! receive data is left, which mirrors the ordering on real hardware where
//! fifo and level interrupts always precede the armed timeout.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use dmx_rdm_driver::dmx_uart_driver::{
    DmxOneShotTimer, DmxUartBus, DmxUartDriverError, LineDirection, UartEvent,
};
use dmx_rdm_driver::parameter_table::ParameterDataType;
use dmx_rdm_driver::persistence::ParameterStore;

/// What the simulated far side does with a frame the driver put on the wire.
pub enum MockReply {
    /// Nobody answers.
    Silence,
    /// A clean response arrives.
    Frame(Vec<u8>),
    /// Something arrives but the line saw a framing error.
    FramingError,
}

type AutoResponder = Box<dyn FnMut(&[u8]) -> MockReply>;

#[derive(Default)]
pub struct MockState {
    /// Every frame the driver wrote, oldest first.
    pub written: Vec<Vec<u8>>,
    pub rx_data: VecDeque<u8>,
    pub events: VecDeque<UartEvent>,
    pub direction: Option<LineDirection>,
    pub breaks_sent: usize,
    pub armed_durations: Vec<u32>,
    armed: bool,
    auto_responder: Option<AutoResponder>,
}

impl MockState {
    /// Queues bytes as if they arrived on the line.
    pub fn push_rx_frame(&mut self, bytes: &[u8]) {
        self.rx_data.extend(bytes.iter().copied());
        self.events.push_back(UartEvent::RxAvailable);
    }
}

#[derive(Clone)]
pub struct MockLink {
    state: Rc<RefCell<MockState>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState::default())),
        }
    }

    pub fn bus(&self) -> MockBus {
        MockBus {
            state: Rc::clone(&self.state),
        }
    }

    pub fn timer(&self) -> MockTimer {
        MockTimer {
            state: Rc::clone(&self.state),
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    /// Installs the far side of the bus: called with every written frame,
    /// its reply is queued as receive data.
    pub fn set_auto_responder(&self, responder: impl FnMut(&[u8]) -> MockReply + 'static) {
        self.state.borrow_mut().auto_responder = Some(Box::new(responder));
    }

    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().written.clone()
    }
}

pub struct MockBus {
    state: Rc<RefCell<MockState>>,
}

impl DmxUartBus for MockBus {
    type DriverError = std::convert::Infallible;

    fn write(&mut self, buffer: &[u8]) -> Result<usize, DmxUartDriverError<Self::DriverError>> {
        let responder = {
            let mut state = self.state.borrow_mut();
            state.written.push(buffer.to_vec());
            state.events.push_back(UartEvent::TxComplete);
            state.auto_responder.take()
        };

        if let Some(mut responder) = responder {
            let reply = responder(buffer);
            let mut state = self.state.borrow_mut();
            match reply {
                MockReply::Silence => {},
                MockReply::Frame(bytes) => state.push_rx_frame(&bytes),
                MockReply::FramingError => state.events.push_back(UartEvent::FramingError),
            }
            state.auto_responder = Some(responder);
        }

        Ok(buffer.len())
    }

    fn read_available(
        &mut self,
        buffer: &mut [u8],
    ) -> Result<usize, DmxUartDriverError<Self::DriverError>> {
        let mut state = self.state.borrow_mut();
        let mut read = 0;
        while read < buffer.len() {
            match state.rx_data.pop_front() {
                Some(byte) => {
                    buffer[read] = byte;
                    read += 1;
                },
                None => break,
            }
        }

        Ok(read)
    }

    fn flush(&mut self) -> Result<(), DmxUartDriverError<Self::DriverError>> {
        let mut state = self.state.borrow_mut();
        state.rx_data.clear();
        state.events.clear();
        Ok(())
    }

    fn set_direction(
        &mut self,
        direction: LineDirection,
    ) -> Result<(), DmxUartDriverError<Self::DriverError>> {
        self.state.borrow_mut().direction = Some(direction);
        Ok(())
    }

    fn set_break(&mut self, enable: bool) -> Result<(), DmxUartDriverError<Self::DriverError>> {
        if enable {
            self.state.borrow_mut().breaks_sent += 1;
        }
        Ok(())
    }

    fn wait_idle(
        &mut self,
        _timeout_us: u32,
    ) -> Result<(), DmxUartDriverError<Self::DriverError>> {
        Ok(())
    }

    fn poll_event(
        &mut self,
    ) -> Result<Option<UartEvent>, DmxUartDriverError<Self::DriverError>> {
        Ok(self.state.borrow_mut().events.pop_front())
    }
}

pub struct MockTimer {
    state: Rc<RefCell<MockState>>,
}

impl DmxOneShotTimer for MockTimer {
    fn arm_one_shot(&mut self, duration_us: u32) {
        let mut state = self.state.borrow_mut();
        state.armed = true;
        state.armed_durations.push(duration_us);
    }

    fn cancel(&mut self) {
        self.state.borrow_mut().armed = false;
    }

    fn poll_expired(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.armed && state.events.is_empty() && state.rx_data.is_empty() {
            state.armed = false;
            return true;
        }

        false
    }
}

/// An in-memory store that can be told to fail.
#[derive(Default)]
pub struct MockStore {
    pub records: std::collections::HashMap<(u8, u16), Vec<u8>>,
    pub fail_stores: bool,
}

#[derive(Debug)]
pub struct MockStoreError;

#[derive(Clone)]
pub struct SharedStore(Rc<RefCell<MockStore>>);

impl std::ops::Deref for SharedStore {
    type Target = RefCell<MockStore>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub fn shared_store() -> SharedStore {
    SharedStore(Rc::new(RefCell::new(MockStore::default())))
}

impl ParameterStore for SharedStore {
    type StoreError = MockStoreError;

    fn load(
        &mut self,
        port_id: u8,
        pid: u16,
        _data_type: ParameterDataType,
        out: &mut [u8],
    ) -> Result<Option<usize>, Self::StoreError> {
        match self.borrow().records.get(&(port_id, pid)) {
            Some(record) => {
                let len = record.len().min(out.len());
                out[..len].copy_from_slice(&record[..len]);
                Ok(Some(len))
            },
            None => Ok(None),
        }
    }

    fn store(
        &mut self,
        port_id: u8,
        pid: u16,
        _data_type: ParameterDataType,
        data: &[u8],
    ) -> Result<(), Self::StoreError> {
        let mut store = self.borrow_mut();
        if store.fail_stores {
            return Err(MockStoreError);
        }

        store.records.insert((port_id, pid), data.to_vec());
        Ok(())
    }
}
