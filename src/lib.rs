//! Driver core for DMX512 (ANSI E1.11) and DMX-RDM (ANSI E1.20) ports on a
//! break-capable uart. The crate owns everything between the uart registers
//! and the application: the line-level state machine that paces break,
//! mark-after-break and slots, the RDM packet codec with its discovery
//! encoding, a format-string parameter marshaller, a table-driven responder
//! with persistent parameters, and a controller with binary-tree discovery.
//!
//! Hardware stays behind two traits ([dmx_uart_driver::DmxUartBus] and
//! [dmx_uart_driver::DmxOneShotTimer]); persistence behind a third
//! ([persistence::ParameterStore]). The crate is no-std and allocation-free,
//! targeting embedded as well as os platforms.
//!
//! Please refer to the [official specifications](https://tsp.esta.org/)
//! published by the ESTA.
//!
//! # Usage
//!
//! ## Controller
//!
//! ```no_run
//! # fn wrapper<B, T>(bus: B, timer: T)
//! # where B: dmx_rdm_driver::dmx_uart_driver::DmxUartBus, B::DriverError: core::fmt::Debug,
//! #       T: dmx_rdm_driver::dmx_uart_driver::DmxOneShotTimer {
//! use dmx_rdm_driver::discovery::run_full_discovery;
//! use dmx_rdm_driver::dmx_controller::DmxController;
//! use dmx_rdm_driver::dmx_port::{DmxPort, DmxPortConfig};
//! use dmx_rdm_driver::unique_identifier::{PackageAddress, UniqueIdentifier};
//!
//! let binding_uid = UniqueIdentifier::new(0x7FF0, 1).unwrap();
//! let port = DmxPort::new(bus, timer, 0, binding_uid, DmxPortConfig::default());
//! let mut controller = DmxController::new(port);
//!
//! let mut uid_array = [UniqueIdentifier::new(1, 1).unwrap(); 32];
//! let devices_found = run_full_discovery(&mut controller, &mut uid_array).unwrap();
//!
//! for device in &uid_array[..devices_found.min(uid_array.len())] {
//!     controller
//!         .rdm_set_identify(PackageAddress::Device(*device), true)
//!         .unwrap();
//! }
//! # }
//! ```
//!
//! ## Responder
//!
//! ```no_run
//! # fn wrapper<B, T>(bus: B, timer: T)
//! # where B: dmx_rdm_driver::dmx_uart_driver::DmxUartBus, B::DriverError: core::fmt::Debug,
//! #       T: dmx_rdm_driver::dmx_uart_driver::DmxOneShotTimer {
//! use dmx_rdm_driver::dmx_port::{DmxPort, DmxPortConfig};
//! use dmx_rdm_driver::frame_buffer::DmxFrame;
//! use dmx_rdm_driver::persistence::NoPersistence;
//! use dmx_rdm_driver::rdm_responder::{
//!     DmxResponderContext, DmxResponderHandler, RdmResponder, RdmResponderConfig,
//! };
//! use dmx_rdm_driver::unique_identifier::UniqueIdentifier;
//!
//! struct DmxHandler;
//!
//! impl DmxResponderHandler for DmxHandler {
//!     type Error = core::convert::Infallible;
//!
//!     fn handle_dmx(
//!         &mut self,
//!         dmx_frame: DmxFrame,
//!         _context: &mut DmxResponderContext,
//!     ) -> Result<(), Self::Error> {
//!         // drive the fixture from dmx_frame here
//!         Ok(())
//!     }
//! }
//!
//! let binding_uid = UniqueIdentifier::new(0x7FF0, 1).unwrap();
//! let port = DmxPort::new(bus, timer, 0, binding_uid, DmxPortConfig::default());
//! let mut responder: RdmResponder<_, _, _, 16> =
//!     RdmResponder::new(port, NoPersistence, RdmResponderConfig::default());
//!
//! let mut handler = DmxHandler;
//! loop {
//!     if let Err(error) = responder.poll(&mut handler) {
//!         // a single bad package should not stop the poll loop
//!         let _ = error;
//!     }
//! }
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod command_class;
pub mod consts;
/// Module for running binary-tree discovery from a controller.
pub mod discovery;
/// Module for building dmx-rdm controllers.
pub mod dmx_controller;
/// The per-port line layer: frame buffer, line state machine and the
/// blocking send/receive primitives on top of them.
pub mod dmx_port;
/// Module for implementing access to the uart and timer hardware.
pub mod dmx_uart_driver;
pub mod frame_buffer;
mod layouts;
pub mod line_state;
/// Declarative parameter-data marshalling driven by format strings.
pub mod parameter_format;
pub mod parameter_table;
pub mod persistence;
pub mod pids;
pub mod rdm_data;
/// Module for building dmx-rdm responders.
pub mod rdm_responder;
pub mod rdm_types;
pub mod types;
pub mod unique_identifier;
mod utils;
