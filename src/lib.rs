#![allow(clippy::needless_doctest_main)]
#![warn(missing_docs)]
//!
//! Full-duplex Ethernet links for discrete event simulations.
//!
//! The crate provides a small discrete event [`runtime`] with simulated
//! [`time`], and a link-layer [`net`]work model on top of it. The central
//! piece is a full-duplex point-to-point link, built from two half-duplex
//! shared-medium channels, one per direction.
//!
//! # Building a link
//!
//! ```
//! use des_ethernet::prelude::*;
//! use std::{cell::Cell, rc::Rc};
//!
//! let link = EthernetChannel::new();
//! link.set_data_rate("100Mbps".parse().unwrap());
//! link.set_delay(Duration::from_micros(5));
//!
//! let d1 = EthernetDevice::new();
//! d1.set_address("00:00:00:00:00:01".parse().unwrap());
//! let d2 = EthernetDevice::new();
//! d2.set_address("00:00:00:00:00:02".parse().unwrap());
//!
//! d1.attach(&link);
//! d2.attach(&link);
//! assert_eq!(link.n_devices(), 2);
//!
//! let received = Rc::new(Cell::new(0));
//! let r = received.clone();
//! d2.set_receive_callback(Some(Rc::new(move |_, _, _, _| {
//!     r.set(r.get() + 1);
//!     true
//! })));
//!
//! assert!(d1.send(Packet::zeroed(100), MacAddress::BROADCAST, 0x0800));
//!
//! let rt = Builder::seeded(1).quiet().build(Sim::default());
//! let _ = rt.run();
//! assert_eq!(received.get(), 1);
//! ```
//!
//! Devices and links schedule their events without access to the runtime,
//! see [`net`] for details. Logging is done through the `tracing` crate,
//! [`tracing::init`] installs a subscriber that prefixes every event
//! with the current simulation time.
//!

pub mod prelude;

pub mod net;
pub mod runtime;
pub mod time;
pub mod tracing;
