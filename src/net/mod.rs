//!
//! Link-layer network simulation.
//!
//! # Overview
//!
//! Devices ([`NetDevice`]) are installed on [`Node`]s and attached to
//! channels ([`Channel`]). The [`csma`] module provides half-duplex shared
//! media, the [`ethernet`] module composes them into full-duplex
//! point-to-point links.
//!
//! Devices and channels are shared through `Rc`s and never hold the
//! runtime. Instead they schedule their events on a per-thread buffer,
//! which the [`Sim`] application hands over to the runtime after each
//! handled event.
//!
//! ```
//! # use des_ethernet::prelude::*;
//! # use std::rc::Rc;
//! let (a, b) = (Node::new(), Node::new());
//! let link = EthernetHelper::default().install(&a, &b);
//! link.devices[1].set_receive_callback(Some(Rc::new(|dev, packet, _, _| {
//!     println!("{} received {:?}", dev.address(), packet);
//!     true
//! })));
//!
//! assert!(link.devices[0].send(Packet::zeroed(64), MacAddress::BROADCAST, 0x0800));
//!
//! let mut sim = Sim::default();
//! link.register(&mut sim);
//! let _ = Builder::seeded(123).quiet().build(sim).run();
//! ```
//!

mod mac;
pub use self::mac::*;

mod packet;
pub use self::packet::*;

mod data_rate;
pub use self::data_rate::*;

mod queue;
pub use self::queue::*;

mod error_model;
pub use self::error_model::*;

pub mod trace;
pub use self::trace::{TraceFanout, TraceSink, TraceSource, TracedCallback};

mod device;
pub use self::device::*;

mod node;
pub use self::node::*;

mod runtime;
pub use self::runtime::*;

pub mod csma;
pub mod ethernet;

pub use self::ethernet::{
    ConfigError, EthernetChannel, EthernetConfig, EthernetDevice, EthernetHelper, EthernetLink,
};
