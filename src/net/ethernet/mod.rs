//!
//! Full-duplex point-to-point links.
//!
//! An [`EthernetChannel`] connects exactly two [`EthernetDevice`]s. Each
//! direction is carried by a dedicated half-duplex channel, each endpoint
//! transmits on one interface and receives on another. To the outside,
//! endpoints and links behave like any other [`NetDevice`](super::NetDevice)
//! and [`Channel`](super::Channel).
//!

mod channel;
pub use self::channel::*;

mod device;
pub use self::device::*;

mod config;
pub use self::config::*;

mod helper;
pub use self::helper::*;
