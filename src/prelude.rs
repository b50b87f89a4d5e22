//!
//! Convenience re-export of common members.
//!

//
// # Generic core exports
//

pub use crate::runtime::Application;
pub use crate::runtime::Builder;
pub use crate::runtime::EventSet;
pub use crate::runtime::Runtime;
pub use crate::runtime::RuntimeError;
pub use crate::runtime::RuntimeLimit;

pub use crate::runtime::random;
pub use crate::runtime::sample;

pub use crate::time::Duration;
pub use crate::time::SimTime;

//
// # Network exports
//

pub use crate::net::schedule_at;
pub use crate::net::schedule_in;
pub use crate::net::Sim;

pub use crate::net::Channel;
pub use crate::net::NetDevice;
pub use crate::net::Node;
pub use crate::net::PacketType;

pub use crate::net::DataRate;
pub use crate::net::EncapsulationMode;
pub use crate::net::MacAddress;
pub use crate::net::Packet;

pub use crate::net::DropTailQueue;
pub use crate::net::Queue;
pub use crate::net::QueueLimit;

pub use crate::net::ErrorModel;
pub use crate::net::ErrorUnit;
pub use crate::net::ListErrorModel;
pub use crate::net::RateErrorModel;

pub use crate::net::TraceSink;
pub use crate::net::TraceSource;

pub use crate::net::EthernetChannel;
pub use crate::net::EthernetConfig;
pub use crate::net::EthernetDevice;
pub use crate::net::EthernetHelper;
