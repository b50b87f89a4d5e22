//!
//! Half-duplex shared-medium devices and channels.
//!
//! A [`CsmaChannel`] carries one frame at a time. [`CsmaDevice`]s queue
//! outgoing frames, wait for the medium using exponential back-off and
//! classify incoming frames against their own address.
//!

mod backoff;
pub use self::backoff::*;

mod channel;
pub use self::channel::*;

mod device;
pub use self::device::*;

/// The default MAC-level MTU of a device.
pub const DEFAULT_MTU: u16 = 1500;
