use super::{buf_process, Sim};
use crate::{
    net::{
        csma::{CsmaChannel, CsmaDevice},
        EthernetFrame,
    },
    runtime::{EventSet, Runtime},
};
use std::{fmt::Debug, rc::Weak};

///
/// The event set of a [`Sim`].
///
/// Events reference their targets weakly. If the target was dropped
/// or disposed before the event is handled, the event has no effect.
///
#[derive(Debug)]
pub enum NetEvents {
    /// A device tries to put its current frame onto the channel.
    CsmaTransmitStart(Weak<CsmaDevice>),
    /// A device finished serializing its current frame.
    CsmaTransmitComplete(Weak<CsmaDevice>),
    /// The interframe gap of a device has passed.
    CsmaTransmitReady(Weak<CsmaDevice>),
    /// The last bit of a frame has reached all devices on a channel.
    CsmaPropagationComplete(Weak<CsmaChannel>),
    /// A frame arrives at a device.
    CsmaReceive(CsmaReceive),
    /// A user scheduled closure.
    Scheduled(ScheduledFn),
}

impl<A> EventSet<Sim<A>> for NetEvents {
    fn handle(self, rt: &mut Runtime<Sim<A>>) {
        match self {
            Self::CsmaTransmitStart(device) => {
                if let Some(device) = device.upgrade() {
                    device.transmit_start();
                }
            }
            Self::CsmaTransmitComplete(device) => {
                if let Some(device) = device.upgrade() {
                    device.transmit_complete();
                }
            }
            Self::CsmaTransmitReady(device) => {
                if let Some(device) = device.upgrade() {
                    device.transmit_ready();
                }
            }
            Self::CsmaPropagationComplete(channel) => {
                if let Some(channel) = channel.upgrade() {
                    channel.propagation_complete();
                }
            }
            Self::CsmaReceive(event) => event.handle(),
            Self::Scheduled(f) => (f.0)(),
        }

        buf_process(rt);
    }
}

/// A frame arriving at a device.
#[derive(Debug)]
pub struct CsmaReceive {
    pub(crate) device: Weak<CsmaDevice>,
    pub(crate) frame: EthernetFrame,
    pub(crate) sender: usize,
}

impl CsmaReceive {
    fn handle(self) {
        if let Some(device) = self.device.upgrade() {
            device.receive(self.frame, self.sender);
        }
    }
}

/// A boxed closure, executed as an event.
pub struct ScheduledFn(pub(crate) Box<dyn FnOnce()>);

impl Debug for ScheduledFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ScheduledFn")
    }
}
