use super::CsmaDevice;
use crate::{
    net::{
        runtime::{buf_schedule_in, CsmaReceive, NetEvents},
        Channel, DataRate, EthernetFrame, NetDevice,
    },
    time::{Duration, SimTime},
};
use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    rc::{Rc, Weak},
};

/// The state of a [`CsmaChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No frame is on the medium.
    Idle,
    /// A device is serializing a frame onto the medium.
    Transmitting,
    /// The last frame is still propagating to the receivers.
    Propagating,
}

#[derive(Debug)]
struct Transmission {
    frame: EthernetFrame,
    sender: usize,
}

///
/// A shared half-duplex medium.
///
/// At most one frame is on the medium at any time. A transmission is
/// delivered to every other attached device after the propagation delay.
/// Attached devices are referenced weakly.
///
pub struct CsmaChannel {
    this: Weak<CsmaChannel>,
    devices: RefCell<Vec<Weak<CsmaDevice>>>,
    state: Cell<ChannelState>,
    current: RefCell<Option<Transmission>>,
    // The sender of the propagating frame, and when propagation ends.
    propagating: Cell<Option<(usize, SimTime)>>,

    data_rate: Cell<DataRate>,
    delay: Cell<Duration>,
    disposed: Cell<bool>,
}

impl CsmaChannel {
    /// Creates a new channel with default attributes.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Self::with_attributes(DataRate::default(), Duration::ZERO)
    }

    /// Creates a new channel with the given data rate and delay.
    #[must_use]
    pub fn with_attributes(data_rate: DataRate, delay: Duration) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            devices: RefCell::new(Vec::new()),
            state: Cell::new(ChannelState::Idle),
            current: RefCell::new(None),
            propagating: Cell::new(None),
            data_rate: Cell::new(data_rate),
            delay: Cell::new(delay),
            disposed: Cell::new(false),
        })
    }

    /// Attaches a device, returning its id on this channel.
    pub(crate) fn attach(&self, device: &Rc<CsmaDevice>) -> usize {
        let mut devices = self.devices.borrow_mut();
        devices.push(Rc::downgrade(device));
        tracing::trace!(id = devices.len() - 1, "attached device {}", device.address());
        devices.len() - 1
    }

    /// The state of the medium.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state.get()
    }

    /// Whether a frame is on the medium.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.get() != ChannelState::Idle
    }

    /// The transmission rate of the medium.
    #[must_use]
    pub fn data_rate(&self) -> DataRate {
        self.data_rate.get()
    }

    /// Sets the transmission rate of the medium.
    pub fn set_data_rate(&self, data_rate: DataRate) {
        self.data_rate.set(data_rate);
    }

    /// The propagation delay of the medium.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay.get()
    }

    /// Sets the propagation delay of the medium.
    pub fn set_delay(&self, delay: Duration) {
        self.delay.set(delay);
    }

    /// The attached device with the given id.
    #[must_use]
    pub fn csma_device(&self, id: usize) -> Option<Rc<CsmaDevice>> {
        self.devices.borrow().get(id).and_then(Weak::upgrade)
    }

    ///
    /// Puts a frame onto the medium.
    ///
    /// Returns `false` if the medium is not idle.
    ///
    pub(crate) fn transmit_start(&self, frame: EthernetFrame, sender: usize) -> bool {
        if self.disposed.get() || self.state.get() != ChannelState::Idle {
            tracing::trace!(state = ?self.state.get(), "channel busy, rejecting frame");
            return false;
        }

        tracing::trace!(sender, "transmission started");
        *self.current.borrow_mut() = Some(Transmission { frame, sender });
        self.state.set(ChannelState::Transmitting);
        true
    }

    ///
    /// Ends the current transmission and schedules its reception at all
    /// other devices.
    ///
    /// # Panics
    ///
    /// Panics if no transmission is in progress.
    ///
    pub(crate) fn transmit_end(&self) {
        if self.disposed.get() {
            return;
        }
        assert_eq!(
            self.state.get(),
            ChannelState::Transmitting,
            "transmit_end requires an active transmission"
        );

        let Some(Transmission { frame, sender }) = self.current.borrow_mut().take() else {
            panic!("transmit_end requires an active transmission");
        };

        self.state.set(ChannelState::Propagating);
        let delay = self.delay.get();
        self.propagating.set(Some((sender, SimTime::now() + delay)));

        tracing::trace!(sender, ?delay, "transmission ended, propagating");

        for (id, device) in self.devices.borrow().iter().enumerate() {
            if id == sender {
                continue;
            }
            buf_schedule_in(
                NetEvents::CsmaReceive(CsmaReceive {
                    device: device.clone(),
                    frame: frame.clone(),
                    sender,
                }),
                delay,
            );
        }

        buf_schedule_in(NetEvents::CsmaPropagationComplete(self.this.clone()), delay);
    }

    pub(crate) fn propagation_complete(&self) {
        if self.disposed.get() {
            return;
        }
        tracing::trace!("propagation complete");
        self.propagating.set(None);
        self.state.set(ChannelState::Idle);
    }

    ///
    /// The time the medium becomes idle, if it is only busy propagating
    /// a frame of `sender`.
    ///
    /// A sender never contends with its own frames, it waits for the
    /// propagation to complete instead.
    ///
    pub(crate) fn own_propagation_end(&self, sender: usize) -> Option<SimTime> {
        if self.state.get() != ChannelState::Propagating {
            return None;
        }
        self.propagating
            .get()
            .filter(|(id, _)| *id == sender)
            .map(|(_, idle_at)| idle_at)
    }

    ///
    /// Releases all devices. Pending propagation events of this
    /// channel have no effect afterwards.
    ///
    pub fn dispose(&self) {
        self.devices.borrow_mut().clear();
        self.current.borrow_mut().take();
        self.propagating.set(None);
        self.state.set(ChannelState::Idle);
        self.disposed.set(true);
    }
}

impl Channel for CsmaChannel {
    fn n_devices(&self) -> usize {
        self.devices.borrow().len()
    }

    fn device(&self, i: usize) -> Option<Rc<dyn NetDevice>> {
        let devices = self.devices.borrow();
        assert!(
            i < devices.len(),
            "device index {i} out of range for channel with {} devices",
            devices.len()
        );
        let device: Rc<dyn NetDevice> = devices[i].upgrade()?;
        Some(device)
    }
}

impl Debug for CsmaChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsmaChannel")
            .field("state", &self.state.get())
            .field("devices", &self.devices.borrow().len())
            .field("data_rate", &self.data_rate.get())
            .field("delay", &self.delay.get())
            .finish()
    }
}
