use super::EthernetDevice;
use crate::{
    net::{csma::CsmaChannel, Channel, DataRate, NetDevice},
    time::Duration,
};
use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    rc::{Rc, Weak},
};

/// The number of endpoints of a full-duplex link.
pub const N_DEVICES: usize = 2;

///
/// A full-duplex point-to-point link.
///
/// Each direction is carried by its own half-duplex [`CsmaChannel`]. Once
/// both endpoints are attached, the first endpoint transmits on the first
/// sub-link and receives on the second, the second endpoint vice versa.
///
/// Endpoints are referenced weakly.
///
pub struct EthernetChannel {
    chan0: Rc<CsmaChannel>,
    chan1: Rc<CsmaChannel>,
    devices: RefCell<Vec<Weak<EthernetDevice>>>,

    data_rate: Cell<DataRate>,
    delay: Cell<Duration>,
}

impl EthernetChannel {
    /// Creates a new link with default attributes.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Self::with_attributes(DataRate::default(), Duration::ZERO)
    }

    /// Creates a new link with the given data rate and delay.
    #[must_use]
    pub fn with_attributes(data_rate: DataRate, delay: Duration) -> Rc<Self> {
        Rc::new(Self {
            chan0: CsmaChannel::with_attributes(data_rate, delay),
            chan1: CsmaChannel::with_attributes(data_rate, delay),
            devices: RefCell::new(Vec::with_capacity(N_DEVICES)),
            data_rate: Cell::new(data_rate),
            delay: Cell::new(delay),
        })
    }

    ///
    /// Registers an endpoint. Attaching the second endpoint wires the
    /// interfaces of both endpoints to the sub-links.
    ///
    /// Endpoints attach themselves through [`EthernetDevice::attach`].
    ///
    /// # Panics
    ///
    /// Panics if two endpoints are already attached.
    ///
    pub(crate) fn attach(&self, device: &Rc<EthernetDevice>) {
        let n = {
            let mut devices = self.devices.borrow_mut();
            assert!(devices.len() < N_DEVICES, "Only two devices permitted");
            devices.push(Rc::downgrade(device));
            devices.len()
        };

        tracing::debug!(n, "endpoint {} attached to link", device.address());

        if n == N_DEVICES {
            let (Some(dev0), Some(dev1)) = (self.ethernet_device(0), self.ethernet_device(1))
            else {
                tracing::warn!("endpoint dropped before the link was complete, not wiring");
                return;
            };

            dev0.tx_device().attach(&self.chan0);
            dev0.rx_device().attach(&self.chan1);
            dev1.tx_device().attach(&self.chan1);
            dev1.rx_device().attach(&self.chan0);

            tracing::debug!(
                "link complete: {} <-> {}",
                dev0.address(),
                dev1.address()
            );
        }
    }

    ///
    /// The endpoint at index `i`, or `None` if it no longer exists.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not within `[0, n_devices)`.
    ///
    #[must_use]
    pub fn ethernet_device(&self, i: usize) -> Option<Rc<EthernetDevice>> {
        let devices = self.devices.borrow();
        assert!(
            i < devices.len(),
            "device index {i} out of range for link with {} devices",
            devices.len()
        );
        devices[i].upgrade()
    }

    /// The data rate of both directions.
    #[must_use]
    pub fn data_rate(&self) -> DataRate {
        self.data_rate.get()
    }

    /// Sets the data rate of both directions.
    pub fn set_data_rate(&self, data_rate: DataRate) -> bool {
        tracing::trace!(%data_rate, "setting link data rate");
        self.data_rate.set(data_rate);
        self.chan0.set_data_rate(data_rate);
        self.chan1.set_data_rate(data_rate);
        true
    }

    /// The propagation delay of both directions.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay.get()
    }

    /// Sets the propagation delay of both directions.
    pub fn set_delay(&self, delay: Duration) -> bool {
        tracing::trace!(?delay, "setting link delay");
        self.delay.set(delay);
        self.chan0.set_delay(delay);
        self.chan1.set_delay(delay);
        true
    }

    /// The sub-link carrying frames from the first to the second endpoint.
    #[must_use]
    pub fn forward_channel(&self) -> &Rc<CsmaChannel> {
        &self.chan0
    }

    /// The sub-link carrying frames from the second to the first endpoint.
    #[must_use]
    pub fn reverse_channel(&self) -> &Rc<CsmaChannel> {
        &self.chan1
    }

    ///
    /// Disposes both sub-links and releases all endpoints.
    ///
    pub fn dispose(&self) {
        tracing::trace!("disposing link");
        self.chan0.dispose();
        self.chan1.dispose();
        self.devices.borrow_mut().clear();
    }
}

impl Channel for EthernetChannel {
    fn n_devices(&self) -> usize {
        self.devices.borrow().len()
    }

    fn device(&self, i: usize) -> Option<Rc<dyn NetDevice>> {
        let device: Rc<dyn NetDevice> = self.ethernet_device(i)?;
        Some(device)
    }
}

impl Debug for EthernetChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthernetChannel")
            .field("devices", &self.devices.borrow().len())
            .field("data_rate", &self.data_rate.get())
            .field("delay", &self.delay.get())
            .finish()
    }
}
