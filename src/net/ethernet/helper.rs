use super::{ConfigError, EthernetChannel, EthernetConfig, EthernetDevice};
use crate::net::{DropTailQueue, ErrorUnit, MacAddress, NetDevice, Node, RateErrorModel, Sim};
use std::rc::Rc;

///
/// Builds full-duplex links between pairs of nodes from an [`EthernetConfig`].
///
#[derive(Debug, Clone, Default)]
pub struct EthernetHelper {
    config: EthernetConfig,
}

///
/// A link created by an [`EthernetHelper`].
///
#[derive(Debug, Clone)]
pub struct EthernetLink {
    /// The link.
    pub channel: Rc<EthernetChannel>,
    /// The endpoints, in attach order.
    pub devices: [Rc<EthernetDevice>; 2],
}

impl EthernetLink {
    /// Registers the link with a simulation, keeping it alive for the run.
    pub fn register<A>(&self, sim: &mut Sim<A>) {
        sim.add_channel(self.channel.clone());
    }
}

impl EthernetHelper {
    ///
    /// Creates a helper using the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not
    /// pass [`EthernetConfig::validate`].
    ///
    pub fn new(config: EthernetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration used for new links.
    #[must_use]
    pub fn config(&self) -> &EthernetConfig {
        &self.config
    }

    /// Creates an unattached link.
    #[must_use]
    pub fn create_channel(&self) -> Rc<EthernetChannel> {
        EthernetChannel::with_attributes(self.config.channel.data_rate, self.config.channel.delay)
    }

    ///
    /// Creates an unattached endpoint with a newly allocated address
    /// and its own transmit queue.
    ///
    #[must_use]
    pub fn create_device(&self) -> Rc<EthernetDevice> {
        let config = &self.config.device;

        let device = EthernetDevice::new();
        device.set_address(MacAddress::allocate());
        device.set_mtu(config.mtu);
        device.set_encapsulation_mode(config.encapsulation);
        device.set_interframe_gap(config.interframe_gap);
        device.set_queue(DropTailQueue::shared(self.config.queue.limit));

        if let Some(rate) = config.receive_error_rate {
            device.set_receive_error_model(Some(RateErrorModel::shared(rate, ErrorUnit::Packet)));
        }

        device
    }

    ///
    /// Connects two nodes with a new link.
    ///
    /// Creates one endpoint per node, installs it on the node and
    /// attaches both endpoints to the link.
    ///
    pub fn install(&self, a: &Rc<Node>, b: &Rc<Node>) -> EthernetLink {
        let channel = self.create_channel();
        let devices = [a, b].map(|node| {
            let device = self.create_device();
            node.add_device(device.clone());
            device.attach(&channel);
            device
        });

        tracing::debug!(
            a = a.id(),
            b = b.id(),
            "installed link {} <-> {}",
            devices[0].address(),
            devices[1].address()
        );

        EthernetLink { channel, devices }
    }
}
