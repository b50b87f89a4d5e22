use super::EthernetChannel;
use crate::{
    net::{
        csma::{CsmaDevice, DEFAULT_MTU},
        trace::*,
        Channel, EncapsulationMode, ErrorModelRef, LinkChangeCallback, MacAddress, NetDevice,
        Node, Packet, PacketType, PromiscReceiveCallback, QueueRef, ReceiveCallback,
    },
    time::Duration,
};
use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    rc::{Rc, Weak},
};

///
/// One endpoint of a full-duplex [`EthernetChannel`].
///
/// The endpoint owns two half-duplex interfaces, one that only transmits
/// and one that only receives, and presents them as a single device.
/// Received packets are reported with the endpoint as the receiving
/// device, events of both interfaces are available through the endpoint.
///
pub struct EthernetDevice {
    this: Weak<EthernetDevice>,

    address: Cell<MacAddress>,
    mtu: Cell<u16>,
    encapsulation: Cell<EncapsulationMode>,
    if_index: Cell<u32>,
    link_up: Cell<bool>,
    disposed: Cell<bool>,

    node: RefCell<Weak<Node>>,
    channel: RefCell<Weak<EthernetChannel>>,

    tx: Rc<CsmaDevice>,
    rx: Rc<CsmaDevice>,

    rx_callback: RefCell<Option<ReceiveCallback>>,
    promisc_rx_callback: RefCell<Option<PromiscReceiveCallback>>,
    link_change_callbacks: RefCell<Vec<LinkChangeCallback>>,

    traces: Vec<TraceFanout>,
}

impl EthernetDevice {
    /// Creates a new, unattached endpoint with default attributes.
    #[must_use]
    pub fn new() -> Rc<Self> {
        let tx = CsmaDevice::new();
        let rx = CsmaDevice::new();
        tx.set_receive_enable(false);
        rx.set_send_enable(false);

        let address = MacAddress::BROADCAST;
        let mtu = DEFAULT_MTU;
        let encapsulation = EncapsulationMode::Dix;
        tx.set_address(address);
        tx.set_mtu(mtu);
        tx.set_encapsulation_mode(encapsulation);
        rx.set_address(address);

        let traces = Self::fanouts(&tx, &rx);

        Rc::new_cyclic(|this| Self {
            this: this.clone(),

            address: Cell::new(address),
            mtu: Cell::new(mtu),
            encapsulation: Cell::new(encapsulation),
            if_index: Cell::new(0),
            link_up: Cell::new(false),
            disposed: Cell::new(false),

            node: RefCell::new(Weak::new()),
            channel: RefCell::new(Weak::new()),

            tx,
            rx,

            rx_callback: RefCell::new(None),
            promisc_rx_callback: RefCell::new(None),
            link_change_callbacks: RefCell::new(Vec::new()),

            traces,
        })
    }

    fn fanouts(tx: &Rc<CsmaDevice>, rx: &Rc<CsmaDevice>) -> Vec<TraceFanout> {
        let (tx, rx): (Weak<CsmaDevice>, Weak<CsmaDevice>) = (Rc::downgrade(tx), Rc::downgrade(rx));
        let (tx, rx): (Weak<dyn TraceSource>, Weak<dyn TraceSource>) = (tx, rx);

        let tx_only = [MAC_TX, MAC_TX_DROP, PHY_TX_BEGIN, PHY_TX_END, PHY_TX_DROP]
            .map(|name| TraceFanout::new(name, Some(tx.clone()), None));
        let rx_only = [MAC_PROMISC_RX, MAC_RX, PHY_RX_END, PHY_RX_DROP]
            .map(|name| TraceFanout::new(name, Some(rx.clone()), None));
        let both = TraceFanout::new(PROMISC_SNIFFER, Some(tx), Some(rx));

        tx_only
            .into_iter()
            .chain(rx_only)
            .chain(std::iter::once(both))
            .collect()
    }

    ///
    /// Attaches the endpoint to a link and raises link-up.
    ///
    /// Attaching an endpoint that is already attached to another link
    /// replaces the stored link and registers the endpoint on the new
    /// link as well. The previous link keeps its entry.
    ///
    /// # Panics
    ///
    /// Panics if the link already has two endpoints.
    ///
    pub fn attach(self: &Rc<Self>, channel: &Rc<EthernetChannel>) -> bool {
        let previous = self.channel.borrow().upgrade();
        if let Some(previous) = previous {
            tracing::warn!(
                same_link = Rc::ptr_eq(&previous, channel),
                "endpoint {} is already attached, re-attaching",
                self.address.get()
            );
        }

        *self.channel.borrow_mut() = Rc::downgrade(channel);
        channel.attach(self);
        self.notify_link_up();
        true
    }

    /// The link the endpoint is attached to.
    #[must_use]
    pub fn ethernet_channel(&self) -> Option<Rc<EthernetChannel>> {
        self.channel.borrow().upgrade()
    }

    /// The transmit-only interface.
    #[must_use]
    pub fn tx_device(&self) -> &Rc<CsmaDevice> {
        &self.tx
    }

    /// The receive-only interface.
    #[must_use]
    pub fn rx_device(&self) -> &Rc<CsmaDevice> {
        &self.rx
    }

    /// Sets the encapsulation used for outgoing frames.
    pub fn set_encapsulation_mode(&self, mode: EncapsulationMode) {
        tracing::trace!(?mode, "setting encapsulation of {}", self.address.get());
        self.encapsulation.set(mode);
        self.tx.set_encapsulation_mode(mode);
    }

    /// The encapsulation used for outgoing frames.
    #[must_use]
    pub fn encapsulation_mode(&self) -> EncapsulationMode {
        self.encapsulation.get()
    }

    /// Sets the idle time between two transmissions.
    pub fn set_interframe_gap(&self, gap: Duration) {
        self.tx.set_interframe_gap(gap);
    }

    /// Replaces the transmit queue.
    pub fn set_queue(&self, queue: QueueRef) {
        self.tx.set_queue(queue);
    }

    /// The transmit queue.
    #[must_use]
    pub fn queue(&self) -> QueueRef {
        self.tx.queue()
    }

    /// Sets the model deciding which received frames are corrupt.
    pub fn set_receive_error_model(&self, model: Option<ErrorModelRef>) {
        self.rx.set_receive_error_model(model);
    }

    /// The named event exposed by this endpoint.
    #[must_use]
    pub fn trace(&self, name: &str) -> Option<&TraceFanout> {
        self.traces.iter().find(|t| t.name() == name)
    }

    /// Whether the endpoint was disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    ///
    /// Disposes both interfaces and releases the link and node.
    ///
    pub fn dispose(&self) {
        tracing::trace!("disposing endpoint {}", self.address.get());
        self.tx.dispose();
        self.rx.dispose();

        *self.node.borrow_mut() = Weak::new();
        *self.channel.borrow_mut() = Weak::new();
        self.rx_callback.borrow_mut().take();
        self.promisc_rx_callback.borrow_mut().take();
        self.link_change_callbacks.borrow_mut().clear();
        self.link_up.set(false);
        self.disposed.set(true);
    }

    fn notify_link_up(&self) {
        self.link_up.set(true);
        let callbacks = self.link_change_callbacks.borrow().clone();
        for callback in callbacks {
            callback();
        }
    }

    fn receive_from_interface(&self, packet: &Packet, protocol: u16, from: MacAddress) -> bool {
        let callback = self.rx_callback.borrow().clone();
        let (Some(callback), Some(this)) = (callback, self.this.upgrade()) else {
            return false;
        };
        callback(this, packet, protocol, from)
    }

    fn promisc_receive_from_interface(
        &self,
        packet: &Packet,
        protocol: u16,
        from: MacAddress,
        to: MacAddress,
        packet_type: PacketType,
    ) -> bool {
        let callback = self.promisc_rx_callback.borrow().clone();
        let (Some(callback), Some(this)) = (callback, self.this.upgrade()) else {
            return false;
        };
        callback(this, packet, protocol, from, to, packet_type)
    }
}

impl NetDevice for EthernetDevice {
    fn if_index(&self) -> u32 {
        self.if_index.get()
    }

    fn set_if_index(&self, index: u32) {
        self.if_index.set(index);
    }

    fn channel(&self) -> Option<Rc<dyn Channel>> {
        let channel: Rc<dyn Channel> = self.ethernet_channel()?;
        Some(channel)
    }

    fn address(&self) -> MacAddress {
        self.address.get()
    }

    fn set_address(&self, address: MacAddress) {
        tracing::trace!("setting address {address}");
        self.address.set(address);
        self.tx.set_address(address);
        // Needed to classify incoming frames.
        self.rx.set_address(address);
    }

    fn mtu(&self) -> u16 {
        self.mtu.get()
    }

    fn set_mtu(&self, mtu: u16) -> bool {
        tracing::trace!(mtu, "setting mtu of {}", self.address.get());
        self.mtu.set(mtu);
        self.tx.set_mtu(mtu);
        true
    }

    fn is_link_up(&self) -> bool {
        self.link_up.get()
    }

    fn add_link_change_callback(&self, callback: LinkChangeCallback) {
        self.link_change_callbacks.borrow_mut().push(callback);
    }

    fn is_broadcast(&self) -> bool {
        true
    }

    fn is_multicast(&self) -> bool {
        true
    }

    fn is_point_to_point(&self) -> bool {
        false
    }

    fn is_bridge(&self) -> bool {
        false
    }

    fn needs_arp(&self) -> bool {
        true
    }

    fn send(&self, packet: Packet, destination: MacAddress, protocol: u16) -> bool {
        self.tx.send(packet, destination, protocol)
    }

    fn send_from(
        &self,
        packet: Packet,
        source: MacAddress,
        destination: MacAddress,
        protocol: u16,
    ) -> bool {
        self.tx.send_from(packet, source, destination, protocol)
    }

    fn supports_send_from(&self) -> bool {
        true
    }

    fn node(&self) -> Option<Rc<Node>> {
        self.node.borrow().upgrade()
    }

    fn set_node(&self, node: &Rc<Node>) {
        *self.node.borrow_mut() = Rc::downgrade(node);
        self.rx.set_node(node);
        self.tx.set_node(node);
    }

    fn set_receive_callback(&self, callback: Option<ReceiveCallback>) {
        let forward: Option<ReceiveCallback> = callback.as_ref().map(|_| {
            let this = self.this.clone();
            let forward: ReceiveCallback = Rc::new(move |_, packet, protocol, from| {
                this.upgrade()
                    .is_some_and(|this| this.receive_from_interface(packet, protocol, from))
            });
            forward
        });

        *self.rx_callback.borrow_mut() = callback;
        self.rx.set_receive_callback(forward);
    }

    fn set_promisc_receive_callback(&self, callback: Option<PromiscReceiveCallback>) {
        let forward: Option<PromiscReceiveCallback> = callback.as_ref().map(|_| {
            let this = self.this.clone();
            let forward: PromiscReceiveCallback =
                Rc::new(move |_, packet, protocol, from, to, packet_type| {
                    this.upgrade().is_some_and(|this| {
                        this.promisc_receive_from_interface(packet, protocol, from, to, packet_type)
                    })
                });
            forward
        });

        *self.promisc_rx_callback.borrow_mut() = callback;
        self.rx.set_promisc_receive_callback(forward);
    }
}

impl TraceSource for EthernetDevice {
    fn trace_connect(&self, name: &str, context: Option<&str>, sink: TraceSink) -> bool {
        let Some(trace) = self.trace(name) else {
            return false;
        };
        match context {
            Some(context) => trace.connect(sink, context),
            None => trace.connect_without_context(sink),
        }
        true
    }

    fn trace_disconnect(&self, name: &str, context: Option<&str>, sink: &TraceSink) -> bool {
        let Some(trace) = self.trace(name) else {
            return false;
        };
        match context {
            Some(context) => trace.disconnect(sink, context),
            None => trace.disconnect_without_context(sink),
        }
        true
    }
}

impl Debug for EthernetDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthernetDevice")
            .field("address", &self.address.get())
            .field("if_index", &self.if_index.get())
            .field("link_up", &self.link_up.get())
            .field("tx", &self.tx)
            .field("rx", &self.rx)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::DropTailQueue;

    #[test]
    fn interfaces_exist_from_construction() {
        let device = EthernetDevice::new();
        assert!(!device.tx_device().is_receive_enabled());
        assert!(device.tx_device().is_send_enabled());
        assert!(device.rx_device().is_receive_enabled());
        assert!(!device.rx_device().is_send_enabled());
        assert_eq!(device.tx_device().mtu(), DEFAULT_MTU);
        assert_eq!(device.address(), MacAddress::BROADCAST);
    }

    #[test]
    fn attributes_are_mirrored() {
        let device = EthernetDevice::new();
        let addr: MacAddress = "00:00:00:00:00:07".parse().unwrap();

        device.set_address(addr);
        assert!(device.set_mtu(1000));
        device.set_encapsulation_mode(EncapsulationMode::Llc);
        device.set_interframe_gap(Duration::from_micros(3));

        assert_eq!(device.address(), addr);
        assert_eq!(device.tx_device().address(), addr);
        assert_eq!(device.rx_device().address(), addr);

        assert_eq!(device.mtu(), 1000);
        assert_eq!(device.tx_device().mtu(), 1000);
        assert_eq!(device.rx_device().mtu(), DEFAULT_MTU);

        assert_eq!(device.encapsulation_mode(), EncapsulationMode::Llc);
        assert_eq!(
            device.tx_device().encapsulation_mode(),
            EncapsulationMode::Llc
        );
        assert_eq!(device.rx_device().encapsulation_mode(), EncapsulationMode::Dix);

        assert_eq!(device.tx_device().interframe_gap(), Duration::from_micros(3));
    }

    #[test]
    fn queue_is_owned_by_tx() {
        let device = EthernetDevice::new();
        let queue = DropTailQueue::shared(crate::net::QueueLimit::Packets(3));
        device.set_queue(queue.clone());
        assert!(Rc::ptr_eq(&device.queue(), &queue));
        assert!(Rc::ptr_eq(&device.tx_device().queue(), &queue));
        assert!(!Rc::ptr_eq(&device.rx_device().queue(), &queue));
    }

    #[test]
    fn fixed_capabilities() {
        let device = EthernetDevice::new();
        assert!(device.is_broadcast());
        assert!(device.is_multicast());
        assert!(device.needs_arp());
        assert!(device.supports_send_from());
        assert!(!device.is_point_to_point());
        assert!(!device.is_bridge());
        assert_eq!(device.broadcast(), MacAddress::BROADCAST);
        assert_eq!(
            device.multicast_v4("224.1.2.3".parse().unwrap()),
            "01:00:5e:01:02:03".parse::<MacAddress>().unwrap()
        );
    }

    #[test]
    fn null_callback_is_forwarded() {
        let device = EthernetDevice::new();
        device.set_receive_callback(Some(Rc::new(|_, _, _, _| true)));
        device.set_receive_callback(None);
        assert!(device.rx_callback.borrow().is_none());
        assert!(!device.rx.has_receive_callback());
    }

    #[test]
    fn trace_targets() {
        let device = EthernetDevice::new();
        assert_eq!(device.trace(PROMISC_SNIFFER).map(TraceFanout::num_targets), Some(2));
        assert_eq!(device.trace(PHY_TX_END).map(TraceFanout::num_targets), Some(1));
        assert_eq!(device.trace(MAC_RX).map(TraceFanout::num_targets), Some(1));
        assert!(device.trace(SNIFFER).is_none());
        assert!(!device.trace_connect(SNIFFER, None, TraceSink::new(|_| {})));
    }
}
