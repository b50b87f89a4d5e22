use super::{Backoff, CsmaChannel, DEFAULT_MTU};
use crate::{
    net::{
        runtime::{buf_schedule_at, buf_schedule_in, NetEvents},
        trace::*,
        Channel, DropTailQueue, EncapsulationMode, ErrorModelRef, EthernetFrame,
        LinkChangeCallback, MacAddress, NetDevice, Node, Packet, PacketType,
        PromiscReceiveCallback, QueueLimit, QueueRef, ReceiveCallback,
    },
    time::Duration,
};
use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    rc::{Rc, Weak},
};

/// The transmit state of a [`CsmaDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMachineState {
    /// Waiting for frames to transmit.
    Ready,
    /// Serializing a frame onto the channel.
    Busy,
    /// Waiting for the interframe gap to pass.
    Gap,
    /// Waiting for a busy channel.
    Backoff,
}

#[derive(Debug)]
struct Traces {
    mac_tx: TracedCallback,
    mac_tx_drop: TracedCallback,
    mac_promisc_rx: TracedCallback,
    mac_rx: TracedCallback,
    phy_tx_begin: TracedCallback,
    phy_tx_end: TracedCallback,
    phy_tx_drop: TracedCallback,
    phy_rx_end: TracedCallback,
    phy_rx_drop: TracedCallback,
    sniffer: TracedCallback,
    promisc_sniffer: TracedCallback,
}

impl Traces {
    fn new() -> Self {
        Self {
            mac_tx: TracedCallback::new(MAC_TX),
            mac_tx_drop: TracedCallback::new(MAC_TX_DROP),
            mac_promisc_rx: TracedCallback::new(MAC_PROMISC_RX),
            mac_rx: TracedCallback::new(MAC_RX),
            phy_tx_begin: TracedCallback::new(PHY_TX_BEGIN),
            phy_tx_end: TracedCallback::new(PHY_TX_END),
            phy_tx_drop: TracedCallback::new(PHY_TX_DROP),
            phy_rx_end: TracedCallback::new(PHY_RX_END),
            phy_rx_drop: TracedCallback::new(PHY_RX_DROP),
            sniffer: TracedCallback::new(SNIFFER),
            promisc_sniffer: TracedCallback::new(PROMISC_SNIFFER),
        }
    }

    fn all(&self) -> [&TracedCallback; 11] {
        [
            &self.mac_tx,
            &self.mac_tx_drop,
            &self.mac_promisc_rx,
            &self.mac_rx,
            &self.phy_tx_begin,
            &self.phy_tx_end,
            &self.phy_tx_drop,
            &self.phy_rx_end,
            &self.phy_rx_drop,
            &self.sniffer,
            &self.promisc_sniffer,
        ]
    }

    fn get(&self, name: &str) -> Option<&TracedCallback> {
        self.all().into_iter().find(|t| t.name() == name)
    }
}

///
/// A network interface on a half-duplex [`CsmaChannel`].
///
/// Outgoing frames are queued and transmitted one at a time. While the
/// channel is busy the device backs off. Incoming frames pass the
/// receive error model, are classified against the device address and
/// handed to the receive callbacks.
///
pub struct CsmaDevice {
    this: Weak<CsmaDevice>,

    address: Cell<MacAddress>,
    mtu: Cell<u16>,
    encapsulation: Cell<EncapsulationMode>,
    interframe_gap: Cell<Duration>,
    if_index: Cell<u32>,
    send_enabled: Cell<bool>,
    receive_enabled: Cell<bool>,
    link_up: Cell<bool>,
    disposed: Cell<bool>,

    node: RefCell<Weak<Node>>,
    channel: RefCell<Weak<CsmaChannel>>,
    device_id: Cell<usize>,

    queue: RefCell<QueueRef>,
    error_model: RefCell<Option<ErrorModelRef>>,
    tx_state: Cell<TxMachineState>,
    current: RefCell<Option<EthernetFrame>>,
    backoff: RefCell<Backoff>,

    rx_callback: RefCell<Option<ReceiveCallback>>,
    promisc_rx_callback: RefCell<Option<PromiscReceiveCallback>>,
    link_change_callbacks: RefCell<Vec<LinkChangeCallback>>,

    traces: Traces,
}

impl CsmaDevice {
    /// Creates a new, unattached device with default attributes.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),

            address: Cell::new(MacAddress::BROADCAST),
            mtu: Cell::new(DEFAULT_MTU),
            encapsulation: Cell::new(EncapsulationMode::Dix),
            interframe_gap: Cell::new(Duration::ZERO),
            if_index: Cell::new(0),
            send_enabled: Cell::new(true),
            receive_enabled: Cell::new(true),
            link_up: Cell::new(false),
            disposed: Cell::new(false),

            node: RefCell::new(Weak::new()),
            channel: RefCell::new(Weak::new()),
            device_id: Cell::new(0),

            queue: RefCell::new(DropTailQueue::shared(QueueLimit::default())),
            error_model: RefCell::new(None),
            tx_state: Cell::new(TxMachineState::Ready),
            current: RefCell::new(None),
            backoff: RefCell::new(Backoff::default()),

            rx_callback: RefCell::new(None),
            promisc_rx_callback: RefCell::new(None),
            link_change_callbacks: RefCell::new(Vec::new()),

            traces: Traces::new(),
        })
    }

    ///
    /// Attaches the device to a channel and raises link-up.
    ///
    /// Attaching an attached device replaces its channel.
    ///
    pub fn attach(self: &Rc<Self>, channel: &Rc<CsmaChannel>) -> bool {
        let id = channel.attach(self);
        *self.channel.borrow_mut() = Rc::downgrade(channel);
        self.device_id.set(id);

        tracing::debug!(id, "device {} attached to channel", self.address.get());
        self.notify_link_up();
        true
    }

    /// The channel the device is attached to.
    #[must_use]
    pub fn csma_channel(&self) -> Option<Rc<CsmaChannel>> {
        self.channel.borrow().upgrade()
    }

    /// The id of the device on its channel.
    #[must_use]
    pub fn device_id(&self) -> usize {
        self.device_id.get()
    }

    /// Replaces the transmit queue.
    pub fn set_queue(&self, queue: QueueRef) {
        *self.queue.borrow_mut() = queue;
    }

    /// The transmit queue.
    #[must_use]
    pub fn queue(&self) -> QueueRef {
        self.queue.borrow().clone()
    }

    /// Sets the model deciding which received frames are corrupt.
    pub fn set_receive_error_model(&self, model: Option<ErrorModelRef>) {
        *self.error_model.borrow_mut() = model;
    }

    /// The receive error model.
    #[must_use]
    pub fn receive_error_model(&self) -> Option<ErrorModelRef> {
        self.error_model.borrow().clone()
    }

    /// Sets the encapsulation used for outgoing frames.
    pub fn set_encapsulation_mode(&self, mode: EncapsulationMode) {
        self.encapsulation.set(mode);
    }

    /// The encapsulation used for outgoing frames.
    #[must_use]
    pub fn encapsulation_mode(&self) -> EncapsulationMode {
        self.encapsulation.get()
    }

    /// Sets the idle time between two transmissions.
    pub fn set_interframe_gap(&self, gap: Duration) {
        self.interframe_gap.set(gap);
    }

    /// The idle time between two transmissions.
    #[must_use]
    pub fn interframe_gap(&self) -> Duration {
        self.interframe_gap.get()
    }

    /// Replaces the back-off parameters.
    pub fn set_backoff(&self, backoff: Backoff) {
        *self.backoff.borrow_mut() = backoff;
    }

    /// Enables or disables sending.
    pub fn set_send_enable(&self, enable: bool) {
        self.send_enabled.set(enable);
    }

    /// Whether sending is enabled.
    #[must_use]
    pub fn is_send_enabled(&self) -> bool {
        self.send_enabled.get()
    }

    /// Enables or disables receiving.
    pub fn set_receive_enable(&self, enable: bool) {
        self.receive_enabled.set(enable);
    }

    /// Whether receiving is enabled.
    #[must_use]
    pub fn is_receive_enabled(&self) -> bool {
        self.receive_enabled.get()
    }

    /// The state of the transmit machine.
    #[must_use]
    pub fn tx_state(&self) -> TxMachineState {
        self.tx_state.get()
    }

    /// The event source with the given name.
    #[must_use]
    pub fn trace(&self, name: &str) -> Option<&TracedCallback> {
        self.traces.get(name)
    }

    /// Whether the device was disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    ///
    /// Releases the channel, node, queue, callbacks and subscriptions.
    ///
    /// The device ignores all further sends and receptions, pending
    /// events targeting it have no effect.
    ///
    pub fn dispose(&self) {
        tracing::trace!("disposing device {}", self.address.get());

        self.disposed.set(true);
        self.link_up.set(false);
        self.tx_state.set(TxMachineState::Ready);

        *self.channel.borrow_mut() = Weak::new();
        *self.node.borrow_mut() = Weak::new();
        self.current.borrow_mut().take();
        *self.queue.borrow_mut() = DropTailQueue::shared(QueueLimit::default());
        self.error_model.borrow_mut().take();

        self.rx_callback.borrow_mut().take();
        self.promisc_rx_callback.borrow_mut().take();
        self.link_change_callbacks.borrow_mut().clear();
        for trace in self.traces.all() {
            trace.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn has_receive_callback(&self) -> bool {
        self.rx_callback.borrow().is_some()
    }

    fn notify_link_up(&self) {
        self.link_up.set(true);
        let callbacks = self.link_change_callbacks.borrow().clone();
        for callback in callbacks {
            callback();
        }
    }

    // Pulls the next frame from the queue and tries to transmit it.
    fn start_next(&self) {
        let next = self.queue.borrow().borrow_mut().dequeue();
        let Some(frame) = next else {
            return;
        };

        let payload = frame.payload.clone();
        *self.current.borrow_mut() = Some(frame);

        self.traces.sniffer.fire(&payload);
        self.traces.promisc_sniffer.fire(&payload);
        self.transmit_start();
    }

    pub(crate) fn transmit_start(&self) {
        if self.disposed.get() {
            return;
        }

        let current = self.current.borrow().clone();
        let Some(frame) = current else {
            self.tx_state.set(TxMachineState::Ready);
            return;
        };

        let channel = self.channel.borrow().upgrade();
        let Some(channel) = channel else {
            tracing::debug!("device {} lost its channel, dropping frame", self.address.get());
            self.current.borrow_mut().take();
            self.tx_state.set(TxMachineState::Ready);
            self.traces.phy_tx_drop.fire(&frame.payload);
            return;
        };

        if let Some(idle_at) = channel.own_propagation_end(self.device_id.get()) {
            tracing::trace!(?idle_at, "own frame still propagating, waiting");
            self.tx_state.set(TxMachineState::Backoff);
            buf_schedule_at(NetEvents::CsmaTransmitStart(self.this.clone()), idle_at);
            return;
        }

        if channel.is_busy() {
            self.tx_state.set(TxMachineState::Backoff);

            let mut backoff = self.backoff.borrow_mut();
            if backoff.max_retries_reached() {
                tracing::debug!(
                    retries = backoff.retries(),
                    "device {} exceeded back-off retries, dropping frame",
                    self.address.get()
                );
                backoff.reset();
                drop(backoff);

                self.current.borrow_mut().take();
                self.tx_state.set(TxMachineState::Ready);
                self.traces.mac_tx_drop.fire(&frame.payload);
                self.start_next();
            } else {
                backoff.incr_retries();
                let wait = backoff.backoff_time();
                tracing::trace!(
                    retries = backoff.retries(),
                    ?wait,
                    "channel busy, backing off"
                );
                drop(backoff);

                buf_schedule_in(NetEvents::CsmaTransmitStart(self.this.clone()), wait);
            }
            return;
        }

        self.tx_state.set(TxMachineState::Busy);
        let tx_time = channel.data_rate().tx_time(frame.wire_len());

        if channel.transmit_start(frame.clone(), self.device_id.get()) {
            self.backoff.borrow_mut().reset();
            tracing::trace!(
                ?tx_time,
                "device {} transmitting {:?}",
                self.address.get(),
                frame.payload
            );
            buf_schedule_in(NetEvents::CsmaTransmitComplete(self.this.clone()), tx_time);
            self.traces.phy_tx_begin.fire(&frame.payload);
        } else {
            self.current.borrow_mut().take();
            self.tx_state.set(TxMachineState::Ready);
            self.traces.phy_tx_drop.fire(&frame.payload);
        }
    }

    pub(crate) fn transmit_complete(&self) {
        if self.disposed.get() {
            return;
        }
        if self.tx_state.get() != TxMachineState::Busy {
            tracing::warn!(state = ?self.tx_state.get(), "unexpected transmit completion");
            return;
        }

        let frame = self.current.borrow_mut().take();
        self.tx_state.set(TxMachineState::Gap);

        let channel = self.channel.borrow().upgrade();
        if let Some(channel) = channel {
            channel.transmit_end();
        }

        buf_schedule_in(
            NetEvents::CsmaTransmitReady(self.this.clone()),
            self.interframe_gap.get(),
        );

        if let Some(frame) = frame {
            self.traces.phy_tx_end.fire(&frame.payload);
        }
    }

    pub(crate) fn transmit_ready(&self) {
        if self.disposed.get() {
            return;
        }

        self.tx_state.set(TxMachineState::Ready);
        if self.current.borrow().is_none() {
            self.start_next();
        }
    }

    pub(crate) fn receive(&self, frame: EthernetFrame, sender: usize) {
        if self.disposed.get() {
            return;
        }

        let payload = frame.payload;
        if !self.receive_enabled.get() {
            tracing::trace!(sender, "receiving disabled, dropping frame");
            self.traces.phy_rx_drop.fire(&payload);
            return;
        }

        let model = self.error_model.borrow().clone();
        if model
            .as_ref()
            .is_some_and(|m| m.borrow_mut().is_corrupt(&payload))
        {
            tracing::debug!(sender, "dropping corrupt frame {payload:?}");
            self.traces.phy_rx_drop.fire(&payload);
            return;
        }

        self.traces.phy_rx_end.fire(&payload);

        let packet_type = PacketType::classify(frame.destination, self.address.get());
        tracing::trace!(
            sender,
            ?packet_type,
            "device {} received {:?}",
            self.address.get(),
            payload
        );

        self.traces.promisc_sniffer.fire(&payload);

        let Some(this) = self.this.upgrade() else {
            return;
        };
        let this: Rc<dyn NetDevice> = this;

        let promisc = self.promisc_rx_callback.borrow().clone();
        if let Some(callback) = promisc {
            self.traces.mac_promisc_rx.fire(&payload);
            callback(
                this.clone(),
                &payload,
                frame.protocol,
                frame.source,
                frame.destination,
                packet_type,
            );
        }

        if packet_type != PacketType::OtherHost {
            self.traces.sniffer.fire(&payload);
            self.traces.mac_rx.fire(&payload);

            let callback = self.rx_callback.borrow().clone();
            if let Some(callback) = callback {
                callback(this, &payload, frame.protocol, frame.source);
            }
        }
    }
}

impl NetDevice for CsmaDevice {
    fn if_index(&self) -> u32 {
        self.if_index.get()
    }

    fn set_if_index(&self, index: u32) {
        self.if_index.set(index);
    }

    fn channel(&self) -> Option<Rc<dyn Channel>> {
        let channel: Rc<dyn Channel> = self.csma_channel()?;
        Some(channel)
    }

    fn address(&self) -> MacAddress {
        self.address.get()
    }

    fn set_address(&self, address: MacAddress) {
        self.address.set(address);
    }

    fn mtu(&self) -> u16 {
        self.mtu.get()
    }

    fn set_mtu(&self, mtu: u16) -> bool {
        self.mtu.set(mtu);
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
        self.send_from(packet, self.address.get(), destination, protocol)
    }

    fn send_from(
        &self,
        packet: Packet,
        source: MacAddress,
        destination: MacAddress,
        protocol: u16,
    ) -> bool {
        if self.disposed.get() {
            return false;
        }

        if !self.link_up.get() || !self.send_enabled.get() {
            tracing::debug!(
                link_up = self.link_up.get(),
                send_enabled = self.send_enabled.get(),
                "device {} cannot send, dropping {:?}",
                self.address.get(),
                packet
            );
            self.traces.mac_tx_drop.fire(&packet);
            return false;
        }

        if packet.len() > usize::from(self.mtu.get()) {
            tracing::debug!(
                mtu = self.mtu.get(),
                "device {} dropping oversized {:?}",
                self.address.get(),
                packet
            );
            self.traces.mac_tx_drop.fire(&packet);
            return false;
        }

        let frame = EthernetFrame {
            source,
            destination,
            protocol,
            encapsulation: self.encapsulation.get(),
            payload: packet.clone(),
        };

        self.traces.mac_tx.fire(&packet);

        let accepted = self.queue.borrow().borrow_mut().enqueue(frame);
        if !accepted {
            self.traces.mac_tx_drop.fire(&packet);
            return false;
        }

        if self.tx_state.get() == TxMachineState::Ready && self.current.borrow().is_none() {
            self.start_next();
        }
        true
    }

    fn supports_send_from(&self) -> bool {
        true
    }

    fn node(&self) -> Option<Rc<Node>> {
        self.node.borrow().upgrade()
    }

    fn set_node(&self, node: &Rc<Node>) {
        *self.node.borrow_mut() = Rc::downgrade(node);
    }

    fn set_receive_callback(&self, callback: Option<ReceiveCallback>) {
        *self.rx_callback.borrow_mut() = callback;
    }

    fn set_promisc_receive_callback(&self, callback: Option<PromiscReceiveCallback>) {
        *self.promisc_rx_callback.borrow_mut() = callback;
    }
}

impl TraceSource for CsmaDevice {
    fn trace_connect(&self, name: &str, context: Option<&str>, sink: TraceSink) -> bool {
        let Some(trace) = self.traces.get(name) else {
            return false;
        };
        trace.connect(sink, context);
        true
    }

    fn trace_disconnect(&self, name: &str, context: Option<&str>, sink: &TraceSink) -> bool {
        let Some(trace) = self.traces.get(name) else {
            return false;
        };
        trace.disconnect(sink, context);
        true
    }
}

impl Debug for CsmaDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsmaDevice")
            .field("address", &self.address.get())
            .field("device_id", &self.device_id.get())
            .field("tx_state", &self.tx_state.get())
            .field("link_up", &self.link_up.get())
            .finish_non_exhaustive()
    }
}
