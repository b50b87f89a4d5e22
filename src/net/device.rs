use super::{MacAddress, Node, Packet};
use std::{
    fmt::Debug,
    net::{Ipv4Addr, Ipv6Addr},
    rc::Rc,
};

///
/// Called when a device passes a received packet up, non-promiscuous.
///
/// Arguments are the receiving device, the packet, the protocol number and
/// the source address. The return value signals whether the packet
/// was accepted.
///
pub type ReceiveCallback = Rc<dyn Fn(Rc<dyn NetDevice>, &Packet, u16, MacAddress) -> bool>;

///
/// Called when a device passes a received packet up, promiscuous.
///
/// Arguments are the receiving device, the packet, the protocol number,
/// the source address, the destination address and the packet type.
///
pub type PromiscReceiveCallback =
    Rc<dyn Fn(Rc<dyn NetDevice>, &Packet, u16, MacAddress, MacAddress, PacketType) -> bool>;

///
/// Called when the link state of a device changes.
///
/// No arguments are passed, observers re-query the device.
///
pub type LinkChangeCallback = Rc<dyn Fn()>;

///
/// The classification of a received frame, relative to the receiving device.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Addressed to this device.
    Host,
    /// Addressed to all devices.
    Broadcast,
    /// Addressed to a multicast group.
    Multicast,
    /// Addressed to some other device.
    OtherHost,
}

impl PacketType {
    /// Classifies a frame destined to `destination` at a device with
    /// the address `local`.
    #[must_use]
    pub fn classify(destination: MacAddress, local: MacAddress) -> Self {
        if destination.is_broadcast() {
            Self::Broadcast
        } else if destination.is_group() {
            Self::Multicast
        } else if destination == local {
            Self::Host
        } else {
            Self::OtherHost
        }
    }
}

///
/// A network interface, attached to a [`Node`] and a [`Channel`].
///
/// All methods take `&self`, devices use interior mutability and
/// are shared as `Rc`s between nodes, channels and scheduled events.
///
pub trait NetDevice: Debug {
    /// The index of the device on its node.
    fn if_index(&self) -> u32;

    /// Sets the index of the device on its node.
    fn set_if_index(&self, index: u32);

    /// The channel the device is attached to, if any.
    fn channel(&self) -> Option<Rc<dyn Channel>>;

    /// The MAC address of the device.
    fn address(&self) -> MacAddress;

    /// Sets the MAC address of the device.
    fn set_address(&self, address: MacAddress);

    /// The MAC-level maximum transmission unit.
    fn mtu(&self) -> u16;

    /// Sets the MAC-level maximum transmission unit.
    fn set_mtu(&self, mtu: u16) -> bool;

    /// Whether the link of the device is up.
    fn is_link_up(&self) -> bool;

    /// Registers an observer of link state changes.
    fn add_link_change_callback(&self, callback: LinkChangeCallback);

    /// Whether the device supports broadcasts.
    fn is_broadcast(&self) -> bool;

    /// The broadcast address of the device.
    fn broadcast(&self) -> MacAddress {
        MacAddress::BROADCAST
    }

    /// Whether the device supports multicast.
    fn is_multicast(&self) -> bool;

    /// The MAC address of an IPv4 multicast group.
    fn multicast_v4(&self, group: Ipv4Addr) -> MacAddress {
        MacAddress::multicast_v4(group)
    }

    /// The MAC address of an IPv6 multicast group.
    fn multicast_v6(&self, group: Ipv6Addr) -> MacAddress {
        MacAddress::multicast_v6(group)
    }

    /// Whether the device is a point-to-point device.
    fn is_point_to_point(&self) -> bool;

    /// Whether the device is a bridge.
    fn is_bridge(&self) -> bool;

    /// Whether the device requires address resolution.
    fn needs_arp(&self) -> bool;

    ///
    /// Sends a packet to `destination`, using the device address as source.
    ///
    /// Returns `false` if the packet was rejected.
    ///
    fn send(&self, packet: Packet, destination: MacAddress, protocol: u16) -> bool;

    ///
    /// Sends a packet from `source` to `destination`.
    ///
    /// Returns `false` if the packet was rejected.
    ///
    fn send_from(
        &self,
        packet: Packet,
        source: MacAddress,
        destination: MacAddress,
        protocol: u16,
    ) -> bool;

    /// Whether [`NetDevice::send_from`] is supported.
    fn supports_send_from(&self) -> bool;

    /// The node the device is installed on.
    fn node(&self) -> Option<Rc<Node>>;

    /// Sets the node the device is installed on.
    fn set_node(&self, node: &Rc<Node>);

    /// Sets the non-promiscuous receive callback. `None` removes it.
    fn set_receive_callback(&self, callback: Option<ReceiveCallback>);

    /// Sets the promiscuous receive callback. `None` removes it.
    fn set_promisc_receive_callback(&self, callback: Option<PromiscReceiveCallback>);
}

///
/// A medium connecting a set of [`NetDevice`]s.
///
pub trait Channel: Debug {
    /// The number of attached devices.
    fn n_devices(&self) -> usize;

    ///
    /// The device at index `i`, or `None` if that device no longer exists.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not within `[0, n_devices)`.
    ///
    fn device(&self, i: usize) -> Option<Rc<dyn NetDevice>>;
}
