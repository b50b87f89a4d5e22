use super::MacAddress;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_UID: AtomicU64 = AtomicU64::new(0);

///
/// A link-layer payload exchanged between devices.
///
/// Clones of a packet share the same unique id and content, so that
/// trace sinks and error models can identify a packet along its path.
///
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    uid: u64,
    content: Rc<[u8]>,
}

impl Packet {
    /// Creates a new packet with the given content.
    #[must_use]
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            uid: NEXT_UID.fetch_add(1, Ordering::SeqCst),
            content: Rc::from(content),
        }
    }

    /// Creates a new packet of `len` zero bytes.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    /// The unique id of this packet.
    #[must_use]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// The payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The payload bytes.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

impl Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("uid", &self.uid)
            .field("len", &self.len())
            .finish()
    }
}

///
/// The link-layer encapsulation used when framing packets.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncapsulationMode {
    /// DIX II / Ethernet II, protocol carried in the type field.
    #[default]
    Dix,
    /// 802.2 LLC/SNAP, protocol carried in the SNAP header.
    Llc,
}

/// The length of the ethernet header (destination, source, type/length).
pub const ETHERNET_HEADER_LEN: usize = 14;
/// The length of the ethernet trailer (FCS).
pub const ETHERNET_TRAILER_LEN: usize = 4;
/// The length of a LLC/SNAP header.
pub const LLC_SNAP_HEADER_LEN: usize = 8;
/// The minimum size of a frame on the wire.
pub const ETHERNET_MIN_FRAME_LEN: usize = 64;

///
/// A framed packet, as it is queued and put onto a channel.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    /// The sending address.
    pub source: MacAddress,
    /// The receiving address.
    pub destination: MacAddress,
    /// The protocol number of the payload.
    pub protocol: u16,
    /// The encapsulation the frame was created with.
    pub encapsulation: EncapsulationMode,
    /// The encapsulated packet.
    pub payload: Packet,
}

impl EthernetFrame {
    /// The number of bytes this frame occupies on the medium,
    /// including header, trailer and padding.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        let header = match self.encapsulation {
            EncapsulationMode::Dix => ETHERNET_HEADER_LEN,
            EncapsulationMode::Llc => ETHERNET_HEADER_LEN + LLC_SNAP_HEADER_LEN,
        };
        (header + self.payload.len() + ETHERNET_TRAILER_LEN).max(ETHERNET_MIN_FRAME_LEN)
    }
}
