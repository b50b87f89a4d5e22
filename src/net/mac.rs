use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    error::Error,
    fmt::{Debug, Display},
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_ALLOCATED: AtomicU64 = AtomicU64::new(0);

///
/// A 48-bit IEEE 802 MAC address.
///
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The well-known all-ones broadcast address.
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// The all-zeros address.
    pub const NULL: MacAddress = MacAddress([0; 6]);

    /// Creates an address from raw octets.
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// The raw octets of the address.
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    ///
    /// Allocates a new unique address.
    ///
    /// Addresses are handed out sequentially, starting with
    /// `00:00:00:00:00:01`.
    ///
    #[must_use]
    pub fn allocate() -> Self {
        let id = NEXT_ALLOCATED.fetch_add(1, Ordering::SeqCst) + 1;
        let bytes = id.to_be_bytes();
        let mut octets = [0; 6];
        octets.copy_from_slice(&bytes[2..]);
        Self(octets)
    }

    ///
    /// Derives the group address for an IPv4 multicast group.
    ///
    /// The low 23 bits of the group are mapped onto `01:00:5e:00:00:00`.
    ///
    #[must_use]
    pub fn multicast_v4(group: Ipv4Addr) -> Self {
        let [_, b, c, d] = group.octets();
        Self([0x01, 0x00, 0x5e, b & 0x7f, c, d])
    }

    ///
    /// Derives the group address for an IPv6 multicast address.
    ///
    /// The last four bytes of the address are mapped onto `33:33:00:00:00:00`.
    ///
    #[must_use]
    pub fn multicast_v6(addr: Ipv6Addr) -> Self {
        let o = addr.octets();
        Self([0x33, 0x33, o[12], o[13], o[14], o[15]])
    }

    /// Whether this is the broadcast address.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Whether the group bit is set (multicast and broadcast addresses).
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl Default for MacAddress {
    fn default() -> Self {
        Self::BROADCAST
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Debug for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// An error returned when parsing a [`MacAddress`] fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMacAddressError {
    input: String,
}

impl Display for ParseMacAddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid mac address: '{}'", self.input)
    }
}

impl Error for ParseMacAddressError {}

impl FromStr for MacAddress {
    type Err = ParseMacAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMacAddressError {
            input: s.to_string(),
        };

        let mut octets = [0; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 {
                return Err(err());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }

        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
