/// Decoded per-frame record consumed by the registry, and the small typed
/// values it carries.
///
/// Records are produced by the capture/parsing side. Everything here is
/// plain data; nothing is decoded from raw bytes in this crate.
use core::fmt;
use core::net::Ipv4Addr;
use core::ops::BitOr;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Capture timestamp, seconds on a monotonic clock.
pub type Timestamp = u32;

/// Maximum length of an 802.11 SSID.
pub const ESSID_MAX_LEN: usize = 32;

/// Network name as advertised.
pub type Essid = heapless::String<ESSID_MAX_LEN>;

/// Formatted MAC address ("AA:BB:CC:DD:EE:FF").
pub type MacString = heapless::String<18>;

/// 48-bit IEEE MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Multicast or broadcast (I/G bit set).
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Format as "AA:BB:CC:DD:EE:FF".
    pub fn to_mac_string(&self) -> MacString {
        use core::fmt::Write;
        let mut buf = heapless::String::new();
        let _ = write!(buf, "{self}");
        buf
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_mac_string())
    }
}

/// Set of frame and payload kinds.
///
/// A frame usually carries one 802.11 kind plus any higher-layer kinds its
/// payload was recognised as. A node accumulates the union of everything it
/// has sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct FrameKinds(u32);

impl FrameKinds {
    pub const BEACON: Self = Self(1 << 0);
    pub const PROBE_REQ: Self = Self(1 << 1);
    pub const PROBE_RESP: Self = Self(1 << 2);
    pub const ASSOC: Self = Self(1 << 3);
    pub const AUTH: Self = Self(1 << 4);
    pub const RTS_CTS: Self = Self(1 << 5);
    pub const ACK: Self = Self(1 << 6);
    pub const NULL: Self = Self(1 << 7);
    pub const DATA: Self = Self(1 << 8);
    pub const QOS_DATA: Self = Self(1 << 9);
    pub const ARP: Self = Self(1 << 10);
    pub const IP: Self = Self(1 << 11);
    pub const ICMP: Self = Self(1 << 12);
    pub const UDP: Self = Self(1 << 13);
    pub const TCP: Self = Self(1 << 14);
    pub const OLSR: Self = Self(1 << 15);
    pub const BATMAN: Self = Self(1 << 16);
    pub const MESH: Self = Self(1 << 17);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if every kind in `other` is present.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any kind in `other` is present.
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Beacons and probe responses advertise channel and beacon timing.
    pub const fn advertises(&self) -> bool {
        self.intersects(Self(Self::BEACON.0 | Self::PROBE_RESP.0))
    }
}

impl BitOr for FrameKinds {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Operating mode of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    AccessPoint,
    Station,
    AdHoc,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::AccessPoint => "ap",
            Mode::Station => "sta",
            Mode::AdHoc => "ibss",
        }
    }
}

/// Channel width as reported by HT/VHT capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChanWidth {
    #[default]
    Unspecified,
    Mhz20NoHt,
    Mhz20,
    Mhz40,
    Mhz80,
    Mhz160,
    Mhz80P80,
}

/// Encryption advertised or used by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Encryption {
    pub wep: bool,
    pub wpa: bool,
    pub rsn: bool,
}

impl Encryption {
    pub const OPEN: Self = Self {
        wep: false,
        wpa: false,
        rsn: false,
    };

    pub fn is_open(&self) -> bool {
        !(self.wep || self.wpa || self.rsn)
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Transmitter address; identifies the node.
    pub src: MacAddr,
    pub bssid: Option<MacAddr>,
    pub kinds: FrameKinds,
    /// Signal strength in dBm (larger is stronger).
    pub signal: i8,
    /// Channel the frame was seen on / advertises.
    pub channel: Option<u8>,
    pub essid: Option<Essid>,
    pub mode: Option<Mode>,
    pub tsf: Option<u64>,
    /// Beacon interval in TUs.
    pub beacon_interval: Option<u16>,
    /// Retransmission flag.
    pub retry: bool,
    pub seqno: u16,
    pub encryption: Option<Encryption>,
    pub chan_width: Option<ChanWidth>,
    pub ht40plus: bool,
    pub tx_streams: Option<u8>,
    pub rx_streams: Option<u8>,
    pub ip_src: Option<Ipv4Addr>,
    /// OLSR neighbour count carried by a HELLO message.
    pub olsr_neighbors: Option<u16>,
    /// OLSR topology-control entries carried by a TC message.
    pub olsr_topology: Option<u16>,
    /// Batman gateway announcement.
    pub batman_gateway: bool,
    pub timestamp: Timestamp,
}

impl Frame {
    /// A record with only the mandatory fields set.
    pub fn new(src: MacAddr, signal: i8, timestamp: Timestamp) -> Self {
        Self {
            src,
            bssid: None,
            kinds: FrameKinds::empty(),
            signal,
            channel: None,
            essid: None,
            mode: None,
            tsf: None,
            beacon_interval: None,
            retry: false,
            seqno: 0,
            encryption: None,
            chan_width: None,
            ht40plus: false,
            tx_streams: None,
            rx_streams: None,
            ip_src: None,
            olsr_neighbors: None,
            olsr_topology: None,
            batman_gateway: false,
            timestamp,
        }
    }

    /// Set the essid, truncated to [`ESSID_MAX_LEN`] bytes on a char boundary.
    pub fn with_essid(mut self, name: &str) -> Self {
        let mut essid = Essid::new();
        for c in name.chars() {
            if essid.push(c).is_err() {
                break;
            }
        }
        self.essid = Some(essid);
        self
    }

    /// Reject records the registry cannot attribute to a node.
    pub fn validate(&self) -> Result<()> {
        if self.src.is_zero() {
            return Err(Error::InvalidArgument("zero source address"));
        }
        if self.src.is_group() {
            return Err(Error::InvalidArgument("group source address"));
        }
        if self.channel == Some(0) {
            return Err(Error::InvalidArgument("channel 0"));
        }
        Ok(())
    }

    /// Essid if one was supplied and it is not hidden (empty).
    pub fn visible_essid(&self) -> Option<&str> {
        self.essid.as_deref().filter(|name| !name.is_empty())
    }
}
