/// Per-device aggregated state.
///
/// One [`Node`] exists per source MAC currently tracked. Fields that are plain
/// observations are public; the links and handles that tie a node into the
/// registry's indices are only changed by the registry.
use core::net::Ipv4Addr;

use crate::channel::OnNode;
use crate::config::MAX_NODES;
use crate::essid::EssidId;
use crate::ewma;
use crate::frame::{ChanWidth, Encryption, Frame, FrameKinds, MacAddr, Mode, Timestamp};
use crate::list::{Adapter, Link, List};
use crate::slab::{Key, Slab};

/// Generation-checked handle to a node. Resolves to nothing once the node
/// has been evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) Key);

pub(crate) type NodePool = Slab<Node, MAX_NODES>;

/// Signal strength statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalStats {
    /// Strongest sample seen, dBm.
    pub max: i8,
    /// Moving average, dBm.
    pub ewma: f32,
    /// Raw sum of samples, for the plain average.
    pub sum: i64,
    pub count: u32,
}

impl SignalStats {
    fn record(&mut self, sample: i8, weight: f32) {
        let prior = if self.count == 0 { None } else { Some(self.ewma) };
        self.max = if self.count == 0 { sample } else { self.max.max(sample) };
        self.ewma = ewma::blend(prior, sample as f32, weight);
        self.sum += sample as i64;
        self.count = self.count.saturating_add(1);
    }

    /// Plain arithmetic mean of every sample.
    pub fn average(&self) -> Option<f32> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum as f32 / self.count as f32)
        }
    }
}

/// Mesh and IP layer observations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshInfo {
    pub batman_gateway: bool,
    pub ip_src: Option<Ipv4Addr>,
    /// OLSR packets seen from this node.
    pub olsr_count: u32,
    /// Latest reported OLSR neighbour count.
    pub olsr_neighbors: u16,
    /// Latest reported OLSR topology-control entry count.
    pub olsr_topology: u16,
}

#[derive(Debug)]
pub struct Node {
    // housekeeping
    pub(crate) all: Link,
    pub(crate) on_essid: Link,
    pub(crate) channels: List<OnNode>,
    pub(crate) channel_count: u16,
    pub(crate) essid: Option<EssidId>,
    pub(crate) ap: Option<NodeId>,
    id: NodeId,

    pub mac: MacAddr,
    pub last_seen: Timestamp,

    pub kinds: FrameKinds,
    pub frame_count: u32,
    pub signal: SignalStats,

    pub bssid: Option<MacAddr>,
    /// Channel from beacons and probe responses, or the first one reported.
    pub channel: Option<u8>,
    pub mode: Option<Mode>,
    pub tsf: u64,
    pub beacon_interval: u16,
    pub chan_width: ChanWidth,
    pub tx_streams: u8,
    pub rx_streams: u8,
    /// Retransmissions seen over the node's lifetime.
    pub retries: u32,
    /// Whether the most recent frame was a retransmission.
    pub last_retry: bool,
    pub seqno: u16,
    pub encryption: Encryption,
    pub ht40plus: bool,

    pub mesh: MeshInfo,

    /// Most recent frame, verbatim.
    pub last_frame: Frame,
}

impl Node {
    pub(crate) fn new(id: NodeId, frame: &Frame, weight: f32) -> Self {
        let mut node = Self {
            all: Link::new(),
            on_essid: Link::new(),
            channels: List::new(),
            channel_count: 0,
            essid: None,
            ap: None,
            id,
            mac: frame.src,
            last_seen: frame.timestamp,
            kinds: FrameKinds::empty(),
            frame_count: 0,
            signal: SignalStats::default(),
            bssid: None,
            channel: None,
            mode: None,
            tsf: 0,
            beacon_interval: 0,
            chan_width: ChanWidth::Unspecified,
            tx_streams: 0,
            rx_streams: 0,
            retries: 0,
            last_retry: false,
            seqno: 0,
            encryption: Encryption::OPEN,
            ht40plus: false,
            mesh: MeshInfo::default(),
            last_frame: frame.clone(),
        };
        node.absorb(frame, weight);
        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Number of distinct channels this node has been seen on.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Plain mean signal over the node's lifetime, dBm.
    pub fn signal_average(&self) -> Option<f32> {
        self.signal.average()
    }

    /// Handle of the essid group this node belongs to.
    pub fn essid_id(&self) -> Option<EssidId> {
        self.essid
    }

    /// Handle of this node's access point, if resolved. May still be stale
    /// between an eviction and the next sweep; resolve it through the
    /// registry.
    pub fn ap_id(&self) -> Option<NodeId> {
        self.ap
    }

    /// Acting as a client of some other BSS: an explicit station, or a node
    /// of unknown mode talking inside a BSSID that is not its own.
    pub fn is_station(&self) -> bool {
        match self.mode {
            Some(Mode::Station) => true,
            Some(_) => false,
            None => matches!(self.bssid, Some(b) if b != self.mac),
        }
    }

    /// Fold one frame's observations into this node. Index membership
    /// (essid group, channels, AP handle) is the registry's job.
    pub(crate) fn absorb(&mut self, frame: &Frame, weight: f32) {
        self.last_seen = frame.timestamp;
        self.frame_count = self.frame_count.saturating_add(1);
        self.kinds.insert(frame.kinds);
        self.signal.record(frame.signal, weight);

        if let Some(bssid) = frame.bssid {
            self.bssid = Some(bssid);
        }
        if let Some(mode) = frame.mode {
            self.mode = Some(mode);
        }
        if let Some(ch) = frame.channel {
            if frame.kinds.advertises() || self.channel.is_none() {
                self.channel = Some(ch);
            }
        }
        if let Some(tsf) = frame.tsf {
            self.tsf = tsf;
        }
        if let Some(bintval) = frame.beacon_interval {
            self.beacon_interval = bintval;
        }
        if let Some(enc) = frame.encryption {
            self.encryption = enc;
        }
        if let Some(width) = frame.chan_width {
            self.chan_width = width;
        }
        if let Some(n) = frame.tx_streams {
            self.tx_streams = n;
        }
        if let Some(n) = frame.rx_streams {
            self.rx_streams = n;
        }
        if frame.ht40plus {
            self.ht40plus = true;
        }

        if frame.retry {
            self.retries = self.retries.saturating_add(1);
        }
        self.last_retry = frame.retry;
        self.seqno = frame.seqno;

        if let Some(ip) = frame.ip_src {
            self.mesh.ip_src = Some(ip);
        }
        if frame.kinds.contains(FrameKinds::OLSR) {
            self.mesh.olsr_count = self.mesh.olsr_count.saturating_add(1);
        }
        if let Some(n) = frame.olsr_neighbors {
            self.mesh.olsr_neighbors = n;
        }
        if let Some(n) = frame.olsr_topology {
            self.mesh.olsr_topology = n;
        }
        if frame.batman_gateway {
            self.mesh.batman_gateway = true;
        }

        self.last_frame.clone_from(frame);
    }
}

/// Global node list, most recently created first.
pub(crate) struct ByAge;

impl Adapter for ByAge {
    type Item = Node;
    fn link(item: &Node) -> &Link {
        &item.all
    }
    fn link_mut(item: &mut Node) -> &mut Link {
        &mut item.all
    }
}

/// Membership list of an essid group.
pub(crate) struct ByEssid;

impl Adapter for ByEssid {
    type Item = Node;
    fn link(item: &Node) -> &Link {
        &item.on_essid
    }
    fn link_mut(item: &mut Node) -> &mut Link {
        &mut item.on_essid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::Slab;

    const AA: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0xAA]);
    const BB: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0xBB]);

    fn fresh(frame: &Frame) -> Node {
        let mut pool: Slab<(), 1> = Slab::new();
        let key = pool.insert_with(|_| ()).ok().unwrap();
        Node::new(NodeId(key), frame, ewma::DEFAULT_WEIGHT)
    }

    // ── Creation ────────────────────────────────────────────────────

    #[test]
    fn new_node_takes_first_frame() {
        let mut frame = Frame::new(AA, -40, 5).with_essid("X");
        frame.kinds = FrameKinds::BEACON;
        frame.channel = Some(6);
        let node = fresh(&frame);
        assert_eq!(node.mac, AA);
        assert_eq!(node.frame_count, 1);
        assert_eq!(node.last_seen, 5);
        assert_eq!(node.signal.max, -40);
        assert_eq!(node.signal.ewma, -40.0);
        assert_eq!(node.channel, Some(6));
        assert!(node.kinds.contains(FrameKinds::BEACON));
        assert_eq!(node.last_frame, frame);
        // Index fields are filled in by the registry.
        assert_eq!(node.essid_id(), None);
        assert_eq!(node.channel_count(), 0);
    }

    // ── Signal ──────────────────────────────────────────────────────

    #[test]
    fn signal_max_holds_and_average_moves() {
        let mut node = fresh(&Frame::new(AA, -40, 1));
        node.absorb(&Frame::new(AA, -60, 2), ewma::DEFAULT_WEIGHT);
        assert_eq!(node.signal.max, -40);
        assert!(node.signal.ewma < -40.0 && node.signal.ewma > -60.0);
        assert_eq!(node.signal_average(), Some(-50.0));
        assert_eq!(node.signal.count, 2);
    }

    #[test]
    fn signal_max_tracks_stronger_sample() {
        let mut node = fresh(&Frame::new(AA, -70, 1));
        node.absorb(&Frame::new(AA, -30, 2), ewma::DEFAULT_WEIGHT);
        assert_eq!(node.signal.max, -30);
    }

    // ── Field overwrite rules ───────────────────────────────────────

    #[test]
    fn advertised_channel_prefers_beacons() {
        let mut data = Frame::new(AA, -50, 1);
        data.kinds = FrameKinds::DATA;
        data.channel = Some(1);
        let mut node = fresh(&data);
        assert_eq!(node.channel, Some(1));

        data.channel = Some(11);
        node.absorb(&data, ewma::DEFAULT_WEIGHT);
        assert_eq!(node.channel, Some(1), "data frame must not override");

        let mut beacon = Frame::new(AA, -50, 2);
        beacon.kinds = FrameKinds::BEACON;
        beacon.channel = Some(6);
        node.absorb(&beacon, ewma::DEFAULT_WEIGHT);
        assert_eq!(node.channel, Some(6));
    }

    #[test]
    fn authoritative_fields_overwritten_when_supplied() {
        let mut first = Frame::new(AA, -50, 1);
        first.mode = Some(Mode::Station);
        first.bssid = Some(BB);
        first.encryption = Some(Encryption { wpa: true, ..Encryption::OPEN });
        let mut node = fresh(&first);

        let mut second = Frame::new(AA, -50, 2);
        second.mode = Some(Mode::AccessPoint);
        second.encryption = Some(Encryption { rsn: true, ..Encryption::OPEN });
        second.tsf = Some(12345);
        second.beacon_interval = Some(100);
        second.chan_width = Some(ChanWidth::Mhz40);
        second.tx_streams = Some(2);
        second.rx_streams = Some(3);
        node.absorb(&second, ewma::DEFAULT_WEIGHT);

        assert_eq!(node.mode, Some(Mode::AccessPoint));
        assert_eq!(node.bssid, Some(BB), "absent bssid keeps previous");
        assert!(node.encryption.rsn && !node.encryption.wpa);
        assert_eq!(node.tsf, 12345);
        assert_eq!(node.beacon_interval, 100);
        assert_eq!(node.chan_width, ChanWidth::Mhz40);
        assert_eq!((node.tx_streams, node.rx_streams), (2, 3));
    }

    // ── Retries and sequence numbers ────────────────────────────────

    #[test]
    fn retry_counters() {
        let mut frame = Frame::new(AA, -50, 1);
        frame.retry = true;
        frame.seqno = 10;
        let mut node = fresh(&frame);
        node.absorb(&frame, ewma::DEFAULT_WEIGHT);
        assert_eq!(node.retries, 2);
        assert!(node.last_retry);
        assert_eq!(node.frame_count, 2, "retransmissions still count");

        frame.retry = false;
        frame.seqno = 11;
        node.absorb(&frame, ewma::DEFAULT_WEIGHT);
        assert_eq!(node.retries, 2);
        assert!(!node.last_retry);
        assert_eq!(node.seqno, 11);
    }

    // ── Mesh ────────────────────────────────────────────────────────

    #[test]
    fn olsr_and_batman_observations() {
        let mut frame = Frame::new(AA, -50, 1);
        frame.kinds = FrameKinds::DATA | FrameKinds::IP | FrameKinds::UDP | FrameKinds::OLSR;
        frame.ip_src = Some(Ipv4Addr::new(10, 0, 0, 7));
        frame.olsr_neighbors = Some(4);
        let mut node = fresh(&frame);

        let mut plain = Frame::new(AA, -50, 2);
        plain.batman_gateway = true;
        node.absorb(&plain, ewma::DEFAULT_WEIGHT);

        assert_eq!(node.mesh.olsr_count, 1);
        assert_eq!(node.mesh.olsr_neighbors, 4);
        assert_eq!(node.mesh.ip_src, Some(Ipv4Addr::new(10, 0, 0, 7)));
        assert!(node.mesh.batman_gateway);

        node.absorb(&Frame::new(AA, -50, 3), ewma::DEFAULT_WEIGHT);
        assert!(node.mesh.batman_gateway, "gateway flag is sticky");
    }

    // ── Station inference ───────────────────────────────────────────

    #[test]
    fn station_inference() {
        let mut frame = Frame::new(AA, -50, 1);
        assert!(!fresh(&frame).is_station());
        frame.bssid = Some(AA);
        assert!(!fresh(&frame).is_station(), "own bssid means AP-side");
        frame.bssid = Some(BB);
        assert!(fresh(&frame).is_station());
        frame.mode = Some(Mode::AdHoc);
        assert!(!fresh(&frame).is_station());
    }
}
