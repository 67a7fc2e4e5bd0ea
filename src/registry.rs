/// Node registry: turns decoded frames into per-node state and keeps the
/// global, per-essid and per-channel indices consistent with it.
///
/// Single writer. The owner calls [`Registry::update`] for every frame and
/// [`Registry::sweep_timeouts`] on a timer; consumers only read between those
/// calls. For multi-threaded use wrap the registry in one lock held for the
/// duration of each call.
use heapless::index_map::FnvIndexMap;

use crate::channel::{ChannelEntry, ChannelIndex};
use crate::config::{TrackerConfig, MAX_NODES};
use crate::error::{ensure, Error, Result};
use crate::essid::{EssidGroup, EssidId, EssidTable};
use crate::frame::{Frame, MacAddr, Timestamp};
use crate::list::{List, Store};
use crate::node::{ByAge, Node, NodeId, NodePool};
use crate::slab::SlotIdx;

#[derive(Debug)]
pub struct Registry {
    config: TrackerConfig,
    nodes: NodePool,
    by_mac: FnvIndexMap<MacAddr, SlotIdx, MAX_NODES>,
    all: List<ByAge>,
    essids: EssidTable,
    channels: ChannelIndex,
}

impl Registry {
    pub const fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            nodes: NodePool::new(),
            by_mac: FnvIndexMap::new(),
            all: List::new(),
            essids: EssidTable::new(),
            channels: ChannelIndex::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ── Ingest ──────────────────────────────────────────────────────

    /// Ingest one decoded frame and return the node it belongs to.
    ///
    /// On error nothing observable changes, except that an essid group may
    /// have been created empty.
    pub fn update(&mut self, frame: &Frame) -> Result<&Node> {
        frame.validate()?;
        let existing = self.by_mac.get(&frame.src).copied();
        self.reserve(frame, existing)?;

        let idx = match existing {
            Some(idx) => {
                let node = self.nodes.item_mut(idx);
                ensure(
                    frame.timestamp >= node.last_seen,
                    "frame timestamp before node last_seen",
                )?;
                node.absorb(frame, self.config.ewma_weight);
                idx
            }
            None => self.create(frame)?,
        };

        self.assign_essid(idx, frame)?;
        self.add_channel(idx, frame)?;
        self.resolve_ap(idx);
        if let Some(group) = self.nodes.item(idx).essid {
            self.essids.refresh_split(group, &self.nodes);
        }

        Ok(self.nodes.item(idx))
    }

    /// Fail up front if any pool this frame needs is full, so a rejected
    /// frame leaves no partial state behind.
    fn reserve(&self, frame: &Frame, existing: Option<SlotIdx>) -> Result<()> {
        if existing.is_none() && self.nodes.is_full() {
            log::warn!("node table full, dropping frame from {}", frame.src);
            return Err(Error::OutOfMemory("node"));
        }
        if let Some(name) = frame.visible_essid() {
            if !self.essids.has_room_for(name) {
                log::warn!("essid table full, dropping frame from {}", frame.src);
                return Err(Error::OutOfMemory("essid"));
            }
        }
        if let Some(ch) = frame.channel {
            let known = existing
                .map(|idx| self.channels.node_is_on(&self.nodes.item(idx).channels, ch))
                .unwrap_or(false);
            if !known {
                self.channels.has_room_for(ch).inspect_err(|_| {
                    log::warn!("channel index full, dropping frame from {}", frame.src);
                })?;
            }
        }
        Ok(())
    }

    fn create(&mut self, frame: &Frame) -> Result<SlotIdx> {
        let weight = self.config.ewma_weight;
        let key = self
            .nodes
            .insert_with(|key| Node::new(NodeId(key), frame, weight))
            .map_err(|_| Error::OutOfMemory("node"))?;
        let idx = key.index();
        if self.by_mac.insert(frame.src, idx).is_err() {
            self.nodes.remove(key);
            return Err(Error::OutOfMemory("mac index"));
        }
        self.all.push_front(&mut self.nodes, idx);
        log::debug!("new node {} ({} dBm)", frame.src, frame.signal);
        Ok(idx)
    }

    /// Move the node to the group of the frame's essid, if it names a
    /// different one. Unlink and relink happen within this call, so no
    /// reader ever sees the node in zero or two groups.
    fn assign_essid(&mut self, idx: SlotIdx, frame: &Frame) -> Result<()> {
        let Some(name) = frame.visible_essid() else {
            return Ok(());
        };
        let current = self.nodes.item(idx).essid;
        if let Some(group) = current.and_then(|id| self.essids.get(id)) {
            if group.name() == name {
                return Ok(());
            }
        }

        let target = self.essids.lookup_or_create(name)?;
        if let Some(old) = current {
            match self.essids.get_mut(old) {
                Some(group) => group.members.remove(&mut self.nodes, idx),
                None => ensure(false, "node names a released essid group")?,
            }
            self.essids.refresh_split(old, &self.nodes);
        }
        if let Some(group) = self.essids.get_mut(target) {
            group.members.push_back(&mut self.nodes, idx);
        }
        let node = self.nodes.item_mut(idx);
        node.essid = Some(target);
        log::debug!("{} joined essid \"{}\"", node.mac, name);
        Ok(())
    }

    /// Channel memberships only grow; a node keeps every channel it was
    /// ever seen on until it is evicted.
    fn add_channel(&mut self, idx: SlotIdx, frame: &Frame) -> Result<()> {
        let Some(ch) = frame.channel else {
            return Ok(());
        };
        let node = self.nodes.item_mut(idx);
        if self.channels.node_is_on(&node.channels, ch) {
            return Ok(());
        }
        self.channels.join(idx, &mut node.channels, ch)?;
        node.channel_count += 1;
        Ok(())
    }

    /// Point a station at the node whose MAC is its BSSID. Stays unresolved
    /// until that node has been seen; retried on every later update. A node
    /// that stops being a station drops its AP.
    fn resolve_ap(&mut self, idx: SlotIdx) {
        let node = self.nodes.item(idx);
        if !node.is_station() {
            if node.ap.is_some() {
                self.nodes.item_mut(idx).ap = None;
            }
            return;
        }
        let Some(bssid) = node.bssid else {
            return;
        };
        if let Some(ap) = node.ap.and_then(|id| self.nodes.get(id.0)) {
            if ap.mac == bssid {
                return;
            }
        }
        let ap = self
            .by_mac
            .get(&bssid)
            .and_then(|&i| self.nodes.key_at(i))
            .map(NodeId);
        self.nodes.item_mut(idx).ap = ap;
    }

    // ── Eviction ────────────────────────────────────────────────────

    /// Evict every node silent for more than `timeout` seconds at `now`.
    pub fn sweep_timeouts(&mut self, now: Timestamp, timeout: u32) {
        let mut evicted = 0usize;
        let mut cursor = self.all.first();
        while let Some(idx) = cursor {
            cursor = self.all.next_of(&self.nodes, idx);
            if now.saturating_sub(self.nodes.item(idx).last_seen) > timeout {
                self.evict(idx);
                evicted += 1;
            }
        }
        if evicted == 0 {
            return;
        }
        self.drop_dangling_aps();
        log::info!("evicted {} stale nodes, {} remain", evicted, self.len());

        #[cfg(debug_assertions)]
        self.check();
    }

    /// Sweep with the configured node timeout.
    pub fn expire(&mut self, now: Timestamp) {
        self.sweep_timeouts(now, self.config.node_timeout);
    }

    fn evict(&mut self, idx: SlotIdx) {
        let Some(key) = self.nodes.key_at(idx) else {
            return;
        };
        self.all.remove(&mut self.nodes, idx);
        let essid = self.nodes.item(idx).essid;
        if let Some(old) = essid {
            if let Some(group) = self.essids.get_mut(old) {
                group.members.remove(&mut self.nodes, idx);
            }
            self.essids.refresh_split(old, &self.nodes);
        }
        let node = self.nodes.item_mut(idx);
        self.channels.leave_all(&mut node.channels);

        if let Some(node) = self.nodes.remove(key) {
            self.by_mac.remove(&node.mac);
            log::debug!("evicted {} (last seen {})", node.mac, node.last_seen);
        }
    }

    /// Reset AP handles whose target is gone.
    fn drop_dangling_aps(&mut self) {
        let mut cursor = self.all.first();
        while let Some(idx) = cursor {
            cursor = self.all.next_of(&self.nodes, idx);
            let dangling = match self.nodes.item(idx).ap {
                Some(ap) => self.nodes.get(ap.0).is_none(),
                None => false,
            };
            if dangling {
                self.nodes.item_mut(idx).ap = None;
            }
        }
    }

    /// Release every node and index entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_mac.clear();
        self.all = List::new();
        self.essids.clear();
        self.channels.clear();
    }

    /// Release essid groups that no longer have members.
    pub fn purge_empty_essids(&mut self) -> usize {
        self.essids.purge_empty()
    }

    // ── Read access ─────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, most recently created first.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.all.iter(&self.nodes).map(move |i| self.nodes.item(i))
    }

    pub fn get(&self, mac: &MacAddr) -> Option<&Node> {
        self.by_mac.get(mac).map(|&i| self.nodes.item(i))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// The node's access point, or `None` while unresolved or evicted.
    pub fn ap_of(&self, node: &Node) -> Option<&Node> {
        node.ap.and_then(|id| self.node(id))
    }

    pub fn essids(&self) -> &EssidTable {
        &self.essids
    }

    pub fn essid_of(&self, node: &Node) -> Option<&EssidGroup> {
        node.essid.and_then(|id| self.essids.get(id))
    }

    /// Members of an essid group, in order joined.
    pub fn essid_members(&self, id: EssidId) -> impl Iterator<Item = &Node> + '_ {
        self.essids
            .get(id)
            .into_iter()
            .flat_map(move |g| g.members.iter(&self.nodes))
            .map(move |i| self.nodes.item(i))
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelEntry> + '_ {
        self.channels.iter()
    }

    /// Nodes observed on `channel`, in order first seen there.
    pub fn channel_members(&self, channel: u8) -> impl Iterator<Item = &Node> + '_ {
        self.channels
            .members(channel)
            .map(move |i| self.nodes.item(i))
    }

    /// Channels a node has been observed on, in order first seen.
    pub fn node_channels<'a>(&'a self, node: &Node) -> impl Iterator<Item = u8> + 'a {
        self.channels.channels_of(&node.channels)
    }

    // ── Consistency ─────────────────────────────────────────────────

    /// Verify every index against the node table. Panics on the first
    /// broken invariant.
    pub fn check(&self) {
        self.all.check(&self.nodes);
        assert_eq!(self.all.len(), self.nodes.len(), "global list misses nodes");
        assert_eq!(self.by_mac.len(), self.nodes.len(), "mac index out of step");

        for idx in self.all.iter(&self.nodes) {
            let node = self.nodes.item(idx);
            assert_eq!(self.by_mac.get(&node.mac), Some(&idx), "mac index stale");
            assert_eq!(
                self.nodes.key_at(idx).map(NodeId),
                Some(node.id()),
                "node id stale"
            );

            match node.essid {
                Some(id) => assert!(
                    self.essids
                        .get(id)
                        .is_some_and(|g| g.members.contains(&self.nodes, idx)),
                    "node missing from its essid group"
                ),
                None => assert!(!node.on_essid.is_linked(), "node on an essid list without a group"),
            }

            self.channels.check_node(idx, &node.channels);
            assert_eq!(
                node.channels.len(),
                node.channel_count as usize,
                "channel_count out of step"
            );

            if let Some(ap) = node.ap {
                assert!(self.nodes.get(ap.0).is_some(), "dangling AP reference");
            }
        }

        let mut grouped = 0;
        for (_, group) in self.essids.iter() {
            group.members.check(&self.nodes);
            grouped += group.len();
        }
        let with_essid = self.nodes().filter(|n| n.essid.is_some()).count();
        assert_eq!(grouped, with_essid, "node in more than one essid group");

        self.channels.check();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(TrackerConfig::new())
    }
}

/// Tells the owning loop when a timeout sweep is due.
#[derive(Debug, Clone, Copy)]
pub struct SweepTimer {
    interval: u32,
    last: Option<Timestamp>,
}

impl SweepTimer {
    pub const fn new(interval: u32) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.sweep_interval)
    }

    /// True at most once per interval; the first call is always due.
    pub fn due(&mut self, now: Timestamp) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
