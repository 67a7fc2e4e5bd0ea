/// Channel membership index.
///
/// A node can be on many channels and a channel holds many nodes, so each
/// (node, channel) pair is a small [`Membership`] entity threaded onto two
/// lists at once: the node's own channel list and the channel's member list.
/// Memberships are only added by frame updates and only removed when their
/// node is evicted.
use heapless::Vec;

use crate::config::{MAX_CHANNELS, MAX_MEMBERSHIPS};
use crate::error::{Error, Result};
use crate::list::{Adapter, Link, List, Store};
use crate::slab::{Slab, SlotIdx};

#[derive(Debug)]
pub(crate) struct Membership {
    /// Slot of the member node.
    node: SlotIdx,
    /// Position of the channel in the index.
    entry: u16,
    on_node: Link,
    on_channel: Link,
}

/// A node's list of memberships.
pub(crate) struct OnNode;

impl Adapter for OnNode {
    type Item = Membership;
    fn link(item: &Membership) -> &Link {
        &item.on_node
    }
    fn link_mut(item: &mut Membership) -> &mut Link {
        &mut item.on_node
    }
}

/// A channel's list of memberships.
pub(crate) struct OnChannel;

impl Adapter for OnChannel {
    type Item = Membership;
    fn link(item: &Membership) -> &Link {
        &item.on_channel
    }
    fn link_mut(item: &mut Membership) -> &mut Link {
        &mut item.on_channel
    }
}

/// Nodes observed on one channel.
#[derive(Debug)]
pub struct ChannelEntry {
    channel: u8,
    members: List<OnChannel>,
}

impl ChannelEntry {
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ChannelIndex {
    entries: Vec<ChannelEntry, MAX_CHANNELS>,
    memberships: Slab<Membership, MAX_MEMBERSHIPS>,
}

impl ChannelIndex {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            memberships: Slab::new(),
        }
    }

    /// Channels in order of first observation.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelEntry> {
        self.entries.iter()
    }

    pub fn get(&self, channel: u8) -> Option<&ChannelEntry> {
        self.entries.iter().find(|e| e.channel == channel)
    }

    /// Total (node, channel) memberships.
    pub fn membership_count(&self) -> usize {
        self.memberships.len()
    }

    fn position(&self, channel: u8) -> Option<usize> {
        self.entries.iter().position(|e| e.channel == channel)
    }

    /// Check that one more membership on `channel` fits.
    pub(crate) fn has_room_for(&self, channel: u8) -> Result<()> {
        if self.memberships.is_full() {
            return Err(Error::OutOfMemory("channel membership"));
        }
        if self.position(channel).is_none() && self.entries.is_full() {
            return Err(Error::OutOfMemory("channel"));
        }
        Ok(())
    }

    /// Whether a node's membership list already covers `channel`.
    pub(crate) fn node_is_on(&self, node_list: &List<OnNode>, channel: u8) -> bool {
        node_list
            .iter(&self.memberships)
            .any(|m| self.entries[self.memberships.item(m).entry as usize].channel == channel)
    }

    /// Channels on a node's membership list, in order joined.
    pub(crate) fn channels_of<'a>(
        &'a self,
        node_list: &List<OnNode>,
    ) -> impl Iterator<Item = u8> + 'a {
        node_list
            .iter(&self.memberships)
            .map(move |m| self.entries[self.memberships.item(m).entry as usize].channel)
    }

    /// Slots of the nodes on `channel`.
    pub(crate) fn members(&self, channel: u8) -> impl Iterator<Item = SlotIdx> + '_ {
        self.get(channel)
            .into_iter()
            .flat_map(move |e| e.members.iter(&self.memberships))
            .map(move |m| self.memberships.item(m).node)
    }

    /// Put a node on `channel`. The caller has checked it is not already there.
    pub(crate) fn join(
        &mut self,
        node: SlotIdx,
        node_list: &mut List<OnNode>,
        channel: u8,
    ) -> Result<()> {
        let entry = match self.position(channel) {
            Some(pos) => pos,
            None => {
                self.entries
                    .push(ChannelEntry {
                        channel,
                        members: List::new(),
                    })
                    .map_err(|_| Error::OutOfMemory("channel"))?;
                log::debug!("first node on channel {}", channel);
                self.entries.len() - 1
            }
        };
        let key = self
            .memberships
            .insert_with(|_| Membership {
                node,
                entry: entry as u16,
                on_node: Link::new(),
                on_channel: Link::new(),
            })
            .map_err(|_| Error::OutOfMemory("channel membership"))?;
        let m = key.index();
        self.entries[entry].members.push_back(&mut self.memberships, m);
        node_list.push_back(&mut self.memberships, m);
        Ok(())
    }

    /// Take a node off every channel it is on.
    pub(crate) fn leave_all(&mut self, node_list: &mut List<OnNode>) {
        while let Some(m) = node_list.pop_front(&mut self.memberships) {
            let entry = self.memberships.item(m).entry as usize;
            self.entries[entry].members.remove(&mut self.memberships, m);
            if let Some(key) = self.memberships.key_at(m) {
                self.memberships.remove(key);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.memberships.clear();
    }

    /// Verify every channel list and that each membership is on exactly
    /// the channel list it names.
    pub(crate) fn check(&self) {
        let mut total = 0;
        for (pos, entry) in self.entries.iter().enumerate() {
            entry.members.check(&self.memberships);
            for m in entry.members.iter(&self.memberships) {
                assert_eq!(
                    self.memberships.item(m).entry as usize,
                    pos,
                    "membership {m} on the wrong channel list"
                );
            }
            total += entry.members.len();
        }
        assert_eq!(total, self.memberships.len(), "orphaned channel memberships");
    }

    pub(crate) fn check_node(&self, node: SlotIdx, node_list: &List<OnNode>) {
        node_list.check(&self.memberships);
        for m in node_list.iter(&self.memberships) {
            assert_eq!(
                self.memberships.item(m).node,
                node,
                "membership {m} belongs to another node"
            );
        }
    }
}
