/// Essid groups: nodes sharing an observed network name.
///
/// The table hands out groups by name and keeps them around when they empty
/// out. Releasing empty groups is an owner decision ([`EssidTable::purge_empty`]);
/// handles to released groups resolve to nothing.
use crate::config::MAX_ESSIDS;
use crate::error::{Error, Result};
use crate::frame::{Essid, MacAddr, Mode};
use crate::list::{List, Store};
use crate::node::{ByEssid, NodePool};
use crate::slab::{Key, Slab};

/// Generation-checked handle to an essid group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EssidId(Key);

#[derive(Debug)]
pub struct EssidGroup {
    name: Essid,
    pub(crate) members: List<ByEssid>,
    split: bool,
}

impl EssidGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of member nodes.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Ad-hoc members disagree on the BSSID: the IBSS has split.
    pub fn is_split(&self) -> bool {
        self.split
    }
}

#[derive(Debug, Default)]
pub struct EssidTable {
    groups: Slab<EssidGroup, MAX_ESSIDS>,
}

impl EssidTable {
    pub const fn new() -> Self {
        Self { groups: Slab::new() }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<EssidId> {
        self.groups
            .iter()
            .find(|(_, g)| g.name == name)
            .and_then(|(i, _)| self.groups.key_at(i))
            .map(EssidId)
    }

    /// Would `name` need a new group that does not fit?
    pub(crate) fn has_room_for(&self, name: &str) -> bool {
        !self.groups.is_full() || self.lookup(name).is_some()
    }

    pub fn lookup_or_create(&mut self, name: &str) -> Result<EssidId> {
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        let mut essid = Essid::new();
        essid
            .push_str(name)
            .map_err(|_| Error::InvalidArgument("essid too long"))?;
        let key = self
            .groups
            .insert_with(|_| EssidGroup {
                name: essid,
                members: List::new(),
                split: false,
            })
            .map_err(|_| {
                log::warn!("essid table full, dropping \"{}\"", name);
                Error::OutOfMemory("essid")
            })?;
        log::debug!("new essid \"{}\"", name);
        Ok(EssidId(key))
    }

    pub fn get(&self, id: EssidId) -> Option<&EssidGroup> {
        self.groups.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: EssidId) -> Option<&mut EssidGroup> {
        self.groups.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EssidId, &EssidGroup)> {
        self.groups
            .iter()
            .filter_map(|(i, g)| self.groups.key_at(i).map(|k| (EssidId(k), g)))
    }

    /// Release every group without members. Returns how many were released.
    pub fn purge_empty(&mut self) -> usize {
        let mut empty: heapless::Vec<Key, MAX_ESSIDS> = heapless::Vec::new();
        for (i, group) in self.groups.iter() {
            if group.is_empty() {
                if let Some(key) = self.groups.key_at(i) {
                    let _ = empty.push(key);
                }
            }
        }
        for &key in &empty {
            self.groups.remove(key);
        }
        empty.len()
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }

    /// Recompute the split flag of a group from its ad-hoc members.
    pub(crate) fn refresh_split(&mut self, id: EssidId, nodes: &NodePool) {
        let Some(group) = self.groups.get_mut(id.0) else {
            return;
        };
        let mut seen: Option<MacAddr> = None;
        let mut split = false;
        for i in group.members.iter(nodes) {
            let node = nodes.item(i);
            if node.mode != Some(Mode::AdHoc) {
                continue;
            }
            match (seen, node.bssid) {
                (None, Some(bssid)) => seen = Some(bssid),
                (Some(first), Some(bssid)) if first != bssid => {
                    split = true;
                    break;
                }
                _ => {}
            }
        }
        if split && !group.split {
            log::info!("IBSS split detected on \"{}\"", group.name);
        }
        group.split = split;
    }
}
