/// NDJSON snapshots of registry state for display and logging consumers.
///
/// Reports borrow from the registry and are serialized with
/// `serde_json_core` into caller-provided buffers; nothing allocates.
use heapless::Vec;
use serde::Serialize;

use crate::essid::EssidGroup;
use crate::frame::{Encryption, FrameKinds, MacAddr, Mode, Timestamp};
use crate::node::Node;
use crate::registry::Registry;

/// Crate version, carried in status reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of one serialized report line.
pub const MAX_REPORT_LEN: usize = 512;

/// Channels listed per node report; further channels are left out.
pub const MAX_REPORT_CHANNELS: usize = 16;

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Report<'a> {
    #[serde(rename = "node")]
    Node {
        mac: MacAddr,
        #[serde(skip_serializing_if = "Option::is_none")]
        essid: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        bssid: Option<MacAddr>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<Mode>,
        /// Advertised or first-seen channel
        #[serde(skip_serializing_if = "Option::is_none")]
        ch: Option<u8>,
        /// Every channel the node was seen on
        channels: Vec<u8, MAX_REPORT_CHANNELS>,
        sig_max: i8,
        /// Moving average, rounded to whole dBm
        sig_avg: i16,
        pkts: u32,
        kinds: FrameKinds,
        enc: Encryption,
        /// MAC of the resolved access point
        #[serde(skip_serializing_if = "Option::is_none")]
        ap: Option<MacAddr>,
        last_seen: Timestamp,
    },
    #[serde(rename = "essid")]
    Essid {
        name: &'a str,
        members: usize,
        split: bool,
    },
    #[serde(rename = "status")]
    Status {
        nodes: usize,
        essids: usize,
        channels: usize,
        version: &'static str,
    },
}

impl<'a> Report<'a> {
    pub fn node(registry: &'a Registry, node: &'a Node) -> Self {
        let mut channels = Vec::new();
        for ch in registry.node_channels(node) {
            if channels.push(ch).is_err() {
                break;
            }
        }
        Report::Node {
            mac: node.mac,
            essid: registry.essid_of(node).map(EssidGroup::name),
            bssid: node.bssid,
            mode: node.mode,
            ch: node.channel,
            channels,
            sig_max: node.signal.max,
            sig_avg: round_dbm(node.signal.ewma),
            pkts: node.frame_count,
            kinds: node.kinds,
            enc: node.encryption,
            ap: registry.ap_of(node).map(|ap| ap.mac),
            last_seen: node.last_seen,
        }
    }

    pub fn essid(group: &'a EssidGroup) -> Self {
        Report::Essid {
            name: group.name(),
            members: group.len(),
            split: group.is_split(),
        }
    }

    pub fn status(registry: &Registry) -> Self {
        Report::Status {
            nodes: registry.len(),
            essids: registry.essids().len(),
            channels: registry.channels().count(),
            version: VERSION,
        }
    }
}

fn round_dbm(value: f32) -> i16 {
    let half = if value < 0.0 { -0.5 } else { 0.5 };
    (value + half) as i16
}

/// Serialize a report into `buf` as one newline-terminated line. `None` if
/// the line, newline included, does not fit.
pub fn serialize_report(report: &Report, buf: &mut [u8]) -> Option<usize> {
    let len = serde_json_core::to_slice(report, buf).ok()?;
    *buf.get_mut(len)? = b'\n';
    Some(len + 1)
}

/// Emit a full snapshot: one status line, then every essid group, then every
/// node newest first. Returns the number of lines handed to `sink`.
pub fn write_snapshot<F: FnMut(&[u8])>(registry: &Registry, mut sink: F) -> usize {
    let mut buf = [0u8; MAX_REPORT_LEN];
    let mut lines = emit(&Report::status(registry), &mut buf, &mut sink);
    for (_, group) in registry.essids().iter() {
        lines += emit(&Report::essid(group), &mut buf, &mut sink);
    }
    for node in registry.nodes() {
        lines += emit(&Report::node(registry, node), &mut buf, &mut sink);
    }
    lines
}

fn emit<F: FnMut(&[u8])>(report: &Report, buf: &mut [u8], sink: &mut F) -> usize {
    match serialize_report(report, buf) {
        Some(len) => {
            sink(&buf[..len]);
            1
        }
        None => {
            log::warn!("report too large for {} byte buffer, skipped", buf.len());
            0
        }
    }
}
