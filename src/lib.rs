//! nodescope: live 802.11 node and essid state tracking.
//!
//! Consumes decoded frame records from a capture/parsing layer and keeps one
//! aggregated [`Node`] per transmitting MAC, grouped by essid and indexed by
//! every channel it was seen on. Everything lives in fixed-capacity pools:
//! `no_std`, no allocator, testable on any host with `cargo test`.
//!
//! The crate is organized in layers:
//! - **Containers**: `slab` (generation-checked slots) and `list` (index-based
//!   intrusive lists threaded through slab entries).
//! - **Entities**: `frame`, `node`, `essid`, `channel`, plus the `ewma`
//!   signal averager.
//! - **Engine**: `registry` (ingest, eviction, read access) and `report`
//!   (NDJSON snapshots for display and logging consumers).

#![cfg_attr(not(test), no_std)]

pub mod channel;
pub mod config;
pub mod error;
pub mod essid;
pub mod ewma;
pub mod frame;
pub mod list;
pub mod node;
pub mod registry;
pub mod report;
pub mod slab;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use essid::{EssidGroup, EssidId};
pub use frame::{Frame, FrameKinds, MacAddr, Mode, Timestamp};
pub use node::{Node, NodeId};
pub use registry::{Registry, SweepTimer};
