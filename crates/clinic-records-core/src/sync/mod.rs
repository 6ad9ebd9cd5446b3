//! Offline-first sync with the remote patient registry.
//!
//! Protocol, per pass:
//! 1. Scan unsynced patients, vitals, form A and form B visits (in that order)
//! 2. POST each record to the registry
//! 3. Mark accepted records (and duplicate patients) as synced
//! 4. Abort the pass on the first transport failure and retry later

mod client;
mod engine;
mod scheduler;
mod wire;

pub use client::*;
pub use engine::*;
pub use scheduler::*;
pub use wire::*;

use std::fmt;

use thiserror::Error;

/// The four record kinds, in the order a pass visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Patient,
    Vitals,
    VisitA,
    VisitB,
}

impl RecordKind {
    pub const PASS_ORDER: [RecordKind; 4] = [
        RecordKind::Patient,
        RecordKind::Vitals,
        RecordKind::VisitA,
        RecordKind::VisitB,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Patient => "patient",
            RecordKind::Vitals => "vitals",
            RecordKind::VisitA => "visit_a",
            RecordKind::VisitB => "visit_b",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pass stopped early.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Transport failure while syncing {kind}: {message}")]
    Transport { kind: RecordKind, message: String },

    #[error("Local store failure while syncing {kind}: {message}")]
    Store { kind: RecordKind, message: String },
}

pub type SyncResult<T> = Result<T, SyncError>;
