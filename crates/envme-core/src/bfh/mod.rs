//! Boot-from-host (BFH) recovery handoff
//!
//! A controller in BFH mode waits for the host to hand it a loader image
//! before it can boot. [`BfhSequencer`] runs the one-shot recovery:
//!
//! ```text
//!  QueryMspType ──► QueryBfhStatus ──► TransferLoader ──► Settle ──► Recheck
//!       │                │   │                │                        │
//!       ▼                ▼   └─ loader id 3 ──┼────────────┐           │
//!     Fail             Fail                   ▼            ▼           ▼
//!                                           Fail      FetchDescriptor ◄┘
//! ```
//!
//! Every error is terminal; nothing is retried. The two checks whose
//! polarity is uncertain are named settings in [`policy`].

pub mod policy;
mod sequencer;

pub use policy::{BfhConfig, EntryPolarity, RecheckPolicy};
pub use sequencer::*;
