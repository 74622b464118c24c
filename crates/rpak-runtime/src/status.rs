//! Lifecycle status of a loaded-pak record
//!
//! ```text
//!  FREED ──> LOAD_PENDING ──> LOAD_STARTING ──> LOAD_PAKHDR ──┬──> LOAD_PATCH_INIT
//!                 │                                           │          │
//!                 │                                           │          v
//!                 │                                           │   LOAD_PATCH_EDIT_STREAM
//!                 │                                           v          │
//!                 │                                      LOAD_ASSETS <───┘
//!                 │                                           │
//!                 v                                           v
//!           REPAK_RUNNING ──> REPAK_DONE ──┐               LOADED ──> UNLOAD_PENDING
//!                                          v                               │
//!   (any) ──> CANCELING ───────────> FREE_PENDING <────────────────────────┘
//!   (any) ──> ERROR ───────────────────────┘  │
//!                                             v
//!                                           FREED
//! ```
//!
//! Only the fourteen states above are ever stored in a record. The two
//! query-time answers (`PAK_STATUS_INVALID_PAKHANDLE` and `PAK_STATUS_BUSY`)
//! are modelled as [`QueryError`] so a record can never hold them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stored lifecycle status of a pak record
///
/// Discriminants match the numeric status codes used by the game runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PakStatus {
    /// Slot is unused
    Freed = 0,
    /// Load requested, not yet picked up by a worker
    LoadPending = 1,
    /// Decompress-to-disk in progress
    RepakRunning = 2,
    /// Decompress-to-disk finished
    RepakDone = 3,
    /// Resolving the file and acquiring a file slot
    LoadStarting = 4,
    /// Reading the header and decompressing the container
    LoadPakHdr = 5,
    /// Opening patch sources
    LoadPatchInit = 6,
    /// Applying the patch edit stream
    LoadPatchEditStream = 7,
    /// Dispatching assets to their bindings
    LoadAssets = 8,
    /// Resident and usable
    Loaded = 9,
    /// Unload hooks running
    UnloadPending = 10,
    /// Waiting to be released
    FreePending = 11,
    /// Cancel requested, unwinding
    Canceling = 12,
    /// Load failed
    Error = 13,
}

impl PakStatus {
    /// Every stored status, in discriminant order
    pub const ALL: [Self; 14] = [
        Self::Freed,
        Self::LoadPending,
        Self::RepakRunning,
        Self::RepakDone,
        Self::LoadStarting,
        Self::LoadPakHdr,
        Self::LoadPatchInit,
        Self::LoadPatchEditStream,
        Self::LoadAssets,
        Self::Loaded,
        Self::UnloadPending,
        Self::FreePending,
        Self::Canceling,
        Self::Error,
    ];

    /// Numeric status code
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Status for a numeric code, if it names a stored state
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Canonical status name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Freed => "PAK_STATUS_FREED",
            Self::LoadPending => "PAK_STATUS_LOAD_PENDING",
            Self::RepakRunning => "PAK_STATUS_REPAK_RUNNING",
            Self::RepakDone => "PAK_STATUS_REPAK_DONE",
            Self::LoadStarting => "PAK_STATUS_LOAD_STARTING",
            Self::LoadPakHdr => "PAK_STATUS_LOAD_PAKHDR",
            Self::LoadPatchInit => "PAK_STATUS_LOAD_PATCH_INIT",
            Self::LoadPatchEditStream => "PAK_STATUS_LOAD_PATCH_EDIT_STREAM",
            Self::LoadAssets => "PAK_STATUS_LOAD_ASSETS",
            Self::Loaded => "PAK_STATUS_LOADED",
            Self::UnloadPending => "PAK_STATUS_UNLOAD_PENDING",
            Self::FreePending => "PAK_STATUS_FREE_PENDING",
            Self::Canceling => "PAK_STATUS_CANCELING",
            Self::Error => "PAK_STATUS_ERROR",
        }
    }

    /// Whether the record is somewhere in the load path
    pub const fn is_loading(self) -> bool {
        matches!(
            self,
            Self::LoadPending
                | Self::LoadStarting
                | Self::LoadPakHdr
                | Self::LoadPatchInit
                | Self::LoadPatchEditStream
                | Self::LoadAssets
        )
    }

    /// Whether a waiter can stop waiting on this status
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Loaded | Self::Error | Self::Freed | Self::RepakDone
        )
    }

    /// Whether `self -> next` is an edge of the lifecycle graph
    pub fn can_transition_to(self, next: Self) -> bool {
        use PakStatus::{
            Canceling, Error, FreePending, Freed, LoadAssets, LoadPakHdr, LoadPatchEditStream,
            LoadPatchInit, LoadPending, LoadStarting, Loaded, RepakDone, RepakRunning,
            UnloadPending,
        };

        if self == next {
            return false;
        }
        if matches!(next, Error | Canceling) {
            return self != Freed;
        }

        matches!(
            (self, next),
            (Freed, LoadPending)
                | (LoadPending, LoadStarting | RepakRunning)
                | (LoadStarting, LoadPakHdr)
                | (LoadPakHdr, LoadPatchInit | LoadAssets)
                | (LoadPatchInit, LoadPatchEditStream)
                | (LoadPatchEditStream, LoadAssets)
                | (LoadAssets, Loaded)
                | (Loaded, UnloadPending)
                | (RepakRunning, RepakDone)
                | (UnloadPending | RepakDone | Canceling | Error, FreePending)
                | (FreePending, Freed)
        )
    }
}

impl fmt::Display for PakStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query-time answers that are not stored states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum QueryError {
    /// The handle does not name a live record
    #[error("Invalid pak handle")]
    InvalidHandle,

    /// The record is being written and cannot be read without blocking
    #[error("Pak record is busy")]
    Busy,
}

impl QueryError {
    /// Numeric status code
    pub const fn code(self) -> i32 {
        match self {
            Self::InvalidHandle => 14,
            Self::Busy => 15,
        }
    }

    /// Canonical status name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidHandle => "PAK_STATUS_INVALID_PAKHANDLE",
            Self::Busy => "PAK_STATUS_BUSY",
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_codes_and_names() {
        for status in PakStatus::ALL {
            assert_eq!(PakStatus::from_code(status.code()), Some(status));
            assert!(status.as_str().starts_with("PAK_STATUS_"));
        }
        assert_eq!(PakStatus::Loaded.code(), 9);
        assert_eq!(PakStatus::Error.to_string(), "PAK_STATUS_ERROR");
        assert_eq!(PakStatus::from_code(14), None);
        assert_eq!(QueryError::InvalidHandle.code(), 14);
        assert_eq!(QueryError::Busy.as_str(), "PAK_STATUS_BUSY");
    }

    #[test]
    fn test_load_path_is_connected() {
        let path = [
            PakStatus::Freed,
            PakStatus::LoadPending,
            PakStatus::LoadStarting,
            PakStatus::LoadPakHdr,
            PakStatus::LoadPatchInit,
            PakStatus::LoadPatchEditStream,
            PakStatus::LoadAssets,
            PakStatus::Loaded,
            PakStatus::UnloadPending,
            PakStatus::FreePending,
            PakStatus::Freed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(PakStatus::LoadPakHdr.can_transition_to(PakStatus::LoadAssets));
    }

    #[test]
    fn test_rejected_edges() {
        assert!(!PakStatus::Loaded.can_transition_to(PakStatus::LoadAssets));
        assert!(!PakStatus::Freed.can_transition_to(PakStatus::Error));
        assert!(!PakStatus::LoadPending.can_transition_to(PakStatus::Loaded));
        assert!(!PakStatus::Error.can_transition_to(PakStatus::LoadPending));
        assert!(!PakStatus::Canceling.can_transition_to(PakStatus::Canceling));
        assert!(PakStatus::LoadAssets.can_transition_to(PakStatus::Canceling));
        assert!(PakStatus::Canceling.can_transition_to(PakStatus::FreePending));
    }

    fn status_strategy() -> impl Strategy<Value = PakStatus> {
        (0usize..PakStatus::ALL.len()).prop_map(|i| PakStatus::ALL[i])
    }

    proptest! {
        #[test]
        fn status_never_regresses(attempts in proptest::collection::vec(status_strategy(), 1..64)) {
            let mut status = PakStatus::LoadPending;
            for next in attempts {
                if !status.can_transition_to(next) {
                    continue;
                }
                let exit = matches!(next, PakStatus::Error | PakStatus::Canceling)
                    || matches!(status, PakStatus::Error | PakStatus::Canceling)
                    || (status, next) == (PakStatus::FreePending, PakStatus::Freed);
                prop_assert!(
                    exit || next.code() > status.code(),
                    "{} -> {} regresses", status, next
                );
                status = next;
            }
        }
    }
}
