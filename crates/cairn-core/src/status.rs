//! Lifecycle status of a registered data version.
//!
//! ```text
//! UPLOADING ──► VALID ────┐
//!     │                   │
//!     ├───────► INVALID ──┼──► DELETED (terminal)
//!     │                   │
//!     └───────────────────┘
//! ```
//!
//! Ordinary registration starts in `UPLOADING`. Data discovered by reconciliation
//! is created directly in [`DataStatus::UNREGISTERED`] because its bytes already
//! exist in storage.
//!
//! Two notions of "terminal" apply. `VALID` and `INVALID` are *settled*
//! ([`DataStatus::is_settled`]): the upload lifecycle is over and only deletion
//! may follow, so `INVALID` is where discovered data comes to rest. `DELETED`
//! is fully *terminal* ([`DataStatus::is_terminal`]): nothing leaves it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Status of one registered data version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataStatus {
    /// Bytes are still being written by an ordinary registration.
    Uploading,
    /// Data has been confirmed.
    Valid,
    /// Data is not usable, or was discovered in storage without confirmation.
    Invalid,
    /// Logically removed.
    Deleted,
}

impl DataStatus {
    /// Status given to data discovered in storage but never registered.
    pub const UNREGISTERED: Self = Self::Invalid;

    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "UPLOADING",
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Deleted => "DELETED",
        }
    }

    /// Returns true once the upload lifecycle is over (`VALID`, `INVALID` or
    /// `DELETED`). A settled status can at most move to `DELETED`.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Uploading)
    }

    /// Returns true if no transition at all, deletion included, may leave this
    /// status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Returns true if `self -> next` is an allowed transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Deleted, _) => false,
            (_, Self::Deleted) => true,
            (Self::Uploading, Self::Valid | Self::Invalid) => true,
            _ => false,
        }
    }

    /// Validates and performs a transition, returning the new status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the state machine forbids the move.
    pub fn transition(self, next: Self) -> Result<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for DataStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UPLOADING" => Ok(Self::Uploading),
            "VALID" => Ok(Self::Valid),
            "INVALID" => Ok(Self::Invalid),
            "DELETED" => Ok(Self::Deleted),
            other => Err(Error::InvalidInput(format!("unknown data status: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DataStatus; 4] = [
        DataStatus::Uploading,
        DataStatus::Valid,
        DataStatus::Invalid,
        DataStatus::Deleted,
    ];

    #[test]
    fn uploading_moves_to_valid_or_invalid() {
        assert_eq!(
            DataStatus::Uploading.transition(DataStatus::Valid).unwrap(),
            DataStatus::Valid
        );
        assert_eq!(
            DataStatus::Uploading.transition(DataStatus::Invalid).unwrap(),
            DataStatus::Invalid
        );
    }

    #[test]
    fn every_live_status_can_be_deleted() {
        for status in [DataStatus::Uploading, DataStatus::Valid, DataStatus::Invalid] {
            assert!(status.can_transition_to(DataStatus::Deleted), "{status}");
        }
    }

    #[test]
    fn nothing_leaves_deleted() {
        for next in ALL {
            let err = DataStatus::Deleted.transition(next).unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidTransition {
                    from: DataStatus::Deleted,
                    ..
                }
            ));
        }
    }

    #[test]
    fn confirmed_states_do_not_flip() {
        assert!(!DataStatus::Valid.can_transition_to(DataStatus::Invalid));
        assert!(!DataStatus::Invalid.can_transition_to(DataStatus::Valid));
        assert!(!DataStatus::Valid.can_transition_to(DataStatus::Uploading));
    }

    #[test]
    fn unregistered_is_invalid_and_settled() {
        assert_eq!(DataStatus::UNREGISTERED, DataStatus::Invalid);
        assert!(DataStatus::UNREGISTERED.is_settled());
        assert!(!DataStatus::UNREGISTERED.is_terminal());
    }

    #[test]
    fn settled_statuses_only_move_to_deleted() {
        for status in ALL {
            let moves: Vec<DataStatus> = ALL
                .into_iter()
                .filter(|next| status.can_transition_to(*next))
                .collect();
            if status.is_terminal() {
                assert!(moves.is_empty(), "{status}");
            } else if status.is_settled() {
                assert_eq!(moves, vec![DataStatus::Deleted], "{status}");
            } else {
                assert!(moves.len() > 1, "{status}");
            }
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&DataStatus::Uploading).unwrap();
        assert_eq!(json, "\"UPLOADING\"");
        let parsed: DataStatus = "deleted".parse().unwrap();
        assert_eq!(parsed, DataStatus::Deleted);
    }
}
