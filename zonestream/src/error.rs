//! Error types for zone streaming and hand-offs.

use thiserror::Error;

use crate::registry::{TransitionId, ZoneId};

/// Result type for streaming operations.
pub type ZoneResult<T> = Result<T, ZoneError>;

/// Errors surfaced by the lifecycle controller and the transition orchestrator.
///
/// Errors are `Clone` because a coalesced load hands the same outcome to
/// every caller attached to it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ZoneError {
    /// The zone id is not registered.
    #[error("zone not found: {0}")]
    ZoneNotFound(ZoneId),

    /// No transition links the two zones.
    #[error("no transition links {from} and {to}")]
    TransitionNotFound { from: ZoneId, to: ZoneId },

    /// The loader failed; the zone reverted to its previous state.
    #[error("failed to load zone {zone}: {reason}")]
    LoadFailed { zone: ZoneId, reason: String },

    /// The load was abandoned because its zone was evicted while loading.
    #[error("load of zone {0} was cancelled")]
    LoadCancelled(ZoneId),

    /// Eviction could not free enough memory and overruns are rejected.
    #[error("memory budget exceeded: requested {requested} bytes, {available} available")]
    BudgetExceeded { requested: u64, available: u64 },

    /// The transition is locked and the player lacks the required item.
    #[error("transition {transition} requires {item}")]
    TransitionLocked {
        transition: TransitionId,
        item: String,
    },

    /// The active zone cannot be unloaded.
    #[error("zone {0} is active and cannot be unloaded")]
    ActiveZoneProtected(ZoneId),

    /// A hand-off is already running.
    #[error("a transition is already in progress")]
    TransitionInProgress,

    /// A transition was requested from a zone the player is not in.
    #[error("zone {0} is not the active zone")]
    NotActive(ZoneId),
}

impl ZoneError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ZoneError::LoadFailed { .. }
                | ZoneError::LoadCancelled(_)
                | ZoneError::BudgetExceeded { .. }
        )
    }

    /// Message suitable for showing to the player, if this error is meant
    /// to be user-visible.
    pub fn user_message(&self) -> Option<String> {
        match self {
            ZoneError::TransitionLocked { item, .. } => Some(format!("Requires {}", item)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ZoneError::LoadFailed {
            zone: "lab".into(),
            reason: "disk gone".to_string(),
        };
        assert_eq!(err.to_string(), "failed to load zone lab: disk gone");

        let err = ZoneError::TransitionNotFound {
            from: "a".into(),
            to: "b".into(),
        };
        assert!(err.to_string().contains("a and b"));
    }

    #[test]
    fn test_retryable() {
        assert!(ZoneError::LoadFailed {
            zone: "a".into(),
            reason: String::new()
        }
        .is_retryable());
        assert!(ZoneError::LoadCancelled("a".into()).is_retryable());
        assert!(!ZoneError::ZoneNotFound("a".into()).is_retryable());
    }

    #[test]
    fn test_only_locked_is_user_visible() {
        let locked = ZoneError::TransitionLocked {
            transition: "door".into(),
            item: "keycard".to_string(),
        };
        assert_eq!(locked.user_message().as_deref(), Some("Requires keycard"));
        assert!(ZoneError::TransitionInProgress.user_message().is_none());
    }
}
