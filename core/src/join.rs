//! Point-in-time lookup of factor observations.

use thiserror::Error;
use vault_types::{ScopeId, State, Timestamp};

use crate::store::{StateStore, StoreError};

#[derive(Debug, Error)]
pub enum JoinError {
    /// The factor has no observation strictly before the requested time, or
    /// the factor scope is not registered.
    #[error("no state in '{scope}' before {before}")]
    NotFound { scope: ScopeId, before: Timestamp },
    /// The store answered with a state that is not strictly earlier.
    #[error("store returned a state at {found} for '{scope}', not strictly before {before}")]
    NotStrictlyBefore {
        scope: ScopeId,
        found: Timestamp,
        before: Timestamp,
    },
    #[error(transparent)]
    Store(StoreError),
}

/// As-of join over a [`StateStore`].
///
/// Looks exactly one level back: the returned state is never joined against
/// its own factors, so self-referencing or cyclic models terminate.
#[derive(Clone, Copy)]
pub struct TemporalJoin<'a> {
    states: &'a dyn StateStore,
}

impl<'a> TemporalJoin<'a> {
    #[must_use]
    pub fn new(states: &'a dyn StateStore) -> Self {
        Self { states }
    }

    /// The state of `factor` with the greatest key strictly less than `time`.
    ///
    /// A state stamped exactly `time` is never eligible, so a scope that
    /// lists itself as a factor joins against its previous observation.
    pub fn as_of(&self, factor: &ScopeId, time: Timestamp) -> Result<State, JoinError> {
        match self.states.state_before(factor, time) {
            Ok(state) if state.time() < time => Ok(state),
            Ok(state) => Err(JoinError::NotStrictlyBefore {
                scope: factor.clone(),
                found: state.time(),
                before: time,
            }),
            Err(StoreError::NotFound { .. }) => Err(JoinError::NotFound {
                scope: factor.clone(),
                before: time,
            }),
            Err(err) => Err(JoinError::Store(err)),
        }
    }
}

/// Latest entry of an ascending history strictly before `time`.
#[must_use]
pub fn latest_before(history: &[State], time: Timestamp) -> Option<&State> {
    let end = history.partition_point(|state| state.time() < time);
    end.checked_sub(1).map(|index| &history[index])
}
