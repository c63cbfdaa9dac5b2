//! Test space lifecycle status and the transitions the engine performs.
//!
//! A space starts `Open`. The source of a duplicate is `Locked` for the
//! duration of the copy and returned to `Open` afterwards; a destination
//! space is created `Copying` and ends `Open` or `Failed`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a test space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceStatus {
    Open,
    Locked,
    Copying,
    Failed,
}

impl SpaceStatus {
    /// Return the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Locked => "locked",
            Self::Copying => "copying",
            Self::Failed => "failed",
        }
    }

    /// Parse a status string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "locked" => Some(Self::Locked),
            "copying" => Some(Self::Copying),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// All valid status values.
    pub const ALL: &'static [&'static str] = &["open", "locked", "copying", "failed"];

    /// Whether ordinary graph mutations may target a space in this status.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for SpaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SpaceStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
            .ok_or_else(|| CoreError::Parse(format!("unknown space status '{value}'")))
    }
}

/// Reject a lock attempt unless the space is currently `Open`.
pub fn ensure_lockable(space_name: &str, status: SpaceStatus) -> Result<(), CoreError> {
    if status != SpaceStatus::Open {
        return Err(CoreError::StateConflict(format!(
            "space '{space_name}' already locked (status: {status})"
        )));
    }
    Ok(())
}

/// Reject copying a space that is half-populated or failed.
///
/// A `Locked` space is a consistent source and may still be read.
pub fn ensure_copyable(space_name: &str, status: SpaceStatus) -> Result<(), CoreError> {
    if matches!(status, SpaceStatus::Copying | SpaceStatus::Failed) {
        return Err(CoreError::StateConflict(format!(
            "space '{space_name}' cannot be copied (status: {status})"
        )));
    }
    Ok(())
}

/// Reject a mutation unless the space accepts writes.
pub fn ensure_writable(space_name: &str, status: SpaceStatus) -> Result<(), CoreError> {
    if !status.is_writable() {
        return Err(CoreError::StateConflict(format!(
            "space '{space_name}' is not open for modification (status: {status})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for s in SpaceStatus::ALL {
            let parsed = SpaceStatus::from_str(s).unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert_eq!(SpaceStatus::from_str("archived"), None);
    }

    #[test]
    fn only_open_spaces_are_lockable() {
        assert!(ensure_lockable("s", SpaceStatus::Open).is_ok());
        for status in [SpaceStatus::Locked, SpaceStatus::Copying, SpaceStatus::Failed] {
            let err = ensure_lockable("s", status).unwrap_err();
            assert!(matches!(err, CoreError::StateConflict(_)));
        }
    }

    #[test]
    fn copying_and_failed_spaces_are_not_copyable() {
        assert!(ensure_copyable("s", SpaceStatus::Open).is_ok());
        assert!(ensure_copyable("s", SpaceStatus::Locked).is_ok());
        for status in [SpaceStatus::Copying, SpaceStatus::Failed] {
            let err = ensure_copyable("s", status).unwrap_err();
            assert!(matches!(err, CoreError::StateConflict(_)));
        }
    }

    #[test]
    fn failed_space_rejects_writes() {
        assert!(ensure_writable("s", SpaceStatus::Failed).is_err());
        assert!(ensure_writable("s", SpaceStatus::Open).is_ok());
    }
}
