//! Per-scope size ceilings for the scene graph.
//!
//! Every ceiling is checked before the insert it guards, so a rejected
//! create never leaves a row behind.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum number of scenes in one scene set.
pub const MAX_SCENES_PER_SET: usize = 500;

/// Maximum number of scenes in one space.
pub const MAX_SCENES_PER_SPACE: usize = 50_000;

/// Maximum number of scene sets in one space.
pub const MAX_SCENE_SETS_PER_SPACE: usize = 200;

/// Maximum number of steps (serial and parallel) in one scene.
pub const MAX_STEPS_PER_SCENE: usize = 100;

/// Maximum number of steps in one space.
pub const MAX_STEPS_PER_SPACE: usize = 100_000;

/// Maximum length of a scene-set reference path (scene -> referenced set -> ...).
pub const MAX_REF_SET_DEPTH: usize = 10;

// ---------------------------------------------------------------------------
// Insert guards
// ---------------------------------------------------------------------------

/// Fail when `current` entities already fill a scope of size `limit`.
fn ensure_room(current: usize, limit: usize, scope: &'static str) -> Result<(), CoreError> {
    if current >= limit {
        return Err(CoreError::LimitExceeded { scope, limit });
    }
    Ok(())
}

/// Validate that one more scene fits into a scene set holding `current`.
pub fn validate_scene_count_in_set(current: usize) -> Result<(), CoreError> {
    ensure_room(current, MAX_SCENES_PER_SET, "scenes per scene set")
}

/// Validate that one more scene fits into a space holding `current`.
pub fn validate_scene_count_in_space(current: usize) -> Result<(), CoreError> {
    ensure_room(current, MAX_SCENES_PER_SPACE, "scenes per space")
}

/// Validate that one more scene set fits into a space holding `current`.
pub fn validate_scene_set_count(current: usize) -> Result<(), CoreError> {
    ensure_room(current, MAX_SCENE_SETS_PER_SPACE, "scene sets per space")
}

/// Validate that one more step fits into a scene holding `current`.
pub fn validate_step_count_in_scene(current: usize) -> Result<(), CoreError> {
    ensure_room(current, MAX_STEPS_PER_SCENE, "steps per scene")
}

/// Validate that one more step fits into a space holding `current`.
pub fn validate_step_count_in_space(current: usize) -> Result<(), CoreError> {
    ensure_room(current, MAX_STEPS_PER_SPACE, "steps per space")
}

// ---------------------------------------------------------------------------
// Copy precheck
// ---------------------------------------------------------------------------

/// Entity counts of a source graph, gathered before a copy starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphCounts {
    /// Scene count of every scene set in the source.
    pub scenes_per_set: Vec<usize>,
    /// Step count of every scene in the source.
    pub steps_per_scene: Vec<usize>,
}

impl GraphCounts {
    pub fn total_scenes(&self) -> usize {
        self.scenes_per_set.iter().sum()
    }

    pub fn total_steps(&self) -> usize {
        self.steps_per_scene.iter().sum()
    }
}

/// Reject a copy whose destination would exceed any ceiling.
///
/// Runs before any mutation: no lock is taken and no space is created
/// when this fails.
pub fn precheck_copy(counts: &GraphCounts) -> Result<(), CoreError> {
    if counts.scenes_per_set.len() > MAX_SCENE_SETS_PER_SPACE {
        return Err(CoreError::LimitExceeded {
            scope: "scene sets per space",
            limit: MAX_SCENE_SETS_PER_SPACE,
        });
    }
    if counts.scenes_per_set.iter().any(|&n| n > MAX_SCENES_PER_SET) {
        return Err(CoreError::LimitExceeded {
            scope: "scenes per scene set",
            limit: MAX_SCENES_PER_SET,
        });
    }
    if counts.total_scenes() > MAX_SCENES_PER_SPACE {
        return Err(CoreError::LimitExceeded {
            scope: "scenes per space",
            limit: MAX_SCENES_PER_SPACE,
        });
    }
    if counts.steps_per_scene.iter().any(|&n| n > MAX_STEPS_PER_SCENE) {
        return Err(CoreError::LimitExceeded {
            scope: "steps per scene",
            limit: MAX_STEPS_PER_SCENE,
        });
    }
    if counts.total_steps() > MAX_STEPS_PER_SPACE {
        return Err(CoreError::LimitExceeded {
            scope: "steps per space",
            limit: MAX_STEPS_PER_SPACE,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
