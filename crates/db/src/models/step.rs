//! Scene step models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scenegraph_core::chain::{Chained, ChainedStep};
use scenegraph_core::error::CoreError;
use scenegraph_core::step::{PreType, StepKind, StepPayload};
use scenegraph_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `scene_steps` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Step {
    pub id: DbId,
    pub space_id: DbId,
    pub scene_id: DbId,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub kind: StepKind,
    /// Serialized [`StepPayload`]; empty while the step is a placeholder.
    pub value: String,
    pub pre_id: DbId,
    #[sqlx(try_from = "String")]
    pub pre_type: PreType,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Step {
    /// Decode the typed payload. Returns `None` for an empty value.
    pub fn payload(&self) -> Result<Option<StepPayload>, CoreError> {
        if self.value.is_empty() {
            return Ok(None);
        }
        StepPayload::decode(self.kind, &self.value).map(Some)
    }
}

impl Chained for Step {
    fn id(&self) -> DbId {
        self.id
    }

    fn pre_id(&self) -> DbId {
        self.pre_id
    }
}

impl ChainedStep for Step {
    fn pre_type(&self) -> PreType {
        self.pre_type
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a new step.
#[derive(Debug, Clone)]
pub struct CreateStep {
    pub space_id: DbId,
    pub scene_id: DbId,
    pub name: String,
    pub kind: StepKind,
    pub value: String,
    pub pre_id: DbId,
    pub pre_type: PreType,
}
