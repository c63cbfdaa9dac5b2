//! Scene step kinds, chain positions, and typed step payloads.
//!
//! A step row stores its kind as a short string and its payload as opaque
//! JSON text. [`StepPayload`] is the closed set of payload shapes, one per
//! [`StepKind`], so every consumer matches exhaustively on the kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Step kind
// ---------------------------------------------------------------------------

/// What a step does when its scene runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// An HTTP API call.
    Api,
    /// A user-provided script run in a container image.
    CustomScript,
    /// A fixed delay.
    Wait,
    /// A reference to a shared configuration sheet.
    ConfigSheet,
    /// A nested run of another scene.
    Scene,
}

impl StepKind {
    /// Return the kind name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::CustomScript => "custom_script",
            Self::Wait => "wait",
            Self::ConfigSheet => "config_sheet",
            Self::Scene => "scene",
        }
    }

    /// Parse a kind string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "api" => Some(Self::Api),
            "custom_script" => Some(Self::CustomScript),
            "wait" => Some(Self::Wait),
            "config_sheet" => Some(Self::ConfigSheet),
            "scene" => Some(Self::Scene),
            _ => None,
        }
    }

    /// All valid kind values.
    pub const ALL: &'static [&'static str] =
        &["api", "custom_script", "wait", "config_sheet", "scene"];
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for StepKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
            .ok_or_else(|| CoreError::Parse(format!("unknown step kind '{value}'")))
    }
}

// ---------------------------------------------------------------------------
// Chain position
// ---------------------------------------------------------------------------

/// How a step hangs off its `pre_id`.
///
/// `Serial` steps form the top-level sequence of a scene. A `Parallel`
/// step runs alongside the serial step at the head of its sub-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreType {
    Serial,
    Parallel,
}

impl PreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "serial" => Some(Self::Serial),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }
}

impl std::fmt::Display for PreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PreType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
            .ok_or_else(|| CoreError::Parse(format!("unknown pre type '{value}'")))
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of an [`StepKind::Api`] step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPayload {
    /// The request definition (method, url, headers, body, asserts, outputs).
    pub api_spec: serde_json::Value,
    /// Optional retry loop strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_strategy: Option<serde_json::Value>,
}

/// Payload of a [`StepKind::CustomScript`] step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomScriptPayload {
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Payload of a [`StepKind::Wait`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPayload {
    pub wait_time_secs: u64,
}

/// Payload of a [`StepKind::ConfigSheet`] step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSheetPayload {
    pub config_sheet_id: String,
    #[serde(default)]
    pub run_params: BTreeMap<String, serde_json::Value>,
}

/// Payload of a [`StepKind::Scene`] step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePayload {
    /// The scene to run; `None` while the target is not known yet.
    pub scene_id: Option<DbId>,
    pub space_id: DbId,
    #[serde(default)]
    pub run_params: BTreeMap<String, serde_json::Value>,
    /// Legacy identifier of the target, kept until it resolves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_target: Option<String>,
}

/// A typed step payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StepPayload {
    Api(ApiPayload),
    CustomScript(CustomScriptPayload),
    Wait(WaitPayload),
    ConfigSheet(ConfigSheetPayload),
    Scene(ScenePayload),
}

impl StepPayload {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Api(_) => StepKind::Api,
            Self::CustomScript(_) => StepKind::CustomScript,
            Self::Wait(_) => StepKind::Wait,
            Self::ConfigSheet(_) => StepKind::ConfigSheet,
            Self::Scene(_) => StepKind::Scene,
        }
    }

    /// Decode the stored value text of a step of the given kind.
    pub fn decode(kind: StepKind, value: &str) -> Result<Self, CoreError> {
        let parsed = match kind {
            StepKind::Api => serde_json::from_str(value).map(Self::Api),
            StepKind::CustomScript => serde_json::from_str(value).map(Self::CustomScript),
            StepKind::Wait => serde_json::from_str(value).map(Self::Wait),
            StepKind::ConfigSheet => serde_json::from_str(value).map(Self::ConfigSheet),
            StepKind::Scene => serde_json::from_str(value).map(Self::Scene),
        };
        parsed.map_err(|e| CoreError::Parse(format!("invalid {kind} step value: {e}")))
    }

    /// Encode into the value text stored on the step row.
    pub fn encode(&self) -> Result<String, CoreError> {
        let encoded = match self {
            Self::Api(p) => serde_json::to_string(p),
            Self::CustomScript(p) => serde_json::to_string(p),
            Self::Wait(p) => serde_json::to_string(p),
            Self::ConfigSheet(p) => serde_json::to_string(p),
            Self::Scene(p) => serde_json::to_string(p),
        };
        encoded.map_err(|e| CoreError::Internal(format!("failed to encode step value: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
