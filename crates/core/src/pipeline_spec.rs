//! Pipeline spec model and the text codec behind it.
//!
//! Legacy cases are stored as pipeline text; scenes can be rendered back
//! into it. The engine only relies on the shape below
//! (`params`, `stages[].actions[]`, `outputs`) and goes through
//! [`PipelineSpecCodec`] for text conversion.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::step::{
    ApiPayload, ConfigSheetPayload, CustomScriptPayload, ScenePayload, StepKind, StepPayload,
    WaitPayload,
};
use crate::types::DbId;

/// Version written into generated specs.
pub const SPEC_VERSION: &str = "1.1";

/// Action type of an API call.
pub const ACTION_TYPE_API: &str = "api-test";

/// Action type of a script (also used to render wait steps).
pub const ACTION_TYPE_CUSTOM_SCRIPT: &str = "custom-script";

/// Action type of a nested scene or config sheet run.
pub const ACTION_TYPE_SNIPPET: &str = "snippet";

/// Snippet label naming the scope of the snippet target.
pub const LABEL_SNIPPET_SCOPE: &str = "snippet_scope";

/// Scope value marking a config-sheet snippet.
pub const SCOPE_CONFIG_SHEET: &str = "autotest-configsheet";

/// Snippet source for scenes and config sheets.
pub const SNIPPET_SOURCE: &str = "autotest";

/// Labels carried by snippets that run a scene.
pub const LABEL_SCENE_ID: &str = "scene_id";
pub const LABEL_SPACE_ID: &str = "space_id";

/// A wait rendered as a script: `sleep <n>s`.
static SLEEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sleep (\d+)s$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A parsed pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub alias: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_strategy: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_config: Option<SnippetConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetConfig {
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

impl PipelineSpec {
    /// Every action in declaration order, with its stage index.
    pub fn actions(&self) -> impl Iterator<Item = (usize, &ActionSpec)> {
        self.stages
            .iter()
            .enumerate()
            .flat_map(|(i, stage)| stage.actions.iter().map(move |a| (i, a)))
    }

    /// Targets of scene snippets, in declaration order.
    ///
    /// Config-sheet snippets are not included.
    pub fn snippet_targets(&self) -> Vec<&str> {
        self.actions()
            .filter_map(|(_, action)| match action.kind() {
                ActionKind::SceneSnippet { target } => Some(target),
                _ => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Action classification
// ---------------------------------------------------------------------------

/// The closed set of action shapes the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind<'a> {
    Api,
    CustomScript,
    Wait { secs: u64 },
    ConfigSheet { sheet_id: &'a str },
    SceneSnippet { target: &'a str },
}

impl ActionKind<'_> {
    pub fn step_kind(&self) -> StepKind {
        match self {
            Self::Api => StepKind::Api,
            Self::CustomScript => StepKind::CustomScript,
            Self::Wait { .. } => StepKind::Wait,
            Self::ConfigSheet { .. } => StepKind::ConfigSheet,
            Self::SceneSnippet { .. } => StepKind::Scene,
        }
    }
}

impl ActionSpec {
    /// Classify the action.
    ///
    /// Unknown action types are treated as scripts; a script that is a
    /// single `sleep <n>s` is a wait.
    pub fn kind(&self) -> ActionKind<'_> {
        match self.action_type.as_str() {
            ACTION_TYPE_API => ActionKind::Api,
            ACTION_TYPE_SNIPPET => match &self.snippet_config {
                Some(cfg)
                    if cfg.labels.get(LABEL_SNIPPET_SCOPE).map(String::as_str)
                        == Some(SCOPE_CONFIG_SHEET) =>
                {
                    ActionKind::ConfigSheet {
                        sheet_id: &cfg.name,
                    }
                }
                Some(cfg) => ActionKind::SceneSnippet { target: &cfg.name },
                None => ActionKind::SceneSnippet { target: "" },
            },
            _ => match self.commands.as_slice() {
                [only] => SLEEP_RE
                    .captures(only.trim())
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse().ok())
                    .map_or(ActionKind::CustomScript, |secs| ActionKind::Wait { secs }),
                _ => ActionKind::CustomScript,
            },
        }
    }

    /// Build the step payload for this action.
    ///
    /// `resolve_scene` maps a snippet target to the scene created for it;
    /// an unresolved target is kept as `legacy_target`.
    pub fn to_payload<F>(&self, space_id: DbId, resolve_scene: F) -> StepPayload
    where
        F: Fn(&str) -> Option<DbId>,
    {
        match self.kind() {
            ActionKind::Api => StepPayload::Api(ApiPayload {
                api_spec: serde_json::Value::Object(
                    self.params.clone().into_iter().collect(),
                ),
                loop_strategy: self.loop_strategy.clone(),
            }),
            ActionKind::CustomScript => StepPayload::CustomScript(CustomScriptPayload {
                commands: self.commands.clone(),
                image: self.image.clone(),
            }),
            ActionKind::Wait { secs } => StepPayload::Wait(WaitPayload {
                wait_time_secs: secs,
            }),
            ActionKind::ConfigSheet { sheet_id } => StepPayload::ConfigSheet(ConfigSheetPayload {
                config_sheet_id: sheet_id.to_string(),
                run_params: self.params.clone(),
            }),
            ActionKind::SceneSnippet { target } => {
                let scene_id = resolve_scene(target);
                StepPayload::Scene(ScenePayload {
                    scene_id,
                    space_id,
                    run_params: self.params.clone(),
                    legacy_target: match scene_id {
                        Some(_) => None,
                        None => Some(target.to_string()),
                    },
                })
            }
        }
    }

    /// Render a step payload as an action aliased by the step ID.
    pub fn from_payload(step_id: DbId, payload: &StepPayload) -> Self {
        let mut action = Self {
            alias: step_id.to_string(),
            ..Self::default()
        };
        match payload {
            StepPayload::Api(p) => {
                action.action_type = ACTION_TYPE_API.to_string();
                action.version = Some("2.0".to_string());
                if let serde_json::Value::Object(map) = &p.api_spec {
                    action.params = map.clone().into_iter().collect();
                }
                action.loop_strategy = p.loop_strategy.clone();
            }
            StepPayload::CustomScript(p) => {
                action.action_type = ACTION_TYPE_CUSTOM_SCRIPT.to_string();
                action.version = Some("1.0".to_string());
                action.commands = p.commands.clone();
                action.image = p.image.clone();
            }
            StepPayload::Wait(p) => {
                action.action_type = ACTION_TYPE_CUSTOM_SCRIPT.to_string();
                action.version = Some("1.0".to_string());
                action.commands = vec![format!("sleep {}s", p.wait_time_secs)];
            }
            StepPayload::ConfigSheet(p) => {
                action.action_type = ACTION_TYPE_SNIPPET.to_string();
                action.params = p.run_params.clone();
                action.snippet_config = Some(SnippetConfig {
                    name: p.config_sheet_id.clone(),
                    source: SNIPPET_SOURCE.to_string(),
                    labels: BTreeMap::from([(
                        LABEL_SNIPPET_SCOPE.to_string(),
                        SCOPE_CONFIG_SHEET.to_string(),
                    )]),
                });
            }
            StepPayload::Scene(p) => {
                action.action_type = ACTION_TYPE_SNIPPET.to_string();
                action.params = p.run_params.clone();
                let name = match (p.scene_id, &p.legacy_target) {
                    (Some(id), _) => id.to_string(),
                    (None, Some(target)) => target.clone(),
                    (None, None) => String::new(),
                };
                let mut labels = BTreeMap::from([(
                    LABEL_SPACE_ID.to_string(),
                    p.space_id.to_string(),
                )]);
                if let Some(id) = p.scene_id {
                    labels.insert(LABEL_SCENE_ID.to_string(), id.to_string());
                }
                action.snippet_config = Some(SnippetConfig {
                    name,
                    source: SNIPPET_SOURCE.to_string(),
                    labels,
                });
            }
        }
        action
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Converts pipeline text to and from [`PipelineSpec`].
pub trait PipelineSpecCodec: Send + Sync {
    fn parse(&self, text: &str) -> Result<PipelineSpec, CoreError>;
    fn generate(&self, spec: &PipelineSpec) -> Result<String, CoreError>;
}

/// YAML codec backed by `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlSpecCodec;

impl PipelineSpecCodec for YamlSpecCodec {
    fn parse(&self, text: &str) -> Result<PipelineSpec, CoreError> {
        serde_yaml::from_str(text).map_err(|e| CoreError::Parse(format!("invalid pipeline: {e}")))
    }

    fn generate(&self, spec: &PipelineSpec) -> Result<String, CoreError> {
        serde_yaml::to_string(spec)
            .map_err(|e| CoreError::Internal(format!("failed to generate pipeline: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LEGACY: &str = r#"
version: "1.1"
params:
  - name: user
    default: admin
stages:
  - actions:
      - alias: login
        type: api-test
        params:
          url: /login
          body: "${params.user}"
      - alias: pause
        type: custom-script
        commands: ["sleep 3s"]
  - actions:
      - alias: shared
        type: snippet
        snippet_config:
          name: case-common
          source: autotest
      - alias: sheet
        type: snippet
        snippet_config:
          name: "42"
          labels:
            snippet_scope: autotest-configsheet
outputs:
  - name: token
    ref: "${login:OUTPUT:token}"
"#;

    #[test]
    fn parses_stages_and_classifies_actions() {
        let spec = YamlSpecCodec.parse(LEGACY).unwrap();
        assert_eq!(spec.params[0].default, Some(json!("admin")));
        let kinds: Vec<ActionKind<'_>> = spec.actions().map(|(_, a)| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::Api,
                ActionKind::Wait { secs: 3 },
                ActionKind::SceneSnippet {
                    target: "case-common"
                },
                ActionKind::ConfigSheet { sheet_id: "42" },
            ]
        );
        assert_eq!(spec.outputs[0].reference, "${login:OUTPUT:token}");
    }

    #[test]
    fn config_sheets_are_not_snippet_targets() {
        let spec = YamlSpecCodec.parse(LEGACY).unwrap();
        assert_eq!(spec.snippet_targets(), vec!["case-common"]);
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let err = YamlSpecCodec.parse("stages: [[[").unwrap_err();
        assert!(matches!(err, CoreError::Parse(_)));
    }

    #[test]
    fn unresolved_snippet_keeps_legacy_target() {
        let spec = YamlSpecCodec.parse(LEGACY).unwrap();
        let (_, shared) = spec.actions().nth(2).unwrap();
        match shared.to_payload(9, |_| None) {
            StepPayload::Scene(p) => {
                assert_eq!(p.scene_id, None);
                assert_eq!(p.space_id, 9);
                assert_eq!(p.legacy_target.as_deref(), Some("case-common"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn wait_renders_as_sleep_script() {
        let action = ActionSpec::from_payload(
            5,
            &StepPayload::Wait(WaitPayload { wait_time_secs: 10 }),
        );
        assert_eq!(action.alias, "5");
        assert_eq!(action.commands, vec!["sleep 10s".to_string()]);
        assert_eq!(action.kind(), ActionKind::Wait { secs: 10 });
    }

    #[test]
    fn generated_text_parses_back() {
        let action = ActionSpec::from_payload(
            7,
            &StepPayload::Scene(ScenePayload {
                scene_id: Some(3),
                space_id: 1,
                run_params: BTreeMap::new(),
                legacy_target: None,
            }),
        );
        let spec = PipelineSpec {
            version: SPEC_VERSION.to_string(),
            stages: vec![StageSpec {
                actions: vec![action],
            }],
            ..PipelineSpec::default()
        };
        let text = YamlSpecCodec.generate(&spec).unwrap();
        let parsed = YamlSpecCodec.parse(&text).unwrap();
        assert_eq!(parsed, spec);
        assert_eq!(parsed.snippet_targets(), vec!["3"]);
    }
}
