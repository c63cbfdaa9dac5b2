//! Rendering a scene back into pipeline text.

use scenegraph_core::pipeline_spec::{
    ActionSpec, OutputSpec, ParamSpec, PipelineSpec, PipelineSpecCodec, StageSpec, SPEC_VERSION,
};
use scenegraph_core::types::DbId;

use crate::error::EngineError;
use crate::graph::SceneGraph;

/// Build the pipeline of a scene.
///
/// Each serial step and its parallel steps form one stage. Steps without a
/// value are skipped and a stage left empty is omitted. Inputs become
/// params, with their value as the default when set.
pub async fn scene_spec(graph: &SceneGraph, scene_id: DbId) -> Result<PipelineSpec, EngineError> {
    graph.scene(scene_id).await?;
    let store = graph.store();

    let mut stages = Vec::new();
    for group in graph.step_groups(scene_id).await? {
        let mut actions = Vec::new();
        for step in std::iter::once(&group.head).chain(&group.children) {
            if let Some(payload) = step.payload()? {
                actions.push(ActionSpec::from_payload(step.id, &payload));
            }
        }
        if !actions.is_empty() {
            stages.push(StageSpec { actions });
        }
    }

    let params = store
        .list_inputs_by_scene(scene_id)
        .await?
        .into_iter()
        .map(|input| ParamSpec {
            default: (!input.value.is_empty()).then(|| serde_json::Value::String(input.value)),
            name: input.name,
            desc: input.description,
        })
        .collect();

    let outputs = store
        .list_outputs_by_scene(scene_id)
        .await?
        .into_iter()
        .map(|output| OutputSpec {
            name: output.name,
            reference: output.value,
            desc: output.description,
        })
        .collect();

    Ok(PipelineSpec {
        version: SPEC_VERSION.to_string(),
        params,
        stages,
        outputs,
    })
}

/// Render a scene as pipeline text.
pub async fn render_scene(
    graph: &SceneGraph,
    codec: &dyn PipelineSpecCodec,
    scene_id: DbId,
) -> Result<String, EngineError> {
    let spec = scene_spec(graph, scene_id).await?;
    tracing::debug!(scene_id, stages = spec.stages.len(), "Rendering scene");
    Ok(codec.generate(&spec)?)
}
