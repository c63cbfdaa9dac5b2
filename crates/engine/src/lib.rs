//! Scene graph engine: limit-checked graph mutations, whole-space copies,
//! the legacy case migration and pipeline rendering.

pub mod config;
pub mod copy;
pub mod error;
pub mod graph;
pub mod migration;
pub mod render;

pub use config::EngineConfig;
pub use copy::snapshot::SpaceSnapshot;
pub use copy::{CopyEngine, CopyHandle, CopyPhase, CopyProgress, CopyReport, UnresolvedRef};
pub use error::EngineError;
pub use graph::{SceneGraph, StepPlacement};
pub use migration::{MigrationReport, Migrator};
pub use render::{render_scene, scene_spec};
