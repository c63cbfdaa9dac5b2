//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod legacy_case_repo;
pub mod scene_io_repo;
pub mod scene_repo;
pub mod scene_set_repo;
pub mod space_repo;
pub mod step_repo;

pub use legacy_case_repo::LegacyCaseRepo;
pub use scene_io_repo::{InputRepo, OutputRepo};
pub use scene_repo::SceneRepo;
pub use scene_set_repo::SceneSetRepo;
pub use space_repo::SpaceRepo;
pub use step_repo::StepRepo;
