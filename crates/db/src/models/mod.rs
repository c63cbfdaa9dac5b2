//! Row structs and create DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts

pub mod legacy_case;
pub mod scene;
pub mod scene_io;
pub mod scene_set;
pub mod space;
pub mod step;
