//! Domain logic of the test-scene graph: identifiers, limits, naming,
//! sibling chains, ID remapping, placeholder rewriting, step payloads and
//! the pipeline spec model. No I/O lives here.

pub mod chain;
pub mod error;
pub mod expression;
pub mod legacy;
pub mod limits;
pub mod naming;
pub mod pipeline_spec;
pub mod remap;
pub mod space;
pub mod step;
pub mod types;
