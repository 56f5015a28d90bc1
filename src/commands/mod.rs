//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Create or update a jail tree
//! - `plan` - Show the expanded execution plan
//! - `deps` - List shared-library dependencies

pub mod build;
pub mod deps;
pub mod plan;

pub use build::cmd_build;
pub use deps::cmd_deps;
pub use plan::cmd_plan;
