mod build;
mod project;
mod validate;

pub use build::cmd_build;
pub use project::ProjectArgs;
pub use validate::cmd_validate;
