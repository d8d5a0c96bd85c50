// ABOUTME: Command implementations behind each CLI subcommand
// ABOUTME: Exports copy, restore, export/import, commit, publish-file, and update-env

pub mod archive;
pub mod copy;
pub mod env;
pub mod git;
pub mod publish;
pub mod restore;

pub use archive::{export, import};
pub use copy::copy;
pub use env::update_env;
pub use git::commit;
pub use publish::publish_file;
pub use restore::restore;
