//! Pluggable engine architecture: browsing, authorization and the workspace

pub mod authorizer;
pub mod builder;
pub mod memory;
pub mod traits;

pub use authorizer::SimpleAuthorizer;
pub use builder::{Workspace, WorkspaceBuilder};
pub use memory::MemoryBrowser;
pub use traits::{Authorizer, Browser, Identity};
