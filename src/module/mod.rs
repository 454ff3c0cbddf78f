//! Update-module discovery, file-tree materialization, and phase invocation
//! (C4/C5/C6).
pub mod discovery;
pub mod driver;
pub mod file_tree;
pub mod phases;

pub use discovery::discover_modules;
