pub mod deployment;
pub mod http;
pub mod logging;
pub mod module;
pub mod settings;

pub use settings::{Args, Settings};

pub const BUILD_INFO_VERSION: &str = env!("CARGO_PKG_VERSION");
