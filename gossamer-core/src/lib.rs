pub mod config;
pub mod jobs;
pub mod storage;

pub use config::{Config, JobKind, SourceConfig, TargetConfig, load_config};
pub use storage::FsStore;
