pub mod archive;
pub mod clean;
pub mod client;
pub mod error;
pub mod extract;
pub mod select;
pub mod store;
pub mod urls;
pub mod walk;

pub use archive::{ArchiveEntry, ArchiveOptions, PageArchiver};
pub use clean::{CleanOptions, OutputMode, clean_html};
pub use client::FetchClient;
pub use error::SpiderError;
pub use store::{ArtifactStore, RecordSink};
pub use walk::{DepthTarget, FrontierNode, LinkWalker, UrlRecord};
