use anyhow::{Context, Result, bail};
use gossamer_spider::clean::{CleanOptions, OutputMode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Top-level configuration file. Unknown keys are rejected everywhere so a
/// typo in the config fails loudly instead of silently doing nothing.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub crawler: BTreeMap<JobKind, JobConfig>,
}

/// The crawler behaviors a job can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    UrlExtractor,
    HtmlCrawler,
    ImageExtractor,
    TextExtractor,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::UrlExtractor => "url_extractor",
            JobKind::HtmlCrawler => "html_crawler",
            JobKind::ImageExtractor => "image_extractor",
            JobKind::TextExtractor => "text_extractor",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub sources: BTreeMap<String, SourceConfig>,
}

/// One site to run a job against.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub base_url: String,
    /// Where manifests and artifacts for this source land.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    /// Pinned identity header; a random one is rotated in when unset.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Ceiling on concurrent fetches.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Serialization mode for cleaned documents.
    #[serde(default = "default_format")]
    pub format: OutputMode,
    /// Drop script/style/stylesheet elements while cleaning.
    #[serde(default = "default_strip_assets")]
    pub strip_assets: bool,
}

/// One unit of configured work inside a source. For the URL extractor a
/// target describes a depth level; for the other jobs, one flat page or
/// one input manifest.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Falls back to the source's base_url when unset.
    #[serde(default)]
    pub url: Option<String>,
    pub selector: String,
    /// Query parameters forced onto every URL at this depth.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Traversal manifest to archive (html_crawler only).
    #[serde(default)]
    pub input_file: Option<PathBuf>,
    /// Query parameter whose value names stored artifacts.
    #[serde(default)]
    pub file_key: Option<String>,
    /// Skip pages whose artifact already exists.
    #[serde(default)]
    pub resumable: bool,
    /// Download discovered images (image_extractor only).
    #[serde(default = "default_save_images")]
    pub save_images: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_concurrency_limit() -> usize {
    20
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_format() -> OutputMode {
    OutputMode::Pretty
}

fn default_strip_assets() -> bool {
    true
}

fn default_save_images() -> bool {
    true
}

impl SourceConfig {
    pub fn target_url<'a>(&'a self, target: &'a TargetConfig) -> &'a str {
        target.url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            strip_assets: self.strip_assets,
            mode: self.format,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.crawler.is_empty() {
            bail!("no crawler jobs configured");
        }
        for (kind, job) in &self.crawler {
            if job.sources.is_empty() {
                bail!("job {} has no sources", kind.as_str());
            }
            for (name, source) in &job.sources {
                Url::parse(&source.base_url)
                    .with_context(|| format!("source {} has an invalid base_url", name))?;
                if source.targets.is_empty() {
                    bail!("source {} has no targets", name);
                }
                for target in &source.targets {
                    if let Some(url) = &target.url {
                        Url::parse(url).with_context(|| {
                            format!("source {} has an invalid target url {}", name, url)
                        })?;
                    }
                }
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading configuration from {}", path.display()))?;
    let config: Config =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
