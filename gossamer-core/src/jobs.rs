use crate::config::{Config, JobKind, SourceConfig};
use crate::storage::FsStore;
use anyhow::{Context, Result};
use gossamer_spider::archive::{ArchiveOptions, PageArchiver, ProgressCallback, deepest_tier};
use gossamer_spider::client::FetchClient;
use gossamer_spider::extract::{self, ImageHit};
use gossamer_spider::select;
use gossamer_spider::store::ArtifactStore;
use gossamer_spider::urls;
use gossamer_spider::walk::{DepthTarget, LinkWalker};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runs every configured job, optionally restricted to one named source.
/// A failing source is logged and skipped so the remaining sources still
/// run, the same best-effort contract the engine applies per target.
pub async fn run_config(
    config: &Config,
    only_source: Option<&str>,
    show_progress: bool,
) -> Result<()> {
    for (kind, job) in &config.crawler {
        info!("Running crawler job: {}", kind.as_str());
        for (source_name, source) in &job.sources {
            if let Some(only) = only_source
                && only != source_name
            {
                continue;
            }
            info!("Running {} on {}", kind.as_str(), source_name);
            if let Err(e) = run_source(*kind, source_name, source, show_progress).await {
                error!("Source {} failed: {:#}", source_name, e);
            }
        }
    }
    Ok(())
}

pub async fn run_source(
    kind: JobKind,
    source_name: &str,
    source: &SourceConfig,
    show_progress: bool,
) -> Result<()> {
    let mut client = FetchClient::with_timeout(source.timeout_secs);
    if let Some(user_agent) = &source.user_agent {
        client = client.with_user_agent(user_agent.clone());
    }
    match kind {
        JobKind::UrlExtractor => run_url_extraction(&client, source_name, source).await,
        JobKind::HtmlCrawler => run_page_archive(client, source_name, source, show_progress).await,
        JobKind::ImageExtractor => run_image_extraction(&client, source_name, source).await,
        JobKind::TextExtractor => run_text_extraction(&client, source_name, source).await,
    }
}

async fn run_url_extraction(
    client: &FetchClient,
    source_name: &str,
    source: &SourceConfig,
) -> Result<()> {
    let targets: Vec<DepthTarget> = source
        .targets
        .iter()
        .map(|target| DepthTarget {
            url: source.target_url(target).to_string(),
            selector: target.selector.clone(),
            params: target.params.clone(),
        })
        .collect();

    let store = FsStore::new(&source.output_dir, source_name);
    let walker = LinkWalker::new(client).with_fetch_concurrency(source.concurrency_limit);
    let frontier = walker.run(&targets, &store).await?;
    info!(
        "Walk of {} finished with {} URLs at the final depth",
        source_name,
        frontier.len()
    );
    Ok(())
}

async fn run_page_archive(
    client: FetchClient,
    source_name: &str,
    source: &SourceConfig,
    show_progress: bool,
) -> Result<()> {
    let client = Arc::new(client);
    let store = Arc::new(FsStore::new(&source.output_dir, source_name));

    for target in &source.targets {
        let input_file = target
            .input_file
            .as_ref()
            .with_context(|| format!("a target in source {} is missing input_file", source_name))?;
        let records = FsStore::load_records(input_file)
            .with_context(|| format!("loading URL records from {}", input_file.display()))?;
        let tier = deepest_tier(&records);
        if tier.is_empty() {
            warn!("No URL records found in {}", input_file.display());
            continue;
        }

        let options = ArchiveOptions {
            selector: Some(target.selector.clone()),
            key_param: target.file_key.clone(),
            concurrency_limit: source.concurrency_limit,
            resumable: target.resumable,
            clean: source.clean_options(),
        };

        // Progress spinner for overall archive progress (only if enabled)
        let bar = if show_progress {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap(),
            );
            bar.set_message("Archiving...");
            Some(bar)
        } else {
            None
        };

        let mut archiver = PageArchiver::new(Arc::clone(&client), options);
        if let Some(bar) = &bar {
            let bar_clone = bar.clone();
            let callback: ProgressCallback = Arc::new(move |done, url| {
                bar_clone.set_message(format!("Archived {} pages, last: {}", done, url));
                bar_clone.tick();
            });
            archiver = archiver.with_progress_callback(callback);
        }
        let manifest = archiver
            .run(&tier, Arc::clone(&store) as Arc<dyn ArtifactStore>)
            .await?;
        if let Some(bar) = bar {
            bar.finish_with_message(format!("Archived {} pages", manifest.len()));
        }

        let manifest_name = format!("{}_manifest", source_name);
        store.save_json(&manifest_name, &manifest)?;
        info!(
            "Wrote archive manifest with {} entries for {}",
            manifest.len(),
            source_name
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ImageRecord {
    url: String,
    alt: String,
    filename: String,
    source_url: String,
    depth: usize,
}

#[derive(Debug, Serialize)]
struct TextRecord {
    id: String,
    text: String,
    attributes: std::collections::BTreeMap<String, String>,
    element_type: String,
    source_url: String,
    depth: usize,
}

async fn run_image_extraction(
    client: &FetchClient,
    source_name: &str,
    source: &SourceConfig,
) -> Result<()> {
    let store = FsStore::new(&source.output_dir, source_name);
    let mut records: Vec<ImageRecord> = Vec::new();

    for (depth, target) in source.targets.iter().enumerate() {
        let url = urls::parse_url(source.target_url(target))?;
        let selector = select::parse_selector(&target.selector)?;
        let body = match client.fetch(url.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to fetch {}: {}", url, e);
                continue;
            }
        };

        let images = extract::extract_images(&body, &selector, &url);
        info!("Found {} images on {}", images.len(), url);
        for image in images {
            if target.save_images {
                download_image(client, &store, &image).await;
            }
            records.push(ImageRecord {
                url: image.url,
                alt: image.alt,
                filename: image.filename,
                source_url: url.to_string(),
                depth,
            });
        }
    }

    store.save_json(source_name, &records)?;
    info!("Saved {} image records for {}", records.len(), source_name);
    Ok(())
}

async fn download_image(client: &FetchClient, store: &FsStore, image: &ImageHit) {
    if store.has_file(&image.filename) {
        debug!("Image already exists: {}", image.filename);
        return;
    }
    match client.fetch_bytes(&image.url).await {
        Ok(bytes) => match store.put_file(&image.filename, &bytes) {
            Ok(path) => debug!("Saved image to {}", path.display()),
            Err(e) => error!("Failed to save image {}: {}", image.url, e),
        },
        Err(e) => warn!("Failed to download image {}: {}", image.url, e),
    }
}

async fn run_text_extraction(
    client: &FetchClient,
    source_name: &str,
    source: &SourceConfig,
) -> Result<()> {
    let store = FsStore::new(&source.output_dir, source_name);
    let mut records: Vec<TextRecord> = Vec::new();

    for (depth, target) in source.targets.iter().enumerate() {
        let url = urls::parse_url(source.target_url(target))?;
        let selector = select::parse_selector(&target.selector)?;
        let body = match client.fetch(url.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to fetch {}: {}", url, e);
                continue;
            }
        };

        let texts = extract::extract_text(&body, &selector);
        info!("Found {} text blocks on {}", texts.len(), url);
        for text in texts {
            records.push(TextRecord {
                id: text.id,
                text: text.text,
                attributes: text.attributes,
                element_type: text.element_type,
                source_url: url.to_string(),
                depth,
            });
        }
    }

    store.save_json(source_name, &records)?;
    info!("Saved {} text records for {}", records.len(), source_name);
    Ok(())
}
