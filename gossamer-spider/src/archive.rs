use crate::clean::{self, CleanOptions};
use crate::client::FetchClient;
use crate::error::{Result, SpiderError};
use crate::select;
use crate::store::ArtifactStore;
use crate::urls;
use crate::walk::UrlRecord;
use futures::stream::{FuturesUnordered, StreamExt};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Completed-so-far counter plus the URL that just finished. Notification
/// order is not a contract; only the returned manifest is authoritative.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Selector handed to the normalizer for every page.
    pub selector: Option<String>,
    /// Query parameter whose value names the stored artifact.
    pub key_param: Option<String>,
    /// Hard ceiling on targets in flight at any instant.
    pub concurrency_limit: usize,
    /// Skip targets whose artifact already exists in the store.
    pub resumable: bool,
    pub clean: CleanOptions,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            selector: None,
            key_param: None,
            concurrency_limit: 20,
            resumable: false,
            clean: CleanOptions::default(),
        }
    }
}

/// One successfully archived page. Failed targets are simply absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub url: String,
    pub storage_key: String,
}

/// Keeps only the records of the deepest tier present in a traversal
/// manifest; the pipeline runs downstream of the walker and archives the
/// leaves.
pub fn deepest_tier(records: &[UrlRecord]) -> Vec<UrlRecord> {
    let Some(max_depth) = records.iter().map(|r| r.depth).max() else {
        return Vec::new();
    };
    records
        .iter()
        .filter(|r| r.depth == max_depth)
        .cloned()
        .collect()
}

/// Fetch/normalize/persist over a flat set of independent targets, bounded
/// by a counting admission gate. One target's failure never aborts the
/// rest.
pub struct PageArchiver {
    client: Arc<FetchClient>,
    options: ArchiveOptions,
    progress_callback: Option<ProgressCallback>,
}

impl PageArchiver {
    pub fn new(client: Arc<FetchClient>, options: ArchiveOptions) -> Self {
        Self {
            client,
            options,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Archives every target, returning manifest entries in completion
    /// order. Targets whose artifact already exists are skipped outright
    /// when resumability is on: no fetch, no failure, no new entry.
    pub async fn run(
        &self,
        targets: &[UrlRecord],
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Vec<ArchiveEntry>> {
        let selector = match &self.options.selector {
            Some(expression) => Some(Arc::new(select::parse_selector(expression)?)),
            None => None,
        };

        let mut pending: Vec<(String, String)> = Vec::new();
        for record in targets {
            let url = urls::trimmed_url(&record.url);
            let key = urls::storage_key(&url, self.options.key_param.as_deref());
            if self.options.resumable && store.contains(&key) {
                debug!("Already archived, skipping {}", url);
                continue;
            }
            pending.push((url, key));
        }
        if pending.is_empty() {
            info!("Nothing left to archive");
            return Ok(Vec::new());
        }

        info!(
            "Archiving {} pages with at most {} in flight",
            pending.len(),
            self.options.concurrency_limit
        );
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency_limit.max(1)));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut tasks = FuturesUnordered::new();
        for (url, key) in pending {
            let client = Arc::clone(&self.client);
            let store = Arc::clone(&store);
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let selector = selector.clone();
            let clean_options = self.options.clean.clone();
            let progress = self.progress_callback.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("admission gate closed");
                let outcome =
                    archive_one(&client, store.as_ref(), &url, &key, selector.as_deref(), &clean_options).await;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(callback) = progress {
                    callback(done, url.clone());
                }
                match outcome {
                    Ok(entry) => Some(entry),
                    Err(e @ SpiderError::Persistence(_)) => {
                        error!("Failed to persist {}: {}", url, e);
                        None
                    }
                    Err(e) => {
                        warn!("Failed to archive {}: {}", url, e);
                        None
                    }
                }
            }));
        }

        let mut manifest = Vec::new();
        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(Some(entry)) => manifest.push(entry),
                Ok(None) => {}
                Err(e) => warn!("Archive task failed: {}", e),
            }
        }
        Ok(manifest)
    }
}

async fn archive_one(
    client: &FetchClient,
    store: &dyn ArtifactStore,
    url: &str,
    key: &str,
    selector: Option<&Selector>,
    clean_options: &CleanOptions,
) -> Result<ArchiveEntry> {
    let body = client.fetch(url).await?;
    let cleaned = clean::clean_html(&body, selector, clean_options);
    let path = store.put(key, &cleaned)?;
    debug!("Archived {} to {}", url, path.display());
    Ok(ArchiveEntry {
        url: url.to_string(),
        storage_key: key.to_string(),
    })
}
