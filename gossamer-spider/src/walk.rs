use crate::client::FetchClient;
use crate::error::Result;
use crate::select;
use crate::store::RecordSink;
use crate::urls;
use futures::StreamExt;
use futures::stream;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// What to do at one depth level: where the walk starts (level zero only),
/// which anchors to follow, and which query parameters to force onto every
/// discovered URL.
#[derive(Debug, Clone)]
pub struct DepthTarget {
    pub url: String,
    pub selector: String,
    pub params: BTreeMap<String, String>,
}

/// A discovered-but-not-yet-expanded page. `path` is the slash-joined
/// trail of anchor texts from the root, kept as human-readable provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierNode {
    pub url: String,
    pub anchor_text: String,
    pub path: String,
}

/// One row of the persisted traversal manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub depth: usize,
    pub url: String,
    pub path: String,
}

/// Depth-bounded link discovery. One `DepthTarget` per level; all nodes of
/// a level finish before the next level starts, and within a level fetches
/// run concurrently with results folded back in node order, so first-seen
/// ties are deterministic.
pub struct LinkWalker<'a> {
    client: &'a FetchClient,
    fetch_concurrency: usize,
}

impl<'a> LinkWalker<'a> {
    pub fn new(client: &'a FetchClient) -> Self {
        Self {
            client,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_fetch_concurrency(mut self, limit: usize) -> Self {
        self.fetch_concurrency = limit.max(1);
        self
    }

    /// Walks every configured depth level, persists the accumulated
    /// records through `sink`, and returns only the FINAL level's
    /// frontier. Intermediate levels are available solely through the
    /// sink; callers chaining further work read them back from there.
    pub async fn run(
        &self,
        targets: &[DepthTarget],
        sink: &dyn RecordSink,
    ) -> Result<Vec<FrontierNode>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let root = urls::parse_url(&targets[0].url)?;
        let root = urls::merge_params(&root, &targets[0].params);
        let mut frontier = vec![FrontierNode {
            url: root.to_string(),
            anchor_text: String::new(),
            path: String::new(),
        }];

        let mut records: Vec<UrlRecord> = Vec::new();
        for (depth, target) in targets.iter().enumerate() {
            let selector = select::parse_selector(&target.selector)?;
            info!(
                "Expanding depth {}/{} from {} nodes",
                depth + 1,
                targets.len(),
                frontier.len()
            );

            let next = self
                .expand_level(&frontier, &selector, &target.params)
                .await;
            for node in &next {
                records.push(UrlRecord {
                    depth,
                    url: node.url.clone(),
                    path: node.path.clone(),
                });
            }
            info!("Found {} URLs to process at the next depth", next.len());

            frontier = next;
            if frontier.is_empty() {
                debug!("Frontier drained at depth {}, stopping early", depth + 1);
                break;
            }
        }

        sink.persist_records(&records)?;
        Ok(frontier)
    }

    /// Expands one depth level. A node whose fetch fails is logged and
    /// contributes nothing; it never aborts the level. Children are
    /// deduplicated by absolute URL within this level only, first
    /// occurrence winning.
    async fn expand_level(
        &self,
        frontier: &[FrontierNode],
        selector: &Selector,
        params: &BTreeMap<String, String>,
    ) -> Vec<FrontierNode> {
        let pages = stream::iter(frontier.iter().map(|node| async move {
            match self.client.fetch(&node.url).await {
                Ok(body) => Some((node, body)),
                Err(e) => {
                    warn!("Skipping {}: {}", node.url, e);
                    None
                }
            }
        }))
        .buffered(self.fetch_concurrency)
        .collect::<Vec<_>>()
        .await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut next = Vec::new();
        for (node, body) in pages.into_iter().flatten() {
            let Ok(base) = Url::parse(&node.url) else {
                continue;
            };
            for anchor in select::extract_anchors(&body, selector) {
                let Ok(resolved) = base.join(&anchor.href) else {
                    debug!("Unresolvable href {:?} on {}", anchor.href, node.url);
                    continue;
                };
                let child_url = urls::merge_params(&resolved, params).to_string();
                if seen.insert(child_url.clone()) {
                    let path = child_path(&node.path, &anchor.text);
                    next.push(FrontierNode {
                        url: child_url,
                        anchor_text: anchor.text,
                        path,
                    });
                }
            }
        }
        next
    }
}

fn child_path(parent_path: &str, anchor_text: &str) -> String {
    if parent_path.is_empty() {
        anchor_text.to_string()
    } else {
        format!("{}/{}", parent_path, anchor_text)
    }
}
