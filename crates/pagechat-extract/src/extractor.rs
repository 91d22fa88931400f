use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::snapshot::PageSnapshot;

/// Default bound on extracted text, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 10_000;

/// A content root candidate must carry more visible text than this to be
/// accepted; otherwise the search falls through to the next selector.
const MIN_CONTENT_LENGTH: usize = 100;

/// Elements detached before reading content, in removal order.
const NOISE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "noscript",
    "iframe",
    "nav",
    "header",
    "footer",
    ".advertisement",
    ".ads",
    ".sidebar",
    ".menu",
    ".navigation",
    ".social",
    ".comments",
    ".popup",
    ".modal",
];

/// Content root candidates, tried in priority order.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    ".content",
    ".main-content",
    ".post-content",
    ".entry-content",
    ".article-body",
    "#content",
    "#main",
];

/// Normalized, bounded text payload for one page.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub title: String,
    pub url: String,
    pub text: String,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractedContent {
    /// Degraded record for a snapshot that could not be read at all.
    /// Callers always receive a record, never an error.
    pub fn failed(url: impl Into<String>, title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            text: String::new(),
            truncated: false,
            error: Some(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Extract the readable content of a snapshot, bounded to `max_length`
/// characters.
///
/// The document is mutated only transiently: noise nodes are detached
/// under a lease that records `(node, parent, next sibling)` and every
/// lease is released before this function returns, on all paths.
pub fn extract(snapshot: &mut PageSnapshot, max_length: usize) -> ExtractedContent {
    let title = snapshot.title();
    let url = snapshot.url().to_string();

    let raw = with_noise_detached(&mut snapshot.html, |html| {
        content_root(html).map(|root| element_text(html, root))
    });

    let Some(raw) = raw else {
        debug!(url = %url, "snapshot has no readable body");
        return ExtractedContent::failed(url, title, "document body unavailable");
    };

    let cleaned = normalize_whitespace(&raw);
    let (text, truncated) = truncate_chars(cleaned, max_length);

    ExtractedContent {
        title,
        url,
        text,
        truncated,
        error: None,
    }
}

/// Lease for one temporarily detached node. Holding the original parent
/// and next sibling is what makes exact restoration possible.
struct NoiseLease {
    node: NodeId,
    parent: NodeId,
    next_sibling: Option<NodeId>,
}

/// Run `read` with noise nodes detached, restoring them before returning.
///
/// The read closure is infallible by construction (it only walks the
/// tree), so the release step runs on every exit path.
fn with_noise_detached<T>(html: &mut Html, read: impl FnOnce(&Html) -> T) -> T {
    let leases = detach_noise(html);
    let out = read(html);
    restore_noise(html, leases);
    out
}

fn detach_noise(html: &mut Html) -> Vec<NoiseLease> {
    let mut leases = Vec::new();
    for raw in NOISE_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        // Collect ids first: each selector queries the live document, so
        // nodes inside an already detached subtree are never matched.
        let ids: Vec<NodeId> = html.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            let Some(node) = html.tree.get(id) else {
                continue;
            };
            let Some(parent) = node.parent() else {
                continue;
            };
            let lease = NoiseLease {
                node: id,
                parent: parent.id(),
                next_sibling: node.next_sibling().map(|s| s.id()),
            };
            if let Some(mut node) = html.tree.get_mut(id) {
                node.detach();
                leases.push(lease);
            }
        }
    }
    leases
}

/// Re-attach detached nodes, newest lease first.
///
/// Reverse order guarantees that a remembered next sibling which was
/// itself detached (a later lease) is already back in place, so "insert
/// before sibling" reproduces the original order exactly. The append
/// fallback only fires if the sibling is somehow still gone.
fn restore_noise(html: &mut Html, leases: Vec<NoiseLease>) {
    for lease in leases.into_iter().rev() {
        let sibling = lease.next_sibling.filter(|sib| {
            html.tree
                .get(*sib)
                .and_then(|n| n.parent())
                .is_some_and(|p| p.id() == lease.parent)
        });
        match sibling {
            Some(sib) => {
                if let Some(mut sib) = html.tree.get_mut(sib) {
                    sib.insert_id_before(lease.node);
                }
            }
            None => {
                if let Some(mut parent) = html.tree.get_mut(lease.parent) {
                    parent.append_id(lease.node);
                }
            }
        }
    }
}

/// First content selector whose match carries enough visible text;
/// falls back to `<body>`.
fn content_root(html: &Html) -> Option<NodeId> {
    for raw in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(el) = html.select(&selector).next() {
            if element_text(html, el.id()).trim().chars().count() > MIN_CONTENT_LENGTH {
                return Some(el.id());
            }
        }
    }
    let body = Selector::parse("body").ok()?;
    html.select(&body).next().map(|el| el.id())
}

fn element_text(html: &Html, id: NodeId) -> String {
    html.tree
        .get(id)
        .and_then(ElementRef::wrap)
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
}

/// Collapse whitespace runs to a single space (a single newline when the
/// run spans lines) and trim both ends.
fn normalize_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending: Option<char> = None;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            let sep = pending.get_or_insert(' ');
            if ch == '\n' {
                *sep = '\n';
            }
        } else {
            if let Some(sep) = pending.take() {
                if !out.is_empty() {
                    out.push(sep);
                }
            }
            out.push(ch);
        }
    }
    out
}

fn truncate_chars(text: String, max: usize) -> (String, bool) {
    if text.chars().count() <= max {
        (text, false)
    } else {
        (text.chars().take(max).collect(), true)
    }
}
