//! Natural-language media resolution.
//!
//! Maps asset references in a prompt ("the logo", "that image") to concrete
//! previously-uploaded URLs with a confidence score, and rewrites any URL a
//! generator invented so that no fabricated URL ever reaches validation.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::asset::{AssetCatalog, MediaAsset, MediaKind};

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'\)\}]+"#).unwrap());

/// Matches below this confidence are treated as "no match".
const MIN_CONFIDENCE: f64 = 0.35;

/// A catalog asset matched to a natural-language reference.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub asset: MediaAsset,
    /// 0.0..=1.0; how sure the resolver is that this is the asset meant.
    pub confidence: f64,
}

/// Scores catalog assets against free-text references. Read-only over the
/// external registry's records.
pub struct MediaResolver<'a> {
    catalog: &'a AssetCatalog,
}

impl<'a> MediaResolver<'a> {
    pub fn new(catalog: &'a AssetCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve one reference phrase to the best-scoring asset, if any
    /// clears the confidence threshold.
    pub fn resolve(&self, reference: &str) -> Option<ResolvedMedia> {
        let reference = reference.to_lowercase();
        self.catalog
            .all()
            .iter()
            .map(|asset| ResolvedMedia {
                asset: asset.clone(),
                confidence: score_asset(&reference, asset),
            })
            .filter(|m| m.confidence >= MIN_CONFIDENCE)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    /// Resolve every asset the prompt plausibly refers to, best first.
    /// An empty result is the non-fatal "media resolution failure" path:
    /// the request proceeds, it just carries no media URLs.
    pub fn resolve_all(&self, prompt: &str) -> Vec<ResolvedMedia> {
        let prompt = prompt.to_lowercase();
        let mut matches: Vec<ResolvedMedia> = self
            .catalog
            .all()
            .iter()
            .map(|asset| ResolvedMedia {
                asset: asset.clone(),
                confidence: score_asset(&prompt, asset),
            })
            .filter(|m| m.confidence >= MIN_CONFIDENCE)
            .collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        matches
    }

    /// Replace every URL in `source` that is neither in the catalog nor in
    /// `permitted` with the closest known URL. `permitted` carries URLs that
    /// are legitimate for this request without being catalog assets, such as
    /// images the user just uploaded or screenshots from a page analysis.
    /// When nothing suitable exists the whole line carrying the fabricated
    /// URL is dropped, so a hallucinated URL can never survive into
    /// validation or compilation.
    pub fn rewrite_foreign_urls(&self, source: &str, permitted: &[String]) -> String {
        let mut kept_lines = Vec::new();

        for line in source.lines() {
            let mut line_out = line.to_string();
            let mut drop_line = false;

            for url in URL_RE.find_iter(line) {
                let url = url.as_str();
                if self.catalog.contains_url(url) || permitted.iter().any(|p| p == url) {
                    continue;
                }
                let replacement = self
                    .closest_by_url(url)
                    .map(|asset| asset.url.clone())
                    .or_else(|| permitted.first().cloned());
                match replacement {
                    Some(replacement) => {
                        warn!(foreign = url, %replacement, "rewrote fabricated media URL");
                        line_out = line_out.replace(url, &replacement);
                    }
                    None => {
                        warn!(foreign = url, "dropped line with unresolvable media URL");
                        drop_line = true;
                    }
                }
            }

            if !drop_line {
                kept_lines.push(line_out);
            }
        }

        let mut out = kept_lines.join("\n");
        if source.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Closest catalog asset for a fabricated URL: same media kind as the
    /// URL's extension suggests, else any asset at all.
    fn closest_by_url(&self, url: &str) -> Option<&MediaAsset> {
        let guessed = guess_kind_from_url(url);
        if let Some(kind) = guessed {
            if let Some(asset) = self.catalog.by_kind(kind).next() {
                return Some(asset);
            }
            // A fabricated image URL may still best map onto a logo upload.
            if kind == MediaKind::Image {
                if let Some(asset) = self.catalog.by_kind(MediaKind::Logo).next() {
                    return Some(asset);
                }
            }
        }
        self.catalog.all().first()
    }
}

fn score_asset(text: &str, asset: &MediaAsset) -> f64 {
    let mut best: f64 = 0.0;

    for name in &asset.reference_names {
        let name = name.to_lowercase();
        if text.contains(&name) {
            best = best.max(1.0);
        } else if name.split_whitespace().any(|w| w.len() > 3 && text.contains(w)) {
            best = best.max(0.7);
        }
    }

    for tag in &asset.tags {
        if text.contains(&tag.to_lowercase()) {
            best = best.max(0.6);
        }
    }

    if text.contains(&asset.kind.to_string()) {
        best = best.max(0.5);
    }
    // "that picture", "the photo" and similar kind synonyms.
    if asset.kind == MediaKind::Image && (text.contains("picture") || text.contains("photo")) {
        best = best.max(0.5);
    }
    if asset.kind == MediaKind::Video && (text.contains("clip") || text.contains("footage")) {
        best = best.max(0.5);
    }

    if let Some(stem) = url_stem(&asset.url) {
        if stem.len() > 3 && text.contains(&stem) {
            best = best.max(0.4);
        }
    }

    best
}

fn url_stem(url: &str) -> Option<String> {
    let file = url.rsplit('/').next()?;
    let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_lowercase())
    }
}

fn guess_kind_from_url(url: &str) -> Option<MediaKind> {
    let ext = url.rsplit('.').next()?.to_lowercase();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => Some(MediaKind::Image),
        "mp4" | "webm" | "mov" => Some(MediaKind::Video),
        "mp3" | "wav" | "ogg" => Some(MediaKind::Audio),
        _ => None,
    }
}
