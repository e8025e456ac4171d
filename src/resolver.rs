use std::path::Path;

use crate::catalog::PostcodeCatalog;
use crate::image_index::{normalize_token, ImageIndex, Orientation};

const ORIENTATION_SCORE: u32 = 5;

fn token_score(name: &str, token: &str, suburb_token: &str, rank: u32) -> u32 {
    if name == token {
        100 - 10 * rank
    } else if name.starts_with(token) {
        80 - 8 * rank
    } else if !suburb_token.is_empty() && name.contains(suburb_token) {
        45 - 2 * rank
    } else {
        0
    }
}

/// Pick the best image for a record, or `None` when no asset exists for that
/// postcode in exactly `orientation`.
pub fn resolve<'a>(
    index: &'a ImageIndex,
    postcode: &str,
    suburb: &str,
    orientation: Orientation,
) -> Option<&'a Path> {
    let orient = orientation.as_str();
    let raw_tokens = [
        format!("{postcode}_{suburb}_{orient}"),
        format!("{postcode}_{suburb}"),
        format!("{postcode}_{orient}"),
        postcode.to_string(),
    ];
    let tokens: Vec<(u32, String)> = raw_tokens
        .iter()
        .enumerate()
        .filter(|(_, raw)| !raw.ends_with('_'))
        .map(|(i, raw)| (i as u32, normalize_token(raw)))
        .filter(|(_, t)| !t.is_empty())
        .collect();
    let suburb_token = normalize_token(suburb);

    let mut best: Option<(&'a Path, u32)> = None;
    for asset in index.pool(postcode, orientation) {
        let name = asset.normalized_name.as_str();
        let score = tokens
            .iter()
            .map(|(rank, token)| token_score(name, token, &suburb_token, *rank))
            .fold(ORIENTATION_SCORE, u32::max);

        if best.is_none_or(|(_, s)| score > s) {
            best = Some((asset.url.as_path(), score));
        }
    }
    best.map(|(url, _)| url)
}

/// Per-record resolution for one orientation, computed once per orientation
/// change so per-frame code never re-scores the pool.
#[derive(Debug, Default)]
pub struct ImageMap {
    urls: Vec<Option<std::path::PathBuf>>,
    any_orientation: Vec<bool>,
}

impl ImageMap {
    pub fn build(catalog: &PostcodeCatalog, index: &ImageIndex, orientation: Orientation) -> Self {
        let urls = catalog
            .records()
            .iter()
            .map(|r| resolve(index, &r.postcode, &r.suburb, orientation).map(Path::to_path_buf))
            .collect();
        let any_orientation = catalog
            .records()
            .iter()
            .map(|r| index.has_any(&r.postcode))
            .collect();
        Self {
            urls,
            any_orientation,
        }
    }

    pub fn url(&self, idx: usize) -> Option<&Path> {
        self.urls.get(idx).and_then(|u| u.as_deref())
    }

    /// Image-bearing for the current orientation.
    pub fn has_image(&self, idx: usize) -> bool {
        self.url(idx).is_some()
    }

    /// Looser predicate used by the side rail: an image exists in any
    /// orientation, even if `url` would return nothing.
    pub fn has_any_image(&self, idx: usize) -> bool {
        self.any_orientation.get(idx).copied().unwrap_or(false)
    }

    /// Image-bearing indices in ascending order.
    pub fn image_indices(&self) -> Vec<usize> {
        self.urls
            .iter()
            .enumerate()
            .filter_map(|(i, u)| u.as_ref().map(|_| i))
            .collect()
    }
}
