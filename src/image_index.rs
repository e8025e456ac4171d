use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use clap::ValueEnum;
use rayon::prelude::*;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::files::collect_asset_files;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Orientation::Landscape => Orientation::Portrait,
            Orientation::Portrait => Orientation::Landscape,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold a name into a matching token: NFKD, diacritics dropped, lowercase,
/// non-alphanumeric runs collapsed to `_`, no leading/trailing `_`.
pub fn normalize_token(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for c in s.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Leading run of 3-4 ASCII digits, zero-padded to 4.
fn leading_postcode(stem: &str) -> Option<String> {
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).take(4).collect();
    if digits.len() < 3 {
        return None;
    }
    Some(format!("{:0>4}", digits))
}

fn is_portrait_path(rel: &Path) -> bool {
    let Some(parent) = rel.parent() else { return false };
    parent.components().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .map(|n| n.eq_ignore_ascii_case("portrait"))
            .unwrap_or(false),
        _ => false,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub url: PathBuf,
    pub postcode: String,
    pub orientation: Orientation,
    pub normalized_name: String,
}

impl ImageAsset {
    /// Interpret `rel` (the path relative to the asset root). Returns `None`
    /// when the file name carries no leading postcode.
    pub fn parse(rel: &Path, url: PathBuf) -> Option<Self> {
        let stem = rel.file_stem()?.to_str()?;
        let postcode = leading_postcode(stem)?;
        Some(Self {
            url,
            postcode,
            orientation: if is_portrait_path(rel) {
                Orientation::Portrait
            } else {
                Orientation::Landscape
            },
            normalized_name: normalize_token(stem),
        })
    }
}

/// Immutable index of all usable assets, grouped by postcode.
#[derive(Debug, Default)]
pub struct ImageIndex {
    assets: Vec<ImageAsset>,
    by_postcode: HashMap<String, Vec<usize>>,
}

impl ImageIndex {
    pub fn from_assets(assets: Vec<ImageAsset>) -> Self {
        let mut by_postcode: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, a) in assets.iter().enumerate() {
            by_postcode.entry(a.postcode.clone()).or_default().push(i);
        }
        Self { assets, by_postcode }
    }

    /// Scan `root` and index every file with a leading postcode.
    pub fn build(root: &Path, follow_links: bool) -> Self {
        let start_time = Instant::now();
        if !root.is_dir() {
            log::warn!("Asset root {:?} not found; no images will be shown", root);
            return Self::default();
        }

        let files = collect_asset_files(root, follow_links);
        let total = files.len();
        let assets: Vec<ImageAsset> = files
            .into_par_iter()
            .filter_map(|path| {
                let rel = path.strip_prefix(root).ok()?.to_path_buf();
                ImageAsset::parse(&rel, path)
            })
            .collect();

        log::info!(
            "Image index built in {:.2}s: {} of {} files usable",
            start_time.elapsed().as_secs_f64(),
            assets.len(),
            total
        );
        Self::from_assets(assets)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Entries for `postcode` in exactly `orientation`, in index order.
    pub fn pool<'a>(
        &'a self,
        postcode: &str,
        orientation: Orientation,
    ) -> impl Iterator<Item = &'a ImageAsset> + 'a {
        self.by_postcode
            .get(postcode)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.assets[i])
            .filter(move |a| a.orientation == orientation)
    }

    /// Whether `postcode` has an image in any orientation.
    pub fn has_any(&self, postcode: &str) -> bool {
        self.by_postcode.contains_key(postcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn normalizes_diacritics_and_separators() {
        assert_eq!(normalize_token("2000_Sydney_Portrait"), "2000_sydney_portrait");
        assert_eq!(normalize_token("  Café -- Rouge!! "), "cafe_rouge");
        assert_eq!(normalize_token("Ōtaki Beach"), "otaki_beach");
        assert_eq!(normalize_token("__"), "");
        assert_eq!(normalize_token("ﬁsh"), "fish");
    }

    #[test]
    fn parses_portrait_asset() {
        let rel = Path::new("./portrait/2000_sydney_portrait.jpg");
        let a = ImageAsset::parse(rel, rel.to_path_buf()).unwrap();
        assert_eq!(a.postcode, "2000");
        assert_eq!(a.orientation, Orientation::Portrait);
        assert_eq!(a.normalized_name, "2000_sydney_portrait");
    }

    #[test]
    fn short_postcodes_are_padded() {
        let rel = Path::new("landscape/800-darwin.png");
        let a = ImageAsset::parse(rel, rel.to_path_buf()).unwrap();
        assert_eq!(a.postcode, "0800");
        assert_eq!(a.orientation, Orientation::Landscape);
        assert_eq!(a.normalized_name, "800_darwin");
    }

    #[test]
    fn files_without_postcode_are_rejected() {
        assert!(ImageAsset::parse(Path::new("sydney.jpg"), PathBuf::from("sydney.jpg")).is_none());
        assert!(ImageAsset::parse(Path::new("20_x.jpg"), PathBuf::from("20_x.jpg")).is_none());
    }

    #[test]
    fn portrait_is_a_directory_not_a_name() {
        let rel = Path::new("2000_portrait.jpg");
        let a = ImageAsset::parse(rel, rel.to_path_buf()).unwrap();
        assert_eq!(a.orientation, Orientation::Landscape);
    }

    #[test]
    fn builds_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("portrait")).unwrap();
        fs::create_dir_all(root.join("landscape")).unwrap();
        fs::write(root.join("portrait/2000_sydney.jpg"), b"").unwrap();
        fs::write(root.join("landscape/2000_sydney.jpg"), b"").unwrap();
        fs::write(root.join("landscape/harbour.jpg"), b"").unwrap();

        let idx = ImageIndex::build(root, false);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.pool("2000", Orientation::Portrait).count(), 1);
        assert_eq!(idx.pool("2000", Orientation::Landscape).count(), 1);
        assert_eq!(idx.pool("3000", Orientation::Landscape).count(), 0);
        assert!(idx.has_any("2000"));
        assert!(!idx.has_any("3000"));
    }

    #[test]
    fn missing_root_builds_empty_index() {
        assert!(ImageIndex::build(Path::new("/no/such/assets"), false).is_empty());
    }
}
