use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tga", "tiff", "tif", "webp", "ico", "pnm", "pbm",
    "pgm", "ppm", "pam", "dds", "hdr", "exr", "ff", "qoi",
];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collect every image file below `root`, depth first, sorted per directory.
/// Symlinks are skipped unless `follow_links` is set.
pub fn collect_asset_files(root: &Path, follow_links: bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    scan_dir(root, follow_links, &mut out);
    out
}

fn scan_dir(dir: &Path, follow_links: bool, dest: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in entries.filter_map(|e| e.ok()) {
        let ft = if let Ok(ft) = entry.file_type() {
            ft
        } else {
            continue;
        };

        if ft.is_symlink() && !follow_links {
            continue;
        }

        let p = entry.path();
        if p.is_file() && is_image_file(&p) {
            files.push(p);
        } else if p.is_dir() {
            subdirs.push(p);
        }
    }

    files.sort();
    if !files.is_empty() {
        log::debug!("Scanning {:?}... ({} images)", dir, files.len());
    }
    dest.extend(files);

    subdirs.sort();
    for sub in subdirs {
        scan_dir(&sub, follow_links, dest);
    }
}
