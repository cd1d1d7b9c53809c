use crate::error::{AllergenScanError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp", "webp"];

/// ファイル・フォルダの指定からラベル画像を集める
///
/// ファイルはそのまま、フォルダは直下（`recursive` なら再帰的に）を走査する。
pub fn scan_paths(paths: &[PathBuf], recursive: bool) -> Result<Vec<ImageInfo>> {
    let mut images = Vec::new();

    for path in paths {
        if !path.exists() {
            return Err(AllergenScanError::FileNotFound(path.display().to_string()));
        }

        if path.is_file() {
            if is_image_path(path) {
                images.push(image_info(path));
            } else {
                tracing::warn!(path = %path.display(), "skipping non-image file");
            }
            continue;
        }

        images.extend(scan_folder(path, recursive));
    }

    // パスでソート
    images.sort_by(|a, b| a.path.cmp(&b.path));
    images.dedup_by(|a, b| a.path == b.path);

    Ok(images)
}

fn scan_folder(folder: &Path, recursive: bool) -> Vec<ImageInfo> {
    let max_depth = if recursive { usize::MAX } else { 1 };

    WalkDir::new(folder)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_image_path(path))
        .map(|path| image_info(&path))
        .collect()
}

fn image_info(path: &Path) -> ImageInfo {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    ImageInfo {
        path: path.to_path_buf(),
        file_name,
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| is_image_extension(&ext.to_string_lossy()))
        .unwrap_or(false)
}

/// Check if a file extension is a supported image format
fn is_image_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}
