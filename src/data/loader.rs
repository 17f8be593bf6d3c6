// ============================================================
// Layer 4 — Image-Folder Loader
// ============================================================
// Loads a labelled face dataset laid out one directory per
// identity:
//
//   features/
//     alice/   001.jpg  002.png ...
//     bob/     001.jpg ...
//
// Class labels come from the sorted directory names (see
// ClassIndex). Only paths and labels are collected; pixels are
// decoded later by FaceDataset. Each file's header is checked
// here so obviously broken files are dropped at startup.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::dataset::FaceRecord;
use crate::domain::classes::ClassIndex;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Everything read from the inputs directory
#[derive(Debug, Default)]
pub struct LoadedFaces {
    pub records: Vec<FaceRecord>,
    pub classes: ClassIndex,
}

pub struct ImageFolderLoader {
    dir: PathBuf,
}

impl ImageFolderLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load_all(&self) -> Result<LoadedFaces> {
        // A missing inputs directory is not fatal: the run still
        // bootstraps, provisions and checkpoints, it just has no batches.
        if !self.dir.exists() {
            tracing::warn!(
                "Inputs directory '{}' does not exist, training on an empty dataset",
                self.dir.display()
            );
            return Ok(LoadedFaces::default());
        }

        let class_dirs = list_class_dirs(&self.dir)?;
        let classes = ClassIndex::from_names(class_dirs.iter().map(|(name, _)| name.clone()));

        let mut records = Vec::new();
        for (name, path) in &class_dirs {
            let label = classes
                .label_of(name)
                .with_context(|| format!("class '{name}' missing from index"))?;

            let before = records.len();
            for file in list_images(path)? {
                match image::image_dimensions(&file) {
                    Ok(_)  => records.push(FaceRecord::new(file, label)),
                    Err(e) => tracing::warn!("Skipping '{}': {}", file.display(), e),
                }
            }
            tracing::debug!("Class '{}' (label {}): {} images", name, label, records.len() - before);
        }

        tracing::info!(
            "Found {} images across {} classes in '{}'",
            records.len(),
            classes.len(),
            self.dir.display()
        );
        Ok(LoadedFaces { records, classes })
    }
}

/// Sub-directories of `root` as (name, path), sorted by name.
fn list_class_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)
        .with_context(|| format!("Cannot read directory '{}'", root.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            dirs.push((name.to_string(), path.clone()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    files.sort();
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, shade: u8) {
        RgbImage::from_pixel(12, 12, Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let loader = ImageFolderLoader::new(tmp.path().join("nope"));
        let loaded = loader.load_all().unwrap();
        assert!(loaded.records.is_empty());
        assert!(loaded.classes.is_empty());
    }

    #[test]
    fn test_labels_from_sorted_dirs() {
        let tmp = TempDir::new().unwrap();
        for (class, n) in [("zed", 1), ("amy", 2)] {
            let dir = tmp.path().join(class);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..n {
                write_png(&dir.join(format!("{i}.png")), 10 * i as u8);
            }
        }
        // Non-image files and stray top-level files are ignored
        fs::write(tmp.path().join("amy").join("notes.txt"), "x").unwrap();
        fs::write(tmp.path().join("README"), "x").unwrap();

        let loaded = ImageFolderLoader::new(tmp.path()).load_all().unwrap();
        assert_eq!(loaded.classes.len(), 2);
        assert_eq!(loaded.records.len(), 3);
        assert_eq!(loaded.records.iter().filter(|s| s.label == 0).count(), 2);
        assert_eq!(loaded.records.iter().filter(|s| s.label == 1).count(), 1);
        assert!(loaded.records.iter().all(|r| r.path.extension().unwrap() == "png"));
    }

    #[test]
    fn test_corrupt_image_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("amy");
        fs::create_dir_all(&dir).unwrap();
        write_png(&dir.join("good.png"), 200);
        fs::write(dir.join("bad.jpg"), b"not a jpeg").unwrap();

        let loaded = ImageFolderLoader::new(tmp.path()).load_all().unwrap();
        assert_eq!(loaded.records, vec![FaceRecord::new(dir.join("good.png"), 0)]);
    }
}
