// ============================================================
// Layer 6 — Pretrained Weights Cache
// ============================================================
// Fetches the facenet-pytorch casia-webface state dict once and
// keeps it in a local cache directory:
//
//   <cache_dir>/20180408-102900-casia-webface.pt
//
// A file already present in the cache is reused as-is. Downloads
// land in `<name>.part` first and are renamed when complete, so
// an interrupted download never looks like a cached file.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

/// facenet-pytorch release asset for InceptionResnetV1(pretrained='casia-webface')
pub const CASIA_WEBFACE_URL: &str =
    "https://github.com/timesler/facenet-pytorch/releases/download/v2.2.9/20180408-102900-casia-webface.pt";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct WeightsCache {
    dir: PathBuf,
}

impl WeightsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<user cache dir>/facenet-finetune`, or `fallback` when the
    /// platform has no cache directory.
    pub fn default_dir(fallback: &Path) -> PathBuf {
        dirs::cache_dir()
            .map(|d| d.join("facenet-finetune"))
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    /// Where `url` is (or will be) stored.
    pub fn path_for(&self, url: &str) -> Result<PathBuf> {
        let name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .with_context(|| format!("Cannot derive a file name from '{url}'"))?;
        Ok(self.dir.join(name))
    }

    /// Local path of `url`, downloading it first if it is not cached.
    pub fn fetch(&self, url: &str) -> Result<PathBuf> {
        let path = self.path_for(url)?;
        if is_cached(&path) {
            tracing::info!("Using cached weights '{}'", path.display());
            return Ok(path);
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create weights cache '{}'", self.dir.display()))?;

        tracing::info!("Downloading pretrained weights {} → '{}'", url, path.display());
        let part = path.with_extension("part");
        download(url, &part)?;
        fs::rename(&part, &path)
            .with_context(|| format!("Cannot move '{}' into place", part.display()))?;
        Ok(path)
    }
}

fn is_cached(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .context("Cannot build HTTP client")?;

    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("Request to '{url}' failed"))?;
    if !response.status().is_success() {
        bail!("Downloading '{}' failed with status {}", url, response.status());
    }

    let mut file = fs::File::create(dest)
        .with_context(|| format!("Cannot create '{}'", dest.display()))?;
    let bytes = io::copy(&mut response, &mut file)
        .with_context(|| format!("Download of '{url}' was interrupted"))?;
    tracing::debug!("Downloaded {} bytes", bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Nothing listens on the discard port, so any request fails fast
    const UNREACHABLE: &str = "http://127.0.0.1:9/weights/casia.pt";

    #[test]
    fn test_file_name_comes_from_url() {
        let cache = WeightsCache::new("/cache");
        assert_eq!(
            cache.path_for(CASIA_WEBFACE_URL).unwrap(),
            PathBuf::from("/cache/20180408-102900-casia-webface.pt")
        );
        assert!(cache.path_for("https://example.com/").is_err());
    }

    #[test]
    fn test_cached_file_is_reused_without_network() {
        let tmp = TempDir::new().unwrap();
        let cache = WeightsCache::new(tmp.path());
        let cached = tmp.path().join("casia.pt");
        fs::write(&cached, b"state dict").unwrap();

        assert_eq!(cache.fetch(UNREACHABLE).unwrap(), cached);
        assert_eq!(fs::read(&cached).unwrap(), b"state dict");
    }

    #[test]
    fn test_failed_download_leaves_no_cached_file() {
        let tmp = TempDir::new().unwrap();
        let cache = WeightsCache::new(tmp.path().join("weights"));

        let err = cache.fetch(UNREACHABLE).unwrap_err();
        assert!(format!("{err:#}").contains("127.0.0.1:9"));
        assert!(!tmp.path().join("weights/casia.pt").exists());
    }

    #[test]
    fn test_empty_file_is_not_a_cache_hit() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("casia.pt"), b"").unwrap();

        assert!(WeightsCache::new(tmp.path()).fetch(UNREACHABLE).is_err());
    }
}
