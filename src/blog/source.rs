use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::error::{PluginError, Result};
use crate::plugins::network::{FetchRequest, Fetcher};
use crate::utils::resolve_url;

/// 博客内容来源：清单和 markdown 文件都按站点绝对路径读取
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn read_text(&self, path: &str) -> Result<String>;
}

/// 从本地站点目录读取
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(PluginError::InvalidInput(format!("Path escapes content root: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentSource for DirectorySource {
    async fn read_text(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        debug!("Reading {}", full.display());
        Ok(tokio::fs::read_to_string(&full).await?)
    }
}

/// 通过 `Fetcher` 读取，可以直接挂在 worker 上让请求经过缓存
///
/// 相对路径基于 `base` 解析，绝对 URL 原样使用。
pub struct FetchSource {
    fetcher: Arc<dyn Fetcher>,
    base: Url,
}

impl FetchSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, base: Url) -> Self {
        Self { fetcher, base }
    }
}

#[async_trait]
impl ContentSource for FetchSource {
    async fn read_text(&self, path: &str) -> Result<String> {
        let url = resolve_url(&self.base, path)?;
        let response = self.fetcher.fetch(&FetchRequest::get(url.clone())).await?;
        if !response.is_ok() {
            return Err(PluginError::Network(format!("{} returned {}", url, response.status)));
        }
        String::from_utf8(response.body.to_vec())
            .map_err(|e| PluginError::InvalidInput(format!("{} is not UTF-8: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::network::testing::ScriptedFetcher;
    use hyper::StatusCode;

    #[tokio::test]
    async fn test_directory_source_reads_site_paths() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("blog/posts")).await.unwrap();
        tokio::fs::write(dir.path().join("blog/posts/hello.md"), "# Hello").await.unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.read_text("/blog/posts/hello.md").await.unwrap(), "# Hello");
        assert!(matches!(
            source.read_text("/blog/missing.md").await,
            Err(PluginError::Io(_))
        ));
        assert!(matches!(
            source.read_text("/blog/../../etc/passwd").await,
            Err(PluginError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_source_rejects_error_status() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.route("https://savoie.app/blog/posts-manifest.json", StatusCode::OK, "{}");
        fetcher.route("https://savoie.app/blog/posts/gone.md", StatusCode::NOT_FOUND, "");

        let source = FetchSource::new(fetcher, Url::parse("https://savoie.app").unwrap());
        assert_eq!(source.read_text("/blog/posts-manifest.json").await.unwrap(), "{}");
        assert!(source.read_text("/blog/posts/gone.md").await.is_err());
    }
}
