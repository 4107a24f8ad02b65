use hyper::Uri;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use url::Url;

use crate::error::{PluginError, Result};

/// 从代理收到的 Uri 还原完整 URL
///
/// 绝对形式（正向代理）的 Uri 原样使用，否则拼接到站点 origin 上。
pub fn get_full_url(uri: &Uri, origin: &Url) -> Result<Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string())
            .map_err(|e| PluginError::InvalidInput(e.to_string()));
    }

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    origin
        .join(path)
        .map_err(|e| PluginError::InvalidInput(e.to_string()))
}

/// 生成缓存 key：保留查询参数，去掉片段
///
/// # Examples
/// ```
/// use site_cache::utils::cache_key;
///
/// let url = url::Url::parse("https://example.com/a.css?v=2#top").unwrap();
/// assert_eq!(cache_key(&url), "https://example.com/a.css?v=2");
/// ```
pub fn cache_key(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_fragment(None);
    clean.to_string()
}

/// 计算URL的哈希值
///
/// 返回16位的十六进制哈希字符串，用作磁盘缓存文件名
pub fn hash_url(url: &str) -> String {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

pub fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

pub fn is_http_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// 将相对URL转换为绝对URL
pub fn resolve_url(base: &Url, relative: &str) -> Result<Url> {
    let resolved = if is_absolute_url(relative) {
        Url::parse(relative)
    } else {
        base.join(relative)
    };
    resolved.map_err(|e| PluginError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_full_url() {
        let origin = Url::parse("https://example.com").unwrap();

        let uri: Uri = "http://other.com/path?query=1".parse().unwrap();
        assert_eq!(get_full_url(&uri, &origin).unwrap().as_str(), "http://other.com/path?query=1");

        let uri: Uri = "/path?query=1".parse().unwrap();
        assert_eq!(get_full_url(&uri, &origin).unwrap().as_str(), "https://example.com/path?query=1");
    }

    #[test]
    fn test_cache_key_drops_fragment_only() {
        let url = Url::parse("https://example.com/blog/?tag=rust#list").unwrap();
        assert_eq!(cache_key(&url), "https://example.com/blog/?tag=rust");
    }

    #[test]
    fn test_hash_url() {
        let hash = hash_url("https://example.com/index.html");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("http://example.com"));
        assert!(is_absolute_url("https://example.com"));
        assert!(!is_absolute_url("relative/path"));
        assert!(!is_absolute_url("/absolute/path"));
    }

    #[test]
    fn test_is_http_scheme() {
        assert!(is_http_scheme(&Url::parse("https://example.com").unwrap()));
        assert!(!is_http_scheme(&Url::parse("chrome-extension://abc/x.js").unwrap()));
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/blog/").unwrap();
        assert_eq!(
            resolve_url(&base, "posts/hello.md").unwrap().as_str(),
            "https://example.com/blog/posts/hello.md"
        );
        assert_eq!(
            resolve_url(&base, "/assets/main.css").unwrap().as_str(),
            "https://example.com/assets/main.css"
        );
        assert_eq!(
            resolve_url(&base, "http://other.com/file.js").unwrap().as_str(),
            "http://other.com/file.js"
        );
    }
}
