use url::Url;

use crate::error::{PluginError, Result};

/// 前缀映射规则：把对外 origin 的请求改写到真实回源地址
#[derive(Debug, Clone, Default)]
pub struct UrlMapper {
    rules: Vec<(String, String)>,
}

impl UrlMapper {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// 按添加顺序匹配，先添加的优先
    pub fn add_rule(&mut self, pattern: String, target: String) {
        self.rules.push((pattern, target));
    }

    pub fn with_rule(mut self, pattern: &str, target: &str) -> Self {
        self.add_rule(pattern.to_string(), target.to_string());
        self
    }

    pub fn map_url(&self, url: &Url) -> Result<Url> {
        let raw = url.as_str();
        for (pattern, target) in &self.rules {
            if let Some(rest) = raw.strip_prefix(pattern.as_str()) {
                let mapped = format!("{}{}", target, rest);
                return Url::parse(&mapped)
                    .map_err(|e| PluginError::InvalidInput(e.to_string()));
            }
        }

        Ok(url.clone())
    }
}
