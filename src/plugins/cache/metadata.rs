use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::StatusCode;
use serde::{Serialize, Deserialize};

use crate::error::{PluginError, Result};
use crate::plugins::network::FetchResponse;

/// 缓存条目的元数据，磁盘模式下以 JSON 形式与响应体并排存放
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub key: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl CacheMetadata {
    pub fn from_response(key: &str, response: &FetchResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            key: key.to_string(),
            status: response.status.as_u16(),
            headers,
            size: response.body.len() as u64,
            created_at: Utc::now(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
            .map(|(_, value)| value.as_str())
    }

    pub fn to_response(&self, body: Bytes) -> Result<FetchResponse> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| PluginError::Storage(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| PluginError::Storage(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| PluginError::Storage(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(FetchResponse { status, headers, body })
    }
}
