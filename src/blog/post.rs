use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// 清单里没有 `readingTime` 时使用的阅读时间（分钟）
pub const DEFAULT_READING_TIME: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<u32>,
}

impl Post {
    pub fn new(slug: &str, title: &str, date: &str) -> Self {
        Self {
            slug: slug.to_string(),
            title: title.to_string(),
            date: date.to_string(),
            excerpt: String::new(),
            tags: Vec::new(),
            featured_image: None,
            reading_time: None,
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// 阅读时间，缺失或为 0 时取默认值
    pub fn reading_time(&self) -> u32 {
        self.reading_time
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_READING_TIME)
    }

    /// 解析发布时间，支持 RFC 3339、`YYYY-MM-DDTHH:MM:SS` 和 `YYYY-MM-DD`（按 UTC）
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.date.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// 精确匹配，区分大小写
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// 两篇文章共有的不同标签数量
    pub fn shared_tag_count(&self, other: &Post) -> usize {
        let mine: HashSet<&str> = self.tags.iter().map(String::as_str).collect();
        other
            .tags
            .iter()
            .map(String::as_str)
            .collect::<HashSet<_>>()
            .intersection(&mine)
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub posts: Vec<Post>,
}

/// 按发布时间倒序；无法解析的日期排在最后，相同时间保持原顺序
pub fn sort_by_date_desc(posts: &mut [Post]) {
    posts.sort_by(|a, b| match (a.published_at(), b.published_at()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_uses_camel_case_fields() {
        let json = r#"{
            "posts": [{
                "slug": "hello",
                "title": "Hello",
                "date": "2024-03-01",
                "excerpt": "First post",
                "tags": ["swift", "ios"],
                "featuredImage": "/assets/images/blog/hello.webp",
                "readingTime": 7
            }]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let post = &manifest.posts[0];
        assert_eq!(post.featured_image.as_deref(), Some("/assets/images/blog/hello.webp"));
        assert_eq!(post.reading_time(), 7);
        assert_eq!(post.tags, vec!["swift", "ios"]);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let manifest: Manifest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(manifest.posts.is_empty());

        let post: Post = serde_json::from_str(r#"{"slug":"a","title":"A","date":"2024-01-01","readingTime":0}"#).unwrap();
        assert_eq!(post.reading_time(), DEFAULT_READING_TIME);
        assert!(post.tags.is_empty());
    }

    #[test]
    fn test_published_at_formats() {
        let date = Post::new("a", "A", "2024-01-15");
        let local = Post::new("b", "B", "2024-01-15T08:30:00");
        let rfc = Post::new("c", "C", "2024-01-15T08:30:00+02:00");
        let bad = Post::new("d", "D", "someday");

        assert_eq!(date.published_at().unwrap().to_rfc3339(), "2024-01-15T00:00:00+00:00");
        assert_eq!(local.published_at().unwrap().to_rfc3339(), "2024-01-15T08:30:00+00:00");
        assert_eq!(rfc.published_at().unwrap().to_rfc3339(), "2024-01-15T06:30:00+00:00");
        assert!(bad.published_at().is_none());
    }

    #[test]
    fn test_sort_newest_first_with_invalid_dates_last() {
        let mut posts = vec![
            Post::new("bad-1", "", "not a date"),
            Post::new("old", "", "2023-05-01"),
            Post::new("new", "", "2024-02-01"),
            Post::new("bad-2", "", ""),
            Post::new("mid", "", "2023-11-20T10:00:00Z"),
        ];
        sort_by_date_desc(&mut posts);
        let slugs: Vec<&str> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["new", "mid", "old", "bad-1", "bad-2"]);
    }

    #[test]
    fn test_shared_tags_are_distinct() {
        let a = Post::new("a", "", "").with_tags(&["x", "y"]);
        let b = Post::new("b", "", "").with_tags(&["y", "y", "x", "z"]);
        assert_eq!(a.shared_tag_count(&b), 2);
        assert!(b.has_tag("z"));
        assert!(!b.has_tag("Z"));
    }
}
