use std::collections::BTreeSet;
use tracing::{error, info, warn};

use crate::config::BlogConfig;
use crate::error::Result;

pub mod filters;
pub mod front_matter;
pub mod post;
pub mod reading_time;
pub mod render;
pub mod seo;
pub mod source;

pub use filters::{BlogFilters, FilterState};
pub use front_matter::{parse_front_matter, FrontMatterValue, ParsedDocument};
pub use post::{Manifest, Post};
pub use seo::PostSeo;
pub use source::{ContentSource, DirectorySource, FetchSource};

/// 博客数据层：加载清单、排序、按标签筛选、计算相关文章
pub struct BlogManager {
    posts: Vec<Post>,
    filtered: Vec<Post>,
    current_filter: FilterState,
    manifest_path: String,
    posts_directory: String,
    related_limit: usize,
    site_url: String,
    author: String,
}

impl BlogManager {
    pub fn new(config: &BlogConfig) -> Self {
        Self {
            posts: Vec::new(),
            filtered: Vec::new(),
            current_filter: FilterState::All,
            manifest_path: config.manifest_path.clone(),
            posts_directory: config.posts_directory.clone(),
            related_limit: config.related_limit,
            site_url: config.site_url.clone(),
            author: config.author.clone(),
        }
    }

    pub fn with_posts(config: &BlogConfig, posts: Vec<Post>) -> Self {
        let mut manager = Self::new(config);
        manager.set_posts(posts);
        manager
    }

    fn set_posts(&mut self, mut posts: Vec<Post>) {
        post::sort_by_date_desc(&mut posts);
        self.filtered = posts.clone();
        self.posts = posts;
        self.current_filter = FilterState::All;
    }

    /// 读取清单；读取或解析失败时记录日志并返回空列表
    #[tracing::instrument(skip(self, source), fields(manifest = %self.manifest_path))]
    pub async fn load_posts(&mut self, source: &dyn ContentSource) -> &[Post] {
        match self.read_manifest(source).await {
            Ok(manifest) => {
                info!("Loaded {} posts", manifest.posts.len());
                self.set_posts(manifest.posts);
            }
            Err(e) => {
                error!("Error loading posts: {}", e);
                self.set_posts(Vec::new());
            }
        }
        &self.posts
    }

    async fn read_manifest(&self, source: &dyn ContentSource) -> Result<Manifest> {
        let text = source.read_text(&self.manifest_path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn filtered_posts(&self) -> &[Post] {
        &self.filtered
    }

    pub fn find_post(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.slug == slug)
    }

    /// `None` 和 `"all"` 恢复全部文章，其他值精确匹配标签
    pub fn filter_by_tag(&mut self, tag: Option<&str>) -> &[Post] {
        self.current_filter = FilterState::from_tag(tag);
        self.filtered = match &self.current_filter {
            FilterState::All => self.posts.clone(),
            FilterState::Tag(tag) => self
                .posts
                .iter()
                .filter(|post| post.has_tag(tag))
                .cloned()
                .collect(),
        };
        &self.filtered
    }

    pub fn clear_filter(&mut self) -> &[Post] {
        self.filter_by_tag(None)
    }

    pub fn current_filter(&self) -> &FilterState {
        &self.current_filter
    }

    pub fn is_filtered(&self) -> bool {
        !self.current_filter.is_all()
    }

    /// 所有文章的标签，去重后按字典序排列
    pub fn get_all_tags(&self) -> Vec<String> {
        self.posts
            .iter()
            .flat_map(|post| post.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 按共同标签数排序的相关文章，不含自身和没有共同标签的文章
    pub fn get_related_posts(&self, post: &Post, limit: usize) -> Vec<&Post> {
        if post.tags.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &Post)> = self
            .posts
            .iter()
            .filter(|other| other.slug != post.slug)
            .map(|other| (post.shared_tag_count(other), other))
            .filter(|(score, _)| *score > 0)
            .collect();
        // sort_by 是稳定排序，同分保持原顺序
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored.into_iter().take(limit).map(|(_, post)| post).collect()
    }

    pub fn post_path(&self, slug: &str) -> String {
        format!("{}{}.md", self.posts_directory, slug)
    }

    pub fn seo<'a>(&'a self, post: &'a Post) -> PostSeo<'a> {
        PostSeo::new(post, &self.site_url, &self.author)
    }

    /// 渲染文章详情页；找不到或读取失败时返回对应的错误页，只有模板本身出错才返回 `Err`
    #[tracing::instrument(skip(self, source))]
    pub async fn render_post(&self, slug: &str, source: &dyn ContentSource) -> Result<String> {
        let post = match self.find_post(slug) {
            Some(post) => post,
            None => {
                warn!("Post not found: {}", slug);
                return render::post_not_found();
            }
        };

        let markdown = match source.read_text(&self.post_path(slug)).await {
            Ok(markdown) => markdown,
            Err(e) => {
                error!("Error rendering post {}: {}", slug, e);
                return render::post_error();
            }
        };

        let document = parse_front_matter(&markdown);
        let body = render::markdown_to_html(&document.body);
        let related = self.get_related_posts(post, self.related_limit);
        render::post_detail(post, &body, &related)
    }

    pub fn render_post_list(&self) -> Result<String> {
        render::post_list(&self.filtered, self.is_filtered())
    }

    pub fn render_filters(&self) -> Result<String> {
        render::filter_bar(&self.get_all_tags(), &self.current_filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// 内存中的站点文件
    struct StaticSource(HashMap<String, String>);

    impl StaticSource {
        fn new(files: &[(&str, &str)]) -> Self {
            Self(files.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        }
    }

    #[async_trait]
    impl ContentSource for StaticSource {
        async fn read_text(&self, path: &str) -> Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| PluginError::Network(format!("404 {}", path)))
        }
    }

    fn slugs(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    fn manager(posts: Vec<Post>) -> BlogManager {
        BlogManager::with_posts(&BlogConfig::default(), posts)
    }

    const MANIFEST: &str = r#"{"posts": [
        {"slug": "older", "title": "Older", "date": "2023-06-01", "excerpt": "o", "tags": ["swift"]},
        {"slug": "newer", "title": "Newer", "date": "2024-06-01", "excerpt": "n", "tags": ["swift", "ios"], "readingTime": 3}
    ]}"#;

    #[tokio::test]
    async fn test_load_posts_sorts_newest_first() {
        let source = StaticSource::new(&[("/blog/posts-manifest.json", MANIFEST)]);
        let mut manager = BlogManager::new(&BlogConfig::default());

        assert_eq!(slugs(manager.load_posts(&source).await), vec!["newer", "older"]);
        assert_eq!(slugs(manager.filtered_posts()), vec!["newer", "older"]);
        assert!(!manager.is_filtered());
    }

    #[tokio::test]
    async fn test_load_failures_yield_empty_list() {
        let mut manager = BlogManager::new(&BlogConfig::default());
        assert!(manager.load_posts(&StaticSource::new(&[])).await.is_empty());

        let broken = StaticSource::new(&[("/blog/posts-manifest.json", "{not json")]);
        assert!(manager.load_posts(&broken).await.is_empty());
        assert!(manager.render_post_list().unwrap().contains("No posts found. Check back soon!"));
    }

    #[test]
    fn test_all_tags_deduplicated_and_sorted() {
        let manager = manager(vec![
            Post::new("1", "", "2024-01-01").with_tags(&["b", "a"]),
            Post::new("2", "", "2024-01-02").with_tags(&["a"]),
        ]);
        assert_eq!(manager.get_all_tags(), vec!["a", "b"]);
    }

    #[test]
    fn test_related_posts_ranked_by_shared_tags() {
        let subject = Post::new("p", "P", "2024-01-01").with_tags(&["x", "y"]);
        let manager = manager(vec![
            subject.clone(),
            Post::new("one", "", "2024-01-04").with_tags(&["y", "z"]),
            Post::new("zero", "", "2024-01-03").with_tags(&["z"]),
            Post::new("two", "", "2024-01-02").with_tags(&["x", "y"]),
        ]);

        let related = manager.get_related_posts(&subject, 2);
        let related: Vec<&str> = related.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(related, vec!["two", "one"]);

        assert!(manager.get_related_posts(&subject, 0).is_empty());
        let untagged = Post::new("u", "", "2024-01-01");
        assert!(manager.get_related_posts(&untagged, 3).is_empty());
    }

    #[test]
    fn test_related_ties_keep_date_order() {
        let subject = Post::new("p", "P", "2024-01-01").with_tags(&["x"]);
        let manager = manager(vec![
            Post::new("b", "", "2024-01-02").with_tags(&["x"]),
            Post::new("a", "", "2024-01-03").with_tags(&["x"]),
            subject.clone(),
        ]);
        let related = manager.get_related_posts(&subject, 5);
        let related: Vec<&str> = related.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(related, vec!["a", "b"]);
    }

    #[test]
    fn test_filter_and_reset() {
        let mut manager = manager(vec![
            Post::new("a", "", "2024-01-03").with_tags(&["rust"]),
            Post::new("b", "", "2024-01-02").with_tags(&["Rust"]),
            Post::new("c", "", "2024-01-01"),
        ]);

        assert_eq!(slugs(manager.filter_by_tag(Some("rust"))), vec!["a"]);
        assert!(manager.is_filtered());
        assert_eq!(manager.current_filter().as_str(), "rust");

        assert!(manager.filter_by_tag(Some("rus")).is_empty());
        assert!(manager.render_post_list().unwrap().contains("No posts found with this tag."));

        assert_eq!(slugs(manager.filter_by_tag(Some("all"))), vec!["a", "b", "c"]);
        assert_eq!(slugs(manager.filter_by_tag(Some("Rust"))), vec!["b"]);
        assert_eq!(slugs(manager.clear_filter()), vec!["a", "b", "c"]);
        assert!(!manager.is_filtered());
    }

    #[tokio::test]
    async fn test_render_post_views() {
        let source = StaticSource::new(&[
            ("/blog/posts-manifest.json", MANIFEST),
            (
                "/blog/posts/newer.md",
                "---\ntitle: \"Newer\"\ntags:\n- swift\n- ios\n---\n## Section\n\nHello **world**",
            ),
        ]);
        let mut manager = BlogManager::new(&BlogConfig::default());
        manager.load_posts(&source).await;

        let html = manager.render_post("newer", &source).await.unwrap();
        assert!(html.contains("<h2>Section</h2>"));
        assert!(html.contains("<strong>world</strong>"));
        assert!(html.contains("3 min read"));
        assert!(html.contains("Jun 1, 2024"));
        assert!(html.contains("slug=older"));
        assert!(!html.contains("title: "));

        assert!(manager.render_post("missing", &source).await.unwrap().contains("Post Not Found"));
        // 清单里有但 markdown 文件不存在
        assert!(manager.render_post("older", &source).await.unwrap().contains("Error Loading Post"));
    }

    #[test]
    fn test_render_filters_and_seo() {
        let mut manager = manager(vec![Post::new("a", "A", "2024-01-01").with_tags(&["rust"])]);
        manager.filter_by_tag(Some("rust"));
        assert!(manager.render_filters().unwrap().contains("data-tag=\"rust\" aria-pressed=\"true\""));

        let post = manager.find_post("a").unwrap();
        assert_eq!(manager.seo(post).title(), "A | Eric Savoie Blog");
        assert_eq!(manager.post_path("a"), "/blog/posts/a.md");
    }
}
