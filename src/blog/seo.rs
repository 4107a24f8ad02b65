use askama::Template;
use serde::Serialize;
use serde_json::{json, Value};

use super::post::Post;
use super::render::post_href;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaAttribute {
    Name,
    Property,
}

impl MetaAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaAttribute::Name => "name",
            MetaAttribute::Property => "property",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaTag {
    pub attribute: MetaAttribute,
    pub key: &'static str,
    pub content: String,
}

/// `<head>` 片段：title、meta、canonical 和 JSON-LD
#[derive(Template)]
#[template(path = "blog/seo_head.html")]
pub struct SeoHeadTemplate {
    pub title: String,
    pub meta_tags: Vec<MetaTag>,
    pub canonical_url: String,
    /// 已经转义过 `<` 的 JSON，原样输出
    pub json_ld: String,
}

/// 文章详情页的 SEO 信息
#[derive(Debug, Clone, Copy)]
pub struct PostSeo<'a> {
    pub post: &'a Post,
    pub site_url: &'a str,
    pub author: &'a str,
}

impl<'a> PostSeo<'a> {
    pub fn new(post: &'a Post, site_url: &'a str, author: &'a str) -> Self {
        Self { post, site_url, author }
    }

    pub fn title(&self) -> String {
        format!("{} | {} Blog", self.post.title, self.author)
    }

    pub fn canonical_url(&self) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), post_href(self.post))
    }

    /// 空值的标签不输出；`article:tag` 每个标签一条
    pub fn meta_tags(&self) -> Vec<MetaTag> {
        use MetaAttribute::*;

        let post = self.post;
        let image = post.featured_image.clone().unwrap_or_default();
        let canonical = self.canonical_url();

        let mut tags = vec![
            meta(Name, "description", &post.excerpt),
            meta(Name, "keywords", &post.tags.join(", ")),
            meta(Property, "og:type", "article"),
            meta(Property, "og:title", &post.title),
            meta(Property, "og:description", &post.excerpt),
            meta(Property, "og:image", &image),
            meta(Property, "og:url", &canonical),
            meta(Property, "article:published_time", &post.date),
            meta(Property, "article:author", self.author),
        ];
        tags.extend(post.tags.iter().map(|tag| meta(Property, "article:tag", tag)));
        tags.extend([
            meta(Name, "twitter:card", "summary_large_image"),
            meta(Name, "twitter:title", &post.title),
            meta(Name, "twitter:description", &post.excerpt),
            meta(Name, "twitter:image", &image),
        ]);

        tags.into_iter().filter(|tag| !tag.content.is_empty()).collect()
    }

    /// schema.org `BlogPosting`
    pub fn structured_data(&self) -> Value {
        let post = self.post;
        let mut data = json!({
            "@context": "https://schema.org",
            "@type": "BlogPosting",
            "headline": post.title,
            "description": post.excerpt,
            "image": post.featured_image.clone().unwrap_or_default(),
            "datePublished": post.date,
            "dateModified": post.date,
            "author": {
                "@type": "Person",
                "name": self.author,
                "url": self.site_url,
            },
            "publisher": {
                "@type": "Person",
                "name": self.author,
            },
            "mainEntityOfPage": {
                "@type": "WebPage",
                "@id": self.canonical_url(),
            },
        });
        if !post.tags.is_empty() {
            data["keywords"] = Value::String(post.tags.join(", "));
        }
        data
    }

    pub fn head_html(&self) -> Result<String> {
        let template = SeoHeadTemplate {
            title: self.title(),
            meta_tags: self.meta_tags(),
            canonical_url: self.canonical_url(),
            // script 内容里不能出现标签
            json_ld: self.structured_data().to_string().replace('<', "\\u003c"),
        };
        Ok(template.render()?)
    }
}

fn meta(attribute: MetaAttribute, key: &'static str, content: &str) -> MetaTag {
    MetaTag {
        attribute,
        key,
        content: content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        let mut post = Post::new("swift-tips", "Swift Tips", "2024-03-01").with_tags(&["swift", "ios"]);
        post.excerpt = "Small tricks".to_string();
        post
    }

    #[test]
    fn test_title_and_canonical() {
        let post = post();
        let seo = PostSeo::new(&post, "https://savoie.app/", "Eric Savoie");
        assert_eq!(seo.title(), "Swift Tips | Eric Savoie Blog");
        assert_eq!(seo.canonical_url(), "https://savoie.app/blog/post-template.html?slug=swift-tips");

        let odd = Post::new("a b&c", "Odd", "2024-01-01");
        assert_eq!(
            PostSeo::new(&odd, "https://savoie.app", "Eric Savoie").canonical_url(),
            "https://savoie.app/blog/post-template.html?slug=a+b%26c"
        );
    }

    #[test]
    fn test_meta_tags_skip_empty_values() {
        let post = post();
        let seo = PostSeo::new(&post, "https://savoie.app", "Eric Savoie");
        let tags = seo.meta_tags();

        assert!(tags.iter().all(|t| t.key != "og:image" && t.key != "twitter:image"));
        let article_tags: Vec<&str> = tags
            .iter()
            .filter(|t| t.key == "article:tag")
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(article_tags, vec!["swift", "ios"]);
        assert!(tags.contains(&meta(MetaAttribute::Name, "keywords", "swift, ios")));
    }

    #[test]
    fn test_structured_data() {
        let post = post();
        let data = PostSeo::new(&post, "https://savoie.app", "Eric Savoie").structured_data();
        assert_eq!(data["@type"], "BlogPosting");
        assert_eq!(data["keywords"], "swift, ios");
        assert_eq!(
            data["mainEntityOfPage"]["@id"],
            "https://savoie.app/blog/post-template.html?slug=swift-tips"
        );

        let untagged = Post::new("a", "A", "2024-01-01");
        let data = PostSeo::new(&untagged, "https://savoie.app", "Eric Savoie").structured_data();
        assert!(data.get("keywords").is_none());
    }

    #[test]
    fn test_head_html_escapes_content() {
        let mut post = post();
        post.title = "A <b> & \"c\"".to_string();
        let head = PostSeo::new(&post, "https://savoie.app", "Eric Savoie").head_html().unwrap();

        let title = head.lines().next().unwrap();
        assert!(title.starts_with("<title>A "));
        assert!(title.ends_with(" | Eric Savoie Blog</title>"));
        assert!(!title.contains('"'));
        assert!(head.contains("<meta property=\"og:type\" content=\"article\">"));
        assert!(head.contains("<link rel=\"canonical\" href=\"https://savoie.app/blog/post-template.html?slug=swift-tips\">"));
        assert!(head.contains("<script type=\"application/ld+json\">"));
        assert!(head.contains("\\u003cb>"));
        assert!(!head.contains("<b>"));
    }
}
