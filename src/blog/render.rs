use askama::Template;
use comrak::{markdown_to_html as comrak_to_html, options::Options};
use url::form_urlencoded;

use super::filters::FilterState;
use super::post::Post;
use super::reading_time::format_reading_time;
use crate::error::Result;

pub const DEFAULT_CARD_IMAGE: &str = "/assets/images/default-app-icon.svg";

/// `Mar 1, 2024`
pub fn format_date(post: &Post) -> String {
    match post.published_at() {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// GFM 风格的 markdown 渲染，原始 HTML 会被过滤
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    comrak_to_html(markdown, &options)
}

pub fn tag_href(tag: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(tag.as_bytes()).collect();
    format!("/blog?tag={}", encoded)
}

pub fn post_href(post: &Post) -> String {
    let slug: String = form_urlencoded::byte_serialize(post.slug.as_bytes()).collect();
    format!("/blog/post-template.html?slug={}", slug)
}

#[derive(Debug, Clone)]
pub struct PostCard {
    pub href: String,
    pub title: String,
    pub image: String,
    pub date: String,
    pub excerpt: String,
    pub reading_time: String,
    pub tags: Vec<String>,
}

impl From<&Post> for PostCard {
    fn from(post: &Post) -> Self {
        Self {
            href: post_href(post),
            title: post.title.clone(),
            image: post
                .featured_image
                .clone()
                .unwrap_or_else(|| DEFAULT_CARD_IMAGE.to_string()),
            date: format_date(post),
            excerpt: post.excerpt.clone(),
            reading_time: format_reading_time(post.reading_time() as usize),
            tags: post.tags.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelatedCard {
    pub href: String,
    pub title: String,
    pub image: Option<String>,
    pub date: String,
}

impl From<&Post> for RelatedCard {
    fn from(post: &Post) -> Self {
        Self {
            href: post_href(post),
            title: post.title.clone(),
            image: post.featured_image.clone(),
            date: format_date(post),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagLink {
    pub href: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct FilterButton {
    pub tag: String,
    pub label: String,
    pub active: bool,
}

/// 文章列表；空列表时根据是否在筛选显示不同提示
#[derive(Template)]
#[template(path = "blog/post_list.html")]
pub struct PostListTemplate {
    pub cards: Vec<PostCard>,
    pub filtered: bool,
}

#[derive(Template)]
#[template(path = "blog/post_detail.html")]
pub struct PostDetailTemplate {
    pub title: String,
    pub datetime: String,
    pub date: String,
    pub reading_time: String,
    pub tags: Vec<TagLink>,
    pub featured_image: Option<String>,
    /// 已经渲染好的正文，原样输出
    pub body_html: String,
    pub related: Vec<RelatedCard>,
}

#[derive(Template)]
#[template(path = "blog/post_error.html")]
pub struct PostErrorTemplate {
    pub heading: &'static str,
    pub message: &'static str,
}

/// 标签筛选按钮，第一个是 "All Posts"
#[derive(Template)]
#[template(path = "blog/filter_bar.html")]
pub struct FilterBarTemplate {
    pub buttons: Vec<FilterButton>,
}

pub fn post_list(posts: &[Post], filtered: bool) -> Result<String> {
    let template = PostListTemplate {
        cards: posts.iter().map(PostCard::from).collect(),
        filtered,
    };
    Ok(template.render()?)
}

pub fn post_detail(post: &Post, body_html: &str, related: &[&Post]) -> Result<String> {
    let template = PostDetailTemplate {
        title: post.title.clone(),
        datetime: post.date.clone(),
        date: format_date(post),
        reading_time: format_reading_time(post.reading_time() as usize),
        tags: post
            .tags
            .iter()
            .map(|tag| TagLink {
                href: tag_href(tag),
                label: tag.clone(),
            })
            .collect(),
        featured_image: post.featured_image.clone(),
        body_html: body_html.to_string(),
        related: related.iter().map(|post| RelatedCard::from(*post)).collect(),
    };
    Ok(template.render()?)
}

pub fn post_not_found() -> Result<String> {
    let template = PostErrorTemplate {
        heading: "Post Not Found",
        message: "The blog post you're looking for doesn't exist.",
    };
    Ok(template.render()?)
}

pub fn post_error() -> Result<String> {
    let template = PostErrorTemplate {
        heading: "Error Loading Post",
        message: "There was an error loading this blog post. Please try again later.",
    };
    Ok(template.render()?)
}

pub fn filter_bar(tags: &[String], current: &FilterState) -> Result<String> {
    let button = |tag: &str, label: &str| FilterButton {
        tag: tag.to_string(),
        label: label.to_string(),
        active: current.as_str() == tag,
    };

    let mut buttons = vec![button(FilterState::ALL, "All Posts")];
    buttons.extend(tags.iter().map(|tag| button(tag, tag)));
    Ok(FilterBarTemplate { buttons }.render()?)
}
