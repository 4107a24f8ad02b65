// 标准库导入
use std::path::PathBuf;

// 第三方库导入
use tracing::info;
use url::Url;

// 项目导入
use site_cache::blog::reading_time::{calculate_reading_time, format_reading_time, DEFAULT_WORDS_PER_MINUTE};
use site_cache::blog::parse_front_matter;
use site_cache::logger::init_logger;
use site_cache::prelude::*;
use site_cache::Config;

const MANIFEST: &str = r#"{
  "posts": [
    {"slug": "offline-first", "title": "Offline First", "date": "2024-05-02", "excerpt": "Caching strategies for a static site.", "tags": ["pwa", "web"]},
    {"slug": "ruler-app", "title": "Building a Ruler App", "date": "2024-03-18", "excerpt": "Notes from shipping a tiny utility.", "tags": ["swift", "ios"], "readingTime": 4},
    {"slug": "service-workers", "title": "Service Workers in Practice", "date": "2023-11-30", "excerpt": "What broke and what worked.", "tags": ["pwa"]}
  ]
}"#;

const POST: &str = r#"---
title: "Offline First"
date: 2024-05-02
tags:
- pwa
- web
---
## Why offline

Static sites can keep working without a network. Serve **cached** assets first,
refresh images in the background and always have a fallback page ready.
"#;

/// 没有指定站点目录时写一份示例内容
async fn sample_site() -> std::io::Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    tokio::fs::create_dir_all(dir.path().join("blog/posts")).await?;
    tokio::fs::write(dir.path().join("blog/posts-manifest.json"), MANIFEST).await?;
    tokio::fs::write(dir.path().join("blog/posts/offline-first.md"), POST).await?;
    Ok(dir)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let config = Config::load()?;

    let _sample;
    let root = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let dir = sample_site().await?;
            let path = dir.path().to_path_buf();
            _sample = dir;
            path
        }
    };
    let source = DirectorySource::new(&root);

    let mut manager = BlogManager::new(&config.blog);
    let count = manager.load_posts(&source).await.len();
    info!("Loaded {} posts from {}", count, root.display());
    info!("Tags: {:?}", manager.get_all_tags());

    let location = Url::parse(&config.blog.site_url)?.join("/blog?tag=pwa")?;
    let mut filters = BlogFilters::new(manager, location);
    let titles: Vec<String> = filters
        .initialize_from_url()
        .iter()
        .map(|post| post.title.clone())
        .collect();
    info!("[{}] {:?}", filters.current_filter(), titles);
    filters.clear_filter();
    info!("Location after clearing: {}", filters.location());

    let manager = filters.into_manager();
    if let Some(post) = manager.posts().first() {
        let markdown = source.read_text(&manager.post_path(&post.slug)).await.unwrap_or_default();
        let body = parse_front_matter(&markdown).body;
        let minutes = calculate_reading_time(&body, DEFAULT_WORDS_PER_MINUTE);
        info!("{}: {}", post.slug, format_reading_time(minutes));

        println!("{}", manager.seo(post).head_html()?);
        println!("{}", manager.render_post(&post.slug, &source).await?);
    }
    println!("{}", manager.render_post_list()?);

    Ok(())
}
