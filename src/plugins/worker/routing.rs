use std::fmt;
use url::Url;

/// 缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::NetworkOnly => "network-only",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条匹配条件。`Path*` 只看路径，`Url*` 看完整 href。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    PathSuffix(&'static str),
    PathContains(&'static str),
    PathEquals(&'static str),
    UrlContains(&'static str),
    /// `^https://.*<marker>`：https 开头且其后出现 marker
    HttpsUrlContains(&'static str),
}

impl Matcher {
    pub fn matches(&self, url: &Url) -> bool {
        let path = url.path();
        let href = url.as_str();
        match self {
            Matcher::PathSuffix(suffix) => path.ends_with(suffix),
            Matcher::PathContains(part) => path.contains(part),
            Matcher::PathEquals(exact) => path == *exact,
            Matcher::UrlContains(part) => href.contains(part),
            Matcher::HttpsUrlContains(marker) => href
                .strip_prefix("https://")
                .map_or(false, |rest| rest.contains(marker)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub strategy: Strategy,
}

/// 有序规则表，自上而下匹配，第一条命中的规则生效
///
/// 默认顺序：cache-first 规则、network-first 规则、
/// stale-while-revalidate 规则、network-only 规则，都不命中时回落到 `fallback`。
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<Rule>,
    fallback: Strategy,
}

impl RouteTable {
    pub fn new(fallback: Strategy) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    pub fn rule(mut self, strategy: Strategy, matcher: Matcher) -> Self {
        self.rules.push(Rule { matcher, strategy });
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn classify(&self, url: &Url) -> Strategy {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(url))
            .map(|rule| rule.strategy)
            .unwrap_or(self.fallback)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        use Matcher::*;
        use Strategy::*;

        RouteTable::new(CacheFirst)
            // 静态资源
            .rule(CacheFirst, PathSuffix(".css"))
            .rule(CacheFirst, PathSuffix(".js"))
            .rule(CacheFirst, PathContains("/components/"))
            .rule(CacheFirst, PathContains("/utilities/"))
            .rule(CacheFirst, PathEquals("/"))
            .rule(CacheFirst, PathSuffix(".html"))
            // 动态内容
            .rule(NetworkFirst, UrlContains("/api/"))
            .rule(NetworkFirst, UrlContains("/analytics/"))
            .rule(NetworkFirst, HttpsUrlContains(".googleapis.com"))
            .rule(NetworkFirst, HttpsUrlContains(".google-analytics.com"))
            .rule(NetworkFirst, HttpsUrlContains(".googletagmanager.com"))
            // 图片和字体
            .rule(StaleWhileRevalidate, PathContains("/images/"))
            .rule(StaleWhileRevalidate, PathSuffix(".png"))
            .rule(StaleWhileRevalidate, PathSuffix(".jpg"))
            .rule(StaleWhileRevalidate, PathSuffix(".jpeg"))
            .rule(StaleWhileRevalidate, PathSuffix(".gif"))
            .rule(StaleWhileRevalidate, PathSuffix(".webp"))
            .rule(StaleWhileRevalidate, PathSuffix(".svg"))
            .rule(StaleWhileRevalidate, PathContains("/fonts/"))
            // 统计和追踪
            .rule(NetworkOnly, UrlContains("google-analytics.com"))
            .rule(NetworkOnly, UrlContains("googletagmanager.com"))
            .rule(NetworkOnly, UrlContains("analytics."))
            .rule(NetworkOnly, UrlContains("/api/track"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(url: &str) -> Strategy {
        RouteTable::default().classify(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_static_assets_are_cache_first() {
        assert_eq!(classify("https://savoie.app/"), Strategy::CacheFirst);
        assert_eq!(classify("https://savoie.app/assets/css/main.css"), Strategy::CacheFirst);
        assert_eq!(classify("https://savoie.app/terms.html"), Strategy::CacheFirst);
        assert_eq!(classify("https://savoie.app/assets/css/utilities/x"), Strategy::CacheFirst);
    }

    #[test]
    fn test_cache_first_wins_over_later_rules() {
        // .js 结尾的统计脚本仍然是 cache-first
        assert_eq!(
            classify("https://www.googletagmanager.com/gtag/js/loader.js"),
            Strategy::CacheFirst
        );
        // components 目录下的图片同理
        assert_eq!(
            classify("https://savoie.app/assets/components/images/a.png"),
            Strategy::CacheFirst
        );
    }

    #[test]
    fn test_dynamic_content_is_network_first() {
        assert_eq!(classify("https://savoie.app/api/posts"), Strategy::NetworkFirst);
        assert_eq!(classify("https://savoie.app/api/track?e=1"), Strategy::NetworkFirst);
        assert_eq!(classify("https://fonts.googleapis.com/css2?family=Inter"), Strategy::NetworkFirst);
        assert_eq!(classify("https://www.google-analytics.com/g/collect"), Strategy::NetworkFirst);
    }

    #[test]
    fn test_media_is_stale_while_revalidate() {
        assert_eq!(classify("https://savoie.app/assets/images/hero/bg"), Strategy::StaleWhileRevalidate);
        assert_eq!(classify("https://savoie.app/icon.svg"), Strategy::StaleWhileRevalidate);
        assert_eq!(classify("https://savoie.app/assets/fonts/inter.woff2"), Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_tracking_is_network_only() {
        // http 协议不会被 https 规则命中
        assert_eq!(classify("http://www.google-analytics.com/collect"), Strategy::NetworkOnly);
        assert_eq!(classify("https://analytics.example.com/event"), Strategy::NetworkOnly);
    }

    #[test]
    fn test_unmatched_defaults_to_cache_first() {
        assert_eq!(classify("https://savoie.app/apps/infiniteruler/"), Strategy::CacheFirst);
        assert_eq!(classify("https://savoie.app/manifest.json"), Strategy::CacheFirst);
    }
}
