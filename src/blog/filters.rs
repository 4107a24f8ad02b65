use std::fmt;
use tracing::{debug, info};
use url::Url;

use super::post::Post;
use super::BlogManager;

const TAG_PARAM: &str = "tag";

/// 当前筛选条件；`None`、空串和 `"all"` 都表示不筛选
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FilterState {
    #[default]
    All,
    Tag(String),
}

impl FilterState {
    pub const ALL: &'static str = "all";

    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None | Some("") | Some(Self::ALL) => FilterState::All,
            Some(tag) => FilterState::Tag(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FilterState::All => Self::ALL,
            FilterState::Tag(tag) => tag,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            FilterState::All => None,
            FilterState::Tag(tag) => Some(tag),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FilterState::All)
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 标签筛选和地址栏 `?tag=` 的双向同步
///
/// 每次筛选变化都把新地址压入 `history`，不会"重新加载"文章。
pub struct BlogFilters {
    manager: BlogManager,
    location: Url,
    history: Vec<Url>,
}

impl BlogFilters {
    pub fn new(manager: BlogManager, location: Url) -> Self {
        Self {
            manager,
            location,
            history: Vec::new(),
        }
    }

    pub fn manager(&self) -> &BlogManager {
        &self.manager
    }

    pub fn into_manager(self) -> BlogManager {
        self.manager
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// 已压入的地址，最新的在最后
    pub fn history(&self) -> &[Url] {
        &self.history
    }

    pub fn current_filter(&self) -> &FilterState {
        self.manager.current_filter()
    }

    /// 根据地址里的 `tag` 初始化；未知标签回到全部并去掉参数
    pub fn initialize_from_url(&mut self) -> &[Post] {
        let requested = self
            .location
            .query_pairs()
            .find(|(key, _)| key == TAG_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());

        match requested {
            Some(tag) if self.manager.get_all_tags().contains(&tag) => {
                info!("Initial tag filter from URL: {}", tag);
                self.filter_by_tag(&tag)
            }
            Some(tag) => {
                info!("Unknown tag in URL, showing all posts: {}", tag);
                self.clear_filter()
            }
            None => self.manager.filtered_posts(),
        }
    }

    pub fn filter_by_tag(&mut self, tag: &str) -> &[Post] {
        self.manager.filter_by_tag(Some(tag));
        self.push_location();
        self.manager.filtered_posts()
    }

    pub fn clear_filter(&mut self) -> &[Post] {
        self.filter_by_tag(FilterState::ALL)
    }

    fn push_location(&mut self) {
        let next = with_tag_param(&self.location, self.manager.current_filter().tag());
        debug!("Push location {}", next);
        self.history.push(next.clone());
        self.location = next;
    }
}

/// 设置或删除 `tag` 参数，其他参数保持原有顺序
fn with_tag_param(location: &Url, tag: Option<&str>) -> Url {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (key, value) in location.query_pairs() {
        if key != TAG_PARAM {
            pairs.push((key.into_owned(), value.into_owned()));
        } else if let (Some(tag), false) = (tag, replaced) {
            pairs.push((TAG_PARAM.to_string(), tag.to_string()));
            replaced = true;
        }
    }
    if let (Some(tag), false) = (tag, replaced) {
        pairs.push((TAG_PARAM.to_string(), tag.to_string()));
    }

    let mut next = location.clone();
    next.set_query(None);
    if !pairs.is_empty() {
        next.query_pairs_mut().extend_pairs(pairs);
    }
    next
}
