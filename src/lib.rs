pub mod blog;
pub mod config;
pub mod error;
pub mod logger;
pub mod plugin;
pub mod plugin_manager;
pub mod plugins;
pub mod proxy;
pub mod url_mapper;
pub mod utils;

pub use config::Config;
pub use error::{PluginError, Result};
pub use plugin_manager::PluginManager;

pub mod prelude {
    pub use crate::blog::{BlogFilters, BlogManager, ContentSource, DirectorySource, FetchSource, Post};
    pub use crate::plugin::{Plugin, PluginHealth};
    pub use crate::plugins::cache::CacheStorage;
    pub use crate::plugins::network::{FetchRequest, FetchResponse, Fetcher, HttpFetcher};
    pub use crate::plugins::worker::{ClientMessage, Envelope, MessageReply, ServiceWorker, Strategy};
    pub use crate::proxy::ProxyServer;
    pub use crate::url_mapper::UrlMapper;
}
