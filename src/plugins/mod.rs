pub mod cache;
pub mod network;
pub mod worker;

pub use cache::{CacheBucket, CacheStorage};
pub use network::{FetchRequest, FetchResponse, Fetcher, HttpFetcher, RequestDestination};
pub use worker::{FetchOutcome, ServiceWorker, Strategy, WorkerState};
