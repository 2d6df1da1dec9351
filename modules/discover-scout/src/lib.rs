pub mod browserless_page;
pub mod builder;
pub mod cache_store;
pub mod extractor;
pub mod fetcher;
pub mod page;
pub mod reconcile;
pub mod refresh;
pub mod relative_time;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
