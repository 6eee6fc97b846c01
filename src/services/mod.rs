pub mod backend_client;
pub mod classifier;
pub mod image_fetcher;
