#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}
