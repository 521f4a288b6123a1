use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("selectors outdated for {source_name}: {reason}")]
    SelectorsOutdated { source_name: String, reason: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("browser error: {0}")]
    Browser(#[from] leadforge_browser::BrowserError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
