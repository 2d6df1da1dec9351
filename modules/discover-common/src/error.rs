use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
