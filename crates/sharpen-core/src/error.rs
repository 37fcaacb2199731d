use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read manifest: {0}")]
    ManifestIo(#[from] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("Failed to parse declaration tree: {0}")]
    SourceParse(#[from] serde_json::Error),

    #[error("Unknown source file: {0}")]
    UnknownFile(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
