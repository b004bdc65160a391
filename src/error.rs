use thiserror::Error;

#[derive(Error, Debug)]
pub enum JimakuError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed or missing timing data, zero-duration media
    #[error("Invalid input: {0}")]
    Input(String),

    /// Audio or video could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Capture sink unavailable or codec unsupported
    #[error("Capture error: {0}")]
    Capture(String),

    /// Probe/processing failure inside the tempo reconciler
    #[error("Retime error: {0}")]
    Retime(String),

    #[error("Compile cancelled")]
    Cancelled,

    #[error("Style error: {0}")]
    Style(String),

    #[error("Subtitle parsing error: {0}")]
    Subtitle(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, JimakuError>;
