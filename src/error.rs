use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid boundary data: {0}")]
    InvalidBoundary(String),

    #[error("Shape '{0}' is not registered")]
    UnknownShape(String),

    #[error("Render engine already disposed")]
    EngineDisposed,
}

pub type Result<T> = std::result::Result<T, AtlasError>;
