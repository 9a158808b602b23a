use thiserror::Error;

// Custom Result type alias for convenient use across the project
pub type Result<T> = std::result::Result<T, CityError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CityError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid grid dimensions {width}x{height}: width and height must be at least 1")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("A system named '{0}' is already registered")]
    DuplicateSystem(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
