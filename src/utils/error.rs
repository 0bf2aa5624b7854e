use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("GeoPackage error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Shapefile error: {0}")]
    ShapefileError(#[from] shapefile::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("CENSUS_API_KEY not found in environment")]
    MissingApiKey,

    #[error("Failed to download boundary archive from: {}", urls.join(", "))]
    DownloadFailed { urls: Vec<String> },

    #[error("GeoPackage not found at {path}")]
    GeoPackageNotFound { path: String },

    #[error("Layer '{layer}' not found in GeoPackage")]
    LayerNotFound { layer: String },

    #[error("Could not find identifier column in {source_name} (tried: {})", candidates.join(", "))]
    IdentifierColumnNotFound {
        source_name: String,
        candidates: Vec<String>,
    },

    #[error("No data was successfully fetched from Census API ({attempted} chunks attempted)")]
    NoChunksFetched { attempted: usize },

    #[error("Unsupported coordinate reference system: {crs}")]
    UnsupportedCrs { crs: String },

    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Storage,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::DownloadFailed { .. } | EtlError::NoChunksFetched { .. } => {
                ErrorCategory::Network
            }
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::MissingApiKey => ErrorCategory::Configuration,
            EtlError::IoError(_)
            | EtlError::ZipError(_)
            | EtlError::SqliteError(_)
            | EtlError::GeoPackageNotFound { .. }
            | EtlError::LayerNotFound { .. } => ErrorCategory::Storage,
            EtlError::SerializationError(_)
            | EtlError::ShapefileError(_)
            | EtlError::IdentifierColumnNotFound { .. }
            | EtlError::UnsupportedCrs { .. }
            | EtlError::InvalidGeometry { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::MissingApiKey => {
                "CENSUS_API_KEY not found in environment. Please set it in .env file.".to_string()
            }
            EtlError::DownloadFailed { urls } => format!(
                "Could not download the TIGER ZCTA archive ({} candidate(s) failed)",
                urls.len()
            ),
            EtlError::GeoPackageNotFound { path } => {
                format!("Zipcode boundaries not found at {}", path)
            }
            EtlError::NoChunksFetched { .. } => {
                "The Census API returned no usable data".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::MissingApiKey => "Request a key at https://api.census.gov/data/key_signup.html",
            EtlError::DownloadFailed { .. } => {
                "Check your internet connection, or download the archive manually into data/raw/census"
            }
            EtlError::GeoPackageNotFound { .. } | EtlError::LayerNotFound { .. } => {
                "Run `census-etl boundaries` first"
            }
            EtlError::NoChunksFetched { .. } | EtlError::ApiError(_) => {
                "Verify the API key and the dataset year, then retry"
            }
            EtlError::UnsupportedCrs { .. } | EtlError::IdentifierColumnNotFound { .. } => {
                "The source files changed layout; update the identifier aliases in the configuration"
            }
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Fix the configuration file and run again",
            _ => "Re-run with --verbose for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_drives_exit_code() {
        assert_eq!(EtlError::MissingApiKey.exit_code(), 3);
        assert_eq!(EtlError::NoChunksFetched { attempted: 2 }.exit_code(), 2);
        let err = EtlError::IdentifierColumnNotFound {
            source_name: "ACS data".to_string(),
            candidates: vec!["ZCTA5".to_string()],
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_download_failed_names_urls() {
        let err = EtlError::DownloadFailed {
            urls: vec!["http://a/2025.zip".to_string(), "http://a/2024.zip".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("http://a/2025.zip"));
        assert!(message.contains("http://a/2024.zip"));
    }
}
