//! Error types for checking scheme construction and loading.

/// Errors raised while building a [`CheckingScheme`](super::CheckingScheme).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemeError {
    #[error("checking scheme name is empty")]
    EmptyName,

    #[error("checking scheme {scheme} declares no tiers")]
    NoTiers { scheme: String },

    #[error("tier #{index} of checking scheme {scheme} has an empty name")]
    EmptyTierName { scheme: String, index: usize },

    #[error("tier {tier} is declared more than once in checking scheme {scheme}")]
    DuplicateTier { scheme: String, tier: String },

    #[error("categorical tier {tier} declares no categories")]
    EmptyCategories { tier: String },

    #[error("tier {tier} has an empty parser reference")]
    EmptyParserRef { tier: String },
}

/// Errors raised while reading a scheme file from disk.
#[derive(Debug, thiserror::Error)]
pub enum SchemeFileError {
    #[error("failed to read scheme file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in scheme file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON in scheme file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown scheme file extension for {path} (expected .toml or .json)")]
    UnknownFormat { path: String },

    #[error(transparent)]
    Scheme(#[from] SchemeError),
}

/// Result type for scheme operations.
pub type SchemeResult<T> = std::result::Result<T, SchemeError>;
