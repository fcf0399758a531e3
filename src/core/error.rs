use thiserror::Error;

#[derive(Error, Debug)]
pub enum VeilError {
    #[error("Unsupported compression algorithm: {0} (expected one of: none, gzip)")]
    UnsupportedCompression(String),

    #[error("Unsupported encoding scheme: {0} (expected one of: base64, ascii85)")]
    UnsupportedEncoding(String),

    #[error("Invalid build options: {0}")]
    InvalidOptions(String),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Wrong passphrase and damaged payload report the same error.
    #[error("Unable to unlock page content")]
    Access,

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Template '{template}' is missing placeholder {{{placeholder}}}")]
    MissingPlaceholder { template: String, placeholder: String },

    #[error("Template '{template}' is malformed: {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VeilError {
    /// True for errors the caller can fix by changing its configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            VeilError::UnsupportedCompression(_)
                | VeilError::UnsupportedEncoding(_)
                | VeilError::InvalidOptions(_)
                | VeilError::Config(_)
        )
    }

    /// True for template loading and rendering failures
    pub fn is_template(&self) -> bool {
        matches!(
            self,
            VeilError::UnknownTemplate(_)
                | VeilError::MissingPlaceholder { .. }
                | VeilError::MalformedTemplate { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VeilError>;
