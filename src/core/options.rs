//! Build configuration for self-decoding pages
//!
//! `BuildOptions` is the one validated bundle of settings a build call consumes.
//! It can be assembled in code through [`BuildOptionsBuilder`] or loaded from a
//! TOML/JSON config section; either way [`BuildOptions::validate`] runs before
//! the options are handed out, so a build never starts from a bad combination.
//!
//! ```toml
//! compression = "gzip"
//! encoding = "ascii85"
//! password = "hunter2"
//! password_hint = "the usual"
//! obscure_action = true
//! ```

use crate::error::{Result, VeilError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest PBKDF2 iteration count accepted in a config
pub const MIN_KDF_ITERATIONS: u32 = 1_000;

/// Iteration count used when the config does not set one
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Compression algorithm applied to the page before encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Identity
    None,
    /// Deflate inside a gzip container
    #[default]
    Gzip,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
        }
    }
}

impl FromStr for Compression {
    type Err = VeilError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            other => Err(VeilError::UnsupportedCompression(other.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary-to-text scheme used to embed the payload in the shell document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Standard alphabet, padded
    #[default]
    Base64,
    /// Base-85 with an HTML/JS-safe alphabet
    Ascii85,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Base64 => "base64",
            Encoding::Ascii85 => "ascii85",
        }
    }
}

impl FromStr for Encoding {
    type Err = VeilError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "base64" => Ok(Encoding::Base64),
            "ascii85" => Ok(Encoding::Ascii85),
            other => Err(VeilError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated configuration for one page build
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildOptions {
    /// Compression applied before encryption and encoding
    pub compression: Compression,

    /// Text encoding of the final payload
    pub encoding: Encoding,

    /// Passphrase gating the content; `None` means obfuscation only
    pub password: Option<String>,

    /// Text shown in the passphrase prompt. Never the password itself.
    pub password_hint: String,

    /// Rename bootstrap identifiers so the script carries no decoder signature
    pub obscure_action: bool,

    /// Keep per-stage diagnostics (and formatting) in the client script
    pub insert_debug_statements: bool,

    /// Document title visible to every agent
    pub title: String,

    /// Placeholder text shown to agents that do not run the bootstrap
    pub noscript_message: String,

    /// PBKDF2 iteration count, only used with a password
    pub kdf_iterations: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            compression: Compression::Gzip,
            encoding: Encoding::Base64,
            password: None,
            password_hint: String::new(),
            obscure_action: true,
            insert_debug_statements: false,
            title: "Loading…".to_string(),
            noscript_message: "This page needs JavaScript to display its content.".to_string(),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("compression", &self.compression)
            .field("encoding", &self.encoding)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_hint", &self.password_hint)
            .field("obscure_action", &self.obscure_action)
            .field("insert_debug_statements", &self.insert_debug_statements)
            .field("title", &self.title)
            .field("noscript_message", &self.noscript_message)
            .field("kdf_iterations", &self.kdf_iterations)
            .finish()
    }
}

impl BuildOptions {
    /// Start a builder from the default options
    pub fn builder() -> BuildOptionsBuilder {
        BuildOptionsBuilder::new()
    }

    /// Parse and validate options from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let options: BuildOptions = toml::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    /// Parse and validate options from a JSON document
    pub fn from_json_str(source: &str) -> Result<Self> {
        let options: BuildOptions = serde_json::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    /// Whether the Access Gate is active for this build
    pub fn is_password_protected(&self) -> bool {
        self.password.is_some()
    }

    /// Check option combinations that the type system cannot rule out
    ///
    /// # Errors
    ///
    /// Returns `InvalidOptions` for an empty password, a hint that reveals the
    /// password, or a KDF iteration count below [`MIN_KDF_ITERATIONS`].
    pub fn validate(&self) -> Result<()> {
        if let Some(password) = &self.password {
            if password.is_empty() {
                return Err(VeilError::InvalidOptions(
                    "password cannot be empty (omit it to disable the access gate)".to_string(),
                ));
            }

            if self
                .password_hint
                .to_lowercase()
                .contains(&password.to_lowercase())
            {
                return Err(VeilError::InvalidOptions(
                    "password_hint must not contain the password".to_string(),
                ));
            }

            if self.kdf_iterations < MIN_KDF_ITERATIONS {
                return Err(VeilError::InvalidOptions(format!(
                    "kdf_iterations must be at least {} (got {})",
                    MIN_KDF_ITERATIONS, self.kdf_iterations
                )));
            }
        }

        Ok(())
    }
}

/// Fluent constructor for [`BuildOptions`]
///
/// # Examples
///
/// ```
/// use pageveil::{BuildOptions, Compression, Encoding};
///
/// let options = BuildOptions::builder()
///     .compression(Compression::None)
///     .encoding(Encoding::Ascii85)
///     .password("hunter2")
///     .password_hint("the classic")
///     .build()
///     .unwrap();
///
/// assert!(options.is_password_protected());
/// ```
#[derive(Debug, Clone, Default)]
pub struct BuildOptionsBuilder {
    options: BuildOptions,
}

impl BuildOptionsBuilder {
    pub fn new() -> Self {
        BuildOptionsBuilder {
            options: BuildOptions::default(),
        }
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.options.encoding = encoding;
        self
    }

    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.options.password = Some(password.into());
        self
    }

    pub fn password_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.options.password_hint = hint.into();
        self
    }

    pub fn obscure_action(mut self, enabled: bool) -> Self {
        self.options.obscure_action = enabled;
        self
    }

    pub fn insert_debug_statements(mut self, enabled: bool) -> Self {
        self.options.insert_debug_statements = enabled;
        self
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.options.title = title.into();
        self
    }

    pub fn noscript_message<S: Into<String>>(mut self, message: S) -> Self {
        self.options.noscript_message = message.into();
        self
    }

    pub fn kdf_iterations(mut self, iterations: u32) -> Self {
        self.options.kdf_iterations = iterations;
        self
    }

    /// Validate and return the options
    pub fn build(self) -> Result<BuildOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
