//! # Pageveil - Self-Decoding HTML Pages
//!
//! `pageveil` turns a rendered HTML page into a small shell document that
//! carries the real page as an encoded payload. A browser running the inlined
//! bootstrap restores the page; a static fetcher only sees the placeholder.
//!
//! - **Compression**: gzip, undone in the browser by `DecompressionStream`
//! - **Text encoding**: base64 or a script-safe ascii85 variant
//! - **Access gate**: optional passphrase (PBKDF2-SHA256 + AES-256-GCM),
//!   compatible with WebCrypto
//! - **Obscured bootstrap**: minified script with neutral identifiers
//!
//! ## Quick Start
//!
//! ```rust
//! use pageveil::{build_page, restore_document, Result, Template};
//!
//! # fn main() -> Result<()> {
//! let template = Template::load("default")?;
//! let shell = build_page(
//!     b"<html><body>secret</body></html>",
//!     &template,
//!     pageveil::DEFAULT_CLIENT_SCRIPT,
//!     None,
//!     "",
//!     true,
//!     "gzip",
//!     "base64",
//!     false,
//! )?;
//!
//! assert!(!shell.contains("secret"));
//! assert_eq!(restore_document(&shell, None)?, b"<html><body>secret</body></html>");
//! # Ok(())
//! # }
//! ```
//!
//! ## Typed Usage
//!
//! ```rust
//! use pageveil::{BuildOptions, Encoding, PageBuilder, Result, Template};
//!
//! # fn main() -> Result<()> {
//! let options = BuildOptions::builder()
//!     .encoding(Encoding::Ascii85)
//!     .password("hunter2")
//!     .password_hint("the classic")
//!     .kdf_iterations(1_000)
//!     .build()?;
//!
//! let builder = PageBuilder::new(options)?.with_template(Template::load("minimal")?);
//! let shell = builder.build(b"<html><body>members only</body></html>")?;
//! assert!(shell.contains("<noscript>"));
//! # Ok(())
//! # }
//! ```

// Pipeline implementation
pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use self::core::{
    builder, compression, encoding, encryption, error, options, payload, restore, script,
    template,
};

// Re-export core types that users need
pub use crate::core::{
    builder::{build_page_with_rng, PageBuilder},
    encoding::{ASCII85_ALPHABET, FORBIDDEN_CHARS},
    error::{Result, VeilError},
    options::{
        BuildOptions, BuildOptionsBuilder, Compression, Encoding, DEFAULT_KDF_ITERATIONS,
        MIN_KDF_ITERATIONS,
    },
    payload::{DecodeParams, EncodedPayload, Layer, FORMAT_VERSION},
    restore::{restore_document, RestoreState, Restorer},
    script::{prepare_client_script, DEFAULT_CLIENT_SCRIPT},
    template::{Placeholder, Template, PARAMS_ELEMENT_ID, PAYLOAD_ELEMENT_ID, STATUS_ELEMENT_ID},
};

use rand::rngs::OsRng;
use tracing::debug;

/// Build one self-decoding page
///
/// This is the single entry point a host build pipeline calls once per
/// rendered page. `compression` and `encoding` are scheme names
/// (`"none"`/`"gzip"`, `"base64"`/`"ascii85"`). Salt and IV come from the
/// OS generator; use [`build_page_with_rng`] for reproducible output.
///
/// An empty return value means "skip persisting this page".
///
/// # Errors
///
/// - `UnsupportedCompression` / `UnsupportedEncoding` for unknown scheme names
/// - `InvalidOptions` for an empty password or a hint that reveals it
/// - `Encryption` if key derivation or the cipher fails
#[allow(clippy::too_many_arguments)]
pub fn build_page(
    input_bytes: &[u8],
    template: &Template,
    client_script_source: &str,
    password: Option<&str>,
    password_hint: &str,
    obscure_action: bool,
    compression: &str,
    encoding: &str,
    insert_debug_statements: bool,
) -> Result<String> {
    let compression: Compression = compression.parse()?;
    let encoding: Encoding = encoding.parse()?;

    let mut builder = BuildOptions::builder()
        .compression(compression)
        .encoding(encoding)
        .password_hint(password_hint)
        .obscure_action(obscure_action)
        .insert_debug_statements(insert_debug_statements);
    if let Some(password) = password {
        builder = builder.password(password);
    }
    let options = builder.build()?;

    debug!(
        "build_page: template '{}', {} + {}",
        template.name(),
        compression,
        encoding
    );
    build_page_with_rng(
        input_bytes,
        template,
        client_script_source,
        &options,
        &mut OsRng,
    )
}
