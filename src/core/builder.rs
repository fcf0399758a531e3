//! Page Builder: original HTML in, self-decoding shell out
//!
//! Runs the payload pipeline (compress, encrypt, encode), prepares the client
//! script and renders the shell template. One call per page, no I/O, no state
//! shared between calls beyond the read-only template and script source, so a
//! single [`PageBuilder`] can serve any number of threads.

use crate::error::Result;
use crate::options::BuildOptions;
use crate::payload::EncodedPayload;
use crate::script::{self, DEFAULT_CLIENT_SCRIPT};
use crate::template::{Slots, Template};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, info};

/// Build one self-decoding page with caller-supplied randomness
///
/// With a fixed `rng` the output is fully deterministic. Without a password
/// `rng` is never touched.
///
/// Returns an empty string for empty input, which tells the caller to skip
/// persisting the page.
pub fn build_page_with_rng<R: RngCore + CryptoRng>(
    input: &[u8],
    template: &Template,
    client_script_source: &str,
    options: &BuildOptions,
    rng: &mut R,
) -> Result<String> {
    options.validate()?;

    if input.is_empty() {
        debug!("Empty page, nothing to build");
        return Ok(String::new());
    }

    let payload = EncodedPayload::seal(input, options, rng)?;
    let decode_params = payload.params.to_embedded_json()?;
    let client_script = script::prepare_client_script(client_script_source, options)?;

    let html = template.render(&Slots {
        title: &options.title,
        noscript_message: &options.noscript_message,
        encoded_payload: &payload.text,
        decode_params: &decode_params,
        client_script: &client_script,
    });

    debug!(
        "Built page from template '{}': {} bytes in, {} bytes out",
        template.name(),
        input.len(),
        html.len()
    );
    Ok(html)
}

/// Reusable builder holding the template and bootstrap for a whole site
///
/// # Examples
///
/// ```
/// use pageveil::{BuildOptions, Compression, PageBuilder};
///
/// # fn main() -> pageveil::Result<()> {
/// let options = BuildOptions::builder().compression(Compression::Gzip).build()?;
/// let builder = PageBuilder::new(options)?;
///
/// let shell = builder.build(b"<html><body>secret</body></html>")?;
/// assert!(!shell.contains("secret"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PageBuilder {
    options: BuildOptions,
    template: Template,
    client_script: String,
}

impl PageBuilder {
    /// Builder with the `default` template and the bundled bootstrap
    ///
    /// # Errors
    ///
    /// Returns `InvalidOptions` if `options` does not validate.
    pub fn new(options: BuildOptions) -> Result<Self> {
        options.validate()?;
        Ok(PageBuilder {
            options,
            template: Template::load("default")?,
            client_script: DEFAULT_CLIENT_SCRIPT.to_string(),
        })
    }

    /// Use a different shell template
    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    /// Use a different client bootstrap source
    pub fn with_client_script<S: Into<String>>(mut self, source: S) -> Self {
        self.client_script = source.into();
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Build one page, drawing salt and IV from the OS generator
    pub fn build(&self, input: &[u8]) -> Result<String> {
        self.build_with_rng(input, &mut OsRng)
    }

    /// Build one page with caller-supplied randomness
    pub fn build_with_rng<R: RngCore + CryptoRng>(
        &self,
        input: &[u8],
        rng: &mut R,
    ) -> Result<String> {
        if self.options.is_password_protected() {
            info!("Building password-protected page ({} bytes)", input.len());
        }
        build_page_with_rng(input, &self.template, &self.client_script, &self.options, rng)
    }
}
