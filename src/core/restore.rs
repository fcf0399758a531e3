//! Rust model of the client bootstrap
//!
//! Performs the same reconstruction the browser does, so a built document can
//! be checked without a JavaScript engine:
//!
//! ```text
//! Loading -> Decoding -> [Decrypting (waits for a passphrase)] -> Restoring -> Done
//!                 \________________________\___________________________\----> Failed
//! ```
//!
//! A wrong passphrase keeps the restorer in `Decrypting`; callers may retry for
//! as long as they like. Any other failure is final.

use crate::compression;
use crate::encoding;
use crate::encryption;
use crate::error::{Result, VeilError};
use crate::payload::{DecodeParams, Layer};
use crate::template::{PARAMS_ELEMENT_ID, PAYLOAD_ELEMENT_ID};
use regex::Regex;
use tracing::{debug, warn};

/// Stage of the reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Loading,
    Decoding,
    /// Waiting for a passphrase
    Decrypting,
    Restoring,
    Done,
    Failed,
}

/// Step-by-step reconstruction of one built document
#[derive(Debug)]
pub struct Restorer {
    state: RestoreState,
    params: DecodeParams,
    payload: String,
    /// Layers still to undo; the next one is at the end
    pending: Vec<Layer>,
    data: Vec<u8>,
}

fn element_text(html: &str, id: &str) -> Result<String> {
    let pattern = format!(
        r#"(?s)<script\b[^>]*\bid="{}"[^>]*>(.*?)</script>"#,
        regex::escape(id)
    );
    let re = Regex::new(&pattern)
        .map_err(|e| VeilError::Encoding(format!("bad element pattern: {}", e)))?;

    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| VeilError::Encoding(format!("document has no element with id \"{}\"", id)))
}

impl Restorer {
    /// Locate the payload and decode parameters in a built document
    pub fn from_document(html: &str) -> Result<Self> {
        let payload = element_text(html, PAYLOAD_ELEMENT_ID)?;
        let params = DecodeParams::from_embedded_json(&element_text(html, PARAMS_ELEMENT_ID)?)?;
        Restorer::new(payload, params)
    }

    /// Start from an already extracted payload
    pub fn new(payload: String, params: DecodeParams) -> Result<Self> {
        // The outermost layer must be a text encoding
        params.encoding()?;

        Ok(Restorer {
            state: RestoreState::Loading,
            pending: params.layers.clone(),
            params,
            payload,
            data: Vec::new(),
        })
    }

    pub fn state(&self) -> RestoreState {
        self.state
    }

    pub fn params(&self) -> &DecodeParams {
        &self.params
    }

    /// Prompt text for the passphrase, if the payload is encrypted
    pub fn hint(&self) -> Option<&str> {
        self.params.hint.as_deref()
    }

    /// Advance until a passphrase is needed or the document is restored
    pub fn run(&mut self) -> Result<RestoreState> {
        loop {
            let step = match self.state {
                RestoreState::Loading => {
                    self.state = RestoreState::Decoding;
                    continue;
                }
                RestoreState::Decoding => self.decode(),
                RestoreState::Restoring => self.restore(),
                RestoreState::Decrypting | RestoreState::Done | RestoreState::Failed => {
                    return Ok(self.state)
                }
            };

            if let Err(e) = step {
                warn!("Restore failed in {:?}: {}", self.state, e);
                self.state = RestoreState::Failed;
                return Err(e);
            }
        }
    }

    /// Try a passphrase while in `Decrypting`
    ///
    /// On `Access` the state stays `Decrypting` and another attempt may follow.
    /// In any other state this is a no-op returning the current state.
    pub fn unlock(&mut self, passphrase: &str) -> Result<RestoreState> {
        if self.state != RestoreState::Decrypting {
            return Ok(self.state);
        }

        let seal_params = match self.params.seal_params() {
            Ok(p) => p,
            Err(e) => {
                self.state = RestoreState::Failed;
                return Err(e);
            }
        };

        let plaintext = encryption::open(&self.data, passphrase, &seal_params)?;
        debug!("Unlocked payload ({} bytes)", plaintext.len());

        self.data = plaintext;
        self.pending.pop();
        self.state = RestoreState::Restoring;
        self.run()
    }

    /// The restored document once `Done`
    pub fn output(&self) -> Option<&[u8]> {
        (self.state == RestoreState::Done).then_some(self.data.as_slice())
    }

    pub fn into_output(self) -> Option<Vec<u8>> {
        (self.state == RestoreState::Done).then_some(self.data)
    }

    fn decode(&mut self) -> Result<()> {
        let scheme = match self.pending.pop() {
            Some(Layer::Encoding(e)) => e,
            _ => {
                return Err(VeilError::Encoding(
                    "outermost payload layer is not a text encoding".to_string(),
                ))
            }
        };

        self.data = encoding::decode(&self.payload, scheme)?;
        debug!("Decoded {} payload to {} bytes", scheme, self.data.len());
        self.state = self.after_unwrap();
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        while let Some(layer) = self.pending.last().copied() {
            match layer {
                Layer::Encryption => {
                    self.state = RestoreState::Decrypting;
                    return Ok(());
                }
                Layer::Compression(c) => {
                    self.data = compression::decompress(&self.data, c)?;
                    debug!("Decompressed {} to {} bytes", c, self.data.len());
                }
                Layer::Encoding(_) => {
                    return Err(VeilError::Encoding(
                        "text encoding nested inside the payload".to_string(),
                    ))
                }
            }
            self.pending.pop();
        }

        self.state = RestoreState::Done;
        Ok(())
    }

    fn after_unwrap(&self) -> RestoreState {
        match self.pending.last() {
            Some(Layer::Encryption) => RestoreState::Decrypting,
            _ => RestoreState::Restoring,
        }
    }
}

/// Restore a built document in one call
///
/// # Errors
///
/// Returns `Access` if the document is encrypted and `passphrase` is missing
/// or wrong.
pub fn restore_document(html: &str, passphrase: Option<&str>) -> Result<Vec<u8>> {
    let mut restorer = Restorer::from_document(html)?;

    if restorer.run()? == RestoreState::Decrypting {
        restorer.unlock(passphrase.ok_or(VeilError::Access)?)?;
    }

    restorer
        .into_output()
        .ok_or_else(|| VeilError::Encoding("document was not fully restored".to_string()))
}
