//! Encoded payload and the decode parameters that travel with it
//!
//! The build pipeline applies its stages in a fixed order
//! (compress, then encrypt, then encode) and records every applied stage as a
//! [`Layer`] in [`DecodeParams::layers`]. Readers undo the list back to front,
//! so the order is part of the format rather than an assumption shared by
//! the build side and the client.
//!
//! Embedded form (short keys keep the shell free of descriptive names):
//!
//! ```json
//! {"v":1,"l":["gzip","aes-gcm","base64"],"s":"<salt>","n":"<iv>","k":100000,"h":"hint"}
//! ```

use crate::compression;
use crate::encoding;
use crate::encryption::{self, SealParams, NONCE_SIZE, SALT_SIZE};
use crate::error::{Result, VeilError};
use crate::options::{BuildOptions, Compression, Encoding};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::debug;

/// Format version written into every document
pub const FORMAT_VERSION: u32 = 1;

/// One reversible stage of the payload pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Compression(Compression),
    Encryption,
    Encoding(Encoding),
}

impl Layer {
    /// Identifier used in the embedded parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Compression(c) => c.as_str(),
            Layer::Encryption => "aes-gcm",
            Layer::Encoding(e) => e.as_str(),
        }
    }

    /// Parse a layer name as written by [`EncodedPayload::seal`]
    ///
    /// `none` is not a layer: uncompressed payloads simply omit the stage.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "aes-gcm" => Ok(Layer::Encryption),
            "gzip" => Ok(Layer::Compression(Compression::Gzip)),
            "base64" | "ascii85" => Ok(Layer::Encoding(s.parse()?)),
            other => Err(VeilError::Encoding(format!("unknown payload layer: {}", other))),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Layer::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Metadata needed to reverse the payload pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeParams {
    #[serde(rename = "v")]
    pub version: u32,

    /// Applied layers, in application order
    #[serde(rename = "l")]
    pub layers: Vec<Layer>,

    /// Base64 PBKDF2 salt
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,

    /// Base64 AES-GCM IV
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// PBKDF2 iteration count
    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,

    /// Passphrase prompt text
    #[serde(rename = "h", default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl DecodeParams {
    pub fn is_encrypted(&self) -> bool {
        self.layers.contains(&Layer::Encryption)
    }

    /// Text encoding of the payload (always the outermost layer)
    pub fn encoding(&self) -> Result<Encoding> {
        match self.layers.last() {
            Some(Layer::Encoding(e)) => Ok(*e),
            _ => Err(VeilError::Encoding(
                "outermost payload layer is not a text encoding".to_string(),
            )),
        }
    }

    /// Recover the salt, IV and iteration count of an encrypted payload
    pub fn seal_params(&self) -> Result<SealParams> {
        let (Some(salt), Some(nonce), Some(iterations)) =
            (&self.salt, &self.nonce, self.iterations)
        else {
            return Err(VeilError::Encoding(
                "encrypted payload is missing salt, IV or iteration count".to_string(),
            ));
        };

        Ok(SealParams {
            salt: decode_fixed::<SALT_SIZE>(salt, "salt")?,
            nonce: decode_fixed::<NONCE_SIZE>(nonce, "IV")?,
            iterations,
        })
    }

    /// JSON safe to place inside a `<script>` element
    pub fn to_embedded_json(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(json
            .replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026"))
    }

    /// Parse embedded JSON, rejecting unknown format versions
    pub fn from_embedded_json(json: &str) -> Result<Self> {
        let params: DecodeParams = serde_json::from_str(json.trim())?;
        if params.version != FORMAT_VERSION {
            return Err(VeilError::Encoding(format!(
                "unsupported payload format version: {}",
                params.version
            )));
        }
        Ok(params)
    }
}

fn decode_fixed<const N: usize>(value: &str, what: &str) -> Result<[u8; N]> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| VeilError::Encoding(format!("invalid {}: {}", what, e)))?;
    bytes
        .try_into()
        .map_err(|_| VeilError::Encoding(format!("{} must be {} bytes", what, N)))
}

/// Text payload plus everything needed to reverse it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub text: String,
    pub params: DecodeParams,
}

impl EncodedPayload {
    /// Run the payload pipeline over `input`
    ///
    /// `rng` is only drawn from when `options` carries a password.
    pub fn seal<R: RngCore + CryptoRng>(
        input: &[u8],
        options: &BuildOptions,
        rng: &mut R,
    ) -> Result<Self> {
        let mut layers = Vec::with_capacity(3);
        let mut params = DecodeParams {
            version: FORMAT_VERSION,
            layers: Vec::new(),
            salt: None,
            nonce: None,
            iterations: None,
            hint: None,
        };

        let mut data = compression::compress(input, options.compression)?;
        if options.compression != Compression::None {
            layers.push(Layer::Compression(options.compression));
            debug!(
                "Compressed {} bytes to {} with {}",
                input.len(),
                data.len(),
                options.compression
            );
        }

        if let Some(password) = &options.password {
            let seal_params = SealParams::generate(rng, options.kdf_iterations);
            data = encryption::seal(&data, password, &seal_params)?;
            layers.push(Layer::Encryption);

            params.salt = Some(STANDARD.encode(seal_params.salt));
            params.nonce = Some(STANDARD.encode(seal_params.nonce));
            params.iterations = Some(seal_params.iterations);
            params.hint = Some(options.password_hint.clone());
            debug!("Sealed payload ({} bytes)", data.len());
        }

        let text = encoding::encode(&data, options.encoding);
        layers.push(Layer::Encoding(options.encoding));
        debug!("Encoded payload as {} ({} chars)", options.encoding, text.len());

        params.layers = layers;
        Ok(EncodedPayload { text, params })
    }

    /// Undo every layer except encryption, which needs `passphrase`
    ///
    /// Mirrors what the client bootstrap does in the browser.
    pub fn open(&self, passphrase: Option<&str>) -> Result<Vec<u8>> {
        let mut data = encoding::decode(&self.text, self.params.encoding()?)?;

        for layer in self.params.layers.iter().rev().skip(1) {
            data = match layer {
                Layer::Compression(c) => compression::decompress(&data, *c)?,
                Layer::Encryption => {
                    let passphrase = passphrase.ok_or(VeilError::Access)?;
                    encryption::open(&data, passphrase, &self.params.seal_params()?)?
                }
                Layer::Encoding(e) => encoding::decode(
                    std::str::from_utf8(&data)
                        .map_err(|err| VeilError::Encoding(err.to_string()))?,
                    *e,
                )?,
            };
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn options(compression: Compression, encoding: Encoding) -> BuildOptions {
        BuildOptions {
            compression,
            encoding,
            ..Default::default()
        }
    }

    #[test]
    fn test_layers_record_application_order() {
        let options = BuildOptions {
            password: Some("hunter2".to_string()),
            kdf_iterations: 1_000,
            ..options(Compression::Gzip, Encoding::Ascii85)
        };
        let payload =
            EncodedPayload::seal(b"page", &options, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(
            payload.params.layers,
            vec![
                Layer::Compression(Compression::Gzip),
                Layer::Encryption,
                Layer::Encoding(Encoding::Ascii85)
            ]
        );
        assert!(payload.params.is_encrypted());
        assert_eq!(payload.params.iterations, Some(1_000));
    }

    #[test]
    fn test_no_compression_adds_no_layer() {
        let payload = EncodedPayload::seal(
            b"page",
            &options(Compression::None, Encoding::Base64),
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();

        assert_eq!(payload.params.layers, vec![Layer::Encoding(Encoding::Base64)]);
        assert!(payload.params.salt.is_none());
        assert_eq!(payload.text, "cGFnZQ==");
    }

    #[test]
    fn test_open_round_trip() {
        let input = b"<html><body>secret</body></html>";
        for compression in [Compression::None, Compression::Gzip] {
            for encoding in [Encoding::Base64, Encoding::Ascii85] {
                let payload = EncodedPayload::seal(
                    input,
                    &options(compression, encoding),
                    &mut StdRng::seed_from_u64(7),
                )
                .unwrap();
                assert_eq!(payload.open(None).unwrap(), input);
            }
        }
    }

    #[test]
    fn test_open_encrypted_requires_passphrase() {
        let options = BuildOptions {
            password: Some("hunter2".to_string()),
            kdf_iterations: 1_000,
            ..Default::default()
        };
        let payload =
            EncodedPayload::seal(b"page", &options, &mut StdRng::seed_from_u64(3)).unwrap();

        assert!(matches!(payload.open(None), Err(VeilError::Access)));
        assert!(matches!(payload.open(Some("wrong")), Err(VeilError::Access)));
        assert_eq!(payload.open(Some("hunter2")).unwrap(), b"page");
    }

    #[test]
    fn test_embedded_json_is_script_safe() {
        let params = DecodeParams {
            version: FORMAT_VERSION,
            layers: vec![Layer::Encoding(Encoding::Base64)],
            salt: None,
            nonce: None,
            iterations: None,
            hint: Some("</script><b>&amp;".to_string()),
        };

        let json = params.to_embedded_json().unwrap();
        assert!(!json.contains('<'));
        assert!(!json.contains('>'));
        assert!(!json.contains('&'));
        assert_eq!(DecodeParams::from_embedded_json(&json).unwrap(), params);
    }

    #[test]
    fn test_embedded_json_shape() {
        let params = DecodeParams {
            version: FORMAT_VERSION,
            layers: vec![
                Layer::Compression(Compression::Gzip),
                Layer::Encoding(Encoding::Base64),
            ],
            salt: None,
            nonce: None,
            iterations: None,
            hint: None,
        };
        assert_eq!(
            params.to_embedded_json().unwrap(),
            r#"{"v":1,"l":["gzip","base64"]}"#
        );
    }

    #[test]
    fn test_rejects_unknown_version_and_layer() {
        let result = DecodeParams::from_embedded_json(r#"{"v":2,"l":["base64"]}"#);
        assert!(matches!(result, Err(VeilError::Encoding(_))));

        let result = DecodeParams::from_embedded_json(r#"{"v":1,"l":["rot13"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_none_is_not_a_layer() {
        assert!(matches!(Layer::parse("none"), Err(VeilError::Encoding(_))));
        assert!(DecodeParams::from_embedded_json(r#"{"v":1,"l":["none","base64"]}"#).is_err());
        assert_eq!(
            Layer::parse("gzip").unwrap(),
            Layer::Compression(Compression::Gzip)
        );
    }

    #[test]
    fn test_seal_params_validates_sizes() {
        let params = DecodeParams {
            version: FORMAT_VERSION,
            layers: vec![Layer::Encryption, Layer::Encoding(Encoding::Base64)],
            salt: Some(STANDARD.encode([0u8; 4])),
            nonce: Some(STANDARD.encode([0u8; NONCE_SIZE])),
            iterations: Some(1_000),
            hint: None,
        };
        assert!(matches!(params.seal_params(), Err(VeilError::Encoding(_))));
    }
}
