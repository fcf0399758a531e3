//! Shell templates for self-decoding pages
//!
//! A template is an HTML skeleton with five fixed slots:
//! `{title}`, `{noscript_message}`, `{encoded_payload}`, `{decode_params}` and
//! `{client_script}`. Templates are validated when loaded, so a build never
//! discovers a broken shell halfway through.
//!
//! # Rules
//! - Every slot appears at least once
//! - `{encoded_payload}`, `{decode_params}` and `{client_script}` appear exactly once
//! - The payload and parameter carriers (`id="__d"`, `id="__m"`) and the status
//!   element (`id="__s"`) are present; the bootstrap locates its data and
//!   reports failures through them
//! - Any other `{...}` text (CSS blocks, unknown names) is left as-is
//!
//! Rendering is single-pass: substituted text is never scanned for slots again.

use crate::error::{Result, VeilError};
use regex::{Captures, Regex};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Element id carrying the encoded payload
pub const PAYLOAD_ELEMENT_ID: &str = "__d";

/// Element id carrying the decode parameters
pub const PARAMS_ELEMENT_ID: &str = "__m";

/// Element id the bootstrap writes its failure message into
pub const STATUS_ELEMENT_ID: &str = "__s";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("default", include_str!("templates/default.html")),
    ("minimal", include_str!("templates/minimal.html")),
];

fn slot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("slot pattern is valid"))
}

/// A named template slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Title,
    NoscriptMessage,
    EncodedPayload,
    DecodeParams,
    ClientScript,
}

impl Placeholder {
    pub const ALL: [Placeholder; 5] = [
        Placeholder::Title,
        Placeholder::NoscriptMessage,
        Placeholder::EncodedPayload,
        Placeholder::DecodeParams,
        Placeholder::ClientScript,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Title => "title",
            Placeholder::NoscriptMessage => "noscript_message",
            Placeholder::EncodedPayload => "encoded_payload",
            Placeholder::DecodeParams => "decode_params",
            Placeholder::ClientScript => "client_script",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Placeholder::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Slots carrying machine data may not be duplicated
    fn must_be_unique(&self) -> bool {
        matches!(
            self,
            Placeholder::EncodedPayload | Placeholder::DecodeParams | Placeholder::ClientScript
        )
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.name())
    }
}

/// Values for one render
///
/// `title` and `noscript_message` are plain text and get HTML-escaped. The
/// other three are inserted verbatim and must already be safe for their
/// element (see `payload` and `script`).
#[derive(Debug, Clone, Copy)]
pub struct Slots<'a> {
    pub title: &'a str,
    pub noscript_message: &'a str,
    pub encoded_payload: &'a str,
    pub decode_params: &'a str,
    pub client_script: &'a str,
}

/// A validated shell template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    source: String,
}

impl Template {
    /// Identifiers of the built-in templates
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_TEMPLATES.iter().map(|(name, _)| *name)
    }

    /// Load a built-in template by identifier
    ///
    /// # Errors
    ///
    /// Returns `UnknownTemplate` if no built-in template has that identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use pageveil::Template;
    ///
    /// let template = Template::load("default").unwrap();
    /// assert_eq!(template.name(), "default");
    /// assert!(Template::load("fancy").is_err());
    /// ```
    pub fn load(id: &str) -> Result<Self> {
        let (name, source) = BUILTIN_TEMPLATES
            .iter()
            .find(|(name, _)| *name == id)
            .ok_or_else(|| VeilError::UnknownTemplate(id.to_string()))?;
        Template::parse(*name, *source)
    }

    /// Validate a custom template
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let template = Template {
            name: name.into(),
            source: source.into(),
        };
        template.validate()?;
        Ok(template)
    }

    /// Read and validate a template file; the file stem becomes its name
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading template from {:?}", path);
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        Template::parse(name, source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn validate(&self) -> Result<()> {
        let mut counts = [0usize; 5];
        for caps in slot_pattern().captures_iter(&self.source) {
            if let Some(placeholder) = Placeholder::from_name(&caps[1]) {
                counts[placeholder as usize] += 1;
            }
        }

        for placeholder in Placeholder::ALL {
            let count = counts[placeholder as usize];
            if count == 0 {
                return Err(VeilError::MissingPlaceholder {
                    template: self.name.clone(),
                    placeholder: placeholder.name().to_string(),
                });
            }
            if count > 1 && placeholder.must_be_unique() {
                return Err(self.malformed(format!("{} appears {} times", placeholder, count)));
            }
        }

        for id in [PAYLOAD_ELEMENT_ID, PARAMS_ELEMENT_ID, STATUS_ELEMENT_ID] {
            if !self.source.contains(&format!("id=\"{}\"", id)) {
                return Err(self.malformed(format!("no element with id=\"{}\"", id)));
            }
        }

        Ok(())
    }

    fn malformed(&self, reason: String) -> VeilError {
        VeilError::MalformedTemplate {
            template: self.name.clone(),
            reason,
        }
    }

    /// Fill every slot in one pass
    pub fn render(&self, slots: &Slots<'_>) -> String {
        slot_pattern()
            .replace_all(&self.source, |caps: &Captures| {
                match Placeholder::from_name(&caps[1]) {
                    Some(Placeholder::Title) => escape_html(slots.title),
                    Some(Placeholder::NoscriptMessage) => escape_html(slots.noscript_message),
                    Some(Placeholder::EncodedPayload) => slots.encoded_payload.to_string(),
                    Some(Placeholder::DecodeParams) => slots.decode_params.to_string(),
                    Some(Placeholder::ClientScript) => slots.client_script.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Escape text for element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"<title>{title}</title><p id="__s">{noscript_message}</p>
<script id="__d">{encoded_payload}</script><script id="__m">{decode_params}</script>
<script>{client_script}</script>"#;

    fn slots() -> Slots<'static> {
        Slots {
            title: "Docs",
            noscript_message: "Enable JS",
            encoded_payload: "PAYLOAD",
            decode_params: "{\"v\":1}",
            client_script: "run();",
        }
    }

    #[test]
    fn test_builtin_templates_load() {
        let names: Vec<_> = Template::builtin_names().collect();
        assert_eq!(names, vec!["default", "minimal"]);

        for name in names {
            let template = Template::load(name).unwrap();
            assert_eq!(template.name(), name);
        }
    }

    #[test]
    fn test_unknown_template() {
        assert!(matches!(
            Template::load("fancy"),
            Err(VeilError::UnknownTemplate(name)) if name == "fancy"
        ));
    }

    #[test]
    fn test_missing_placeholder() {
        let source = VALID.replace("{title}", "Static");
        let result = Template::parse("custom", source);
        assert!(matches!(
            result,
            Err(VeilError::MissingPlaceholder { placeholder, .. }) if placeholder == "title"
        ));
    }

    #[test]
    fn test_duplicate_payload_slot_is_malformed() {
        let source = format!("{}{{encoded_payload}}", VALID);
        let result = Template::parse("custom", source);
        assert!(matches!(result, Err(VeilError::MalformedTemplate { .. })));
    }

    #[test]
    fn test_missing_carrier_element_is_malformed() {
        let source = VALID.replace("id=\"__m\"", "id=\"meta\"");
        let result = Template::parse("custom", source);
        assert!(matches!(result, Err(VeilError::MalformedTemplate { .. })));
    }

    #[test]
    fn test_missing_status_element_is_malformed() {
        let source = VALID.replace(" id=\"__s\"", "");
        let result = Template::parse("nostatus", source);
        assert!(matches!(
            result,
            Err(VeilError::MalformedTemplate { template, reason })
                if template == "nostatus" && reason.contains("__s")
        ));
    }

    #[test]
    fn test_builtin_templates_carry_status_element() {
        for name in Template::builtin_names() {
            let template = Template::load(name).unwrap();
            assert!(template.source().contains(&format!("id=\"{}\"", STATUS_ELEMENT_ID)));
        }
    }

    #[test]
    fn test_repeated_text_slots_are_allowed() {
        let source = format!("{}<h1>{{title}}</h1>", VALID);
        let template = Template::parse("custom", source).unwrap();
        assert_eq!(template.render(&slots()).matches("Docs").count(), 2);
    }

    #[test]
    fn test_render_fills_all_slots() {
        let template = Template::parse("custom", VALID).unwrap();
        let html = template.render(&slots());

        assert!(html.contains("<title>Docs</title>"));
        assert!(html.contains(r#"<p id="__s">Enable JS</p>"#));
        assert!(html.contains(r#"<script id="__d">PAYLOAD</script>"#));
        assert!(html.contains(r#"<script id="__m">{"v":1}</script>"#));
        assert!(html.contains("<script>run();</script>"));
    }

    #[test]
    fn test_render_is_single_pass() {
        let template = Template::parse("custom", VALID).unwrap();
        let html = template.render(&Slots {
            encoded_payload: "{title}",
            ..slots()
        });
        assert!(html.contains(r#"<script id="__d">{title}</script>"#));
    }

    #[test]
    fn test_render_escapes_text_slots() {
        let template = Template::parse("custom", VALID).unwrap();
        let html = template.render(&Slots {
            title: "<b>Docs & more</b>",
            ..slots()
        });
        assert!(html.contains("<title>&lt;b&gt;Docs &amp; more&lt;/b&gt;</title>"));
    }

    #[test]
    fn test_css_blocks_untouched() {
        let template = Template::load("default").unwrap();
        let html = template.render(&slots());
        assert!(html.contains("body { margin: 0;"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell.html");
        std::fs::write(&path, VALID).unwrap();

        let template = Template::from_file(&path).unwrap();
        assert_eq!(template.name(), "shell");

        let missing = Template::from_file(dir.path().join("nope.html"));
        assert!(matches!(missing, Err(VeilError::Io(_))));
    }
}
