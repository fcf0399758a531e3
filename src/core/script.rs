//! Client script preparation
//!
//! Turns bootstrap source into the script that is inlined into the shell:
//!
//! 1. Drop diagnostic lines (tagged `// @debug`) unless debug output is wanted
//! 2. Minify (strip comments, collapse whitespace) unless debug output is wanted
//! 3. With `obscure_action`, strip comments, rename every `sdp_` identifier
//!    to a neutral short name (numbered by first appearance) and rewrite
//!    double-quoted literals as escape sequences
//! 4. Neutralise `</script` and `<!--` so the script cannot end its element early
//!
//! The minifier is simple: sources must terminate statements with
//! semicolons and must not contain regex literals that include `//` or `/*`.

use crate::error::{Result, VeilError};
use crate::options::BuildOptions;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Default browser bootstrap
pub const DEFAULT_CLIENT_SCRIPT: &str = include_str!("bootstrap.js");

/// Trailing comment marking a diagnostic line
pub const DEBUG_MARKER: &str = "// @debug";

/// Prefix of identifiers that `obscure_action` renames
pub const OBSCURE_PREFIX: &str = "sdp_";

fn obscure_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\bsdp_[A-Za-z0-9_$]*").expect("identifier pattern is valid")
    })
}

fn closing_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)</(script)|<!--").expect("closing tag pattern is valid")
    })
}

/// Produce the inline client script for one build
pub fn prepare_client_script(source: &str, options: &BuildOptions) -> Result<String> {
    let debug = options.insert_debug_statements;
    let mut script = filter_debug_lines(source, debug);

    if !debug {
        script = minify(&script)?;
    } else if options.obscure_action {
        script = strip_comments(&script)?;
    }

    if options.obscure_action {
        script = encode_string_literals(&obscure_identifiers(&script));
    }

    Ok(neutralize_markup(&script))
}

/// Remove (or keep) lines ending with [`DEBUG_MARKER`]
pub fn filter_debug_lines(source: &str, keep: bool) -> String {
    if keep {
        return source.to_string();
    }

    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        if line.trim_end().ends_with(DEBUG_MARKER) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Rename every `sdp_` identifier to `_$0`, `_$1`, ... in order of first use
pub fn obscure_identifiers(script: &str) -> String {
    let mut names: HashMap<String, String> = HashMap::new();
    obscure_pattern()
        .replace_all(script, |caps: &Captures| {
            let next = names.len();
            names
                .entry(caps[0].to_string())
                .or_insert_with(|| format!("_${:x}", next))
                .clone()
        })
        .into_owned()
}

/// Rewrite the body of every double-quoted literal as `\xHH`/`\uHHHH` escapes
///
/// Existing escape sequences and the `"use strict"` directive are kept.
/// Single-quoted and template literals are passed through unchanged.
pub fn encode_string_literals(script: &str) -> String {
    let mut out = String::with_capacity(script.len() * 2);
    let mut chars = script.chars();
    let mut quote: Option<char> = None;
    let mut literal = String::new();

    while let Some(ch) = chars.next() {
        match quote {
            None => {
                out.push(ch);
                if ch == '"' || ch == '\'' || ch == '`' {
                    quote = Some(ch);
                }
            }
            Some('"') => {
                if ch == '\\' {
                    literal.push(ch);
                    if let Some(next) = chars.next() {
                        literal.push(next);
                    }
                } else if ch == '"' {
                    push_literal(&mut out, &literal);
                    out.push(ch);
                    literal.clear();
                    quote = None;
                } else {
                    literal.push(ch);
                }
            }
            Some(q) => {
                out.push(ch);
                if ch == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if ch == q {
                    quote = None;
                }
            }
        }
    }

    // Unterminated literal: emit as found
    out.push_str(&literal);
    out
}

fn push_literal(out: &mut String, literal: &str) {
    if literal == "use strict" {
        out.push_str(literal);
        return;
    }

    let mut chars = literal.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            out.push(ch);
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }

        let code = ch as u32;
        if code < 0x100 {
            out.push_str(&format!("\\x{:02x}", code));
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units).iter() {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
}

fn neutralize_markup(script: &str) -> String {
    closing_tag_pattern()
        .replace_all(script, |caps: &Captures| match caps.get(1) {
            Some(tag) => format!("<\\/{}", tag.as_str()),
            None => "<\\!--".to_string(),
        })
        .into_owned()
}

/// Comment-stripping states
enum State {
    Normal,
    AfterSlash,
    InString(char),
    InStringEscape(char),
    InBlockComment,
    InBlockCommentEnd,
    InLineComment,
}

fn malformed(reason: &str) -> VeilError {
    VeilError::MalformedTemplate {
        template: "client script".to_string(),
        reason: reason.to_string(),
    }
}

/// Strip `/* */` and `//` comments, leaving string literals untouched
pub fn strip_comments(input: &str) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    let mut state = State::Normal;

    for ch in input.chars() {
        match state {
            State::Normal => {
                output.push(ch);
                match ch {
                    '"' | '\'' | '`' => state = State::InString(ch),
                    '/' => state = State::AfterSlash,
                    _ => {}
                }
            }
            State::AfterSlash => match ch {
                '*' => {
                    output.pop();
                    state = State::InBlockComment;
                }
                '/' => {
                    output.pop();
                    state = State::InLineComment;
                }
                '"' | '\'' | '`' => {
                    output.push(ch);
                    state = State::InString(ch);
                }
                _ => {
                    // Division or regex: keep the character
                    output.push(ch);
                    state = State::Normal;
                }
            },
            State::InString(quote) => {
                output.push(ch);
                if ch == '\\' {
                    state = State::InStringEscape(quote);
                } else if ch == quote {
                    state = State::Normal;
                }
            }
            State::InStringEscape(quote) => {
                output.push(ch);
                state = State::InString(quote);
            }
            State::InBlockComment => {
                if ch == '*' {
                    state = State::InBlockCommentEnd;
                }
            }
            State::InBlockCommentEnd => {
                if ch == '/' {
                    // Keep tokens on either side of the comment apart
                    output.push(' ');
                    state = State::Normal;
                } else if ch != '*' {
                    state = State::InBlockComment;
                }
            }
            State::InLineComment => {
                if ch == '\n' || ch == '\r' {
                    output.push(ch);
                    state = State::Normal;
                }
            }
        }
    }

    match state {
        State::InString(_) | State::InStringEscape(_) => {
            Err(malformed("unterminated string literal"))
        }
        State::InBlockComment | State::InBlockCommentEnd => {
            Err(malformed("unterminated block comment"))
        }
        _ => Ok(output),
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

fn push_separator(out: &mut String, next: char) {
    let Some(prev) = out.chars().last() else {
        return;
    };

    // `a + ++b` must not become `a+++b`
    if (prev == '+' || prev == '-') && prev == next {
        out.push(' ');
        return;
    }

    if is_word_char(prev) && is_word_char(next) {
        out.push(' ');
    }
}

/// Collapse whitespace outside string literals
pub fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut pending_space = false;

    for ch in input.chars() {
        if let Some(q) = quote {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }

        if pending_space {
            push_separator(&mut out, ch);
            pending_space = false;
        }

        if ch == '"' || ch == '\'' || ch == '`' {
            quote = Some(ch);
        }
        out.push(ch);
    }

    out
}

/// Strip comments, then collapse whitespace
pub fn minify(input: &str) -> Result<String> {
    let no_comments = strip_comments(input)?;
    Ok(collapse_whitespace(&no_comments).trim().to_string())
}
