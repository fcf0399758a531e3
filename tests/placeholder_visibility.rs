//! What a non-scripting agent sees
//!
//! With every `<script>` element removed, a built page must show the
//! placeholder text and nothing of the original content.

use pageveil::{
    build_page, BuildOptions, Compression, Encoding, PageBuilder, Template, DEFAULT_CLIENT_SCRIPT,
};
use regex::Regex;

const PAGE: &[u8] = b"<html><body>secret</body></html>";

fn without_scripts(html: &str) -> String {
    let scripts = Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap();
    scripts.replace_all(html, "").into_owned()
}

#[test]
fn test_gzip_base64_example_hides_content() {
    let template = Template::load("default").unwrap();
    let html = build_page(
        PAGE,
        &template,
        DEFAULT_CLIENT_SCRIPT,
        None,
        "",
        true,
        "gzip",
        "base64",
        false,
    )
    .unwrap();

    assert!(!html.contains("secret"));
    assert!(!without_scripts(&html).contains("secret"));
}

#[test]
fn test_static_view_shows_only_placeholder() {
    let options = BuildOptions::builder()
        .title("Quarterly report")
        .noscript_message("Please enable JavaScript.")
        .build()
        .unwrap();

    for template in Template::builtin_names() {
        for compression in [Compression::None, Compression::Gzip] {
            for encoding in [Encoding::Base64, Encoding::Ascii85] {
                let builder = PageBuilder::new(BuildOptions {
                    compression,
                    encoding,
                    ..options.clone()
                })
                .unwrap()
                .with_template(Template::load(template).unwrap());

                let html = builder.build(PAGE).unwrap();
                let visible = without_scripts(&html);

                assert!(visible.contains("<title>Quarterly report</title>"));
                assert!(visible.contains("Please enable JavaScript."));
                assert!(!visible.contains("secret"), "{} {} {}", template, compression, encoding);
                assert!(!html.contains("<body>secret"));
            }
        }
    }
}

#[test]
fn test_placeholder_text_is_escaped() {
    let options = BuildOptions::builder()
        .title("<script>alert(1)</script>")
        .build()
        .unwrap();
    let html = PageBuilder::new(options).unwrap().build(PAGE).unwrap();

    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!html.contains("alert(1)</script>"));
}

#[test]
fn test_obscured_script_has_no_decoder_names() {
    let html = PageBuilder::new(BuildOptions::default())
        .unwrap()
        .build(PAGE)
        .unwrap();

    let markers = [
        "sdp_",
        "fromAscii85",
        "bootstrap",
        "PBKDF2",
        "AES-GCM",
        "DecompressionStream",
    ];
    for name in markers {
        assert!(!html.contains(name), "found {}", name);
    }
}
