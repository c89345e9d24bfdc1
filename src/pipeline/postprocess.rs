//! Post-processing: deterministic cleanup of converter output.
//!
//! Converters write full documents or plain text, while the serving layer
//! embeds HTML renditions into its own pages. These rules turn raw tool
//! output into something embeddable without touching its content. Each rule
//! is a pure function and independently testable.

use once_cell::sync::Lazy;
use regex::Regex;

/// How the stdout of a converter is finished before publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// Bytes are published unchanged (binary output such as PDF).
    AsIs,
    /// Plain text, escaped and wrapped in `<pre>`.
    Preformatted,
    /// HTML/XML fragment with any XML declaration removed.
    Fragment,
}

impl Finish {
    pub fn apply(self, raw: Vec<u8>) -> Vec<u8> {
        match self {
            Finish::AsIs => raw,
            Finish::Preformatted => wrap_preformatted(&String::from_utf8_lossy(&raw)).into_bytes(),
            Finish::Fragment => match String::from_utf8(raw) {
                Ok(text) => strip_xml_declaration(&text).into_bytes(),
                // Not UTF-8: the declaration names another encoding, keep it.
                Err(e) => e.into_bytes(),
            },
        }
    }
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

pub fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Escape HTML special characters ───────────────────────────────────

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Rule 3: Wrap extracted text in <pre> ─────────────────────────────────────

/// Escape extracted plain text and wrap it in a `<pre>` block.
pub fn wrap_preformatted(text: &str) -> String {
    let body = escape_html(&normalise_line_endings(text));
    let body = body.trim_end_matches('\n');
    format!("<pre>\n{body}\n</pre>\n")
}

// ── Rule 4: Strip the XML declaration ────────────────────────────────────────

static RE_XML_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\u{FEFF}?\s*<\?xml[^>]*\?>\s*").unwrap());

/// Remove a leading `<?xml …?>` declaration so the fragment embeds in HTML.
pub fn strip_xml_declaration(input: &str) -> String {
    RE_XML_DECL.replace(input, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_normalised() {
        assert_eq!(normalise_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn html_escaped() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn preformatted_wrapping() {
        let out = wrap_preformatted("Motie 12 < 13\r\nAangenomen\n\n");
        assert_eq!(out, "<pre>\nMotie 12 &lt; 13\nAangenomen\n</pre>\n");
    }

    #[test]
    fn xml_declaration_removed() {
        let out = strip_xml_declaration("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<div>x</div>");
        assert_eq!(out, "<div>x</div>");
    }

    #[test]
    fn fragment_without_declaration_untouched() {
        let html = "<div class=\"spreker\">Voorzitter</div>\n";
        assert_eq!(strip_xml_declaration(html), html);
    }

    #[test]
    fn declaration_only_stripped_at_start() {
        let s = "<div><?xml version=\"1.0\"?></div>";
        assert_eq!(strip_xml_declaration(s), s);
    }

    #[test]
    fn finish_dispatch() {
        assert_eq!(Finish::AsIs.apply(b"%PDF".to_vec()), b"%PDF");
        assert_eq!(
            Finish::Preformatted.apply(b"a&b".to_vec()),
            b"<pre>\na&amp;b\n</pre>\n"
        );
        assert_eq!(
            Finish::Fragment.apply(b"<?xml version=\"1.0\"?><p/>".to_vec()),
            b"<p/>"
        );
    }
}
