//! Markup cleanup before persistence.
//!
//! Removes images, scripts, styles, embedded frames, canvases, inline SVG and
//! HTML comments from a fetched page. Text, structure and links are left
//! exactly as fetched.

use std::sync::LazyLock;

use regex::Regex;

use crate::markup::compile_static_regex;

/// Elements removed together with everything inside them.
const STRIPPED_CONTAINERS: &[&str] = &["script", "style", "iframe", "canvas", "svg"];

/// Everything removed, as one alternation scanned left to right.
///
/// Whichever construct opens first wins, so a `<!--` inside a script body goes
/// with the script and a `<script>` inside a comment goes with the comment.
/// Comments are removed only when terminated. Containers are removed in their
/// self-closing form, their paired form, or unterminated up to the end of
/// input.
static STRIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    let mut alternatives = vec![r"<!--.*?-->".to_string()];
    alternatives.extend(STRIPPED_CONTAINERS.iter().map(|tag| {
        format!(r"<{tag}\b[^>]*/>|<{tag}\b[^>]*>.*?(?:</{tag}\s*>|\z)")
    }));
    alternatives.push(r"<(?:img|picture|source)\b[^>]*>|</picture\s*>".to_string());
    compile_static_regex(&format!("(?is){}", alternatives.join("|")))
});

/// Returns `raw` with non-essential markup removed.
///
/// ```
/// use catalogue_sync_core::sanitize;
///
/// let cleaned = sanitize(r#"<p>Hola <img src="a.png"> <a href="/x">mundo</a></p><script>x()</script>"#);
/// assert_eq!(cleaned, r#"<p>Hola  <a href="/x">mundo</a></p>"#);
/// ```
#[must_use]
pub fn sanitize(raw: &str) -> String {
    STRIP_RE.replace_all(raw, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_scripts_and_styles_with_content() {
        let raw = "<head><style>p{color:red}</style><script type=\"x\">var a = '<p>';</script></head><p>ok</p>";
        assert_eq!(sanitize(raw), "<head></head><p>ok</p>");
    }

    #[test]
    fn test_removes_images_keeps_surrounding_text() {
        let raw = "<p>Señal <IMG SRC=\"r1.png\" alt=\"r1\"/> de peligro</p>";
        assert_eq!(sanitize(raw), "<p>Señal  de peligro</p>");
    }

    #[test]
    fn test_removes_picture_sources() {
        let raw = "<picture><source srcset=\"a.webp\"><img src=\"a.png\"></picture><p>t</p>";
        assert_eq!(sanitize(raw), "<p>t</p>");
    }

    #[test]
    fn test_removes_iframe_canvas_svg_and_comments() {
        let raw = "<!-- tracking --><iframe src=\"ad\"></iframe><canvas id=c></canvas>\
                   <svg viewBox=\"0 0 1 1\"><path d=\"M0\"/></svg><div>q</div>";
        assert_eq!(sanitize(raw), "<div>q</div>");
    }

    #[test]
    fn test_self_closing_and_unterminated_elements() {
        assert_eq!(sanitize("<p>a</p><svg/><p>b</p>"), "<p>a</p><p>b</p>");
        assert_eq!(sanitize("<p>a</p><script>never closed"), "<p>a</p>");
    }

    #[test]
    fn test_comment_opener_inside_script_keeps_following_text() {
        let raw = r#"<script>var open = "<!--";</script><p>Pregunta 1: ¿Qué indica la señal?</p>"#;
        assert_eq!(sanitize(raw), "<p>Pregunta 1: ¿Qué indica la señal?</p>");
    }

    #[test]
    fn test_unterminated_comment_is_left_alone() {
        let raw = "<p>a</p><!-- sin cerrar <p>b</p>";
        assert_eq!(sanitize(raw), raw);
    }

    #[test]
    fn test_script_tag_inside_comment_goes_with_the_comment() {
        let raw = "<!-- <script> --><p>texto</p>";
        assert_eq!(sanitize(raw), "<p>texto</p>");
    }

    #[test]
    fn test_preserves_links_tables_and_text() {
        let raw = "<table><tr><td><a href=\"/q?id=1&amp;x=2\">Pregunta 1</a></td></tr></table>";
        assert_eq!(sanitize(raw), raw);
    }

    #[test]
    fn test_does_not_touch_lookalike_tags() {
        let raw = "<scripture>text</scripture><imgur>x</imgur>";
        assert_eq!(sanitize(raw), raw);
    }
}
