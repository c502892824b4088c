//! Minimal markup helpers shared by the view helpers and renderers.

/// Escape text for use inside an HTML attribute or element body.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Closing sequence for a void element such as `<input>`.
pub fn void_close(xhtml: bool) -> &'static str {
    if xhtml { " />" } else { ">" }
}

/// `<input type="hidden">` with escaped name and value.
pub fn hidden_input(name: &str, value: &str, xhtml: bool) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}"{}"#,
        escape_html(name),
        escape_html(value),
        void_close(xhtml)
    )
}

/// HTML comment whose body cannot terminate the comment early.
pub fn comment(body: &str) -> String {
    format!("<!-- {} -->", body.replace("--", "- -"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_attribute_breakers() {
        assert_eq!(
            escape_html(r#"a<b>"c"&'d'"#),
            "a&lt;b&gt;&quot;c&quot;&amp;&#39;d&#39;"
        );
    }

    #[test]
    fn hidden_input_follows_dialect() {
        assert_eq!(
            hidden_input("x", "1", true),
            r#"<input type="hidden" name="x" value="1" />"#
        );
        assert_eq!(
            hidden_input("x", "1", false),
            r#"<input type="hidden" name="x" value="1">"#
        );
    }

    #[test]
    fn comment_cannot_be_closed_from_inside() {
        assert_eq!(comment("a --> b"), "<!-- a - -> b -->");
    }
}
