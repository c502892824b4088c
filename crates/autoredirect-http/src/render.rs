//! HTML for the self-submitting redirection page.

use autoredirect_core::form::{FALLBACK_DELAY_MS, FORM_ID, MESSAGE_ID, METHOD_OVERRIDE_FIELD};
use autoredirect_core::markup::{escape_html, hidden_input, void_close};
use autoredirect_core::{FormPage, REDIRECTION_INFORMATION_KEY};

/// Class of the element wrapping the nested token field.
pub const NESTED_INFORMATION_CLASS: &str = "nested_redirection_information";

pub fn render_form_page(page: &FormPage, xhtml: bool) -> String {
    let close = void_close(xhtml);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head><title>Redirecting</title></head>\n<body>\n");
    html.push_str(&format!(
        "<form id=\"{FORM_ID}\" action=\"{}\" method=\"{}\">\n",
        escape_html(&page.action),
        page.form_method()
    ));
    if let Some(method) = page.method_override() {
        html.push_str(&hidden_input(METHOD_OVERRIDE_FIELD, method, xhtml));
        html.push('\n');
    }
    for (name, value) in page.fields() {
        html.push_str(&hidden_input(&name, &value, xhtml));
        html.push('\n');
    }
    html.push_str(&format!("<div class=\"{NESTED_INFORMATION_CLASS}\">\n"));
    if let Some(token) = &page.nested_token {
        html.push_str(&hidden_input(REDIRECTION_INFORMATION_KEY, token, xhtml));
        html.push('\n');
    }
    html.push_str("</div>\n");
    html.push_str(&format!(
        "<noscript>\n<input type=\"submit\" value=\"Click here to continue.\"{close}\n</noscript>\n"
    ));
    html.push_str(&format!(
        "<div id=\"{MESSAGE_ID}\" style=\"display: none\">\n<h2>Your request is being processed...</h2>\n<input type=\"submit\" value=\"Click here if you are not redirected within 5 seconds.\"{close}\n</div>\n"
    ));
    html.push_str("</form>\n");
    html.push_str(&format!(
        "<script type=\"text/javascript\">\n//<![CDATA[\ndocument.getElementById('{FORM_ID}').submit();\nsetTimeout(function() {{\n  document.getElementById('{MESSAGE_ID}').style.display = 'block';\n}}, {FALLBACK_DELAY_MS});\n//]]>\n</script>\n"
    ));
    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoredirect_core::{Parameters, RedirectMethod};

    fn page(method: RedirectMethod, nested: Option<&str>) -> FormPage {
        FormPage {
            action: "/comments/create".to_string(),
            method,
            parameters: Parameters::new().with("summary", "<hi>"),
            nested_token: nested.map(str::to_string),
        }
    }

    #[test]
    fn post_page_replays_fields_and_nested_token() {
        let html = render_form_page(&page(RedirectMethod::Post, Some("tok")), true);
        assert!(html.contains(
            r#"<form id="_auto_redirection_form" action="/comments/create" method="post">"#
        ));
        assert!(html.contains(r#"<input type="hidden" name="summary" value="&lt;hi&gt;" />"#));
        assert!(html.contains(
            "<div class=\"nested_redirection_information\">\n<input type=\"hidden\" name=\"_redirection_information\" value=\"tok\" />\n</div>"
        ));
        assert!(html.contains("<noscript>"));
        assert!(html.contains(r#"<div id="message" style="display: none">"#));
        assert!(html.contains("}, 1000);"));
        assert!(!html.contains("_method"));
    }

    #[test]
    fn delete_page_tunnels_the_method() {
        let html = render_form_page(&page(RedirectMethod::Delete, None), false);
        assert!(html.contains(r#"method="post""#));
        assert!(html.contains(r#"<input type="hidden" name="_method" value="delete">"#));
        assert!(!html.contains(" />"));
        assert!(!html.contains("name=\"_redirection_information\""));
    }
}
