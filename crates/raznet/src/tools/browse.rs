//! `browse_web`: fetch a page and keep the start of its readable text.

use scraper::{ElementRef, Html, Node};

use super::truncate_chars;

/// Elements whose whole subtree is never shown to a reader
const SKIP_TAGS: [&str; 5] = ["script", "style", "noscript", "svg", "template"];

/// Fetch `url` and return its text, cut to `max_chars`.
///
/// Every failure, timeouts included, comes back as an `Error browsing URL:` string.
pub fn browse_web(client: &reqwest::blocking::Client, url: &str, max_chars: usize) -> String {
    tracing::debug!(url, "browsing url");
    match fetch_text(client, url) {
        Ok(text) => truncate_chars(&text, max_chars),
        Err(e) => {
            tracing::warn!(url, error = %e, "failed to browse url");
            format!("Error browsing URL: {}", e)
        }
    }
}

fn fetch_text(client: &reqwest::blocking::Client, url: &str) -> reqwest::Result<String> {
    let response = client.get(url).send()?.error_for_status()?;
    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("html"))
        .unwrap_or(true);
    let body = response.text()?;

    Ok(if is_html {
        html_to_text(&body)
    } else {
        collapse_whitespace(&body)
    })
}

/// Readable text of an html document, ignoring scripts, styles and markup
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();
    collect_text(document.root_element(), &mut parts);
    collapse_whitespace(&parts.join(" "))
}

fn collect_text(element: ElementRef, parts: &mut Vec<String>) {
    if SKIP_TAGS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, parts);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
