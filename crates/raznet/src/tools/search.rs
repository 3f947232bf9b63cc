//! `duckduckgo_search`: query DuckDuckGo's html endpoint and list the top results.

use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use url::Url;

/// DuckDuckGo's javascript free search page
pub const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub body: String,
    pub href: String,
}

/// Run a search and format the top results, one per line.
///
/// Transport failures are returned as errors rather than as an `Error` string, since the
/// search never produced anything to show.
pub fn duckduckgo_search(
    client: &reqwest::blocking::Client,
    endpoint: &str,
    query: &str,
    max_results: usize,
) -> Result<String> {
    tracing::debug!(query, "searching duckduckgo");
    let response = client
        .get(endpoint)
        .query(&[("q", query)])
        .send()?
        .error_for_status()?;
    let html = response.text()?;

    let hits = parse_results(&html, max_results)?;
    if hits.is_empty() {
        return Ok(format!("No results found for: {}", query));
    }
    Ok(format_results(&hits))
}

pub fn format_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("- {}: {} (URL: {})", hit.title, hit.body, hit.href))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull result titles, snippets and target links out of a results page
pub fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(html);
    let result_selector = selector("div.result")?;
    let title_selector = selector("a.result__a")?;
    let snippet_selector = selector(".result__snippet")?;

    let hits = document
        .select(&result_selector)
        .filter_map(|result| {
            let link = result.select(&title_selector).next()?;
            let title = collapse(&link.text().collect::<String>());
            let href = resolve_href(link.value().attr("href")?);
            let body = result
                .select(&snippet_selector)
                .next()
                .map(|s| collapse(&s.text().collect::<String>()))
                .unwrap_or_default();
            (!title.is_empty()).then_some(SearchHit { title, body, href })
        })
        .take(max_results)
        .collect();

    Ok(hits)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {}: {:?}", css, e))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result links go through a redirect (`//duckduckgo.com/l/?uddg=<target>`), unwrap it
fn resolve_href(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or(absolute)
}
