//! HTML extraction for news homepages and article pages.
//!
//! Everything here is pure: same markup in, same output out.
use newsrant_common::Article;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// How many primary candidates are inspected before filtering.
const PRIMARY_CANDIDATES: usize = 10;
/// Minimum trimmed length (chars) for a paragraph to count in the body fallback.
const FALLBACK_MIN_PARAGRAPH_CHARS: usize = 100;

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

static CANDIDATES: LazyLock<Selector> =
    LazyLock::new(|| selector(".article, .story, .article-list article"));
static CANDIDATE_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("h2, .title, .headline, a.title"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static HEADLINE_ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| selector("h1 a[href], h2 a[href], h3 a[href]"));
static BODY_REGION: LazyLock<Selector> = LazyLock::new(|| {
    selector(".article-body, .story-body, .article-content, main article")
});
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));

/// Parse the homepage into at most `max` articles, in display order.
///
/// Uses story containers first and falls back to headline anchors when no container
/// yields a usable title and link. Relative links are resolved against `base`.
pub fn parse_article_list(html: &str, base: &Url, max: usize) -> Vec<Article> {
    let doc = Html::parse_document(html);

    let primary: Vec<Article> = doc
        .select(&CANDIDATES)
        .take(PRIMARY_CANDIDATES)
        .filter_map(|el| candidate_article(el, base))
        .collect();

    let articles = if primary.is_empty() {
        tracing::debug!("extract.article_list.fallback");
        doc.select(&HEADLINE_ANCHORS)
            .filter_map(|a| {
                let title = element_text(a);
                let url = resolve(base, a.value().attr("href")?)?;
                (!title.is_empty()).then(|| Article::new(title, url))
            })
            .collect()
    } else {
        primary
    };

    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.url.clone()))
        .take(max)
        .collect()
}

fn candidate_article(el: ElementRef<'_>, base: &Url) -> Option<Article> {
    let title = element_text(el.select(&CANDIDATE_TITLE).next()?);
    let href = el
        .select(&ANCHOR)
        .next()?
        .value()
        .attr("href")
        .filter(|h| !h.trim().is_empty())?;
    let url = resolve(base, href)?;
    (!title.is_empty()).then(|| Article::new(title, url))
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

/// Extract readable body text from an article page, whitespace-normalised and cut
/// to `max_chars` characters.
pub fn extract_article_text(html: &str, max_chars: usize) -> String {
    let doc = Html::parse_document(html);

    let paragraphs: Vec<String> = match doc.select(&BODY_REGION).next() {
        Some(body) => body.select(&PARAGRAPH).map(element_text).collect(),
        None => doc
            .select(&PARAGRAPH)
            .map(element_text)
            .filter(|p| p.chars().count() > FALLBACK_MIN_PARAGRAPH_CHARS)
            .collect(),
    };

    let joined = normalize_whitespace(&paragraphs.join(" "));
    truncate_chars(&joined, max_chars)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Collapse every run of whitespace (including newlines and tabs) to one space.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
