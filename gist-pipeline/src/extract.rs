//! Readable-text extraction from rendered page HTML.
//!
//! The document is parsed into a private tree, noise regions are detached,
//! and the candidate region with the most visible text wins. The result is
//! normalized and deduplicated before the sparseness check.
use chrono::Utc;
use gist_common::{GistError, PageMetadata, Result};
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Extracted text shorter than this is treated as an empty page.
pub const MIN_CONTENT_CHARS: usize = 50;
/// Lines shorter than this are never deduplicated.
pub const DEDUP_MIN_LINE_CHARS: usize = 30;
/// Upper bound on links returned by [`extract_links`].
pub const MAX_LINKS: usize = 20;

/// Removed before any text is measured, in this order.
const NOISE_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "script",
    "style",
    "noscript",
    "iframe",
    "aside",
    "form",
    "[role=\"navigation\"]",
    "[role=\"banner\"]",
    "[role=\"contentinfo\"]",
    "[class*=\"cookie\"]",
    "[id*=\"cookie\"]",
    "[class*=\"modal\"]",
    "[class*=\"popup\"]",
    "[class*=\"advert\"]",
    "[class~=\"ad\"]",
    "[class~=\"ads\"]",
    "[class^=\"ad-\"]",
    "[class*=\" ad-\"]",
    "[id~=\"ad\"]",
    "[id~=\"ads\"]",
    "[id^=\"ad-\"]",
    "[class*=\"social-share\"]",
    "[class*=\"share-buttons\"]",
    "[class*=\"newsletter\"]",
    "[class*=\"comments\"]",
    "#comments",
];

/// Main-content candidates, scanned in order.
const CANDIDATE_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".article-body",
    ".post",
    "#content",
    ".main-content",
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

fn compile(list: &[&str]) -> Vec<Selector> {
    list.iter().filter_map(|s| Selector::parse(s).ok()).collect()
}

static NOISE: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(NOISE_SELECTORS));
static CANDIDATES: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(CANDIDATE_SELECTORS));
static BODY: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("body").ok());
static MANY_NEWLINES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n{3,}").ok());
static MANY_SPACES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").ok());

/// Extract the readable text of a rendered page.
///
/// Fails with a non-retryable `NoContent` error when fewer than
/// [`MIN_CONTENT_CHARS`] characters survive.
///
/// ```
/// let html = "<html><body><nav>Home | About</nav><article><p>A sufficiently long \
///             paragraph of article text that easily clears the threshold.</p>\
///             </article></body></html>";
/// let text = gist_pipeline::extract::extract(html).unwrap();
/// assert!(text.starts_with("A sufficiently long"));
/// assert!(!text.contains("Home"));
/// ```
pub fn extract(html: &str) -> Result<String> {
    let mut doc = Html::parse_document(html);
    strip_noise(&mut doc);

    let raw = best_candidate_text(&doc)
        .or_else(|| {
            BODY.as_ref()
                .and_then(|sel| attached(&doc, sel).next())
                .map(visible_text)
        })
        .unwrap_or_else(|| visible_text(doc.root_element()));

    let text = dedup_lines(&normalize(&raw));
    let chars = text.chars().count();
    if chars < MIN_CONTENT_CHARS {
        return Err(GistError::no_content(format!(
            "page yielded {chars} characters of readable text (minimum {MIN_CONTENT_CHARS})"
        )));
    }
    Ok(text)
}

fn strip_noise(doc: &mut Html) {
    for sel in NOISE.iter() {
        let ids: Vec<_> = doc.select(sel).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

/// Matches of `sel` still reachable from the document root.
///
/// `Html::select` scans the whole node arena, detached subtrees included.
fn attached<'a>(doc: &'a Html, sel: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let root = doc.tree.root().id();
    doc.select(sel)
        .filter(move |el| el.ancestors().any(|node| node.id() == root))
}

/// Longest candidate by visible text; ties keep the first seen.
fn best_candidate_text(doc: &Html) -> Option<String> {
    let mut best: Option<(usize, String)> = None;
    for sel in CANDIDATES.iter() {
        for el in attached(doc, sel) {
            let text = visible_text(el);
            let len = text.trim().chars().count();
            if len == 0 {
                continue;
            }
            if best.as_ref().map_or(true, |(best_len, _)| len > *best_len) {
                best = Some((len, text));
            }
        }
    }
    best.map(|(_, text)| text)
}

/// Text a reader would see, with block boundaries as newlines.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    walk(root, &mut out);
    out
}

fn walk(el: ElementRef<'_>, out: &mut String) {
    if is_hidden(&el) {
        return;
    }
    let name = el.value().name();
    if name == "br" {
        out.push('\n');
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => push_collapsed(out, text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

fn is_hidden(el: &ElementRef<'_>) -> bool {
    let v = el.value();
    if v.attr("hidden").is_some() {
        return true;
    }
    if v.attr("aria-hidden").is_some_and(|a| a.eq_ignore_ascii_case("true")) {
        return true;
    }
    v.attr("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none")
    })
}

fn push_collapsed(out: &mut String, text: &str) {
    let mut words = text.split_whitespace().peekable();
    if words.peek().is_none() {
        if !text.is_empty() && !out.ends_with([' ', '\n']) {
            out.push(' ');
        }
        return;
    }
    if text.starts_with(char::is_whitespace) && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
    let mut first = true;
    for word in words {
        if !first {
            out.push(' ');
        }
        out.push_str(word);
        first = false;
    }
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

/// Trim lines, collapse runs of blank lines and horizontal whitespace.
fn normalize(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();
    let mut text = lines.join("\n");
    if let Some(re) = MANY_NEWLINES.as_ref() {
        text = re.replace_all(&text, "\n\n").into_owned();
    }
    if let Some(re) = MANY_SPACES.as_ref() {
        text = re.replace_all(&text, " ").into_owned();
    }
    text.trim().to_string()
}

/// Drop repeated long lines, keeping the first occurrence.
fn dedup_lines(text: &str) -> String {
    let mut seen = HashSet::new();
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.chars().count() < DEDUP_MIN_LINE_CHARS || seen.insert(trimmed.to_lowercase())
        })
        .collect();
    kept.join("\n")
}

/// Page title and description straight from the HTML head.
pub fn extract_metadata(html: &str, url: &str) -> PageMetadata {
    let doc = Html::parse_document(html);
    let title = first_text(&doc, "title")
        .or_else(|| meta_content(&doc, "meta[property=\"og:title\"]"))
        .or_else(|| first_text(&doc, "h1"))
        .unwrap_or_default();
    let description = meta_content(&doc, "meta[name=\"description\"]")
        .or_else(|| meta_content(&doc, "meta[property=\"og:description\"]"))
        .unwrap_or_default();
    PageMetadata {
        title,
        description,
        url: url.to_string(),
        timestamp: Utc::now(),
    }
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

/// Same-host http(s) links in document order, without fragments or the page itself.
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in doc.select(&anchors).filter_map(|a| a.value().attr("href")) {
        let Ok(resolved) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https")
            || resolved.host_str() != base.host_str()
            || resolved.fragment().is_some()
            || resolved.as_str() == base.as_str()
        {
            continue;
        }
        if seen.insert(resolved.to_string()) {
            links.push(resolved.to_string());
            if links.len() == MAX_LINKS {
                break;
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use gist_common::ErrorKind;

    const LONG: &str = "This sentence is comfortably longer than thirty characters.";

    fn page(body: &str) -> String {
        format!("<html><head><title>T</title></head><body>{body}</body></html>")
    }

    #[test]
    fn strips_noise_and_prefers_largest_candidate() {
        let html = page(&format!(
            "<header>Site header text that is fairly long itself</header>\
             <nav><a href='/'>Home</a></nav>\
             <div class='content'><p>Short teaser.</p></div>\
             <article><h1>Headline</h1><p>{LONG}</p><p>Second paragraph with more words in it.</p></article>\
             <footer>Copyright footer</footer>"
        ));
        let text = extract(&html).unwrap();
        assert!(text.starts_with("Headline\n"));
        assert!(text.contains(LONG));
        assert!(!text.contains("teaser"));
        assert!(!text.contains("header"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn equal_length_candidates_keep_first_seen() {
        let a = "Alpha text block that is exactly as long as the other one!";
        let b = "Bravo text block that is exactly as long as the other one!";
        let html = page(&format!("<main><p>{b}</p></main><article><p>{a}</p></article>"));
        // `article` is scanned before `main`.
        assert_eq!(extract(&html).unwrap(), a);
    }

    #[test]
    fn candidates_inside_removed_regions_are_ignored() {
        let real = "The real story lives in main and is long enough to count.";
        let html = page(&format!(
            "<main><p>{real}</p></main>\
             <section class=\"comments\"><article class=\"comment\"><p>A very long reader \
             comment that rambles on about the story for far longer than the story itself \
             manages to.</p></article></section>\
             <aside><article><p>Related post teaser that is also much longer than the main \
             text of this page, padded out with words.</p></article></aside>"
        ));
        let text = extract(&html).unwrap();
        assert_eq!(text, real);
        assert!(!text.contains("reader comment"));
        assert!(!text.contains("Related post"));
    }

    #[test]
    fn ad_selectors_spare_words_containing_ads() {
        let html = page(&format!(
            "<div class=\"threads uploads\"><div id=\"downloads\"><p>{LONG}</p>\
             <p>Body text inside wrappers whose names merely contain ads.</p></div></div>\
             <div class=\"ad\">Buy now</div><div class=\"sidebar ad-slot\">Sponsored</div>\
             <p class=\"read-more\">Continue reading below the fold</p>"
        ));
        let text = extract(&html).unwrap();
        assert!(text.contains(LONG));
        assert!(text.contains("merely contain ads"));
        assert!(!text.contains("Buy now"));
        assert!(!text.contains("Sponsored"));
        assert!(text.contains("Continue reading"));
    }

    #[test]
    fn falls_back_to_body_text() {
        let html = page(&format!("<div><p>{LONG}</p><p>And then some more body text.</p></div>"));
        let text = extract(&html).unwrap();
        assert!(text.contains("And then some more body text."));
    }

    #[test]
    fn hidden_elements_are_not_visible() {
        let html = page(&format!(
            "<article><p>{LONG}</p>\
             <p hidden>secret one</p>\
             <p aria-hidden=\"true\">secret two</p>\
             <p style=\"display: none\">secret three</p></article>"
        ));
        let text = extract(&html).unwrap();
        assert!(!text.contains("secret"));
    }

    #[test]
    fn long_duplicates_dropped_short_lines_kept() {
        let html = page(&format!(
            "<article><p>{LONG}</p><p>Read more</p><p>{}</p><p>Read more</p><p>{LONG}</p></article>",
            LONG.to_uppercase()
        ));
        let text = extract(&html).unwrap();
        let lines: Vec<_> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec![LONG, "Read more", "Read more"]);
    }

    #[test]
    fn collapses_whitespace_and_blank_runs() {
        let html = page(&format!(
            "<article><p>  {LONG}   with\t\ttabs  </p><br><br><br><br><p>Tail line that follows.</p></article>"
        ));
        let text = extract(&html).unwrap();
        assert!(!text.contains("\n\n\n"));
        assert!(!text.contains("  "));
        assert!(text.contains("with tabs"));
    }

    #[test]
    fn sparse_page_is_no_content() {
        let err = extract(&page("<article><p>Too short.</p></article>")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoContent);
        assert!(!err.is_retryable());

        let err = extract("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoContent);
    }

    #[test]
    fn metadata_falls_back_through_sources() {
        let html = "<html><head><meta property='og:title' content='OG Title'>\
                    <meta property='og:description' content='OG description'></head>\
                    <body><h1>Heading</h1></body></html>";
        let meta = extract_metadata(html, "https://example.com/a");
        assert_eq!(meta.title, "OG Title");
        assert_eq!(meta.description, "OG description");
        assert_eq!(meta.url, "https://example.com/a");

        let meta = extract_metadata("<body><h1> Only   heading </h1></body>", "https://example.com/");
        assert_eq!(meta.title, "Only heading");
        assert_eq!(meta.description, "");
    }

    #[test]
    fn links_are_same_host_deduped_and_capped() {
        let base = Url::parse("https://example.com/post/1").unwrap();
        let mut body = String::from(
            "<a href='/post/2'>two</a>\
             <a href='https://example.com/post/2'>dup</a>\
             <a href='/post/3#comments'>frag</a>\
             <a href='https://other.org/x'>external</a>\
             <a href='mailto:a@example.com'>mail</a>\
             <a href='/post/1'>self</a>",
        );
        for i in 10..40 {
            body.push_str(&format!("<a href='/p/{i}'>p</a>"));
        }
        let links = extract_links(&page(&body), &base);
        assert_eq!(links.len(), MAX_LINKS);
        assert_eq!(links[0], "https://example.com/post/2");
        assert_eq!(links[1], "https://example.com/p/10");
        assert!(links.iter().all(|l| l.starts_with("https://example.com/")));
        assert!(!links.iter().any(|l| l.contains('#') || l.ends_with("/post/1")));
    }
}
