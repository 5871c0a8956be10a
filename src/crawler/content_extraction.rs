//! Content extraction functionality for the crawler module
//!
//! Turns a raw HTML document into the plain English text kept in the
//! corpus, and collects the page's outbound anchors for the frontier.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// Elements whose subtree never contributes text or links
const STRIPPED_TAGS: [&str; 6] = ["script", "style", "nav", "header", "footer", "aside"];

/// Candidate main-content regions, most specific first
const MAIN_CONTENT_SELECTORS: [&str; 9] = [
    "main",
    "article",
    "div[role=\"main\"]",
    ".main-content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    "body",
];

/// Paragraphs and headings shorter than this are dropped
const MIN_BLOCK_CHARS: usize = 20;

/// List items and cleaned lines shorter than this are dropped
const MIN_LINE_CHARS: usize = 10;

/// Pages yielding less than this are treated as having no content
const MIN_CONTENT_CHARS: usize = 50;

static MAIN_CONTENT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    MAIN_CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("main content selector"))
        .collect()
});
static TEXT_BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p, h1, h2, h3, h4, h5, h6").expect("text block selector"));
static LIST_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("list item selector"));
static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank run pattern"));
static BODY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body[\s/>]").expect("body tag pattern"));

/// An outbound anchor found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Target resolved against the page URL
    pub url: Url,

    /// Visible anchor text, trimmed
    pub text: String,
}

/// Everything the orchestrator needs from one parsed document
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    /// Extracted content; empty when the page has nothing usable
    pub content: String,

    /// Outbound anchors in document order
    pub links: Vec<PageLink>,
}

/// Check whether text is primarily English
///
/// A fragment counts as English when at least 70% of its characters have a
/// code point below 128. Empty text is never English.
pub fn is_english_text(text: &str) -> bool {
    let (ascii, total) = text.chars().fold((0usize, 0usize), |(ascii, total), c| {
        (ascii + usize::from((c as u32) < 128), total + 1)
    });
    // ascii / total >= 0.7, kept in integers so the boundary is exact
    total > 0 && ascii * 10 >= total * 7
}

/// Extract the usable English content of an HTML document
///
/// Returns an empty string when fewer than 50 characters survive filtering.
/// The result depends only on the input, so extracting the same HTML twice
/// yields identical text.
pub fn extract_content(html: &str) -> String {
    let document = Html::parse_document(html);
    extract_from_document(&document, declares_body(html))
}

/// Parse a page once and pull both its content and its links
pub fn analyze_page(html: &str, page_url: &Url) -> PageAnalysis {
    let document = Html::parse_document(html);
    PageAnalysis {
        content: extract_from_document(&document, declares_body(html)),
        links: extract_links(&document, page_url),
    }
}

/// Collect the anchors of a document that sit outside stripped elements
///
/// Targets that fail to resolve against `base` are skipped.
pub fn extract_links(document: &Html, base: &Url) -> Vec<PageLink> {
    document
        .select(&ANCHORS)
        .filter(|anchor| !in_stripped_subtree(*anchor))
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = base.join(href.trim()).ok()?;
            Some(PageLink {
                url,
                text: visible_text(anchor).trim().to_string(),
            })
        })
        .collect()
}

/// Whether a link target is a fragment or a non-navigational pseudo-link
pub fn is_pseudo_link(url: &Url) -> bool {
    url.fragment().is_some() || matches!(url.scheme(), "javascript" | "mailto" | "tel")
}

/// Whether the source carries its own `<body>` tag
///
/// The parser inserts a body element into every document, so only the
/// source text tells a real body apart from a synthesized one.
fn declares_body(html: &str) -> bool {
    BODY_TAG.is_match(html)
}

fn extract_from_document(document: &Html, has_body: bool) -> String {
    let mut content = String::new();

    match main_region(document, has_body) {
        Some(region) => {
            let mut blocks = 0;
            for element in region.select(&TEXT_BLOCKS) {
                if in_stripped_subtree(element) {
                    continue;
                }
                let text = visible_text(element);
                let text = text.trim();
                if text.chars().count() > MIN_BLOCK_CHARS && is_english_text(text) {
                    content.push_str(text);
                    content.push_str("\n\n");
                    blocks += 1;
                }
            }

            let mut items = 0;
            for element in region.select(&LIST_ITEMS) {
                if in_stripped_subtree(element) {
                    continue;
                }
                let text = visible_text(element);
                let text = text.trim();
                if text.chars().count() > MIN_LINE_CHARS && is_english_text(text) {
                    content.push_str("- ");
                    content.push_str(text);
                    content.push('\n');
                    items += 1;
                }
            }
            if items > 0 {
                content.push('\n');
            }
            debug!(blocks, items, "Collected text from main content region");
        }
        None => {
            debug!("No main content region found, using whole document");
            let full_text = visible_text(document.root_element());
            content = full_text
                .split('\n')
                .map(str::trim)
                .filter(|line| line.chars().count() > MIN_LINE_CHARS && is_english_text(line))
                .collect::<Vec<_>>()
                .join("\n");
        }
    }

    clean_up(&content)
}

fn clean_up(content: &str) -> String {
    let collapsed = BLANK_RUNS.replace_all(content, "\n\n");
    let cleaned = collapsed
        .split('\n')
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_LINE_CHARS && is_english_text(line))
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() < MIN_CONTENT_CHARS {
        debug!(
            length = cleaned.chars().count(),
            "Very little English content found"
        );
        return String::new();
    }
    cleaned.to_string()
}

fn main_region(document: &Html, has_body: bool) -> Option<ElementRef<'_>> {
    MAIN_CONTENT
        .iter()
        .zip(MAIN_CONTENT_SELECTORS)
        .filter(|(_, source)| has_body || *source != "body")
        .find_map(|(selector, _)| {
            document
                .select(selector)
                .find(|element| !in_stripped_subtree(*element))
        })
}

fn is_stripped(element: ElementRef<'_>) -> bool {
    STRIPPED_TAGS.contains(&element.value().name())
}

fn in_stripped_subtree(element: ElementRef<'_>) -> bool {
    is_stripped(element)
        || element
            .ancestors()
            .filter_map(|node| node.value().as_element())
            .any(|ancestor| STRIPPED_TAGS.contains(&ancestor.name()))
}

/// Text of an element with stripped subtrees left out
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible_text(element, &mut out);
    out
}

fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !is_stripped(child) {
                        push_visible_text(child, out);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_PAGE: &str = r#"<html>
<head><title>Energy</title><script>var x = "this script text should never appear";</script></head>
<body>
<nav><p>Navigation paragraph that is long enough to count</p></nav>
<article>
<h1>Renewable energy outlook for the decade</h1>
<p>Solar capacity grew faster than any other source of electricity last year.</p>
<p>Short one.</p>
<p>Grid storage is expanding <script>var hidden = 1;</script>across many regions.</p>
<p>这是一个很长的中文段落，用于测试语言过滤器是否正常工作的内容</p>
<ul><li>Wind power additions</li><li>tiny</li></ul>
</article>
<footer><p>Footer paragraph that is long enough to count too</p></footer>
</body>
</html>"#;

    #[test]
    fn test_english_threshold_boundary() {
        // 7 of 10 characters below 128: exactly 0.7
        let at_threshold = format!("{}{}", "a".repeat(7), "é".repeat(3));
        assert!(is_english_text(&at_threshold));

        // 699 of 1000: 0.699
        let below_threshold = format!("{}{}", "a".repeat(699), "é".repeat(301));
        assert!(!is_english_text(&below_threshold));

        assert!(!is_english_text(""));
        assert!(is_english_text("plain ascii"));
    }

    #[test]
    fn test_extracts_article_content() {
        let content = extract_content(ARTICLE_PAGE);
        assert_eq!(
            content,
            "Renewable energy outlook for the decade\n\
             Solar capacity grew faster than any other source of electricity last year.\n\
             Grid storage is expanding across many regions.\n\
             - Wind power additions"
        );
    }

    #[test]
    fn test_stripped_elements_never_leak() {
        let content = extract_content(ARTICLE_PAGE);
        assert!(!content.contains("Navigation paragraph"));
        assert!(!content.contains("Footer paragraph"));
        assert!(!content.contains("script text"));
        assert!(!content.contains("hidden"));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        assert_eq!(extract_content(ARTICLE_PAGE), extract_content(ARTICLE_PAGE));
    }

    #[test]
    fn test_body_used_without_semantic_region() {
        let html = r#"<html><body><div>
            <p>The first paragraph of a page without any semantic markup.</p>
            <p>The second paragraph adds a little more useful English text.</p>
        </div></body></html>"#;
        let content = extract_content(html);
        assert!(content.starts_with("The first paragraph"));
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_whole_document_lines_without_body_tag() {
        let html = "<div>This is a first long line of English text in a div</div>\n<div>And here is a second long line of English text too</div>";
        assert_eq!(
            extract_content(html),
            "This is a first long line of English text in a div\n\
             And here is a second long line of English text too"
        );
    }

    #[test]
    fn test_whole_document_lines_skip_short_and_foreign() {
        let html = "<title>Tiny</title><style>.x { color: red }</style>\n\
                    <div>Some English prose that is long enough to stay around</div>\n\
                    <div>ok</div>\n\
                    <div>这是一个很长的中文段落，用于测试语言过滤器是否正常工作</div>\n\
                    <div>Another English line that also clears the length bar</div>";
        let content = extract_content(html);
        assert_eq!(
            content,
            "Some English prose that is long enough to stay around\n\
             Another English line that also clears the length bar"
        );
    }

    #[test]
    fn test_body_tag_detection() {
        assert!(declares_body("<html><BODY class=\"x\">text</BODY></html>"));
        assert!(declares_body("<body>text</body>"));
        assert!(!declares_body("<div>no body here</div>"));
        assert!(!declares_body("<bodyguard>not a body</bodyguard>"));
    }

    #[test]
    fn test_short_content_is_empty() {
        let html = "<html><body><p>Just a single short paragraph here.</p></body></html>";
        assert_eq!(extract_content(html), "");
    }

    #[test]
    fn test_non_english_page_is_empty() {
        let html = "<html><body><p>Это длинный абзац на русском языке, который не должен пройти фильтр.</p></body></html>";
        assert_eq!(extract_content(html), "");
    }

    #[test]
    fn test_multiline_paragraph_lines_filtered() {
        let html = "<html><body><main><p>A paragraph that wraps onto\n   ok\n   several separate lines of source text here.</p></main></body></html>";
        let content = extract_content(html);
        assert_eq!(
            content,
            "A paragraph that wraps onto\nseveral separate lines of source text here."
        );
    }

    #[test]
    fn test_extract_links() {
        let html = r##"<html><body>
            <nav><a href="/nav-link">Nav</a></nav>
            <main>
              <a href="guide.html">Guide</a>
              <a href="https://other.org/x">Other</a>
              <a href="#top">Top</a>
              <a href="mailto:someone@example.com">Mail</a>
              <a href="/empty"> </a>
            </main>
        </body></html>"##;
        let base = Url::parse("https://example.com/docs/index.html").unwrap();
        let links = extract_links(&Html::parse_document(html), &base);

        assert_eq!(links.len(), 5);
        assert_eq!(links[0].url.as_str(), "https://example.com/docs/guide.html");
        assert_eq!(links[0].text, "Guide");
        assert_eq!(links[1].url.as_str(), "https://other.org/x");
        assert!(is_pseudo_link(&links[2].url));
        assert!(is_pseudo_link(&links[3].url));
        assert!(!is_pseudo_link(&links[0].url));
        assert_eq!(links[4].text, "");
    }

    #[test]
    fn test_analyze_page() {
        let url = Url::parse("https://example.com/energy").unwrap();
        let html = ARTICLE_PAGE.replace(
            "<p>Short one.</p>",
            "<p>Short one. <a href=\"/solar\">Solar report</a></p>",
        );
        let analysis = analyze_page(&html, &url);
        assert!(!analysis.content.is_empty());
        assert_eq!(analysis.links.len(), 1);
        assert_eq!(analysis.links[0].url.as_str(), "https://example.com/solar");
    }
}
