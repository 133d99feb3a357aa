//! Forum detection heuristic.
//!
//! Every rule adds to a single score and none of them short-circuit, so the
//! result only depends on the markup and URL.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::dom::{first_text, selector, text_without};

/// Default score at which a page counts as a forum.
pub const DEFAULT_FORUM_THRESHOLD: u32 = 5;

const GENERATOR_SCORE: u32 = 10;
const URL_SCORE: u32 = 5;
const THREAD_LAYOUT_SCORE: u32 = 3;
const POST_LAYOUT_SCORE: u32 = 3;
const PAGINATION_SCORE: u32 = 2;
const BREADCRUMB_SCORE: u32 = 2;

const FORUM_ENGINES: &[&str] = &[
    "vbulletin", "xenforo", "mybb", "phpbb", "fluxbb", "smf", "discuz", "nodebb",
];

const URL_MARKERS: &[&str] = &[
    "thread", "topic", "showthread", "viewtopic", "board", "forum",
];

/// Forum vocabulary in English and Turkish, matched against page text.
const FORUM_KEYWORDS: &[&str] = &[
    "thread", "post", "topic", "forum", "vbulletin", "xenforo", "phpbb", "mybb",
    "discussion", "board", "kategori", "başlık", "cevap", "reply", "quote", "alıntı",
    "last post", "son mesaj", "started by", "gönderen", "registered", "kayıtlı",
];

static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static H1: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static ENGINE_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(".p-title-value, .ipbType_sectionTitle"));
static GENERATOR: LazyLock<Selector> = LazyLock::new(|| selector("meta[name='generator']"));
static INVISIBLE: LazyLock<Selector> =
    LazyLock::new(|| selector("script, style, noscript, template"));
static THREAD_LAYOUT: LazyLock<Selector> =
    LazyLock::new(|| selector(".thread, .topic, .row, .threadbit, .windowbg"));
static POST_LAYOUT: LazyLock<Selector> =
    LazyLock::new(|| selector(".post, .message, .entry, .postbit, .post_block"));
static PAGINATION: LazyLock<Selector> =
    LazyLock::new(|| selector(".pagination, .pagenav, .pages"));
static BREADCRUMB: LazyLock<Selector> = LazyLock::new(|| selector(".breadcrumb, .navbit"));

/// Result of classifying one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub title: String,
    pub score: u32,
    pub is_forum: bool,
}

/// Classify `document`, fetched from `url`, as forum or not.
#[must_use]
pub fn classify_page(document: &Html, url: &str, threshold: u32) -> Classification {
    let score = detection_score(document, url);
    Classification {
        title: resolve_title(document),
        score,
        is_forum: score >= threshold,
    }
}

/// Page title: `<title>`, overridden by the first non-empty `<h1>`,
/// overridden by a forum engine's own title element.
#[must_use]
pub fn resolve_title(document: &Html) -> String {
    let root = document.root_element();
    let mut title = first_text(root, &TITLE).unwrap_or_default();

    if let Some(h1) = first_non_empty(document, &H1) {
        title = h1;
    }
    if let Some(engine_title) = first_non_empty(document, &ENGINE_TITLE) {
        title = engine_title;
    }
    title
}

fn first_non_empty(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
}

/// Additive forum-likelihood score for `document`.
#[must_use]
pub fn detection_score(document: &Html, url: &str) -> u32 {
    let mut score = 0;

    if has_forum_generator(document) {
        score += GENERATOR_SCORE;
    }

    if url_has_forum_marker(url) {
        score += URL_SCORE;
    }

    let text = text_without(document.root_element(), &INVISIBLE).to_lowercase();
    let keyword_hits = FORUM_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
    score += u32::try_from(keyword_hits).unwrap_or(u32::MAX);

    for (layout, points) in [
        (&*THREAD_LAYOUT, THREAD_LAYOUT_SCORE),
        (&*POST_LAYOUT, POST_LAYOUT_SCORE),
        (&*PAGINATION, PAGINATION_SCORE),
        (&*BREADCRUMB, BREADCRUMB_SCORE),
    ] {
        if document.select(layout).next().is_some() {
            score += points;
        }
    }

    score
}

fn has_forum_generator(document: &Html) -> bool {
    document
        .select(&GENERATOR)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::to_lowercase)
        .any(|content| FORUM_ENGINES.iter().any(|engine| content.contains(engine)))
}

/// Only the path and query are inspected, so a host name that happens to
/// contain "forum" does not count.
fn url_has_forum_marker(url: &str) -> bool {
    let target = match url::Url::parse(url) {
        Ok(parsed) => {
            let mut tail = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                tail.push('?');
                tail.push_str(query);
            }
            tail
        }
        Err(_) => url.to_string(),
    }
    .to_lowercase();

    URL_MARKERS.iter().any(|marker| target.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn test_title_precedence() {
        let page = doc("<html><head><title>Site</title></head><body></body></html>");
        assert_eq!(resolve_title(&page), "Site");

        let page = doc(
            "<html><head><title>Site</title></head><body><h1> </h1><h1>Heading</h1><h1>Later</h1></body></html>",
        );
        assert_eq!(resolve_title(&page), "Heading");

        let page = doc(
            r#"<html><head><title>Site</title></head><body><h1>Heading</h1><span class="p-title-value">Thread name</span></body></html>"#,
        );
        assert_eq!(resolve_title(&page), "Thread name");
    }

    #[test]
    fn test_generator_meta_alone_is_forum() {
        let page = doc(
            r#"<html><head><meta name="generator" content="vBulletin 4.2.5"></head><body>hello</body></html>"#,
        );
        let result = classify_page(&page, "http://abc.onion/", DEFAULT_FORUM_THRESHOLD);
        assert_eq!(result.score, 10);
        assert!(result.is_forum);
    }

    #[test]
    fn test_plain_page_is_not_forum() {
        let page = doc("<html><body><p>Welcome to my blog about cooking.</p></body></html>");
        let result = classify_page(&page, "http://abc.onion/", DEFAULT_FORUM_THRESHOLD);
        assert_eq!(result.score, 0);
        assert!(!result.is_forum);
    }

    #[test]
    fn test_url_marker_scores_path_only() {
        let page = doc("<html><body></body></html>");
        assert_eq!(detection_score(&page, "http://abc.onion/viewtopic.php?t=5"), 5);
        assert_eq!(detection_score(&page, "http://forumhost.onion/"), 0);
        assert_eq!(detection_score(&page, "http://abc.onion/index.php?board=2"), 5);
    }

    #[test]
    fn test_keywords_count_once_each() {
        let page = doc("<html><body>reply reply reply quote</body></html>");
        assert_eq!(detection_score(&page, "http://abc.onion/"), 2);
    }

    #[test]
    fn test_script_text_is_not_scored() {
        let page = doc("<html><body><script>var thread = 'reply';</script></body></html>");
        assert_eq!(detection_score(&page, "http://abc.onion/"), 0);
    }

    #[test]
    fn test_structural_cues() {
        let page = doc(
            r#"<html><body>
                <div class="threadbit"></div>
                <div class="postbit"></div>
                <div class="pagenav"></div>
                <div class="navbit"></div>
            </body></html>"#,
        );
        assert_eq!(detection_score(&page, "http://abc.onion/"), 10);
    }

    #[test]
    fn test_score_is_reproducible() {
        let html = r#"<html><head><title>Board</title></head><body>
            <div class="topic">Started by alice</div><div class="pagination"></div>
        </body></html>"#;
        let first = detection_score(&doc(html), "http://abc.onion/forums/");
        let second = detection_score(&doc(html), "http://abc.onion/forums/");
        assert_eq!(first, second);
        // url marker, "board" + "started by", topic row, pagination
        assert_eq!(first, 5 + 2 + 3 + 2);
    }
}
