//! Thread and post extraction.
//!
//! Extraction is an ordered list of strategies over the parsed page. The
//! first strategy that produces something wins:
//!
//! 1. posts found on the page: the page is one thread holding those posts
//! 2. forum listing page: one stub per thread row
//! 3. forum page with no recognizable structure: one record with raw text

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::category::detect_category;
use super::clean::{clean_text, strip_expander_labels, truncate_chars};
use super::dom::{all_text, first_text, selector, text_without};
use super::types::{Keyword, PostRecord, ThreadRecord};
use crate::constants::{
    FALLBACK_CONTENT_LIMIT, FALLBACK_DATETIME_FORMAT, LISTING_DATE_FORMAT, MIN_POST_CONTENT_CHARS,
};

pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
pub const LISTING_AUTHOR: &str = "Unknown";
pub const FALLBACK_AUTHOR: &str = "System (Fallback)";
pub const FALLBACK_PREFIX: &str = "Automatic parsing failed. Raw content:\n\n";
pub const TRUNCATED_MARKER: &str = "... (truncated)";

/// Post container candidates, most generic first. Only the first one that
/// matches anything is used.
const POST_SELECTORS: &[&str] = &[
    ".post", ".message", ".entry", "article", ".comment", ".post-container", "div[id^='post']",
    ".postbit", ".post-content", ".message-content", ".post_body", ".entry-content",
    ".ItemBody", ".CommentBody", ".lia-message-body-content", ".js-post__content-text",
    ".cooked", ".topic-body", ".post-message", ".post_wrapper", ".post_block",
    "table.post", "div.post", "td.post_content",
];

static POST_CANDIDATES: LazyLock<Vec<Selector>> =
    LazyLock::new(|| POST_SELECTORS.iter().map(|css| selector(css)).collect());

static CONTENT: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        ".content, .message, .body, .text, .entry-content, .post_body, .post_content, \
         .posttext, .post-text, .messageText, .uu_post",
    )
});

static CONTENT_NOISE: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "script, style, button, isindex, \
         .footer, .signature, .kutu, \
         .message-cell--user, .message-userInfo, .post-sidebar, .postprofile, .user-details, \
         .post-left, .user_info, .author_info, \
         .message-userExtras, .message-avatar-wrapper, .message-userTitle, .message-userBanner, \
         .bbCodeBlock-expandLink, .attribution, \
         .reaction-bar, .reactions, .message-attribution, .message-footer, .message-lastEdit, \
         .privateControls, .publicControls, \
         .post_head, .post-head, .node-controls, .post-date, .date, .permalink, .post-number, \
         dl.pairs",
    )
});

static ELEMENT_NOISE: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "script, style, button, \
         .footer, .signature, .user_info, .author_info, .post_head, .post-head, \
         .message-cell--user, .message-userInfo, .postprofile, \
         .message-attribution, .message-footer, .message-lastEdit, .reaction-bar",
    )
});

static AUTHOR: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        ".author, .user, .username, .name, a[href*='user'], .poster, .user-details, \
         .popupctrl, .mem_profile",
    )
});
static AUTHOR_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| selector(".user_info, .author_info, .post_author"));

static DATE: LazyLock<Selector> = LazyLock::new(|| {
    selector(".date, .time, time, .timestamp, .published, .post-date, .date-header, .post_date")
});
static DATE_HEADER: LazyLock<Selector> =
    LazyLock::new(|| selector(".post_head, .post-head, .thead"));

static LAST_EDIT: LazyLock<Selector> =
    LazyLock::new(|| selector(".message-lastEdit, .post-edit, .edited-by"));
static REACTIONS: LazyLock<Selector> =
    LazyLock::new(|| selector(".reactionsBar, .reactions, .reaction-bar"));

static THREAD_ROW: LazyLock<Selector> = LazyLock::new(|| selector(".thread, .topic, .row"));
static THREAD_ROW_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(".title, .subject, h3, a"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

static BODY: LazyLock<Selector> = LazyLock::new(|| selector("body"));
static INVISIBLE: LazyLock<Selector> =
    LazyLock::new(|| selector("script, style, noscript, template"));

/// Inputs shared by every extraction strategy.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub page_url: &'a str,
    pub title: &'a str,
    pub is_forum: bool,
    pub keywords: &'a [Keyword],
    /// Used for dates that are missing from the page.
    pub now: NaiveDateTime,
}

/// What extraction found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub threads: Vec<ThreadRecord>,
    pub thread_count: usize,
    pub post_count: usize,
    /// Forced to true when posts were found.
    pub is_forum: bool,
}

type Strategy = fn(&Html, &ExtractContext<'_>) -> Option<Extraction>;

const STRATEGIES: &[Strategy] = &[single_thread, listing_stubs, raw_fallback];

/// Run the extraction strategies in order and return the first result.
///
/// A page that is not a forum and has no posts yields no threads.
#[must_use]
pub fn extract_content(document: &Html, ctx: &ExtractContext<'_>) -> Extraction {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(document, ctx))
        .unwrap_or(Extraction {
            threads: Vec::new(),
            thread_count: 0,
            post_count: 0,
            is_forum: ctx.is_forum,
        })
}

/// Posts on the page, from the first post selector that yields any.
#[must_use]
pub fn find_posts(document: &Html, now: NaiveDateTime) -> Vec<PostRecord> {
    for candidate in POST_CANDIDATES.iter() {
        let posts: Vec<PostRecord> = document
            .select(candidate)
            .filter_map(|element| extract_post(element, now))
            .enumerate()
            .map(|(idx, post)| PostRecord {
                order: idx + 1,
                ..post
            })
            .collect();

        if !posts.is_empty() {
            return posts;
        }
    }
    Vec::new()
}

fn single_thread(document: &Html, ctx: &ExtractContext<'_>) -> Option<Extraction> {
    let posts = find_posts(document, ctx.now);
    let first = posts.first()?;

    let thread = ThreadRecord {
        title: ctx.title.to_string(),
        link: ctx.page_url.to_string(),
        author: first.author.clone(),
        date: first.date.clone(),
        content: first.content.clone(),
        category: detect_category(&format!("{} {}", first.content, ctx.title), ctx.keywords),
        posts: Vec::new(),
    };
    let post_count = posts.len();

    Some(Extraction {
        threads: vec![ThreadRecord { posts, ..thread }],
        thread_count: 1,
        post_count,
        is_forum: true,
    })
}

fn listing_stubs(document: &Html, ctx: &ExtractContext<'_>) -> Option<Extraction> {
    if !ctx.is_forum {
        return None;
    }

    let today = ctx.now.format(LISTING_DATE_FORMAT).to_string();
    let threads: Vec<ThreadRecord> = document
        .select(&THREAD_ROW)
        .filter_map(|row| {
            let title_el = row.select(&THREAD_ROW_TITLE).next()?;
            let title = title_el.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                return None;
            }
            Some(ThreadRecord {
                link: stub_link(title_el, ctx.page_url),
                author: LISTING_AUTHOR.to_string(),
                date: today.clone(),
                category: detect_category(&title, ctx.keywords),
                title,
                ..ThreadRecord::default()
            })
        })
        .collect();

    if threads.is_empty() {
        return None;
    }

    Some(Extraction {
        thread_count: threads.len(),
        threads,
        post_count: 0,
        is_forum: true,
    })
}

fn raw_fallback(document: &Html, ctx: &ExtractContext<'_>) -> Option<Extraction> {
    if !ctx.is_forum {
        return None;
    }

    let body = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());
    let raw = text_without(body, &INVISIBLE);
    let raw = truncate_chars(raw.trim(), FALLBACK_CONTENT_LIMIT, TRUNCATED_MARKER);

    Some(Extraction {
        threads: vec![ThreadRecord {
            title: ctx.title.to_string(),
            link: ctx.page_url.to_string(),
            author: FALLBACK_AUTHOR.to_string(),
            date: ctx.now.format(FALLBACK_DATETIME_FORMAT).to_string(),
            content: format!("{FALLBACK_PREFIX}{raw}"),
            category: detect_category(ctx.title, ctx.keywords),
            posts: Vec::new(),
        }],
        thread_count: 1,
        post_count: 0,
        is_forum: true,
    })
}

fn extract_post(element: ElementRef<'_>, now: NaiveDateTime) -> Option<PostRecord> {
    let mut content = region_content(element);
    if content.is_empty() {
        let whole = strip_expander_labels(&text_without(element, &ELEMENT_NOISE));
        content = truncate_chars(whole.trim(), FALLBACK_CONTENT_LIMIT, "...");
    }

    if content.chars().count() < MIN_POST_CONTENT_CHARS {
        return None;
    }

    let author = first_text(element, &AUTHOR)
        .filter(|a| !a.is_empty())
        .or_else(|| first_text(element, &AUTHOR_FALLBACK).filter(|a| !a.is_empty()))
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());

    let date = first_text(element, &DATE)
        .filter(|d| !d.is_empty())
        .or_else(|| Some(all_text(element, &DATE_HEADER)).filter(|d| !d.is_empty()))
        .unwrap_or_else(|| now.format(FALLBACK_DATETIME_FORMAT).to_string());

    Some(PostRecord {
        author: clean_text(&author),
        content: clean_text(&content),
        date: clean_text(&date),
        reactions: flattened(&all_text(element, &REACTIONS)),
        last_edited: flattened(&all_text(element, &LAST_EDIT)),
        order: 0,
    })
}

/// Text of the post's content regions with noise removed. Regions nested
/// inside another matched region are skipped so no text is counted twice.
fn region_content(element: ElementRef<'_>) -> String {
    let regions: Vec<ElementRef<'_>> = element.select(&CONTENT).collect();
    let region_ids: HashSet<_> = regions.iter().map(|r| r.id()).collect();

    let text = regions
        .iter()
        .filter(|region| {
            !region
                .ancestors()
                .take_while(|ancestor| ancestor.id() != element.id())
                .any(|ancestor| region_ids.contains(&ancestor.id()))
        })
        .map(|region| text_without(*region, &CONTENT_NOISE))
        .collect::<Vec<_>>()
        .join("\n");

    strip_expander_labels(text.trim()).trim().to_string()
}

fn flattened(text: &str) -> Option<String> {
    let flat = text.replace('\n', " ").trim().to_string();
    if flat.is_empty() {
        None
    } else {
        Some(flat)
    }
}

/// Link for a listing stub: the title anchor's target resolved against the
/// page, or the page itself.
fn stub_link(title_el: ElementRef<'_>, page_url: &str) -> String {
    let href = if title_el.value().name() == "a" {
        title_el.value().attr("href")
    } else {
        title_el
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
    };

    href.and_then(|href| Url::parse(page_url).ok()?.join(href).ok())
        .map_or_else(|| page_url.to_string(), String::from)
}
