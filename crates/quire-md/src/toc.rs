//! Heading anchors and table of contents.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Marker replaced by the table of contents when present in a page.
pub const TOC_MARKER: &str = "<!-- toc -->";

/// Class added to every anchored heading.
const PERMALINK_CLASS: &str = "has-permalink";

/// Id of the table of contents container, never given to a heading.
const TOC_ID: &str = "toc";

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Heading level (1-6)
    pub level: u8,
    /// Anchor ID, unique within the page
    pub anchor_id: String,
    /// Heading text with markup stripped
    pub heading_text: String,
}

/// HTML with anchored headings and the entries that were anchored.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

fn heading_re() -> &'static Regex {
    static HEADING_RE: OnceLock<Regex> = OnceLock::new();
    HEADING_RE.get_or_init(|| {
        Regex::new(r"(?s)<h([1-6])((?:\s[^>]*)?)>(.*?)</h([1-6])>").expect("valid heading regex")
    })
}

fn id_attr_re() -> &'static Regex {
    static ID_ATTR_RE: OnceLock<Regex> = OnceLock::new();
    ID_ATTR_RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)id\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid id regex")
    })
}

fn class_attr_re() -> &'static Regex {
    static CLASS_ATTR_RE: OnceLock<Regex> = OnceLock::new();
    CLASS_ATTR_RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)class\s*=\s*"([^"]*)""#).expect("valid class regex")
    })
}

fn tag_re() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// Convert heading text to an anchor slug.
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single `-` and drops leading and trailing separators.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Anchor ids already handed out on one page.
#[derive(Debug, Default)]
struct Anchors {
    taken: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

impl Anchors {
    /// Anchors for one page, with the TOC container id already taken.
    fn new() -> Self {
        let mut anchors = Self::default();
        anchors.taken.insert(TOC_ID.to_string());
        anchors
    }

    /// Mark an id set by the author as taken.
    fn reserve(&mut self, id: &str) {
        self.taken.insert(id.to_string());
    }

    /// Reserve `base`, or `base-N` for the lowest free N.
    fn claim(&mut self, base: &str) -> String {
        let base = if base.is_empty() { "section" } else { base };

        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }

        let mut n = self.next_suffix.get(base).copied().unwrap_or(1);
        loop {
            let candidate = format!("{}-{}", base, n);
            n += 1;
            if self.taken.insert(candidate.clone()) {
                self.next_suffix.insert(base.to_string(), n);
                tracing::debug!("Anchor '{}' already used, assigned '{}'", base, candidate);
                return candidate;
            }
        }
    }
}

/// Non-empty `id` attribute in a heading's attribute text.
fn existing_id(attrs: &str) -> Option<&str> {
    let caps = id_attr_re().captures(attrs)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
}

/// Attribute text with the permalink class added to any existing class list.
fn with_permalink_class(attrs: &str) -> String {
    match class_attr_re().captures(attrs).and_then(|caps| caps.get(1)) {
        Some(classes) if classes.as_str().is_empty() => {
            format!("{}{}{}", &attrs[..classes.start()], PERMALINK_CLASS, &attrs[classes.end()..])
        }
        Some(classes) => format!(
            "{} {}{}",
            &attrs[..classes.end()],
            PERMALINK_CLASS,
            &attrs[classes.end()..]
        ),
        None => format!(r#"{} class="{}""#, attrs, PERMALINK_CLASS),
    }
}

/// Visible text of a heading's inner HTML.
fn heading_text(inner_html: &str) -> String {
    let stripped = tag_re().replace_all(inner_html, "");
    html_escape::decode_html_entities(&stripped).trim().to_string()
}

/// Add anchor ids to headings up to `max_depth` and collect them in order.
///
/// Deeper headings are left untouched and are not listed. A heading that
/// already has an `id` keeps it as its anchor.
pub fn annotate_headings(html: &str, max_depth: u8) -> Annotated {
    let mut anchors = Anchors::new();
    for caps in heading_re().captures_iter(html) {
        if let Some(id) = existing_id(&caps[2]) {
            anchors.reserve(id);
        }
    }

    let mut toc = Vec::new();
    let mut out = String::with_capacity(html.len() + 64);
    let mut last = 0;

    for caps in heading_re().captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let level = caps[1].parse::<u8>().unwrap_or(u8::MAX);
        let closing = caps[4].parse::<u8>().unwrap_or(0);

        out.push_str(&html[last..whole.start()]);
        last = whole.end();

        if level != closing || level > max_depth {
            out.push_str(whole.as_str());
            continue;
        }

        let attrs = &caps[2];
        let inner = &caps[3];
        let text = heading_text(inner);

        let anchor_id = match existing_id(attrs) {
            Some(id) => {
                let attrs = with_permalink_class(attrs);
                let _ = write!(out, "<h{level}{attrs}>{inner}</h{level}>");
                id.to_string()
            }
            None => {
                let anchor_id = anchors.claim(&slugify(&text));
                let _ = write!(
                    out,
                    r#"<h{level}{attrs} id="{anchor_id}" class="{PERMALINK_CLASS}">{inner}</h{level}>"#
                );
                anchor_id
            }
        };

        toc.push(TocEntry {
            level,
            anchor_id,
            heading_text: text,
        });
    }

    out.push_str(&html[last..]);

    Annotated { html: out, toc }
}

/// Collapsible table of contents for `entries`.
///
/// The container is emitted even when there are no entries.
pub fn toc_block(entries: &[TocEntry]) -> String {
    format!(
        r#"<details id="toc"><summary>Table of contents</summary>{}</details>"#,
        toc_list(entries)
    )
}

/// Nested `<ul>` mirroring heading levels.
fn toc_list(entries: &[TocEntry]) -> String {
    let mut out = String::new();
    let mut open: Vec<u8> = Vec::new();

    for entry in entries {
        while open.len() > 1 && open.last().is_some_and(|&top| entry.level < top) {
            out.push_str("</li></ul>");
            open.pop();
        }

        match open.last() {
            Some(&top) if entry.level <= top => out.push_str("</li>"),
            _ => {
                out.push_str("<ul>");
                open.push(entry.level);
            }
        }

        let _ = write!(
            out,
            r##"<li><a href="#{}">{}</a>"##,
            entry.anchor_id,
            html_escape::encode_text(&entry.heading_text)
        );
    }

    for _ in &open {
        out.push_str("</li></ul>");
    }

    out
}

/// Place the TOC block at [`TOC_MARKER`], or at the top of the content.
pub fn insert_toc(html: &str, block: &str) -> String {
    if html.contains(TOC_MARKER) {
        html.replacen(TOC_MARKER, block, 1)
    } else {
        format!("{}\n{}", block, html)
    }
}
