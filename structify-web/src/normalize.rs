//! Reduce page markup to the deduplicated text of whitelisted tags.

use scraper::{Html, Node, Selector};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

pub const DEFAULT_WANTED_TAGS: [&str; 5] = ["h1", "h2", "h3", "span", "p"];
pub const DEFAULT_UNWANTED_TAGS: [&str; 2] = ["script", "style"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no markup to normalize")]
    MissingMarkup,
    #[error("invalid tag name: {0:?}")]
    InvalidTag(String),
}

/// Which tags contribute text and which subtrees are dropped first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    wanted: Vec<String>,
    unwanted: BTreeSet<String>,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            wanted: DEFAULT_WANTED_TAGS.iter().map(|t| t.to_string()).collect(),
            unwanted: DEFAULT_UNWANTED_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TagPolicy {
    /// Build a policy from tag names. Names are lowercased; repeated wanted
    /// tags keep their first position.
    pub fn new<W, U, S, T>(wanted: W, unwanted: U) -> Result<Self, NormalizeError>
    where
        W: IntoIterator<Item = S>,
        U: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut wanted_tags = Vec::new();
        for tag in wanted {
            let tag = validate_tag(tag.as_ref())?;
            if seen.insert(tag.clone()) {
                wanted_tags.push(tag);
            }
        }
        let unwanted = unwanted
            .into_iter()
            .map(|t| validate_tag(t.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            wanted: wanted_tags,
            unwanted,
        })
    }

    /// Also collect anchor text, annotated with its `href`.
    pub fn with_links(mut self) -> Self {
        if !self.wanted.iter().any(|t| t == "a") {
            self.wanted.push("a".to_string());
        }
        self
    }

    pub fn wanted(&self) -> &[String] {
        &self.wanted
    }

    pub fn unwanted(&self) -> impl Iterator<Item = &str> {
        self.unwanted.iter().map(String::as_str)
    }
}

fn validate_tag(raw: &str) -> Result<String, NormalizeError> {
    let tag = raw.trim().to_ascii_lowercase();
    let valid = tag.starts_with(|c: char| c.is_ascii_alphabetic())
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(tag)
    } else {
        Err(NormalizeError::InvalidTag(raw.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedContent {
    pub text: String,
}

impl NormalizedContent {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Normalize `html` under `policy`.
///
/// ```
/// use structify_web::normalize::{normalize, TagPolicy};
///
/// let policy = TagPolicy::new(["h1", "p"], ["script"]).unwrap();
/// let html = "<html><body><script>x</script><h1>Title</h1><p>Body text</p></body></html>";
/// assert_eq!(normalize(html, &policy).text, "Title Body text");
/// ```
pub fn normalize(html: &str, policy: &TagPolicy) -> NormalizedContent {
    if html.trim().is_empty() {
        return NormalizedContent::default();
    }

    let mut doc = Html::parse_document(html);
    let doomed: Vec<_> = doc
        .tree
        .nodes()
        .filter(|node| match node.value() {
            Node::Element(el) => policy.unwanted.contains(el.name()),
            _ => false,
        })
        .map(|node| node.id())
        .collect();
    for id in doomed {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    // Detached subtrees stay in the arena, so only walk from the root element.
    let root = doc.root_element();
    let mut fragments = Vec::new();
    for tag in &policy.wanted {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        for el in root.select(&selector) {
            let text: String = el.text().collect();
            match el.value().attr("href") {
                Some(href) if tag == "a" && !href.is_empty() => {
                    fragments.push(format!("{text} ({href})"))
                }
                _ => fragments.push(text),
            }
        }
    }

    NormalizedContent {
        text: dedupe_lines(&fragments.join(" ")),
    }
}

/// Reject absent markup instead of treating it as an empty page.
pub fn try_normalize(
    html: Option<&str>,
    policy: &TagPolicy,
) -> Result<NormalizedContent, NormalizeError> {
    html.map(|h| normalize(h, policy))
        .ok_or(NormalizeError::MissingMarkup)
}

/// Split on newlines, trim, drop blanks and repeats, and rejoin with single spaces.
///
/// Applying it twice gives the same result as applying it once.
pub fn dedupe_lines(text: &str) -> String {
    let mut seen = HashSet::new();
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && seen.insert(*line))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keep at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
