//! Next-page evaluation
//!
//! Decides, for the page just extracted, whether a usable "next" link
//! exists. A matching element is not enough: many sites keep the pager
//! markup on the last page and merely mark the link as disabled.

use crate::config::{compile_selector, PaginationRule};
use crate::query::{MatchedNode, PageDocument, Query};
use crate::url::{is_noop_href, resolve_url, visit_key};
use crate::ConfigError;
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Class tokens that mark a pager link as inactive
const DISABLED_CLASSES: &[&str] = &["disabled", "inactive", "unavailable"];

/// URLs fetched so far in one run
///
/// Grows monotonically and is dropped with the run.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    keys: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a URL as fetched; returns false if it already was
    pub fn insert(&mut self, url: &Url) -> bool {
        self.keys.insert(visit_key(url))
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.keys.contains(&visit_key(url))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Why a matched "next" element was not followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisabledReason {
    /// The element carries a `disabled` attribute
    DisabledAttribute,
    /// The element's class list contains one of the inactive tokens
    DisabledClass(String),
    /// `aria-disabled="true"`
    AriaDisabled,
    /// The href is `#` or a no-op script reference
    PlaceholderHref(String),
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisabledAttribute => write!(f, "disabled attribute"),
            Self::DisabledClass(class) => write!(f, "class '{}'", class),
            Self::AriaDisabled => write!(f, "aria-disabled=\"true\""),
            Self::PlaceholderHref(href) => write!(f, "placeholder href '{}'", href),
        }
    }
}

/// The pagination decision for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// A valid, unvisited next page
    Follow(Url),
    /// Nothing matched the selector
    NoMatch,
    /// An element matched but is marked inactive
    Disabled(DisabledReason),
    /// The link has no usable target
    Unresolvable(String),
    /// The link points at a page already fetched in this run
    AlreadyVisited(Url),
}

impl NextPage {
    /// Returns the URL to fetch next, if pagination continues
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Follow(url) => Some(url),
            _ => None,
        }
    }
}

/// Checks a matched link against the inactive-link heuristics
///
/// The checks run in a fixed order and the first hit wins:
/// 1. a `disabled` attribute
/// 2. a `disabled`, `inactive` or `unavailable` class token (exact match)
/// 3. `aria-disabled="true"`
/// 4. an href of `#` or a no-op `javascript:` reference
pub fn check_link(node: &MatchedNode) -> Option<DisabledReason> {
    if node.attr("disabled").is_some() {
        return Some(DisabledReason::DisabledAttribute);
    }

    if let Some(class) = node.attr("class") {
        if let Some(token) = class
            .split_ascii_whitespace()
            .find(|token| DISABLED_CLASSES.contains(token))
        {
            return Some(DisabledReason::DisabledClass(token.to_string()));
        }
    }

    if node.attr("aria-disabled").map(str::trim) == Some("true") {
        return Some(DisabledReason::AriaDisabled);
    }

    match node.href() {
        Some(href) if is_noop_href(href) => Some(DisabledReason::PlaceholderHref(href.to_string())),
        _ => None,
    }
}

/// A compiled pagination rule
#[derive(Debug, Clone)]
pub struct Paginator {
    selector: String,
    query: Query,
    max_pages: u32,
}

impl Paginator {
    /// Compiles the rule's "next" selector
    pub fn new(rule: &PaginationRule) -> Result<Self, ConfigError> {
        let query = compile_selector("pagination", rule.kind, &rule.next_page_selector, None)?;
        Ok(Self {
            selector: rule.next_page_selector.clone(),
            query,
            max_pages: rule.max_pages.max(1),
        })
    }

    /// Upper bound on fetched pages, including the start page
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Decides whether and where to go after `current`
    ///
    /// # Arguments
    ///
    /// * `document` - The page just fetched
    /// * `current` - The URL that page came from; relative hrefs resolve
    ///   against it
    /// * `visited` - Every URL fetched so far in this run
    ///
    /// Fails only when the selector cannot be evaluated against the page.
    pub fn next_page(
        &self,
        document: &PageDocument,
        current: &Url,
        visited: &VisitedSet,
    ) -> Result<NextPage, ConfigError> {
        let matched = self
            .query
            .first_match(document)
            .map_err(|message| ConfigError::Selector {
                field: "pagination".to_string(),
                kind: self.query.kind(),
                selector: self.selector.clone(),
                message,
            })?;

        let node = match matched {
            Some(node) => node,
            None => return Ok(NextPage::NoMatch),
        };

        if let Some(reason) = check_link(&node) {
            return Ok(NextPage::Disabled(reason));
        }

        let href = match node.href() {
            Some(href) if !href.trim().is_empty() => href,
            _ => return Ok(NextPage::Unresolvable("missing href".to_string())),
        };

        let next = match resolve_url(href, Some(current)) {
            Ok(url) => url,
            Err(e) => return Ok(NextPage::Unresolvable(format!("{}: {}", href, e))),
        };

        if visited.contains(&next) {
            return Ok(NextPage::AlreadyVisited(next));
        }

        Ok(NextPage::Follow(next))
    }
}
