//! Selector evaluation over parsed pages
//!
//! Rules may address page content either with CSS selectors or with XPath
//! expressions. Both are compiled once, up front, into a [`Query`], and both
//! evaluate against the same [`PageDocument`]:
//! - CSS runs directly on the `scraper` DOM
//! - XPath runs on an `sxd-document` mirror of that DOM, built lazily the
//!   first time a page is queried with XPath

mod css;
mod xpath;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use sxd_document::Package;

/// The query language a selector is written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// CSS selector
    #[default]
    Css,
    /// XPath 1.0 expression
    Xpath,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css => write!(f, "css"),
            Self::Xpath => write!(f, "xpath"),
        }
    }
}

/// A compiled selector, ready to evaluate against any page
#[derive(Debug, Clone)]
pub enum Query {
    /// CSS selector; the attribute, if any, is read off each matched element
    Css {
        selector: Box<Selector>,
        attr: Option<String>,
    },
    /// XPath expression; an attribute is selected by the expression itself
    Xpath { expression: String },
}

impl Query {
    /// Compiles a selector for the given query language
    ///
    /// For XPath, a requested attribute is appended to the expression as an
    /// attribute step (`expr/@attr`) so the attribute nodes are selected
    /// directly.
    ///
    /// # Returns
    ///
    /// * `Ok(Query)` - The compiled query
    /// * `Err(String)` - A description of the syntax error
    pub fn compile(kind: QueryKind, selector: &str, attr: Option<&str>) -> Result<Self, String> {
        match kind {
            QueryKind::Css => Ok(Self::Css {
                selector: Box::new(css::compile(selector)?),
                attr: attr.map(str::to_string),
            }),
            QueryKind::Xpath => {
                let expression = xpath::with_attribute_step(selector, attr);
                xpath::check(&expression)?;
                Ok(Self::Xpath { expression })
            }
        }
    }

    /// The query language of this query
    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Css { .. } => QueryKind::Css,
            Self::Xpath { .. } => QueryKind::Xpath,
        }
    }

    /// Evaluates the query and returns every matched value in document order
    ///
    /// Element matches yield their whitespace-collapsed text content;
    /// attribute matches yield the trimmed attribute value.
    pub fn values(&self, document: &PageDocument) -> Result<Vec<String>, String> {
        match self {
            Self::Css { selector, attr } => {
                Ok(css::select_values(&document.html, selector, attr.as_deref()))
            }
            Self::Xpath { expression } => xpath::select_values(document.xpath_tree(), expression),
        }
    }

    /// Evaluates the query and returns the first matched node, if any
    pub fn first_match(&self, document: &PageDocument) -> Result<Option<MatchedNode>, String> {
        match self {
            Self::Css { selector, .. } => Ok(css::first_element(&document.html, selector)),
            Self::Xpath { expression } => xpath::first_match(document.xpath_tree(), expression),
        }
    }
}

/// The first node a query matched, reduced to what link evaluation needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedNode {
    /// An element, with its attributes
    Element { attributes: HashMap<String, String> },
    /// An attribute, text node, or scalar result
    Value(String),
}

impl MatchedNode {
    /// Looks up an attribute on a matched element
    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element { attributes } => attributes.get(name).map(String::as_str),
            Self::Value(_) => None,
        }
    }

    /// The value a link would navigate to: an element's `href`, or the
    /// matched value itself
    pub fn href(&self) -> Option<&str> {
        match self {
            Self::Element { .. } => self.attr("href"),
            Self::Value(value) => Some(value.as_str()),
        }
    }
}

/// A fetched page, parsed once and queried many times
pub struct PageDocument {
    html: Html,
    xpath_tree: OnceCell<Package>,
}

impl PageDocument {
    /// Parses an HTML document
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
            xpath_tree: OnceCell::new(),
        }
    }

    /// The parsed HTML tree
    pub fn html(&self) -> &Html {
        &self.html
    }

    fn xpath_tree(&self) -> &Package {
        self.xpath_tree.get_or_init(|| xpath::mirror(&self.html))
    }
}

/// Collapses runs of whitespace to single spaces and trims the ends
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
