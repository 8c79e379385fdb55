use super::{collapse_whitespace, MatchedNode};
use scraper::{Html, Selector};

pub(super) fn compile(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| e.to_string())
}

pub(super) fn select_values(html: &Html, selector: &Selector, attr: Option<&str>) -> Vec<String> {
    html.select(selector)
        .filter_map(|element| match attr {
            Some(name) => element.value().attr(name).map(|v| v.trim().to_string()),
            None => Some(collapse_whitespace(&element.text().collect::<String>())),
        })
        .collect()
}

pub(super) fn first_element(html: &Html, selector: &Selector) -> Option<MatchedNode> {
    html.select(selector).next().map(|element| MatchedNode::Element {
        attributes: element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    })
}
