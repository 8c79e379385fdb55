use super::{collapse_whitespace, MatchedNode};
use scraper::{ElementRef, Html, Node as HtmlNode};
use sxd_document::dom::{Document, Element};
use sxd_document::Package;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{evaluate_xpath, Value};

/// Appends an attribute-selection step to an expression
pub(super) fn with_attribute_step(expression: &str, attr: Option<&str>) -> String {
    let expression = expression.trim();
    match attr {
        Some(attr) => format!("{}/@{}", expression.trim_end_matches('/'), attr.trim()),
        None => expression.to_string(),
    }
}

/// XPath 1.0 core function library
const CORE_FUNCTIONS: &[&str] = &[
    "last",
    "position",
    "count",
    "id",
    "local-name",
    "namespace-uri",
    "name",
    "string",
    "concat",
    "starts-with",
    "contains",
    "substring-before",
    "substring-after",
    "substring",
    "string-length",
    "normalize-space",
    "translate",
    "boolean",
    "not",
    "true",
    "false",
    "lang",
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
];

/// Node-type tests, which are written like calls
const NODE_TESTS: &[&str] = &["node", "text", "comment", "processing-instruction"];

/// Operator names, which may be followed by an opening parenthesis
const OPERATORS: &[&str] = &["and", "or", "div", "mod"];

/// Rejects expressions that fail to parse or that call something the
/// evaluator will not know about
///
/// Function names and variables are only resolved when the step that uses
/// them is evaluated against a matching node, so an empty-document
/// evaluation alone cannot catch them.
pub(super) fn check(expression: &str) -> Result<(), String> {
    check_names(expression)?;

    let package = Package::new();
    let document = package.as_document();
    evaluate_xpath(&document, expression)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn check_names(expression: &str) -> Result<(), String> {
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' || c == '"' {
            match chars[i + 1..].iter().position(|&ch| ch == c) {
                Some(len) => i += len + 2,
                None => return Err("unterminated string literal".to_string()),
            }
            continue;
        }

        if c == '$' {
            let name: String = chars[i + 1..].iter().take_while(|&&ch| is_name_char(ch)).collect();
            return Err(format!("variables are not supported: ${}", name));
        }

        if !is_name_start(c) {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && is_name_char(chars[i]) {
            i += 1;
        }
        let token: String = chars[start..i].iter().collect();

        let next = chars[i..].iter().find(|ch| !ch.is_whitespace());
        if next != Some(&'(') {
            continue;
        }

        // `child::node()` names an axis before the node test
        let name = token.rsplit("::").next().unwrap_or(token.as_str());
        let known = CORE_FUNCTIONS.contains(&name)
            || NODE_TESTS.contains(&name)
            || OPERATORS.contains(&name);
        if !known {
            return Err(format!("unknown function: {}", name));
        }
    }

    Ok(())
}

/// Builds an XPath-queryable copy of a parsed HTML tree
///
/// Only elements, attributes and text are copied; comments, doctypes and
/// processing instructions are not addressable by rules. The walk keeps its
/// own stack so deeply nested pages cannot exhaust the thread stack.
pub(super) fn mirror(html: &Html) -> Package {
    let package = Package::new();
    {
        let document = package.as_document();
        let source_root = html.root_element();
        let root = copy_element(&document, source_root);
        document.root().append_child(root);

        let mut pending = vec![(source_root, root)];
        while let Some((source, element)) = pending.pop() {
            for child in source.children() {
                if let Some(child_source) = ElementRef::wrap(child) {
                    let child_element = copy_element(&document, child_source);
                    element.append_child(child_element);
                    pending.push((child_source, child_element));
                } else if let HtmlNode::Text(text) = child.value() {
                    element.append_child(document.create_text(text));
                }
            }
        }
    }
    package
}

/// Copies an element's name and attributes, without children
fn copy_element<'d>(document: &Document<'d>, source: ElementRef<'_>) -> Element<'d> {
    let value = source.value();
    let element = document.create_element(value.name());
    for (name, attr_value) in value.attrs() {
        element.set_attribute_value(name, attr_value);
    }
    element
}

pub(super) fn select_values(package: &Package, expression: &str) -> Result<Vec<String>, String> {
    let document = package.as_document();
    let value = evaluate_xpath(&document, expression).map_err(|e| e.to_string())?;

    Ok(match value {
        Value::Nodeset(nodes) => nodes.document_order().iter().map(node_value).collect(),
        Value::String(text) => vec![collapse_whitespace(&text)],
        Value::Number(number) => vec![number.to_string()],
        Value::Boolean(flag) => vec![flag.to_string()],
    })
}

pub(super) fn first_match(
    package: &Package,
    expression: &str,
) -> Result<Option<MatchedNode>, String> {
    let document = package.as_document();
    let value = evaluate_xpath(&document, expression).map_err(|e| e.to_string())?;

    Ok(match value {
        Value::Nodeset(nodes) => nodes.document_order().first().map(|node| match node {
            Node::Element(element) => MatchedNode::Element {
                attributes: element
                    .attributes()
                    .iter()
                    .map(|a| (a.name().local_part().to_string(), a.value().to_string()))
                    .collect(),
            },
            other => MatchedNode::Value(node_value(other)),
        }),
        Value::String(text) => Some(MatchedNode::Value(text.trim().to_string())),
        Value::Number(_) | Value::Boolean(_) => None,
    })
}

fn node_value(node: &Node<'_>) -> String {
    match node {
        Node::Attribute(attribute) => attribute.value().trim().to_string(),
        other => collapse_whitespace(&other.string_value()),
    }
}
