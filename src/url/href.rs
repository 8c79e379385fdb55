/// Checks whether an href is a placeholder that navigates nowhere
///
/// Matches a bare `#` and script references that evaluate to nothing, such
/// as `javascript:void(0)`, `JavaScript: void 0;` or `javascript:;`.
/// Whitespace and case are ignored.
///
/// # Examples
///
/// ```
/// use pagetrail::url::is_noop_href;
///
/// assert!(is_noop_href("#"));
/// assert!(is_noop_href(" JavaScript:Void(0); "));
/// assert!(!is_noop_href("/page/2"));
/// ```
pub fn is_noop_href(href: &str) -> bool {
    let compact: String = href
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    if compact == "#" {
        return true;
    }

    let Some(script) = compact.strip_prefix("javascript:") else {
        return false;
    };

    let script = script.trim_end_matches(';');
    matches!(script, "" | "void(0)" | "void0" | "void(null)" | "undefined")
}
