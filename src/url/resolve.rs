use crate::UrlError;
use url::Url;

/// Resolves a possibly-relative URL reference against an optional base
///
/// Absolute references pass through unchanged (apart from the standard
/// parser normalisation); relative references are joined to `base` using
/// RFC 3986 reference resolution. Only `http` and `https` results are
/// accepted, since those are the only schemes the transport can fetch.
///
/// # Arguments
///
/// * `href` - The URL reference as found in configuration or markup
/// * `base` - The URL to resolve against, if one is known yet
///
/// # Returns
///
/// * `Ok(Url)` - The absolute URL
/// * `Err(UrlError)` - The reference is malformed, relative with no base,
///   or resolves to a non-HTTP scheme
///
/// # Examples
///
/// ```
/// use pagetrail::url::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://ex.com/a/b").unwrap();
/// let url = resolve_url("/page/2", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "https://ex.com/page/2");
/// ```
pub fn resolve_url(href: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let href = href.trim();

    let url = match base {
        Some(base) => base.join(href).map_err(|e| UrlError::Parse(e.to_string()))?,
        None => match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Err(UrlError::MissingBase(href.to_string()))
            }
            Err(e) => return Err(UrlError::Parse(e.to_string())),
        },
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    Ok(url)
}

/// Returns the key a URL is tracked under in a visited set
///
/// Fragments are dropped because they never change the fetched resource.
pub fn visit_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.into()
}
