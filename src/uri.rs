//! `xml:base` resolution.
//!
//! URIs stay opaque strings throughout the object model; this module only
//! implements the combination rule for nested `xml:base` declarations and
//! the suppression rule for writing them back out. The merge follows
//! RFC 3986 section 5 closely enough for base resolution: an absolute
//! declared value replaces the inherited base, a relative one resolves
//! against it.

/// Combines an inherited base URI with a declared `xml:base` value.
///
/// Returns the effective base for the element that declared `value`. An
/// empty declaration keeps the inherited base; without an inherited base
/// the declared value is kept as-is, relative or not.
pub fn combine_xml_base(current: Option<&str>, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return current.map(str::to_owned);
    }
    if is_absolute(value) {
        return Some(value.to_owned());
    }
    match current {
        Some(base) => Some(resolve_relative(base, value)),
        None => Some(value.to_owned()),
    }
}

/// Returns the `xml:base` value to emit for a child entity, or `None` when
/// the child's base matches the inherited one and the attribute would be
/// redundant.
pub(crate) fn base_to_write<'a>(
    inherited: Option<&str>,
    child: Option<&'a str>,
) -> Option<&'a str> {
    match child {
        Some(base) if inherited != Some(base) => Some(base),
        _ => None,
    }
}

/// True when the string carries a URI scheme before any path delimiter.
fn is_absolute(uri: &str) -> bool {
    match uri.find(':') {
        Some(i) => {
            let head = &uri[..i];
            !head.is_empty()
                && head.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && head
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !uri[..i].contains(['/', '?', '#'])
        }
        None => false,
    }
}

fn resolve_relative(base: &str, rel: &str) -> String {
    if let Some(rest) = rel.strip_prefix("//") {
        let scheme_end = base.find(':').map(|i| i + 1).unwrap_or(0);
        return format!("{}//{}", &base[..scheme_end], rest);
    }
    let (prefix, path) = split_authority(base);
    if rel.starts_with('/') {
        return format!("{}{}", prefix, remove_dot_segments(rel));
    }
    if rel.starts_with('?') || rel.starts_with('#') {
        let cut = path.find(['?', '#']).unwrap_or(path.len());
        return format!("{}{}{}", prefix, &path[..cut], rel);
    }
    let cut = path.find(['?', '#']).unwrap_or(path.len());
    let dir_end = path[..cut].rfind('/').map(|i| i + 1).unwrap_or(0);
    let merged = format!("{}{}", &path[..dir_end], rel);
    format!("{}{}", prefix, remove_dot_segments(&merged))
}

/// Splits a URI into (scheme + authority, path-and-after).
fn split_authority(uri: &str) -> (&str, &str) {
    let scheme_end = uri.find(':').map(|i| i + 1).unwrap_or(0);
    let rest = &uri[scheme_end..];
    if let Some(auth) = rest.strip_prefix("//") {
        let end = auth.find(['/', '?', '#']).unwrap_or(auth.len());
        let split = scheme_end + 2 + end;
        (&uri[..split], &uri[split..])
    } else {
        (&uri[..scheme_end], rest)
    }
}

fn remove_dot_segments(path: &str) -> String {
    let trailing_slash = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "." | "" => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    let mut joined = out.join("/");
    if absolute {
        joined.insert(0, '/');
    }
    if trailing_slash && !joined.ends_with('/') {
        joined.push('/');
    }
    joined
}
