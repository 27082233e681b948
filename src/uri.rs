//! Document URI recognition and the `.templ ⇄ _templ.go` suffix swap.
//!
//! URIs are opaque strings; the only transformation the proxy performs is
//! swapping the basename suffix so the upstream sees generated Go files
//! where the editor sees templates.

/// Suffix of template document URIs.
pub const TEMPLATE_SUFFIX: &str = ".templ";

/// Suffix of the generated Go files derived from templates.
pub const GENERATED_SUFFIX: &str = "_templ.go";

/// Whether `uri` names a template document.
#[must_use]
pub fn is_template(uri: &str) -> bool {
    uri.ends_with(TEMPLATE_SUFFIX)
}

/// URI of the generated Go file for a template URI. Non-template URIs come
/// back unchanged.
#[must_use]
pub fn to_generated(uri: &str) -> String {
    match uri.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stem) => format!("{stem}{GENERATED_SUFFIX}"),
        None => uri.to_string(),
    }
}

/// URI of the template a generated Go file was produced from. URIs without
/// the generated suffix come back unchanged.
#[must_use]
pub fn to_template(uri: &str) -> String {
    match uri.strip_suffix(GENERATED_SUFFIX) {
        Some(stem) => format!("{stem}{TEMPLATE_SUFFIX}"),
        None => uri.to_string(),
    }
}
