//! `Authorization` header parsing.

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme match is case-insensitive. Returns `None` when the header is
/// absent, has no scheme/token split, uses another scheme, or carries a blank
/// token.
pub fn extract_bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    if header.is_empty() {
        return None;
    }

    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}
