//! Header inspection helpers

/// Extract the content length from a header collection
///
/// Header names are matched case-insensitively. The value is parsed as the
/// leading unsigned integer token, which tolerates malformed duplicated
/// values such as `"11921, 11921"` produced by some upstreams. Returns 0
/// when the header is absent or the value has no leading integer.
#[must_use]
pub fn content_length(headers: &[(String, String)]) -> u64 {
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-length") {
            return leading_integer(value);
        }
    }

    0
}

/// Parse the leading unsigned integer token of a header value
fn leading_integer(value: &str) -> u64 {
    let trimmed = value.trim_start();
    let digits: &str = match trimmed.find(|c: char| !c.is_ascii_digit()) {
        Some(end) => &trimmed[..end],
        None => trimmed,
    };

    digits.parse().unwrap_or(0)
}
