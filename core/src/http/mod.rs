pub mod client;

pub use client::HttpClient;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is when a payload is appended to a reflected prefix:
/// RFC 3986 unreserved characters plus `/`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Percent-encodes a payload for direct concatenation onto a URL prefix.
pub fn encode_payload(payload: &str) -> String {
    utf8_percent_encode(payload, QUERY_VALUE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_script_payload() {
        assert_eq!(
            encode_payload("<script>alert(1)</script>"),
            "%3Cscript%3Ealert%281%29%3C/script%3E"
        );
    }

    #[test]
    fn test_encode_keeps_unreserved() {
        assert_eq!(encode_payload("a-b_c.d~e/f"), "a-b_c.d~e/f");
        assert_eq!(encode_payload("a b&c=d"), "a%20b%26c%3Dd");
    }

    #[test]
    fn test_encode_non_ascii() {
        assert_eq!(encode_payload("é"), "%C3%A9");
    }
}
