//! Percent-encoding rules for the different URL parts.

use crate::error::UrlTreeError;

/// Sub-delimiters left unescaped in every component.
const URI_STRING_KEEP: &[u8] = b"!*'()@:$,";

const FRAGMENT_KEEP: &[u8] = b"!*'()@:$,;/?&=+#";

/// Re-inserts escaped bytes that belong to `keep` as literal characters.
fn restore(encoded: &str, keep: &[u8]) -> String {
	let bytes = encoded.as_bytes();
	let mut out = String::with_capacity(encoded.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' && i + 2 < bytes.len() {
			let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
				.ok()
				.and_then(|hex| u8::from_str_radix(hex, 16).ok());
			if let Some(byte) = decoded.filter(|b| keep.contains(b)) {
				out.push(byte as char);
				i += 3;
				continue;
			}
		}
		out.push(bytes[i] as char);
		i += 1;
	}
	out
}

/// Encodes like `encodeURIComponent`, but keeps `@ : $ ,` readable.
pub fn encode_uri_string(s: &str) -> String {
	restore(&urlencoding::encode(s), URI_STRING_KEEP)
}

/// Encodes a query key or value. `;` stays readable.
pub fn encode_uri_query(s: &str) -> String {
	restore(&urlencoding::encode(s), b"!*'()@:$,;")
}

/// Encodes a path segment or matrix parameter. Parentheses are escaped
/// because they delimit outlet groups; `&` stays readable.
pub fn encode_uri_segment(s: &str) -> String {
	restore(&urlencoding::encode(s), b"!*'@:$,&")
}

/// Encodes a fragment with URI rules.
pub fn encode_uri_fragment(s: &str) -> String {
	restore(&urlencoding::encode(s), FRAGMENT_KEEP)
}

/// Decodes a percent-encoded component, rejecting malformed escapes.
pub fn decode(s: &str) -> Result<String, UrlTreeError> {
	let bytes = s.as_bytes();
	for (i, byte) in bytes.iter().enumerate() {
		if *byte == b'%' {
			let valid = bytes.len() > i + 2
				&& bytes[i + 1].is_ascii_hexdigit()
				&& bytes[i + 2].is_ascii_hexdigit();
			if !valid {
				return Err(UrlTreeError::InvalidEncoding(s.to_string()));
			}
		}
	}
	urlencoding::decode(s)
		.map(|decoded| decoded.into_owned())
		.map_err(|_| UrlTreeError::InvalidEncoding(s.to_string()))
}

/// Decodes a query component; `+` means space.
pub fn decode_query(s: &str) -> Result<String, UrlTreeError> {
	decode(&s.replace('+', "%20"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("one two", "one%20two")]
	#[case("a@b:c$d,e", "a@b:c$d,e")]
	#[case("a/b", "a%2Fb")]
	#[case("(x)", "%28x%29")]
	#[case("a&b", "a&b")]
	#[case("a;b=c", "a%3Bb%3Dc")]
	fn test_encode_uri_segment(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(encode_uri_segment(input), expected);
	}

	#[rstest]
	#[case("a;b", "a;b")]
	#[case("a&b", "a%26b")]
	#[case("a=b", "a%3Db")]
	#[case("(x)", "(x)")]
	fn test_encode_uri_query(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(encode_uri_query(input), expected);
	}

	#[rstest]
	fn test_encode_uri_fragment_keeps_reserved() {
		assert_eq!(encode_uri_fragment("top/a?b=c d"), "top/a?b=c%20d");
	}

	#[rstest]
	fn test_literal_percent_is_not_restored() {
		assert_eq!(encode_uri_string("%2C"), "%252C");
	}

	#[rstest]
	#[case("%")]
	#[case("%2")]
	#[case("%zz")]
	#[case("%ff")]
	fn test_decode_rejects_malformed(#[case] input: &str) {
		assert!(decode(input).is_err());
	}

	#[rstest]
	fn test_decode_query_plus_is_space() {
		assert_eq!(decode_query("a+b%2Bc").unwrap(), "a b+c");
	}
}
