use std::ops::Range;
use std::sync::LazyLock;

use regex::CaptureMatches;
use regex::Regex;

use crate::DetokError;
use crate::DetokResult;

/// The default token syntax: `$(key)` where the key is made of ASCII
/// letters, digits, `-`, `.` and `_`.
pub const DEFAULT_TOKEN_PATTERN: &str = r"\$\(([0-9a-zA-Z\-._]+)\)";

/// Applied to a captured region that still carries the `$(` `)` delimiters.
static DELIMITED_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\$\(([0-9a-zA-Z\-._]+)\)$")
		.unwrap_or_else(|e| unreachable!("static key pattern is valid: {e}"))
});

/// A compiled token pattern.
///
/// The pattern must contain exactly one capture group. The text captured by
/// that group is the token key. Patterns that capture the delimited form
/// (for example `(\$\([a-z]+\))`) are accepted: the delimiters are trimmed
/// from the captured text before it is handed to a resolver.
#[derive(Debug, Clone)]
pub struct TokenPattern {
	regex: Regex,
}

impl TokenPattern {
	/// Compile a pattern string.
	pub fn new(pattern: &str) -> DetokResult<Self> {
		let regex = Regex::new(pattern).map_err(|e| {
			DetokError::InvalidPattern {
				pattern: pattern.to_string(),
				reason: e.to_string(),
			}
		})?;

		// `captures_len` includes the implicit whole-match group.
		let groups = regex.captures_len() - 1;
		if groups != 1 {
			return Err(DetokError::InvalidPattern {
				pattern: pattern.to_string(),
				reason: format!("expected exactly one capture group, found {groups}"),
			});
		}

		Ok(Self { regex })
	}

	/// The source text of the compiled pattern.
	pub fn as_str(&self) -> &str {
		self.regex.as_str()
	}

	/// Return a lazy iterator over every token in `text`, left to right and
	/// without overlap. Call again to restart from the beginning.
	pub fn find_tokens<'p, 't>(&'p self, text: &'t str) -> TokenMatches<'p, 't> {
		TokenMatches {
			captures: self.regex.captures_iter(text),
		}
	}

	/// Check whether `text` contains at least one token.
	pub fn is_match(&self, text: &str) -> bool {
		self.regex.is_match(text)
	}
}

impl Default for TokenPattern {
	fn default() -> Self {
		Self {
			regex: Regex::new(DEFAULT_TOKEN_PATTERN)
				.unwrap_or_else(|e| unreachable!("default token pattern is valid: {e}")),
		}
	}
}

/// A single token found in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch<'t> {
	/// Byte range of the full token, delimiters included.
	pub span: Range<usize>,
	/// The token key used for resolution.
	pub key: &'t str,
}

/// Iterator returned by [`TokenPattern::find_tokens`].
#[derive(Debug)]
pub struct TokenMatches<'p, 't> {
	captures: CaptureMatches<'p, 't>,
}

impl<'t> Iterator for TokenMatches<'_, 't> {
	type Item = TokenMatch<'t>;

	fn next(&mut self) -> Option<Self::Item> {
		let captures = self.captures.next()?;
		let whole = captures.get(0)?;
		let captured = captures.get(1).map_or(whole.as_str(), |m| m.as_str());

		Some(TokenMatch {
			span: whole.range(),
			key: extract_key(captured),
		})
	}
}

/// Trim `$(` and `)` from a captured region when it holds the delimited form.
pub(crate) fn extract_key(captured: &str) -> &str {
	DELIMITED_KEY_PATTERN
		.captures(captured)
		.and_then(|c| c.get(1))
		.map_or(captured, |m| m.as_str())
}
