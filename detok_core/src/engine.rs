use crate::DetokError;
use crate::DetokResult;
use crate::pattern::TokenPattern;
use crate::resolver::Resolver;

/// Result of substituting the tokens of one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
	/// The rewritten text. Equal to the input when nothing matched.
	pub text: String,
	/// True when at least one token was found and replaced.
	pub matched: bool,
	/// Number of tokens replaced.
	pub replaced: usize,
}

/// Replace every token in `text` with its resolved value.
///
/// Tokens are resolved in order. The first key the resolver cannot resolve
/// fails with [`DetokError::TokenNotFound`] and no output is produced.
pub fn substitute(
	text: &str,
	pattern: &TokenPattern,
	resolver: &Resolver<'_>,
) -> DetokResult<Substitution> {
	let mut output = String::with_capacity(text.len());
	let mut last_end = 0;
	let mut replaced = 0usize;

	for token in pattern.find_tokens(text) {
		let Some(value) = resolver.resolve(token.key) else {
			return Err(DetokError::TokenNotFound(token.key.to_string()));
		};

		tracing::trace!(key = token.key, value = %value, "resolved token");
		output.push_str(&text[last_end..token.span.start]);
		output.push_str(&value);
		last_end = token.span.end;
		replaced += 1;
	}

	if replaced == 0 {
		return Ok(Substitution {
			text: text.to_string(),
			matched: false,
			replaced,
		});
	}

	output.push_str(&text[last_end..]);

	Ok(Substitution {
		text: output,
		matched: true,
		replaced,
	})
}
