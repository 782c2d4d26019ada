use std::fmt;

use encoding_rs::Encoding;
use serde::Serialize;
use serde::Serializer;

use crate::DetokError;
use crate::DetokResult;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];
const UTF32LE_BOM: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const UTF32BE_BOM: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];

/// A text encoding used to read or write a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TextEncoding {
	/// 7-bit ASCII. Characters outside the range are written as `?`.
	Ascii,
	/// UTF-8 without a byte order mark.
	Utf8,
	/// UTF-8 with a byte order mark.
	Utf8Bom,
	Utf16Le,
	Utf16Be,
	Utf32Le,
	Utf32Be,
	Utf7,
	/// Any other encoding known to `encoding_rs` by its WHATWG label.
	Legacy(&'static Encoding),
}

impl TextEncoding {
	/// Look up an encoding by name.
	///
	/// Accepts the conventional build names (`ASCII`, `UTF8`, `Unicode`,
	/// `BigEndianUnicode`, `UTF32`, `UTF7`) case-insensitively, their
	/// hyphenated spellings, and any WHATWG label.
	pub fn from_name(name: &str) -> DetokResult<Self> {
		let trimmed = name.trim();
		let lower = trimmed.to_ascii_lowercase();

		let encoding = match lower.as_str() {
			"ascii" | "us-ascii" => Self::Ascii,
			"utf8" | "utf-8" => Self::Utf8,
			"unicode" | "utf16" | "utf-16" | "utf16le" | "utf-16le" => Self::Utf16Le,
			"bigendianunicode" | "utf16be" | "utf-16be" => Self::Utf16Be,
			"utf32" | "utf-32" | "utf32le" | "utf-32le" => Self::Utf32Le,
			"utf32be" | "utf-32be" => Self::Utf32Be,
			"utf7" | "utf-7" => Self::Utf7,
			_ => {
				let encoding = Encoding::for_label(trimmed.as_bytes())
					.filter(|encoding| *encoding != encoding_rs::REPLACEMENT)
					.ok_or_else(|| DetokError::UnsupportedEncoding(trimmed.to_string()))?;
				Self::from_encoding_rs(encoding)
			}
		};

		Ok(encoding)
	}

	fn from_encoding_rs(encoding: &'static Encoding) -> Self {
		if encoding == encoding_rs::UTF_8 {
			Self::Utf8
		} else if encoding == encoding_rs::UTF_16LE {
			Self::Utf16Le
		} else if encoding == encoding_rs::UTF_16BE {
			Self::Utf16Be
		} else {
			Self::Legacy(encoding)
		}
	}

	/// Detect the encoding of `bytes` from its byte order mark. Returns the
	/// encoding and the length of the mark. Content without a mark is UTF-8.
	pub fn sniff(bytes: &[u8]) -> (Self, usize) {
		// UTF-32LE must be checked before UTF-16LE; they share a prefix.
		if bytes.starts_with(UTF32LE_BOM) {
			(Self::Utf32Le, UTF32LE_BOM.len())
		} else if bytes.starts_with(UTF32BE_BOM) {
			(Self::Utf32Be, UTF32BE_BOM.len())
		} else if bytes.starts_with(UTF8_BOM) {
			(Self::Utf8Bom, UTF8_BOM.len())
		} else if bytes.starts_with(UTF16LE_BOM) {
			(Self::Utf16Le, UTF16LE_BOM.len())
		} else if bytes.starts_with(UTF16BE_BOM) {
			(Self::Utf16Be, UTF16BE_BOM.len())
		} else {
			(Self::Utf8, 0)
		}
	}

	/// Human-readable name.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Ascii => "ASCII",
			Self::Utf8 => "UTF-8",
			Self::Utf8Bom => "UTF-8 (BOM)",
			Self::Utf16Le => "UTF-16LE",
			Self::Utf16Be => "UTF-16BE",
			Self::Utf32Le => "UTF-32LE",
			Self::Utf32Be => "UTF-32BE",
			Self::Utf7 => "UTF-7",
			Self::Legacy(encoding) => encoding.name(),
		}
	}

	/// Encode `text`, including a byte order mark for the UTF-16, UTF-32 and
	/// UTF-8 (BOM) encodings.
	pub fn encode(&self, text: &str) -> Vec<u8> {
		match self {
			Self::Ascii => {
				text.chars()
					.map(|ch| if ch.is_ascii() { ch as u8 } else { b'?' })
					.collect()
			}
			Self::Utf8 => text.as_bytes().to_vec(),
			Self::Utf8Bom => [UTF8_BOM, text.as_bytes()].concat(),
			Self::Utf16Le => {
				let mut out = UTF16LE_BOM.to_vec();
				out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
				out
			}
			Self::Utf16Be => {
				let mut out = UTF16BE_BOM.to_vec();
				out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
				out
			}
			Self::Utf32Le => {
				let mut out = UTF32LE_BOM.to_vec();
				out.extend(text.chars().flat_map(|ch| u32::from(ch).to_le_bytes()));
				out
			}
			Self::Utf32Be => {
				let mut out = UTF32BE_BOM.to_vec();
				out.extend(text.chars().flat_map(|ch| u32::from(ch).to_be_bytes()));
				out
			}
			Self::Utf7 => encode_utf7(text),
			Self::Legacy(encoding) => encoding.encode(text).0.into_owned(),
		}
	}
}

impl fmt::Display for TextEncoding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl Serialize for TextEncoding {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

/// File content decoded with its byte-order-mark encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
	pub text: String,
	/// The encoding detected from the byte order mark.
	pub encoding: TextEncoding,
}

/// Decode raw file bytes using the encoding announced by their byte order
/// mark (UTF-8 when there is none). Invalid sequences become U+FFFD.
pub fn decode(bytes: &[u8]) -> DecodedText {
	let (encoding, bom_len) = TextEncoding::sniff(bytes);
	let body = &bytes[bom_len..];

	let text = match encoding {
		TextEncoding::Utf16Le => {
			encoding_rs::UTF_16LE
				.decode_without_bom_handling(body)
				.0
				.into_owned()
		}
		TextEncoding::Utf16Be => {
			encoding_rs::UTF_16BE
				.decode_without_bom_handling(body)
				.0
				.into_owned()
		}
		TextEncoding::Utf32Le => decode_utf32(body, u32::from_le_bytes),
		TextEncoding::Utf32Be => decode_utf32(body, u32::from_be_bytes),
		_ => {
			encoding_rs::UTF_8
				.decode_without_bom_handling(body)
				.0
				.into_owned()
		}
	};

	DecodedText { text, encoding }
}

fn decode_utf32(body: &[u8], from_bytes: fn([u8; 4]) -> u32) -> String {
	let chunks = body.chunks_exact(4);
	let trailing = !chunks.remainder().is_empty();
	let mut text: String = chunks
		.map(|chunk| {
			let unit = from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
			char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)
		})
		.collect();

	if trailing {
		text.push(char::REPLACEMENT_CHARACTER);
	}

	text
}

/// The read and write encodings chosen for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedEncoding {
	pub read: TextEncoding,
	pub write: TextEncoding,
}

/// Pick the encodings for a file. Content is always read with the detected
/// encoding. It is written with the per-file override, else the global
/// override, else the detected encoding.
pub fn negotiate(
	detected: TextEncoding,
	per_file: Option<TextEncoding>,
	global: Option<TextEncoding>,
) -> NegotiatedEncoding {
	NegotiatedEncoding {
		read: detected,
		write: per_file.or(global).unwrap_or(detected),
	}
}

const BASE64_ALPHABET: &[u8; 64] =
	b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Characters written as themselves in UTF-7 (RFC 2152 set D plus
/// whitespace).
fn is_utf7_direct(ch: char) -> bool {
	ch.is_ascii_alphanumeric()
		|| matches!(
			ch,
			'\'' | '(' | ')' | ',' | '-' | '.' | '/' | ':' | '?' | ' ' | '\t' | '\r' | '\n'
		)
}

fn encode_utf7(text: &str) -> Vec<u8> {
	let mut out = Vec::with_capacity(text.len());
	let mut pending: Vec<u16> = Vec::new();

	for ch in text.chars() {
		if is_utf7_direct(ch) {
			flush_utf7(&mut pending, &mut out);
			out.push(ch as u8);
		} else if ch == '+' {
			flush_utf7(&mut pending, &mut out);
			out.extend_from_slice(b"+-");
		} else {
			let mut buf = [0u16; 2];
			pending.extend_from_slice(ch.encode_utf16(&mut buf));
		}
	}

	flush_utf7(&mut pending, &mut out);
	out
}

/// Emit pending UTF-16 units as a `+...-` modified base64 run.
fn flush_utf7(pending: &mut Vec<u16>, out: &mut Vec<u8>) {
	if pending.is_empty() {
		return;
	}

	out.push(b'+');
	let mut buffer: u32 = 0;
	let mut bits = 0u32;

	for unit in pending.drain(..) {
		buffer = (buffer << 16) | u32::from(unit);
		bits += 16;
		while bits >= 6 {
			bits -= 6;
			out.push(BASE64_ALPHABET[((buffer >> bits) & 0x3F) as usize]);
		}
		buffer &= (1 << bits) - 1;
	}

	if bits > 0 {
		out.push(BASE64_ALPHABET[((buffer << (6 - bits)) & 0x3F) as usize]);
	}

	out.push(b'-');
}
