use once_cell::sync::Lazy;
use regex::Regex;

use super::character::CharClasses;

/// Maximum width of one UTF-8 encoded character, in bytes.
const MAX_CHAR_WIDTH: usize = 4;

static WORD_BEGIN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r#"(\s"?)[-']"#).expect("valid word-begin pattern"));
static WORD_END: Lazy<Regex> =
	Lazy::new(|| Regex::new(r#"[-']("?\s)"#).expect("valid word-end pattern"));

/// Scanning direction of a [`Tokenizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	/// Left to right, from the start of the buffer.
	Forward,
	/// Right to left, from the end of the buffer.
	Reverse,
}

/// Splits an immutable text buffer into tokens.
///
/// A token is a maximal run of characters that are neither blankspace nor
/// separator. Both directions share the classification in [`CharClasses`], so
/// for any text the forward token stream is the exact reverse of the reverse
/// token stream.
///
/// The cursor is a byte offset into the UTF-8 buffer. Scanning backward
/// resolves the previous character boundary on the fly (see [`char_before`]);
/// there is no per-character index.
///
/// # Notes
/// - Case folding (`lowercase`) is applied when a token is assembled, never
///   while classifying characters.
/// - `next_token` never yields an empty token.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
	text: &'a str,
	classes: &'a CharClasses,
	direction: Direction,
	offset: usize,
	lowercase: bool,
}

impl<'a> Tokenizer<'a> {
	/// Creates a tokenizer over `text` using the default character classes.
	pub fn new(text: &'a str, direction: Direction) -> Self {
		Self::with_classes(text, CharClasses::standard(), direction)
	}

	pub fn forward(text: &'a str) -> Self {
		Self::new(text, Direction::Forward)
	}

	pub fn reverse(text: &'a str) -> Self {
		Self::new(text, Direction::Reverse)
	}

	/// Creates a tokenizer with custom blankspace/separator sets.
	pub fn with_classes(text: &'a str, classes: &'a CharClasses, direction: Direction) -> Self {
		let mut tokenizer = Self { text, classes, direction, offset: 0, lowercase: false };
		tokenizer.reset_stream();
		tokenizer
	}

	/// Enables or disables case folding of assembled tokens.
	pub fn lowercase(mut self, lowercase: bool) -> Self {
		self.lowercase = lowercase;
		self
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	/// Current byte offset of the cursor.
	pub fn offset(&self) -> usize {
		self.offset
	}

	/// Number of unicode characters in the buffer.
	pub fn count_characters(&self) -> usize {
		self.text.chars().count()
	}

	/// Rewinds the cursor: to the start for [`Direction::Forward`], to the end
	/// for [`Direction::Reverse`].
	pub fn reset_stream(&mut self) {
		self.offset = match self.direction {
			Direction::Forward => 0,
			Direction::Reverse => self.text.len(),
		};
	}

	/// Returns `true` if at least one more (non-empty) token can be read.
	pub fn has_more_tokens(&self) -> bool {
		match self.direction {
			Direction::Forward => self.text[self.offset..].chars().any(|c| !self.classes.is_delimiter(c)),
			Direction::Reverse => {
				let bytes = self.text.as_bytes();
				let mut end = self.offset;
				while let Some((c, start)) = char_before(bytes, end) {
					if !self.classes.is_delimiter(c) {
						return true;
					}
					end = start;
				}
				false
			}
		}
	}

	/// Reads the next token in scanning order.
	///
	/// Returns `None` once the buffer holds no further token; the cursor is
	/// then left at the far end of the buffer.
	pub fn next_token(&mut self) -> Option<String> {
		let span = match self.direction {
			Direction::Forward => self.next_forward_span(),
			Direction::Reverse => self.next_reverse_span(),
		}?;
		Some(self.assemble(&self.text[span.0..span.1]))
	}

	/// Counts the remaining-and-consumed tokens of the whole buffer.
	///
	/// Performs a full scan from the start of the stream and restores the
	/// cursor afterward.
	pub fn count_tokens(&mut self) -> usize {
		let saved = self.offset;
		self.reset_stream();
		let mut count = 0;
		while self.next_token().is_some() {
			count += 1;
		}
		self.offset = saved;
		count
	}

	/// Fraction of the buffer consumed so far, in `[0.0, 1.0]`.
	pub fn progress(&self) -> f64 {
		let len = self.text.len();
		if len == 0 {
			return 1.0;
		}
		let consumed = match self.direction {
			Direction::Forward => self.offset,
			Direction::Reverse => len - self.offset,
		};
		consumed as f64 / len as f64
	}

	fn next_forward_span(&mut self) -> Option<(usize, usize)> {
		let rest = &self.text[self.offset..];
		let skipped = rest.find(|c: char| !self.classes.is_delimiter(c));
		let Some(skipped) = skipped else {
			self.offset = self.text.len();
			return None;
		};
		let start = self.offset + skipped;
		let end = self.text[start..]
			.find(|c: char| self.classes.is_delimiter(c))
			.map_or(self.text.len(), |len| start + len);
		self.offset = end;
		Some((start, end))
	}

	fn next_reverse_span(&mut self) -> Option<(usize, usize)> {
		let bytes = self.text.as_bytes();

		// Skip the trailing run of blankspace/separator characters.
		let mut end = self.offset;
		loop {
			match char_before(bytes, end) {
				Some((c, start)) if self.classes.is_delimiter(c) => end = start,
				Some(_) => break,
				None => {
					self.offset = 0;
					return None;
				}
			}
		}

		let mut start = end;
		while let Some((c, previous)) = char_before(bytes, start) {
			if self.classes.is_delimiter(c) {
				break;
			}
			start = previous;
		}
		self.offset = start;
		Some((start, end))
	}

	fn assemble(&self, raw: &str) -> String {
		if self.lowercase {
			raw.chars().flat_map(char::to_lowercase).collect()
		} else {
			raw.to_owned()
		}
	}
}

impl Iterator for Tokenizer<'_> {
	type Item = String;

	fn next(&mut self) -> Option<Self::Item> {
		self.next_token()
	}
}

/// Decodes the character that ends at byte offset `end`.
///
/// Walks back one byte at a time, up to [`MAX_CHAR_WIDTH`] bytes, and
/// re-decodes the slice until it forms exactly one valid character.
///
/// Returns the character and the byte offset where it starts, or `None` at the
/// start of the buffer.
pub fn char_before(bytes: &[u8], end: usize) -> Option<(char, usize)> {
	(1..=MAX_CHAR_WIDTH.min(end)).find_map(|width| {
		let start = end - width;
		let unit = std::str::from_utf8(&bytes[start..end]).ok()?;
		let mut chars = unit.chars();
		match (chars.next(), chars.next()) {
			(Some(c), None) => Some((c, start)),
			_ => None,
		}
	})
}

/// Cleans a corpus line before tokenization.
///
/// Removes hyphens and apostrophes clinging to the start of a word (after
/// whitespace, optionally followed by a double quote) or to its end (before
/// whitespace, optionally preceded by a double quote).
pub fn preprocess(text: &str) -> String {
	let text = WORD_BEGIN.replace_all(text, "${1}");
	WORD_END.replace_all(&text, "${1}").into_owned()
}
