use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use unicode_general_category::{get_general_category, GeneralCategory};

use crate::error::{PresageError, PresageResult};

/// Default blankspace characters.
pub const DEFAULT_BLANKSPACES: &str = " \u{0c}\n\r\t\u{0b}\u{a0}\u{3000}";

/// Default separator characters (punctuation, quotes, dashes and digits).
pub const DEFAULT_SEPARATORS: &str =
	"`~!@#$%^&*()_+=\\|]}[{\";:/?.>,<¡¿†¨„“”«»।॥ו–—―´’‘‚י0123456789ः";

static STANDARD_CLASSES: Lazy<CharClasses> = Lazy::new(CharClasses::default);

/// Class of a single character as seen by the tokenizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
	Blankspace,
	Separator,
	/// Unicode letter (`L*` general category).
	Word,
	/// Anything else: marks, symbols not listed as separators, ...
	Other,
}

/// Returns `true` if `c` is a letter in the unicode general category sense.
pub fn is_word_character(c: char) -> bool {
	matches!(
		get_general_category(c),
		GeneralCategory::UppercaseLetter
			| GeneralCategory::LowercaseLetter
			| GeneralCategory::TitlecaseLetter
			| GeneralCategory::ModifierLetter
			| GeneralCategory::OtherLetter
	)
}

/// Char index of the first word character of `s`.
pub fn first_word_character(s: &str) -> Option<usize> {
	s.chars().position(is_word_character)
}

/// Char index of the last word character of `s`.
pub fn last_word_character(s: &str) -> Option<usize> {
	let count = s.chars().count();
	s.chars()
		.rev()
		.position(is_word_character)
		.map(|from_end| count - from_end - 1)
}

/// The two configurable character sets used to split text into tokens.
///
/// A character is exactly one of blankspace, separator or word-or-other.
/// When a character appears in both sets, blankspace wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CharClassesSpec", into = "CharClassesSpec")]
pub struct CharClasses {
	blankspaces: HashSet<char>,
	separators: HashSet<char>,
}

/// Serialized form of [`CharClasses`]: the two sets as plain strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharClassesSpec {
	pub blankspaces: String,
	pub separators: String,
}

impl Default for CharClassesSpec {
	fn default() -> Self {
		Self {
			blankspaces: DEFAULT_BLANKSPACES.to_owned(),
			separators: DEFAULT_SEPARATORS.to_owned(),
		}
	}
}

impl From<CharClassesSpec> for CharClasses {
	fn from(spec: CharClassesSpec) -> Self {
		Self::new(&spec.blankspaces, &spec.separators)
	}
}

impl From<CharClasses> for CharClassesSpec {
	fn from(classes: CharClasses) -> Self {
		let mut blankspaces: Vec<char> = classes.blankspaces.into_iter().collect();
		let mut separators: Vec<char> = classes.separators.into_iter().collect();
		blankspaces.sort_unstable();
		separators.sort_unstable();
		Self {
			blankspaces: blankspaces.into_iter().collect(),
			separators: separators.into_iter().collect(),
		}
	}
}

impl Default for CharClasses {
	fn default() -> Self {
		Self::new(DEFAULT_BLANKSPACES, DEFAULT_SEPARATORS)
	}
}

impl CharClasses {
	pub fn new(blankspaces: &str, separators: &str) -> Self {
		let blankspaces: HashSet<char> = blankspaces.chars().collect();
		let separators = separators
			.chars()
			.filter(|c| !blankspaces.contains(c))
			.collect();
		Self { blankspaces, separators }
	}

	/// Shared instance built from the default sets.
	pub fn standard() -> &'static CharClasses {
		&STANDARD_CLASSES
	}

	pub fn classify(&self, c: char) -> CharClass {
		if self.blankspaces.contains(&c) {
			CharClass::Blankspace
		} else if self.separators.contains(&c) {
			CharClass::Separator
		} else if is_word_character(c) {
			CharClass::Word
		} else {
			CharClass::Other
		}
	}

	/// `true` for characters that end a token (blankspace or separator).
	#[inline]
	pub fn is_delimiter(&self, c: char) -> bool {
		self.blankspaces.contains(&c) || self.separators.contains(&c)
	}

	/// Classifies a textual unit that must hold exactly one character.
	///
	/// # Errors
	/// Returns [`PresageError::Tokenization`] for empty or multi-character input.
	pub fn classify_unit(&self, unit: &str) -> PresageResult<CharClass> {
		let mut chars = unit.chars();
		match (chars.next(), chars.next()) {
			(Some(c), None) => Ok(self.classify(c)),
			_ => Err(PresageError::Tokenization(format!(
				"expected a single character, got {unit:?}"
			))),
		}
	}

	/// Tests a one-character unit for blankspace membership.
	pub fn is_blankspace(&self, unit: &str) -> PresageResult<bool> {
		Ok(self.classify_unit(unit)? == CharClass::Blankspace)
	}

	/// Tests a one-character unit for separator membership.
	pub fn is_separator(&self, unit: &str) -> PresageResult<bool> {
		Ok(self.classify_unit(unit)? == CharClass::Separator)
	}
}
