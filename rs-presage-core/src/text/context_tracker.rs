use super::character::{is_word_character, last_word_character, CharClasses};
use super::tokenizer::{Direction, Tokenizer};
use crate::model::predictor::PredictionContext;

/// Default size of the sliding window, in characters.
pub const DEFAULT_SLIDING_WINDOW_SIZE: usize = 80;

/// Default number of characters of past text kept by a [`ContextTracker`].
pub const DEFAULT_HISTORY_SIZE: usize = 1024;

/// Returns the trailing `n` characters of `s`.
///
/// If `n` is greater than the number of characters in `s`, the entire string
/// is returned. UTF-8 safe.
pub(crate) fn last_n_chars(s: &str, n: usize) -> &str {
	if n == 0 {
		return "";
	}
	match s.char_indices().rev().nth(n - 1) {
		Some((start, _)) => &s[start..],
		None => s,
	}
}

/// Detects whether the user started a new token since the last prediction.
///
/// Keeps a bounded trailing snapshot (the sliding window) of the text seen at
/// the last prediction and compares it with the current text.
#[derive(Debug, Clone)]
pub struct ContextChangeDetector {
	sliding_window: String,
	max_window_size: usize,
}

impl Default for ContextChangeDetector {
	fn default() -> Self {
		Self::new(DEFAULT_SLIDING_WINDOW_SIZE)
	}
}

impl ContextChangeDetector {
	pub fn new(max_window_size: usize) -> Self {
		Self { sliding_window: String::new(), max_window_size }
	}

	pub fn sliding_window(&self) -> &str {
		&self.sliding_window
	}

	pub fn max_window_size(&self) -> usize {
		self.max_window_size
	}

	/// Sets the window to the trailing `max_window_size` characters of `text`.
	pub fn update_sliding_window(&mut self, text: &str) {
		self.sliding_window = last_n_chars(text, self.max_window_size).to_owned();
	}

	/// Returns `true` if `new_text` no longer continues the token that was
	/// being completed when the window was last updated.
	///
	/// # Behavior
	/// - Empty window: changed iff `new_text` is non-empty.
	/// - Window not found in `new_text`: changed (the context was reset).
	/// - Otherwise the text after the last occurrence of the window (the
	///   remainder) decides:
	///   - no word character: unchanged if empty, else changed only when the
	///     window itself ended on a token boundary;
	///   - starts with a word character right after a boundary: a new token
	///     began, changed;
	///   - ends on a word character: still mid-token, unchanged;
	///   - anything else: changed.
	pub fn context_change(&self, new_text: &str) -> bool {
		let previous = self.sliding_window.as_str();
		if previous.is_empty() {
			return !new_text.is_empty();
		}

		let Some(index) = new_text.rfind(previous) else {
			return true;
		};
		let split = index + previous.len();
		let remainder = &new_text[split..];
		let preceding_is_word = new_text[..split]
			.chars()
			.next_back()
			.is_some_and(is_word_character);

		match last_word_character(remainder) {
			None => !remainder.is_empty() && !preceding_is_word,
			Some(last) => {
				let starts_new_token = remainder.chars().next().is_some_and(is_word_character);
				if starts_new_token && !preceding_is_word {
					return true;
				}
				last != remainder.chars().count() - 1
			}
		}
	}
}

/// Tracks the text typed during one session.
///
/// Owns the session's past stream (bounded to `history_size` characters) and a
/// [`ContextChangeDetector`]. Exclusively owned by its session, so it needs no
/// locking.
#[derive(Debug, Clone)]
pub struct ContextTracker {
	classes: CharClasses,
	lowercase: bool,
	history_size: usize,
	past_stream: String,
	detector: ContextChangeDetector,
}

impl Default for ContextTracker {
	fn default() -> Self {
		Self::new(CharClasses::default(), DEFAULT_SLIDING_WINDOW_SIZE, DEFAULT_HISTORY_SIZE, false)
	}
}

impl ContextTracker {
	/// Creates a tracker.
	///
	/// `history_size` is raised to `sliding_window_size` if smaller, so the
	/// window can always be found in the kept history.
	pub fn new(classes: CharClasses, sliding_window_size: usize, history_size: usize, lowercase: bool) -> Self {
		Self {
			classes,
			lowercase,
			history_size: history_size.max(sliding_window_size),
			past_stream: String::new(),
			detector: ContextChangeDetector::new(sliding_window_size),
		}
	}

	pub fn past_stream(&self) -> &str {
		&self.past_stream
	}

	pub fn detector(&self) -> &ContextChangeDetector {
		&self.detector
	}

	/// Appends a text increment to the past stream.
	pub fn update(&mut self, increment: &str) {
		self.past_stream.push_str(increment);
		self.trim_history();
	}

	/// Replaces the past stream with the full text typed so far.
	pub fn set_past_stream(&mut self, text: &str) {
		self.past_stream.clear();
		self.past_stream.push_str(last_n_chars(text, self.history_size));
	}

	/// Whether the context changed since the last [`commit`](Self::commit).
	pub fn context_change(&self) -> bool {
		self.detector.context_change(&self.past_stream)
	}

	/// Marks the current past stream as served.
	pub fn commit(&mut self) {
		self.detector.update_sliding_window(&self.past_stream);
	}

	/// Forgets the past stream and the sliding window, keeping the settings.
	pub fn reset(&mut self) {
		self.past_stream.clear();
		self.detector = ContextChangeDetector::new(self.detector.max_window_size());
	}

	/// The partially typed token, empty right after a delimiter.
	pub fn prefix(&self) -> String {
		self.token(0)
	}

	/// Token at `index` counting backward: 0 is the prefix, 1 the token before.
	///
	/// Returns an empty string past the start of the stream.
	pub fn token(&self, index: usize) -> String {
		self.reverse_tokens(index + 1).into_iter().nth(index).unwrap_or_default()
	}

	/// Builds the predictor context for an n-gram `order`: up to `order - 1`
	/// preceding tokens (oldest first) plus the prefix.
	pub fn context(&self, order: usize) -> PredictionContext {
		let mut tokens = self.reverse_tokens(order.max(1));
		let prefix = if tokens.is_empty() { String::new() } else { tokens.remove(0) };
		tokens.retain(|t| !t.is_empty());
		tokens.reverse();
		PredictionContext::new(tokens, prefix)
	}

	/// Reads up to `count` tokens backward, index 0 being the prefix slot.
	fn reverse_tokens(&self, count: usize) -> Vec<String> {
		let mut tokens = Vec::with_capacity(count);
		let ends_on_delimiter = self
			.past_stream
			.chars()
			.next_back()
			.is_none_or(|c| self.classes.is_delimiter(c));
		if ends_on_delimiter {
			tokens.push(String::new());
		}
		let tokenizer = Tokenizer::with_classes(&self.past_stream, &self.classes, Direction::Reverse)
			.lowercase(self.lowercase);
		tokens.extend(tokenizer.take(count.saturating_sub(tokens.len())));
		tokens
	}

	fn trim_history(&mut self) {
		let kept = last_n_chars(&self.past_stream, self.history_size);
		if kept.len() != self.past_stream.len() {
			self.past_stream = kept.to_owned();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn detector_with(window: &str) -> ContextChangeDetector {
		let mut detector = ContextChangeDetector::default();
		detector.update_sliding_window(window);
		detector
	}

	#[test]
	fn test_last_n_chars() {
		assert_eq!(last_n_chars("Grüße", 3), "üße");
		assert_eq!(last_n_chars("abc", 10), "abc");
		assert_eq!(last_n_chars("abc", 0), "");
	}

	#[test]
	fn test_update_sliding_window_keeps_tail() {
		let mut detector = ContextChangeDetector::new(5);
		detector.update_sliding_window("hello world");
		assert_eq!(detector.sliding_window(), "world");
		detector.update_sliding_window("hey");
		assert_eq!(detector.sliding_window(), "hey");
	}

	#[test]
	fn test_empty_window() {
		let detector = ContextChangeDetector::default();
		assert!(!detector.context_change(""));
		assert!(detector.context_change("a"));
	}

	#[test]
	fn test_still_completing_token() {
		assert!(!detector_with("hello wor").context_change("hello world"));
		assert!(!detector_with("hello wor").context_change("hello wor"));
	}

	#[test]
	fn test_new_token_started() {
		assert!(detector_with("hello world ").context_change("hello world foo"));
	}

	#[test]
	fn test_window_not_found() {
		assert!(detector_with("hello world").context_change("something else"));
	}

	#[test]
	fn test_remainder_without_word_character() {
		// The window ended inside a word: the delimiter closes that same token.
		assert!(!detector_with("hello wor").context_change("hello wor, "));
		// The window ended on a boundary and more delimiters followed.
		assert!(detector_with("hello ").context_change("hello , "));
	}

	#[test]
	fn test_remainder_ending_after_word() {
		assert!(detector_with("hello wor").context_change("hello world "));
	}

	#[test]
	fn test_tracker_tokens() {
		let mut tracker = ContextTracker::default();
		tracker.update("Der Links");
		assert_eq!(tracker.prefix(), "Links");
		assert_eq!(tracker.token(1), "Der");
		assert_eq!(tracker.token(2), "");

		tracker.update("denker ");
		assert_eq!(tracker.prefix(), "");
		assert_eq!(tracker.token(1), "Linksdenker");
		assert_eq!(tracker.token(2), "Der");
	}

	#[test]
	fn test_tracker_context() {
		let mut tracker = ContextTracker::default();
		tracker.set_past_stream("the quick brown fo");
		let context = tracker.context(3);
		assert_eq!(context.tokens(), ["quick".to_owned(), "brown".to_owned()]);
		assert_eq!(context.prefix(), "fo");

		tracker.set_past_stream("brown ");
		let context = tracker.context(3);
		assert_eq!(context.tokens(), ["brown".to_owned()]);
		assert_eq!(context.prefix(), "");
	}

	#[test]
	fn test_tracker_commit_and_change() {
		let mut tracker = ContextTracker::default();
		assert!(!tracker.context_change());
		tracker.update("hello wor");
		assert!(tracker.context_change());
		tracker.commit();
		tracker.update("ld");
		assert!(!tracker.context_change());
		tracker.update(" ");
		tracker.commit();
		tracker.update("f");
		assert!(tracker.context_change());
	}

	#[test]
	fn test_tracker_history_is_bounded() {
		let mut tracker = ContextTracker::new(CharClasses::default(), 4, 8, true);
		tracker.update("abcdefghij KLM");
		assert_eq!(tracker.past_stream(), "ghij KLM");
		assert_eq!(tracker.prefix(), "klm");
	}
}
