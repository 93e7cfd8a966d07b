use std::path::PathBuf;

use rs_presage_core::io::read_file;
use rs_presage_core::text::tokenizer::{Direction, Tokenizer};

// tests/data/der_linksdenker.txt is a stand-in written for these tests, not the
// full "Der Linksdenker" text. Its exact character and token counts mean nothing,
// so the tests below only check properties that hold for any text of that size.
fn reference_text() -> String {
	let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/der_linksdenker.txt");
	read_file(path).unwrap().join("\n")
}

#[test]
fn reference_first_tokens() {
	let text = reference_text();
	assert_eq!(Tokenizer::forward(&text).next().as_deref(), Some("Der"));
	assert_eq!(Tokenizer::reverse(&text).next().as_deref(), Some("Linksdenker"));
}

#[test]
fn reference_forward_and_reverse_agree() {
	let text = reference_text();
	let forward: Vec<String> = Tokenizer::new(&text, Direction::Forward).collect();
	let mut reverse: Vec<String> = Tokenizer::new(&text, Direction::Reverse).collect();
	reverse.reverse();

	assert!(forward.len() > 200);
	assert_eq!(forward, reverse);
	assert_eq!(
		Tokenizer::forward(&text).count_tokens(),
		Tokenizer::reverse(&text).count_tokens()
	);
}

#[test]
fn reference_progress_reaches_end() {
	let text = reference_text();
	let mut tokenizer = Tokenizer::forward(&text);
	assert_eq!(tokenizer.count_characters(), text.chars().count());
	while tokenizer.next_token().is_some() {}
	assert!(!tokenizer.has_more_tokens());
	assert_eq!(tokenizer.progress(), 1.0);
}
