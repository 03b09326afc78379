//! Case-insensitive substring matching against trigger phrase sets.
//!
//! Input is lower-cased and nothing else: punctuation, whitespace and Unicode
//! composition are left alone so that a given lexicon always matches the same
//! inputs.

/// Returns true if any trigger is a substring of the lower-cased text.
pub fn matches<S: AsRef<str>>(text: &str, triggers: &[S]) -> bool {
    first_match(text, triggers).is_some()
}

/// Returns the first trigger, in set order, contained in the lower-cased text.
pub fn first_match<'a, S: AsRef<str>>(text: &str, triggers: &'a [S]) -> Option<&'a str> {
    let folded = text.to_lowercase();
    first_match_folded(&folded, triggers)
}

/// Like [`first_match`], for text that has already been lower-cased.
pub(crate) fn first_match_folded<'a, S: AsRef<str>>(
    folded: &str,
    triggers: &'a [S],
) -> Option<&'a str> {
    triggers
        .iter()
        .map(|trigger| trigger.as_ref())
        .find(|trigger| folded.contains(*trigger))
}
