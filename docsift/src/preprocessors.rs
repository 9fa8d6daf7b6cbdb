//! Text preprocessors: pure functions turning a text value into the token
//! sequence the backend indexes.
//!
//! A preprocessor must return the same tokens for the same input and must
//! accept empty text. [`words`] is additionally idempotent: feeding its output
//! (space-joined) back through it yields the same tokens.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

/// Replacement used by [`firstletter`] for text that does not start with an ASCII letter.
pub const OTHER_FIRST_LETTER: &str = "zzz";

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s'+-]").expect("punctuation pattern is valid"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

type PreprocessFn = dyn Fn(&str) -> Vec<String> + Send + Sync;

/// A named, shareable text preprocessor.
#[derive(Clone)]
pub struct Preprocessor {
    name: Cow<'static, str>,
    func: Arc<PreprocessFn>,
}

impl Preprocessor {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the preprocessor over `text`.
    pub fn apply(&self, text: &str) -> Vec<String> {
        (self.func)(text)
    }
}

impl fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Preprocessor").field(&self.name).finish()
    }
}

/// Strip punctuation that would confuse tokenization and collapse whitespace.
pub fn clean_value(value: &str) -> String {
    let stripped = PUNCTUATION.replace_all(value, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Lower-cased, de-duplicated words in order of first appearance.
pub fn words() -> Preprocessor {
    Preprocessor::new("words", |text| {
        let mut tokens: Vec<String> = Vec::new();
        for word in clean_value(text).split_whitespace() {
            push_unique(&mut tokens, word.to_lowercase());
        }
        tokens
    })
}

/// Every word plus each of its prefixes, for type-ahead matching.
///
/// Tokens shorter than `min_size` or longer than `max_size` are skipped.
pub fn startswith(min_size: usize, max_size: usize) -> Preprocessor {
    Preprocessor::new("startswith", move |text| {
        let mut tokens = Vec::new();
        for word in clean_value(text).split_whitespace() {
            for prefix in prefixes(&word.to_lowercase(), min_size, max_size) {
                push_unique(&mut tokens, prefix);
            }
        }
        tokens
    })
}

/// Prefixes of every suffix of every word, so a query can match anywhere inside a word.
pub fn contains(min_size: usize, max_size: usize) -> Preprocessor {
    Preprocessor::new("contains", move |text| {
        let mut tokens = Vec::new();
        for word in clean_value(text).split_whitespace() {
            let lowered = word.to_lowercase();
            for (start, _) in lowered.char_indices() {
                for prefix in prefixes(&lowered[start..], min_size, max_size) {
                    push_unique(&mut tokens, prefix);
                }
            }
        }
        tokens
    })
}

/// A single token holding the lower-cased first letter, after dropping any leading `ignore` words.
///
/// Text that does not start with an ASCII letter collapses to [`OTHER_FIRST_LETTER`].
pub fn firstletter<I, S>(ignore: I) -> Preprocessor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let ignore: Vec<String> = ignore.into_iter().map(|word| word.into().to_ascii_lowercase()).collect();
    Preprocessor::new("firstletter", move |text| {
        let mut remaining = text.trim();
        loop {
            let lowered = remaining.to_ascii_lowercase();
            let stripped = ignore.iter().find_map(|word| {
                lowered
                    .strip_prefix(word.as_str())
                    .filter(|rest| rest.starts_with(char::is_whitespace))
                    .map(|rest| rest.len())
            });
            match stripped {
                Some(rest_len) => remaining = remaining[remaining.len() - rest_len..].trim_start(),
                None => break,
            }
        }
        let letter = match remaining.chars().next() {
            Some(ch) if ch.is_ascii_alphabetic() => ch.to_ascii_lowercase().to_string(),
            _ => OTHER_FIRST_LETTER.to_string(),
        };
        vec![letter]
    })
}

fn prefixes(word: &str, min_size: usize, max_size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut ends: Vec<usize> = word.char_indices().skip(1).map(|(idx, _)| idx).collect();
    ends.push(word.len());
    for (count, end) in ends.into_iter().enumerate() {
        let size = count + 1;
        if size >= min_size && size <= max_size {
            out.push(word[..end].to_string());
        }
    }
    out
}

fn push_unique(tokens: &mut Vec<String>, token: String) {
    if !tokens.contains(&token) {
        tokens.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_value_strips_punctuation() {
        assert_eq!(clean_value("  Hello,   world!  "), "Hello world");
        assert_eq!(clean_value("rock'n'roll + jazz-funk"), "rock'n'roll + jazz-funk");
        assert_eq!(clean_value(""), "");
    }

    #[test]
    fn words_is_idempotent() {
        let words = words();
        let first = words.apply("Die Hard: die HARD with a Vengeance");
        assert_eq!(first, ["die", "hard", "with", "a", "vengeance"]);
        assert_eq!(words.apply(&first.join(" ")), first);
        assert!(words.apply("").is_empty());
    }

    #[test]
    fn startswith_emits_prefixes() {
        let tokens = startswith(1, usize::MAX).apply("Plorm Hamdis");
        assert_eq!(
            tokens,
            ["p", "pl", "plo", "plor", "plorm", "h", "ha", "ham", "hamd", "hamdi", "hamdis"]
        );
        let bounded = startswith(2, 3).apply("hello");
        assert_eq!(bounded, ["he", "hel"]);
    }

    #[test]
    fn startswith_handles_multibyte_words() {
        let tokens = startswith(1, usize::MAX).apply("día");
        assert_eq!(tokens, ["d", "dí", "día"]);
    }

    #[test]
    fn contains_covers_infixes() {
        let tokens = contains(2, usize::MAX).apply("abc");
        assert_eq!(tokens, ["ab", "abc", "bc"]);
    }

    #[test]
    fn firstletter_skips_ignored_words() {
        let letter = firstletter(["the", "a"]);
        assert_eq!(letter.apply("things"), ["t"]);
        assert_eq!(letter.apply("The Londis"), ["l"]);
        assert_eq!(letter.apply("a banana"), ["b"]);
        assert_eq!(letter.apply("theatre"), ["t"]);
        assert_eq!(letter.apply("42 Street"), [OTHER_FIRST_LETTER]);
        assert_eq!(letter.apply(""), [OTHER_FIRST_LETTER]);
    }
}
