//! Sentence-level segmentation of extracted document text.
//!
//! The retrieval pipeline indexes one vector per sentence, so this module turns a
//! single string of corpus text into an ordered sequence of [`Chunk`]s. Boundaries
//! come from the Unicode sentence-break rules (UAX #29), which already treat the
//! Devanagari danda (`।`) and double danda (`॥`) as terminators, and are then
//! refined with an abbreviation list so that "Dr. Rao" or "Rs. 500" stay inside a
//! single sentence.
//!
//! # Whitespace
//!
//! Text produced by PDF extraction is hard-wrapped, and UAX #29 breaks at every
//! line separator. By default the segmenter collapses every whitespace run into a
//! single space before looking for boundaries, so sentences are delimited by
//! punctuation only. Joining the resulting chunks with single spaces reproduces the
//! collapsed input exactly.
//!
//! # Example
//!
//! ```
//! use docqa_context::sentence::Segmenter;
//!
//! let segmenter = Segmenter::default();
//! let chunks = segmenter.segment("RBI stands for Reserve Bank of India. It regulates banks.");
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].text, "RBI stands for Reserve Bank of India.");
//! assert_eq!(chunks[1].position, 1);
//! assert_eq!(chunks[1].text, "It regulates banks.");
//! ```
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations that end with a period without ending the sentence.
///
/// Entries are lower-case and written without their final period, so `"e.g"`
/// matches the token `e.g.`. Single-letter initials are handled separately.
pub const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "rs", "inc",
    "ltd", "co", "corp", "dept", "govt", "fig", "approx", "e.g", "i.e", "viz", "cf", "p.a",
    "a.m", "p.m", "u.s", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept",
    "oct", "nov", "dec",
];

/// Abbreviations that only hold when a number follows, as in "No. 12".
const NUMBER_ABBREVIATIONS: &[&str] = &["no", "nos"];

/// Page markers written by the PDF text extractor, e.g. `--- Page 3 of report.pdf ---`.
pub const PAGE_MARKER_PATTERN: &str = r"(?m)^--- Page \d+ of .* ---$";

/// A retrievable unit of corpus text.
///
/// `position` is the chunk's index in the sequence produced by one call to
/// [`Segmenter::segment`]. The retrieval pipeline relies on it being equal to the
/// row of the chunk's vector in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based position within the chunk sequence.
    pub position: usize,
    /// The sentence text, trimmed.
    pub text: String,
}

/// Settings for a [`Segmenter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Collapse every whitespace run (including newlines) to one space before
    /// detecting boundaries.
    pub collapse_whitespace: bool,
    /// Lower-case abbreviations, without the trailing period, that never end a
    /// sentence.
    pub abbreviations: Vec<String>,
    /// Regex patterns whose matches are removed before segmentation, such as
    /// per-page markers inserted by a text extractor.
    pub strip_patterns: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|s| s.to_string()).collect(),
            strip_patterns: vec![PAGE_MARKER_PATTERN.to_string()],
        }
    }
}

impl SegmenterConfig {
    /// Add a pattern to strip before segmentation (builder style).
    pub fn with_strip_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.strip_patterns.push(pattern.into());
        self
    }

    /// Set whether whitespace runs are collapsed (builder style).
    pub fn with_collapse_whitespace(mut self, collapse: bool) -> Self {
        self.collapse_whitespace = collapse;
        self
    }
}

/// Splits text into sentence [`Chunk`]s.
///
/// A segmenter is built once from a [`SegmenterConfig`] and is then a pure
/// function of its input; it holds no mutable state and can be shared freely.
#[derive(Debug, Clone)]
pub struct Segmenter {
    collapse_whitespace: bool,
    abbreviations: HashSet<String>,
    strip_patterns: Vec<Regex>,
}

impl Default for Segmenter {
    fn default() -> Self {
        let config = SegmenterConfig::default();
        Self {
            collapse_whitespace: config.collapse_whitespace,
            abbreviations: config.abbreviations.into_iter().collect(),
            strip_patterns: config
                .strip_patterns
                .iter()
                .filter_map(|pattern| Regex::new(pattern).ok())
                .collect(),
        }
    }
}

impl Segmenter {
    /// Build a segmenter, compiling the configured strip patterns.
    ///
    /// # Errors
    ///
    /// Returns the regex error for the first strip pattern that does not compile.
    pub fn new(config: SegmenterConfig) -> Result<Self, regex::Error> {
        let strip_patterns = config
            .strip_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            collapse_whitespace: config.collapse_whitespace,
            abbreviations: config
                .abbreviations
                .into_iter()
                .map(|a| a.to_lowercase())
                .collect(),
            strip_patterns,
        })
    }

    /// Split `text` into sentence chunks in order of appearance.
    ///
    /// Empty or whitespace-only input yields an empty vector. Chunks are trimmed
    /// and never empty.
    ///
    /// ```
    /// use docqa_context::sentence::Segmenter;
    ///
    /// let segmenter = Segmenter::default();
    /// assert!(segmenter.segment("   \n\t ").is_empty());
    ///
    /// let chunks = segmenter.segment("Dr. Rao met the manager. The loan was approved.");
    /// assert_eq!(chunks.len(), 2);
    /// assert_eq!(chunks[0].text, "Dr. Rao met the manager.");
    /// ```
    pub fn segment(&self, text: &str) -> Vec<Chunk> {
        let stripped = self.strip(text);
        let prepared: Cow<'_, str> = if self.collapse_whitespace {
            Cow::Owned(collapse_whitespace(&stripped))
        } else {
            stripped
        };

        let mut chunks = Vec::new();
        let mut pending = String::new();
        let mut pieces = prepared.split_sentence_bounds().peekable();

        while let Some(piece) = pieces.next() {
            pending.push_str(piece);

            // Keep accumulating while the piece ends in a known abbreviation,
            // unless there is nothing left to join it with.
            if let Some(next) = pieces.peek() {
                if self.ends_with_abbreviation(&pending, next) {
                    continue;
                }
            }

            push_chunk(&mut chunks, &pending);
            pending.clear();
        }

        push_chunk(&mut chunks, &pending);
        chunks
    }

    fn strip<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut current = Cow::Borrowed(text);
        for pattern in &self.strip_patterns {
            if let Cow::Owned(replaced) = pattern.replace_all(&current, "\n") {
                current = Cow::Owned(replaced);
            }
        }
        current
    }

    /// Whether `sentence` ends in an abbreviation that continues into `next`.
    fn ends_with_abbreviation(&self, sentence: &str, next: &str) -> bool {
        let Some(last) = sentence.split_whitespace().next_back() else {
            return false;
        };
        let Some(word) = last.strip_suffix('.') else {
            return false;
        };
        let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
        let next_char = next.trim_start().chars().next();

        // Initials such as the "K." in "R. K. Narayan": one capital other than
        // the pronoun "I", followed by a capitalised word.
        let mut chars = word.chars();
        if let (Some(first), None) = (chars.next(), chars.next()) {
            return first.is_uppercase()
                && first != 'I'
                && next_char.is_some_and(char::is_uppercase);
        }

        let word = word.to_lowercase();
        if NUMBER_ABBREVIATIONS.contains(&word.as_str()) {
            return next_char.is_some_and(|c| c.is_ascii_digit());
        }
        self.abbreviations.contains(&word)
    }
}

fn push_chunk(chunks: &mut Vec<Chunk>, sentence: &str) {
    let text = sentence.trim();
    if text.is_empty() {
        return;
    }
    chunks.push(Chunk {
        position: chunks.len(),
        text: text.to_string(),
    });
}

/// Collapse every run of whitespace into a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_segment_two_sentences() {
        let segmenter = Segmenter::default();
        let chunks = segmenter.segment("RBI stands for Reserve Bank of India. It regulates banks.");

        assert_eq!(
            texts(&chunks),
            vec!["RBI stands for Reserve Bank of India.", "It regulates banks."]
        );
        assert_eq!(chunks[0].position, 0);
        assert_eq!(chunks[1].position, 1);
    }

    #[test]
    fn test_segment_empty_input() {
        let segmenter = Segmenter::default();
        assert!(segmenter.segment("").is_empty());
        assert!(segmenter.segment(" \n\n \t").is_empty());
    }

    #[test]
    fn test_segment_reconstructs_collapsed_text() {
        let segmenter = Segmenter::default();
        let text = "The first line wraps\nonto the next one.  Second sentence here!\n\n\
                    Is this the third?   Yes, and Mr. Sharma agrees.\n";
        let chunks = segmenter.segment(text);

        let rejoined = texts(&chunks).join(" ");
        assert_eq!(rejoined, collapse_whitespace(text));
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_segment_keeps_wrapped_sentence_together() {
        let segmenter = Segmenter::default();
        let chunks = segmenter.segment("Interest is charged\nmonthly on the balance.");

        assert_eq!(texts(&chunks), vec!["Interest is charged monthly on the balance."]);
    }

    #[test]
    fn test_segment_abbreviations_and_initials() {
        let segmenter = Segmenter::default();
        let chunks = segmenter.segment(
            "The fee is Rs. 500 per year. R. K. Narayan wrote novels. See Fig. 3 for details.",
        );

        assert_eq!(
            texts(&chunks),
            vec![
                "The fee is Rs. 500 per year.",
                "R. K. Narayan wrote novels.",
                "See Fig. 3 for details."
            ]
        );
    }

    #[test]
    fn test_short_words_still_end_sentences() {
        let segmenter = Segmenter::default();

        assert_eq!(
            texts(&segmenter.segment("The answer is no. Rates are fixed.")),
            vec!["The answer is no.", "Rates are fixed."]
        );
        assert_eq!(
            texts(&segmenter.segment("So was I. Then we left.")),
            vec!["So was I.", "Then we left."]
        );
        assert_eq!(
            texts(&segmenter.segment("It ends with option b. Next question.")),
            vec!["It ends with option b.", "Next question."]
        );
    }

    #[test]
    fn test_number_abbreviation_needs_a_number() {
        let segmenter = Segmenter::default();
        let chunks = segmenter.segment("Circular No. 12 RBI/2023 applies to banks. Say no. Then stop.");

        assert_eq!(
            texts(&chunks),
            vec!["Circular No. 12 RBI/2023 applies to banks.", "Say no.", "Then stop."]
        );
    }

    #[test]
    fn test_segment_devanagari_danda() {
        let segmenter = Segmenter::default();
        let chunks = segmenter.segment("भारतीय रिज़र्व बैंक केंद्रीय बैंक है। यह बैंकों को नियंत्रित करता है।");

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with('।'));
        assert!(chunks[1].text.starts_with("यह"));
    }

    #[test]
    fn test_segment_trailing_fragment_without_terminator() {
        let segmenter = Segmenter::default();
        let chunks = segmenter.segment("Complete sentence. trailing words without a period");

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].text,
            "Complete sentence. trailing words without a period"
        );
    }

    #[test]
    fn test_segment_without_collapsing_breaks_at_newlines() {
        let config = SegmenterConfig::default().with_collapse_whitespace(false);
        let segmenter = Segmenter::new(config).unwrap();
        let chunks = segmenter.segment("Heading\nBody text follows.");

        assert_eq!(texts(&chunks), vec!["Heading", "Body text follows."]);
    }

    #[test]
    fn test_page_markers_are_stripped_by_default() {
        let segmenter = Segmenter::default();

        let text = "--- Page 1 of policy.pdf ---\nLoans are approved weekly.\n\
                    --- Page 2 of policy.pdf ---\nRates vary by profile.\n";
        let chunks = segmenter.segment(text);

        assert_eq!(
            texts(&chunks),
            vec!["Loans are approved weekly.", "Rates vary by profile."]
        );
    }

    #[test]
    fn test_page_markers_kept_without_strip_patterns() {
        let config = SegmenterConfig {
            strip_patterns: Vec::new(),
            ..SegmenterConfig::default()
        };
        let segmenter = Segmenter::new(config).unwrap();

        let chunks = segmenter.segment("--- Page 1 of policy.pdf ---\nLoans are approved weekly.");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("--- Page 1"));
    }

    #[test]
    fn test_invalid_strip_pattern_is_rejected() {
        let config = SegmenterConfig::default().with_strip_pattern("(unclosed");
        assert!(Segmenter::new(config).is_err());
    }

    #[test]
    fn test_positions_are_contiguous() {
        let segmenter = Segmenter::default();
        let text = (0..50)
            .map(|i| format!("Sentence number {i} is here. "))
            .collect::<String>();
        let chunks = segmenter.segment(&text);

        assert_eq!(chunks.len(), 50);
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, expected);
        }
    }
}
