//! Filter/query engine: picks the entries a viewer should show.
//!
//! An entry is visible when it passes three stages, checked in order:
//! the severity mask, the component mask, and the text filter. Evaluation
//! only reads the index and header; it never changes them.

use std::borrow::Cow;

use crate::index::{LogEntry, LogReader};
use crate::severity::SEVERITY_COUNT;

/// Text criteria for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFilter {
    /// Search term or wildcard pattern. Empty disables the text stage.
    pub term: String,
    /// Distinguish upper and lower case.
    pub case_sensitive: bool,
    /// Treat `*` and `?` in `term` as wildcards.
    pub wildcard: bool,
    /// Keep entries that do NOT match.
    pub inverted: bool,
    /// Require the whole search space to match, not just part of it.
    pub exact: bool,
    /// Search header and detail text instead of the header alone.
    pub whole_text: bool,
}

impl TextFilter {
    /// Substring search for `term` with every toggle off.
    pub fn contains(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }

    /// Wildcard search for `pattern` with every other toggle off.
    pub fn wildcard(pattern: impl Into<String>) -> Self {
        Self {
            term: pattern.into(),
            wildcard: true,
            ..Self::default()
        }
    }
}

/// Combined severity, component and text criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// Indexed by severity; `false` hides that level.
    pub severities: [bool; SEVERITY_COUNT],
    /// Indexed by component ordinal; `false` hides that component.
    /// Ordinals past the end are shown.
    pub components: Vec<bool>,
    pub text: TextFilter,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self::all(0)
    }
}

impl FilterSpec {
    /// Shows everything: every severity and all `component_count`
    /// components checked, no text filter.
    pub fn all(component_count: usize) -> Self {
        Self {
            severities: [true; SEVERITY_COUNT],
            components: vec![true; component_count],
            text: TextFilter::default(),
        }
    }

    /// Tests one entry against all three stages.
    pub fn matches(&self, entry: &LogEntry<'_>) -> bool {
        Matcher::new(self).matches(entry)
    }
}

/// A [`FilterSpec`] with its text pattern prepared once for many entries.
struct Matcher<'a> {
    spec: &'a FilterSpec,
    /// `None` when the text stage is disabled.
    text: Option<TextMatcher>,
}

enum TextMatcher {
    Literal { term: String, exact: bool },
    Pattern(Vec<char>),
}

impl<'a> Matcher<'a> {
    fn new(spec: &'a FilterSpec) -> Self {
        let filter = &spec.text;
        let text = (!filter.term.is_empty()).then(|| {
            let term = if filter.case_sensitive {
                filter.term.clone()
            } else {
                filter.term.to_uppercase()
            };
            if filter.wildcard {
                // A non-exact pattern behaves as "contains"
                let mut pattern = Vec::with_capacity(term.len() + 2);
                if !filter.exact {
                    pattern.push('*');
                }
                pattern.extend(term.chars());
                if !filter.exact {
                    pattern.push('*');
                }
                TextMatcher::Pattern(pattern)
            } else {
                TextMatcher::Literal {
                    term,
                    exact: filter.exact,
                }
            }
        });
        Self { spec, text }
    }

    fn matches(&self, entry: &LogEntry<'_>) -> bool {
        if !self.spec.severities[entry.severity.index()] {
            return false;
        }
        if !self
            .spec
            .components
            .get(entry.component as usize)
            .copied()
            .unwrap_or(true)
        {
            return false;
        }
        match &self.text {
            None => true,
            Some(text) => self.matches_text(text, entry) != self.spec.text.inverted,
        }
    }

    fn matches_text(&self, text: &TextMatcher, entry: &LogEntry<'_>) -> bool {
        let space: Cow<'_, str> = if self.spec.text.whole_text {
            entry.message()
        } else {
            Cow::Borrowed(entry.header.as_ref())
        };
        let space = if self.spec.text.case_sensitive {
            space
        } else {
            Cow::Owned(space.to_uppercase())
        };

        match text {
            TextMatcher::Literal { term, exact: true } => space == term.as_str(),
            TextMatcher::Literal { term, exact: false } => space.contains(term.as_str()),
            TextMatcher::Pattern(pattern) => {
                let chars: Vec<char> = space.chars().collect();
                wildcard_match(pattern, &chars)
            }
        }
    }
}

/// Matches `text` against `pattern` in full, where `*` matches any run of
/// characters (including none) and `?` matches exactly one.
///
/// Greedy with single-point backtracking to the most recent `*`, so it runs
/// in O(pattern * text) worst case without recursion.
pub fn wildcard_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Returns the ordinals of all entries passing `spec`, in ascending order.
pub fn evaluate(reader: &LogReader, spec: &FilterSpec) -> Vec<u32> {
    evaluate_from(reader, spec, 0)
}

/// Like [`evaluate`], but only considers entries from `first` on. Used to
/// extend an existing result after the index grew.
pub fn evaluate_from(reader: &LogReader, spec: &FilterSpec, first: u32) -> Vec<u32> {
    let matcher = Matcher::new(spec);
    (first..reader.len() as u32)
        .filter_map(|ordinal| reader.entry(ordinal))
        .filter(|entry| matcher.matches(entry))
        .map(|entry| entry.ordinal)
        .collect()
}
