//! Fuzzy matching for "did you mean" hints
//!
//! Used when a resource kind is unknown to the target version, when a plugin
//! kind has no registered handler, when a user silences a rule id that does
//! not exist and when the CLI is asked about a node id that is not in the graph.

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Suggestion result with confidence scoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// The suggested correction
    pub text: String,
    /// Levenshtein distance (lower = better match)
    pub distance: usize,
    pub category: SuggestionCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionCategory {
    Kind,
    PluginKind,
    RuleId,
    NodeId,
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Find closest matches from a list of candidates.
///
/// Exact matches are not suggestions. Case-only differences count as
/// distance 1 so `deployment` still suggests `Deployment`.
pub fn find_closest_matches<'a, I>(
    input: &str,
    candidates: I,
    max_results: usize,
    category: SuggestionCategory,
) -> Vec<Suggestion>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut suggestions: Vec<Suggestion> = candidates
        .into_iter()
        .filter(|candidate| *candidate != input)
        .filter_map(|candidate| {
            let distance = if candidate.eq_ignore_ascii_case(input) {
                1
            } else {
                levenshtein(input, candidate)
            };
            (distance <= MAX_SUGGESTION_DISTANCE).then(|| Suggestion {
                text: candidate.to_string(),
                distance,
                category,
            })
        })
        .collect();

    // Best matches first, ties in candidate order
    suggestions.sort_by_key(|s| s.distance);
    suggestions.dedup_by(|a, b| a.text == b.text);
    suggestions.truncate(max_results);
    suggestions
}

/// `Did you mean `A` or `B`?`, or `None` when nothing is close
pub fn did_you_mean<'a, I>(input: &str, candidates: I, category: SuggestionCategory) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let matches = find_closest_matches(input, candidates, 3, category);
    if matches.is_empty() {
        return None;
    }
    let quoted: Vec<String> = matches.iter().map(|s| format!("`{}`", s.text)).collect();
    Some(format!("Did you mean {}?", quoted.join(" or ")))
}
