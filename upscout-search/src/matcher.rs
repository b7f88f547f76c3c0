//! Decides which index candidate, if any, is the same movie as a library record.

use std::sync::LazyLock;

use regex::Regex;
use strsim::normalized_levenshtein;
use tracing::debug;
use upscout_core::{MatchingConfig, MovieRecord};

use crate::types::{CandidateRecord, CandidateSet, Lookup, MatchBasis, MatchResult};

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[._]+").expect("separator pattern is valid"));
static PAREN_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d{4}\)").expect("year pattern is valid"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"));
static TRAILING_ARTICLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),\s*(the|a|an)\s*$").expect("trailing article pattern is valid")
});

/// Scores within this distance count as tied.
const SCORE_EPSILON: f64 = 1e-9;

/// Folds a title into plain lowercase words.
///
/// Dots and underscores become spaces, a parenthesized year is dropped,
/// punctuation becomes whitespace and runs of whitespace collapse.
pub fn fold_title(title: &str) -> String {
    let folded = SEPARATORS.replace_all(title, " ");
    let folded = PAREN_YEAR.replace_all(&folded, "");
    let folded = NON_WORD.replace_all(&folded, " ");
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Folded title with a leading or trailing article removed, for comparison.
pub fn comparable_title(title: &str) -> String {
    let title = TRAILING_ARTICLE.replace(title.trim(), "");
    let folded = fold_title(&title);
    for article in ["the ", "a ", "an "] {
        if let Some(rest) = folded.strip_prefix(article)
            && !rest.is_empty()
        {
            return rest.to_string();
        }
    }
    folded
}

/// Similarity of two titles in `[0, 1]` after normalization.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = comparable_title(a);
    let b = comparable_title(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(&a, &b)
}

/// Candidate selection policy.
#[derive(Debug, Clone)]
pub struct Matcher {
    threshold: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(config.similarity_threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Picks the candidate describing the same movie as `movie`.
    ///
    /// Identifier lookups trust the index: the candidate carrying the
    /// identifier wins, otherwise the first one listed. Title lookups need a
    /// similar enough title and, when both years are known, the same year.
    pub fn match_candidates(&self, movie: &MovieRecord, set: &CandidateSet) -> MatchResult {
        if set.candidates.is_empty() {
            return MatchResult::NoMatch;
        }

        match &set.lookup {
            Lookup::Identifier(identifier) => {
                let candidate = set
                    .candidates
                    .iter()
                    .find(|c| {
                        c.imdb_code
                            .as_deref()
                            .is_some_and(|code| code.eq_ignore_ascii_case(identifier))
                    })
                    .unwrap_or(&set.candidates[0]);
                debug!(
                    "Matched '{}' to '{}' by identifier {}",
                    movie.title, candidate.title, identifier
                );
                MatchResult::Matched {
                    candidate: candidate.clone(),
                    match_basis: MatchBasis::IdentifierExact,
                    score: 1.0,
                }
            }
            Lookup::TitleYear => self.match_fuzzy(movie, &set.candidates),
        }
    }

    fn match_fuzzy(&self, movie: &MovieRecord, candidates: &[CandidateRecord]) -> MatchResult {
        let mut best: Option<(&CandidateRecord, f64, bool)> = None;

        for candidate in candidates {
            if let (Some(wanted), Some(listed)) = (movie.year, candidate.year)
                && wanted != listed
            {
                continue;
            }

            let score = title_similarity(&movie.title, &candidate.title);
            let year_match = movie.year.is_some() && movie.year == candidate.year;

            let better = match best {
                None => true,
                Some((_, best_score, best_year_match)) => {
                    score > best_score + SCORE_EPSILON
                        || ((score - best_score).abs() <= SCORE_EPSILON
                            && year_match
                            && !best_year_match)
                }
            };
            if better {
                best = Some((candidate, score, year_match));
            }
        }

        match best {
            Some((candidate, score, _)) if score >= self.threshold => {
                debug!(
                    "Matched '{}' to '{}' ({:?}) with score {:.3}",
                    movie.title, candidate.title, candidate.year, score
                );
                MatchResult::Matched {
                    candidate: candidate.clone(),
                    match_basis: MatchBasis::FuzzyTitleYear,
                    score,
                }
            }
            Some((candidate, score, _)) => {
                debug!(
                    "Best candidate '{}' for '{}' scored {:.3}, below {:.2}",
                    candidate.title, movie.title, score, self.threshold
                );
                MatchResult::NoMatch
            }
            None => {
                debug!("No candidate for '{}' shares its year", movie.title);
                MatchResult::NoMatch
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, year: Option<u16>) -> CandidateRecord {
        CandidateRecord::new(title, year, format!("https://index/{title}"))
    }

    #[test]
    fn test_fold_title() {
        assert_eq!(fold_title("The.Matrix_(1999)"), "the matrix");
        assert_eq!(fold_title("  Amélie:  Le Fabuleux Destin!"), "amélie le fabuleux destin");
        assert_eq!(fold_title("Se7en"), "se7en");
        assert_eq!(fold_title("..."), "");
    }

    #[test]
    fn test_comparable_title_drops_articles() {
        assert_eq!(comparable_title("The Matrix"), "matrix");
        assert_eq!(comparable_title("Matrix, The"), "matrix");
        assert_eq!(comparable_title("A Quiet Place"), "quiet place");
        assert_eq!(comparable_title("The"), "the");
    }

    #[test]
    fn test_similarity_ignores_case_and_punctuation() {
        assert_eq!(title_similarity("the matrix", "The Matrix!"), 1.0);
        assert!(title_similarity("Matrix", "The Matrix Reloaded") < 0.6);
        assert_eq!(title_similarity("", "Heat"), 0.0);
    }

    #[test]
    fn test_fuzzy_match_requires_same_year() {
        let movie = MovieRecord::new("Matrix", Some(1999)).with_height(480);
        let set = CandidateSet::by_title_year(vec![
            candidate("The Matrix Reloaded", Some(2003)),
            candidate("The Matrix", Some(1999)),
        ]);

        match Matcher::default().match_candidates(&movie, &set) {
            MatchResult::Matched {
                candidate,
                match_basis,
                score,
            } => {
                assert_eq!(candidate.title, "The Matrix");
                assert_eq!(candidate.year, Some(1999));
                assert_eq!(match_basis, MatchBasis::FuzzyTitleYear);
                assert_eq!(score, 1.0);
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_year_mismatch_only_is_no_match() {
        let movie = MovieRecord::new("Heat", Some(1995));
        let set = CandidateSet::by_title_year(vec![candidate("Heat", Some(1986))]);
        assert_eq!(Matcher::default().match_candidates(&movie, &set), MatchResult::NoMatch);
    }

    #[test]
    fn test_unknown_year_ignores_year() {
        let movie = MovieRecord::new("Heat", None);
        let set = CandidateSet::by_title_year(vec![candidate("Heat", Some(1995))]);
        assert!(Matcher::default().match_candidates(&movie, &set).candidate().is_some());

        let movie = MovieRecord::new("Heat", Some(1995));
        let set = CandidateSet::by_title_year(vec![candidate("Heat", None)]);
        assert!(Matcher::default().match_candidates(&movie, &set).candidate().is_some());
    }

    #[test]
    fn test_low_similarity_is_no_match() {
        let movie = MovieRecord::new("Paddington", Some(2014));
        let set = CandidateSet::by_title_year(vec![candidate("Gone Girl", Some(2014))]);
        assert_eq!(Matcher::default().match_candidates(&movie, &set), MatchResult::NoMatch);
    }

    #[test]
    fn test_ties_prefer_year_match_then_order() {
        let movie = MovieRecord::new("Heat", Some(1995));
        let set = CandidateSet::by_title_year(vec![
            CandidateRecord::new("Heat", None, "first"),
            CandidateRecord::new("Heat", Some(1995), "second"),
            CandidateRecord::new("Heat", Some(1995), "third"),
        ]);
        let matched = Matcher::default().match_candidates(&movie, &set);
        assert_eq!(matched.candidate().unwrap().url, "second");

        let movie = MovieRecord::new("Heat", None);
        let matched = Matcher::default().match_candidates(&movie, &set);
        assert_eq!(matched.candidate().unwrap().url, "first");
    }

    #[test]
    fn test_identifier_prefers_matching_code() {
        let movie = MovieRecord::new("Matrix", Some(1999)).with_primary_id("tt0133093");
        let set = CandidateSet::by_identifier(
            "tt0133093",
            vec![
                candidate("Something Else", Some(2001)).with_imdb_code("tt0000001"),
                candidate("The Matrix", Some(1999)).with_imdb_code("TT0133093"),
            ],
        );
        let matched = Matcher::default().match_candidates(&movie, &set);
        let MatchResult::Matched {
            candidate,
            match_basis,
            ..
        } = matched
        else {
            panic!("expected a match");
        };
        assert_eq!(candidate.title, "The Matrix");
        assert_eq!(match_basis, MatchBasis::IdentifierExact);
    }

    #[test]
    fn test_identifier_falls_back_to_first_candidate() {
        let movie = MovieRecord::new("Anything", None).with_primary_id("tt0133093");
        let set = CandidateSet::by_identifier(
            "tt0133093",
            vec![candidate("Listed First", Some(1999)), candidate("Second", Some(1999))],
        );
        let matched = Matcher::default().match_candidates(&movie, &set);
        assert_eq!(matched.candidate().unwrap().title, "Listed First");
    }

    #[test]
    fn test_empty_candidates_is_no_match() {
        let movie = MovieRecord::new("Heat", Some(1995));
        for set in [
            CandidateSet::by_title_year(Vec::new()),
            CandidateSet::by_identifier("tt0113277", Vec::new()),
        ] {
            assert_eq!(Matcher::default().match_candidates(&movie, &set), MatchResult::NoMatch);
        }
    }

    #[test]
    fn test_threshold_is_clamped() {
        assert_eq!(Matcher::new(4.0).threshold(), 1.0);
        assert_eq!(Matcher::new(-1.0).threshold(), 0.0);
    }
}
