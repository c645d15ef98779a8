//! Candidate scoring
//!
//! Pure ranking of candidate entities against a set of identifying
//! fields. Messy federated data means a lookup can return several
//! plausible rows; rather than erroring, the resolver takes the
//! best-scored one. Scoring is deterministic: field weights derive from
//! the lexicographic order of the field names, not from argument order,
//! so the same inputs always rank the same way.

/// Access to the string-valued match keys of a candidate entity.
///
/// Only string fields participate in scoring; anything else is simply
/// not exposed here.
pub trait MatchFields {
    /// Value of the named match field, `None` when unset
    fn match_field(&self, name: &str) -> Option<&str>;
}

/// Match keys used for ranking resolver candidates
pub const IDENTIFIER_FIELDS: &[&str] = &["fid", "mbid"];

/// Sort candidates most-to-least relevant.
///
/// Each field in `important_fields` gets a weight equal to its 1-based
/// position among the *sorted* field names; a candidate's score is the
/// sum of weights for fields it holds a non-empty value for. The sort is
/// stable and descending, so ties keep encounter order.
pub fn sort_candidates<T: MatchFields>(candidates: Vec<T>, important_fields: &[&str]) -> Vec<T> {
    let mut sorted_fields: Vec<&str> = important_fields.to_vec();
    sorted_fields.sort_unstable();
    sorted_fields.dedup();

    let score = |candidate: &T| -> usize {
        sorted_fields
            .iter()
            .enumerate()
            .filter(|(_, field)| {
                candidate
                    .match_field(field)
                    .is_some_and(|v| !v.is_empty())
            })
            .map(|(i, _)| i + 1)
            .sum()
    };

    let mut scored: Vec<(usize, T)> = candidates
        .into_iter()
        .map(|c| (score(&c), c))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored.into_iter().map(|(_, c)| c).collect()
}

impl MatchFields for crate::db::artists::Artist {
    fn match_field(&self, name: &str) -> Option<&str> {
        match name {
            "mbid" => self.mbid.as_deref(),
            "fid" => self.fid.as_deref(),
            _ => None,
        }
    }
}

impl MatchFields for crate::db::albums::Album {
    fn match_field(&self, name: &str) -> Option<&str> {
        match name {
            "mbid" => self.mbid.as_deref(),
            "fid" => self.fid.as_deref(),
            _ => None,
        }
    }
}

impl MatchFields for crate::db::tracks::Track {
    fn match_field(&self, name: &str) -> Option<&str> {
        match name {
            "mbid" => self.mbid.as_deref(),
            "fid" => self.fid.as_deref(),
            _ => None,
        }
    }
}
