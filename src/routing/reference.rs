//! Identifier extraction and ordinal/referential cue resolution
//!
//! Explicit identifiers come from the configured identifier pattern. Cues
//! ("the first one", "both of them", "that candidate") resolve against the
//! anchor, the reference set of the last turn that updated entity memory.

use crate::error::{Error, Result};
use crate::memory::EntityMemory;
use crate::retrieval::CandidateId;
use regex::Regex;

/// Words that may introduce an ordinal ("the first", "and the third")
const ORDINAL_PREFIXES: &str = r"the|and|or|vs\.?|versus|with";

/// Nouns that turn a bare ordinal into a reference ("second candidate")
const ORDINAL_NOUNS: &[&str] = &[
    "one",
    "ones",
    "candidate",
    "candidates",
    "resume",
    "resumes",
    "person",
    "applicant",
    "profile",
    "result",
];

/// Words allowed right after a prefixed ordinal without a noun
const ORDINAL_FOLLOWERS: &[&str] = &["and", "or", "vs", "versus", "with", "of", "please"];

/// Plural nouns accepted after "both", "these" and "those"
const GROUP_NOUNS: &str = r"candidates|resumes|people|applicants|profiles|ones";

/// Profile attributes a possessive pronoun may point at ("his skills")
const PROFILE_ATTRIBUTES: &str =
    r"resume|cv|profile|experience|skills?|background|education|qualifications|career";

/// Position an ordinal names in the anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// 1-based
    Nth(usize),
    Last,
}

/// What a cue refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CueKind {
    Ordinal(Position),
    /// The first `n` anchored identifiers ("the first two")
    Leading(usize),
    /// The whole anchor
    Plural,
    /// The single anchored identifier
    Singular,
}

/// Result of scanning one turn
#[derive(Debug, Default)]
pub struct Resolution {
    /// Explicit and resolved identifiers, deduplicated, in text order
    pub identifiers: Vec<CandidateId>,
    /// Explicit identifier tokens found
    pub explicit: usize,
    /// Ordinal or referential cues found
    pub cues: usize,
    /// Cues that could not be resolved
    pub unresolved: Vec<Error>,
}

impl Resolution {
    /// Whether the turn mentioned candidates at all, resolved or not
    pub fn mentions_candidates(&self) -> bool {
        self.explicit > 0 || self.cues > 0
    }
}

/// Finds identifiers and cues in user text
pub struct ReferenceResolver {
    identifier: Regex,
    ordinal: Regex,
    leading: Regex,
    plural: Regex,
    singular: Regex,
}

impl ReferenceResolver {
    pub fn new(identifier_pattern: &str) -> Result<Self> {
        let identifier = Regex::new(identifier_pattern).map_err(|e| {
            Error::Config(format!(
                "Invalid identifier pattern '{}': {}",
                identifier_pattern, e
            ))
        })?;

        let ordinal = Regex::new(&format!(
            r"(?i)\b(?:({})\s+)?(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|last|[1-9](?:st|nd|rd|th)|10th)\b",
            ORDINAL_PREFIXES
        ))
        .map_err(|e| Error::Internal(format!("ordinal pattern: {}", e)))?;

        let leading = Regex::new(r"(?i)\bthe\s+(?:first|top)\s+(two|three|four|five|[2-5])\b")
            .map_err(|e| Error::Internal(format!("leading pattern: {}", e)))?;

        // "them" alone is too loose; it must hang off a referring word
        let plural = Regex::new(&format!(
            r"(?i)\b(?:(?:both|all|each|any|either|which)\s+of\s+them|them\s+both|(?:about|between|compare|of)\s+them|both\s+(?:{nouns})|(?:these|those)\s+(?:{nouns}|two|three))\b",
            nouns = GROUP_NOUNS
        ))
        .map_err(|e| Error::Internal(format!("plural pattern: {}", e)))?;

        // Pronouns count only when they clearly point at a profile
        let singular = Regex::new(&format!(
            r"(?i)\b(?:(?:that|this)\s+(?:one|candidate|person|resume|applicant|profile|guy|woman|man)|about\s+(?:him|her)|(?:his|her)\s+(?:key\s+|main\s+|technical\s+)?(?:{}))\b",
            PROFILE_ATTRIBUTES
        ))
        .map_err(|e| Error::Internal(format!("singular pattern: {}", e)))?;

        Ok(Self {
            identifier,
            ordinal,
            leading,
            plural,
            singular,
        })
    }

    /// Extract explicit identifiers in first-occurrence order, deduplicated
    pub fn extract_identifiers(&self, text: &str) -> Vec<CandidateId> {
        let mut ids: Vec<CandidateId> = Vec::new();
        for m in self.identifier.find_iter(text) {
            let id = CandidateId::new(m.as_str());
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Scan `text` and resolve every cue against the memory's anchor
    pub fn resolve(&self, text: &str, memory: &EntityMemory) -> Resolution {
        let anchor = memory.anchor();
        let mut mentions: Vec<(usize, Vec<CandidateId>)> = Vec::new();
        let mut resolution = Resolution::default();

        for m in self.identifier.find_iter(text) {
            resolution.explicit += 1;
            mentions.push((m.start(), vec![CandidateId::new(m.as_str())]));
        }

        for (start, phrase, kind) in self.cues(text) {
            resolution.cues += 1;
            match resolve_cue(kind, anchor) {
                Ok(ids) => {
                    tracing::debug!("Resolved '{}' to {:?}", phrase, ids);
                    mentions.push((start, ids));
                }
                Err(reason) => {
                    resolution.unresolved.push(Error::AmbiguousReference(format!(
                        "'{}': {}",
                        phrase, reason
                    )));
                }
            }
        }

        mentions.sort_by_key(|(start, _)| *start);
        for id in mentions.into_iter().flat_map(|(_, ids)| ids) {
            if !resolution.identifiers.contains(&id) {
                resolution.identifiers.push(id);
            }
        }
        resolution
    }

    /// All cues in `text` with their byte offset and matched phrase
    fn cues<'t>(&self, text: &'t str) -> Vec<(usize, &'t str, CueKind)> {
        let mut found = Vec::new();

        for caps in self.ordinal.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(word) = caps.get(2) else { continue };
            let Some(position) = ordinal_position(word.as_str()) else {
                continue;
            };
            let prefixed = caps.get(1).is_some();
            let next = next_word(&text[whole.end()..]);

            let accepted = match next.as_deref() {
                Some(w) if ORDINAL_NOUNS.contains(&w) => true,
                Some(w) if ORDINAL_FOLLOWERS.contains(&w) => prefixed,
                Some(_) => false,
                None => prefixed,
            };
            if accepted {
                found.push((whole.start(), whole.as_str(), CueKind::Ordinal(position)));
            }
        }

        for caps in self.leading.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(count) = caps.get(1).and_then(|m| count_word(m.as_str())) else {
                continue;
            };
            // "the first two years" is not a reference
            let accepted = match next_word(&text[whole.end()..]).as_deref() {
                Some(w) => ORDINAL_NOUNS.contains(&w) || ORDINAL_FOLLOWERS.contains(&w),
                None => true,
            };
            if accepted {
                found.push((whole.start(), whole.as_str(), CueKind::Leading(count)));
            }
        }

        for m in self.plural.find_iter(text) {
            found.push((m.start(), m.as_str(), CueKind::Plural));
        }

        for m in self.singular.find_iter(text) {
            found.push((m.start(), m.as_str(), CueKind::Singular));
        }

        found.sort_by_key(|(start, _, _)| *start);
        found
    }
}

fn resolve_cue(kind: CueKind, anchor: &[CandidateId]) -> std::result::Result<Vec<CandidateId>, String> {
    if anchor.is_empty() {
        return Err("no earlier results to refer to".to_string());
    }

    match kind {
        CueKind::Ordinal(Position::Nth(position)) => anchor
            .get(position - 1)
            .map(|id| vec![id.clone()])
            .ok_or_else(|| beyond_anchor(position, anchor.len())),
        CueKind::Ordinal(Position::Last) => Ok(anchor.last().cloned().into_iter().collect()),
        CueKind::Leading(count) => anchor
            .get(..count)
            .map(<[CandidateId]>::to_vec)
            .ok_or_else(|| beyond_anchor(count, anchor.len())),
        CueKind::Plural => Ok(anchor.to_vec()),
        CueKind::Singular if anchor.len() == 1 => Ok(anchor.to_vec()),
        CueKind::Singular => Err(format!(
            "{} earlier results match a singular reference",
            anchor.len()
        )),
    }
}

fn beyond_anchor(position: usize, len: usize) -> String {
    format!("position {} is beyond the {} earlier results", position, len)
}

/// Anchor position named by an ordinal word, `None` for anything else
fn ordinal_position(word: &str) -> Option<Position> {
    let word = word.to_ascii_lowercase();
    let position = match word.as_str() {
        "first" => 1,
        "second" => 2,
        "third" => 3,
        "fourth" => 4,
        "fifth" => 5,
        "sixth" => 6,
        "seventh" => 7,
        "eighth" => 8,
        "ninth" => 9,
        "tenth" => 10,
        "last" => return Some(Position::Last),
        numeric => {
            let digits = numeric.strip_suffix(|c: char| c.is_ascii_alphabetic())?;
            let digits = digits.strip_suffix(|c: char| c.is_ascii_alphabetic())?;
            digits.parse().ok().filter(|n| *n > 0)?
        }
    };
    Some(Position::Nth(position))
}

fn count_word(word: &str) -> Option<usize> {
    match word.to_ascii_lowercase().as_str() {
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        digits => digits.parse().ok(),
    }
}

/// The next alphabetic word, lowercased, skipping whitespace only
fn next_word(rest: &str) -> Option<String> {
    let rest = rest.trim_start_matches(|c: char| c == ' ' || c == '\t');
    let word: String = rest
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect();
    if word.is_empty() {
        None
    } else {
        Some(word.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(r"\b\d{5,}\b").unwrap()
    }

    fn memory_with(ids: &[&str]) -> EntityMemory {
        let mut memory = EntityMemory::new(10, 50);
        let ids: Vec<CandidateId> = ids.iter().map(|s| CandidateId::from(*s)).collect();
        memory.record(&ids);
        memory
    }

    fn ids(resolution: &Resolution) -> Vec<&str> {
        resolution.identifiers.iter().map(|i| i.as_str()).collect()
    }

    #[test]
    fn test_extract_identifiers_dedups_in_order() {
        let found = resolver().extract_identifiers("compare 11847784, 57667857 and 11847784 (id 123)");
        let found: Vec<&str> = found.iter().map(|i| i.as_str()).collect();
        assert_eq!(found, vec!["11847784", "57667857"]);
    }

    #[test]
    fn test_ordinal_resolves_against_anchor() {
        let memory = memory_with(&["10101", "20505", "30909"]);
        let r = resolver().resolve("tell me more about the first one", &memory);
        assert_eq!(ids(&r), vec!["10101"]);
        assert_eq!(r.cues, 1);

        let r = resolver().resolve("what about the last candidate?", &memory);
        assert_eq!(ids(&r), vec!["30909"]);

        let r = resolver().resolve("and the 2nd", &memory);
        assert_eq!(ids(&r), vec!["20505"]);
    }

    #[test]
    fn test_two_ordinals_in_text_order() {
        let memory = memory_with(&["10101", "20505", "30909"]);
        let r = resolver().resolve("compare the third and the first", &memory);
        assert_eq!(ids(&r), vec!["30909", "10101"]);
    }

    #[test]
    fn test_bare_ordinal_word_is_not_a_cue() {
        let memory = memory_with(&["10101", "20505"]);
        let r = resolver().resolve("first, find java developers", &memory);
        assert_eq!(r.cues, 0);
        assert!(r.identifiers.is_empty());

        let r = resolver().resolve("who had the first job in banking", &memory);
        assert_eq!(r.cues, 0);
    }

    #[test]
    fn test_ordinal_beyond_anchor_is_unresolved() {
        let memory = memory_with(&["10101"]);
        let r = resolver().resolve("the third candidate", &memory);
        assert!(r.identifiers.is_empty());
        assert_eq!(r.cues, 1);
        assert!(matches!(r.unresolved[0], Error::AmbiguousReference(_)));
    }

    #[test]
    fn test_plural_takes_whole_anchor() {
        let memory = memory_with(&["10101", "20505"]);
        let r = resolver().resolve("compare both of them", &memory);
        assert_eq!(ids(&r), vec!["10101", "20505"]);
    }

    #[test]
    fn test_singular_needs_single_anchor() {
        let one = memory_with(&["10101"]);
        let r = resolver().resolve("what are his key skills?", &one);
        assert_eq!(ids(&r), vec!["10101"]);

        let two = memory_with(&["10101", "20505"]);
        let r = resolver().resolve("tell me about that candidate", &two);
        assert!(r.identifiers.is_empty());
        assert_eq!(r.unresolved.len(), 1);
    }

    #[test]
    fn test_explicit_and_resolved_merge_in_text_order() {
        let memory = memory_with(&["10101", "20505"]);
        let r = resolver().resolve("compare 99999 with the second one", &memory);
        assert_eq!(ids(&r), vec!["99999", "20505"]);

        let r = resolver().resolve("compare the first one and 10101", &memory);
        assert_eq!(ids(&r), vec!["10101"]);
    }

    #[test]
    fn test_cue_with_empty_memory() {
        let memory = EntityMemory::new(10, 50);
        let r = resolver().resolve("tell me more about the first one", &memory);
        assert!(r.identifiers.is_empty());
        assert!(r.mentions_candidates());
        assert_eq!(r.unresolved.len(), 1);
    }

    #[test]
    fn test_incidental_words_are_not_cues() {
        let memory = memory_with(&["10101", "20505", "30909"]);
        for text in [
            "Find candidates who know both payroll and recruiting",
            "Find Python developers who mentored his team",
            "nurses who helped her patients",
            "the first two years of experience matter most",
        ] {
            let r = resolver().resolve(text, &memory);
            assert_eq!(r.cues, 0, "{}", text);
            assert!(r.identifiers.is_empty(), "{}", text);
        }
    }

    #[test]
    fn test_referential_pronouns() {
        let memory = memory_with(&["10101", "20505"]);
        let r = resolver().resolve("tell me more about them", &memory);
        assert_eq!(ids(&r), vec!["10101", "20505"]);

        let r = resolver().resolve("which of them knows kafka?", &memory);
        assert_eq!(ids(&r), vec!["10101", "20505"]);

        let r = resolver().resolve("compare both candidates", &memory);
        assert_eq!(ids(&r), vec!["10101", "20505"]);

        let one = memory_with(&["44444"]);
        let r = resolver().resolve("tell me about him", &one);
        assert_eq!(ids(&r), vec!["44444"]);
    }

    #[test]
    fn test_leading_count_takes_anchor_prefix() {
        let memory = memory_with(&["10101", "20505", "30909"]);
        let r = resolver().resolve("compare the first two", &memory);
        assert_eq!(ids(&r), vec!["10101", "20505"]);
        assert_eq!(r.cues, 1);

        let r = resolver().resolve("compare the top 3 candidates", &memory);
        assert_eq!(ids(&r), vec!["10101", "20505", "30909"]);

        let short = memory_with(&["10101"]);
        let r = resolver().resolve("compare the first two", &short);
        assert!(r.identifiers.is_empty());
        assert_eq!(r.unresolved.len(), 1);
    }

    #[test]
    fn test_ordinal_position() {
        assert_eq!(ordinal_position("Third"), Some(Position::Nth(3)));
        assert_eq!(ordinal_position("4th"), Some(Position::Nth(4)));
        assert_eq!(ordinal_position("10th"), Some(Position::Nth(10)));
        assert_eq!(ordinal_position("last"), Some(Position::Last));
        assert_eq!(ordinal_position("zeroth"), None);
    }
}
