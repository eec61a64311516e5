//! RAKE keyword extraction (Rapid Automatic Keyword Extraction).
//!
//! Candidate phrases are maximal runs of content words between stopwords and
//! punctuation. Each word scores degree/frequency; a phrase scores the sum of
//! its words.

use std::collections::HashMap;

/// Longest phrase kept as a single keyword.
const MAX_PHRASE_WORDS: usize = 3;

/// English stopwords shared with the summarizer.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "please", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
    "yourself", "yourselves",
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

/// Ranked keyword phrases, highest score first.
pub fn rake(text: &str) -> Vec<(String, f64)> {
    let phrases = candidate_phrases(text);

    let mut frequency: HashMap<&str, f64> = HashMap::new();
    let mut degree: HashMap<&str, f64> = HashMap::new();
    for phrase in &phrases {
        let extra = (phrase.len() - 1) as f64;
        for word in phrase {
            *frequency.entry(word.as_str()).or_default() += 1.0;
            *degree.entry(word.as_str()).or_default() += 1.0 + extra;
        }
    }

    let mut scored: HashMap<String, f64> = HashMap::new();
    for phrase in &phrases {
        let score: f64 = phrase
            .iter()
            .map(|w| degree[w.as_str()] / frequency[w.as_str()])
            .sum();
        scored.entry(phrase.join(" ")).or_insert(score);
    }

    let mut ranked: Vec<(String, f64)> = scored.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

fn candidate_phrases(text: &str) -> Vec<Vec<String>> {
    let mut phrases = Vec::new();
    let mut current: Vec<String> = Vec::new();

    let flush = |current: &mut Vec<String>, phrases: &mut Vec<Vec<String>>| {
        if !current.is_empty() {
            for chunk in current.chunks(MAX_PHRASE_WORDS) {
                phrases.push(chunk.to_vec());
            }
            current.clear();
        }
    };

    let mut word = String::new();
    for ch in text.chars().chain(std::iter::once(' ')) {
        if ch.is_alphanumeric() || ch == '\'' || ch == '-' {
            word.extend(ch.to_lowercase());
            continue;
        }
        if !word.is_empty() {
            let w = word.trim_matches(|c| c == '\'' || c == '-').to_string();
            word.clear();
            if w.is_empty() || is_stopword(&w) || w.chars().all(|c| c.is_numeric()) {
                flush(&mut current, &mut phrases);
            } else {
                current.push(w);
            }
        }
        if !ch.is_whitespace() {
            flush(&mut current, &mut phrases);
        }
    }
    flush(&mut current, &mut phrases);
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwords_sorted() {
        let mut sorted = STOPWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOPWORDS);
    }

    #[test]
    fn test_candidate_phrases_split_on_stopwords_and_punctuation() {
        let phrases = candidate_phrases("The quarterly invoice is overdue, payment required.");
        assert_eq!(
            phrases,
            vec![
                vec!["quarterly".to_string(), "invoice".to_string()],
                vec!["overdue".to_string()],
                vec!["payment".to_string(), "required".to_string()],
            ]
        );
    }

    #[test]
    fn test_rake_prefers_multiword_phrases() {
        let ranked = rake("Compatibility of systems of linear constraints. Linear constraints matter.");
        assert_eq!(ranked[0].0, "linear constraints matter");
        let pos = |key: &str| ranked.iter().position(|(k, _)| k == key).unwrap();
        assert!(pos("linear constraints") < pos("compatibility"));
    }

    #[test]
    fn test_rake_ignores_numbers_and_empty() {
        assert!(rake("").is_empty());
        assert!(rake("42 1999, 7.").is_empty());
    }
}
