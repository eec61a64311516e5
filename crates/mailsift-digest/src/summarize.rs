//! Extractive summarization (TextRank over sentence word overlap).

use std::collections::HashSet;

use crate::keywords::is_stopword;

const DAMPING: f64 = 0.85;
const ITERATIONS: usize = 40;
const CONVERGENCE: f64 = 1e-6;

/// Pick the `max_sentences` most central sentences, in original order.
pub fn summarize(text: &str, max_sentences: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.len() <= max_sentences {
        return sentences.join(" ");
    }

    let bags: Vec<HashSet<String>> = sentences.iter().map(|s| content_words(s)).collect();
    let scores = rank(&bags);

    let mut order: Vec<usize> = (0..sentences.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    let mut picked: Vec<usize> = order.into_iter().take(max_sentences).collect();
    picked.sort_unstable();

    picked
        .into_iter()
        .map(|i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split on terminal punctuation and blank lines. Terminators are kept.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\n' && chars.peek() == Some(&'\n') {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(if ch.is_whitespace() { ' ' } else { ch });
        if matches!(ch, '.' | '!' | '?') && chars.peek().is_none_or(|c| c.is_whitespace()) {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let collapsed = current.split_whitespace().collect::<Vec<_>>().join(" ");
    current.clear();
    // Bare delimiters left between concatenated bodies carry no content.
    if collapsed.chars().any(|c| c.is_alphanumeric()) {
        sentences.push(collapsed);
    }
}

fn content_words(sentence: &str) -> HashSet<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !is_stopword(w))
        .collect()
}

fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let overlap = a.intersection(b).count() as f64;
    if overlap == 0.0 {
        return 0.0;
    }
    let norm = (a.len() as f64).ln() + (b.len() as f64).ln();
    if norm <= 0.0 { overlap } else { overlap / norm }
}

fn rank(bags: &[HashSet<String>]) -> Vec<f64> {
    let n = bags.len();
    let mut weights = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let w = similarity(&bags[i], &bags[j]);
            weights[i][j] = w;
            weights[j][i] = w;
        }
    }
    let out_sums: Vec<f64> = weights.iter().map(|row| row.iter().sum()).collect();

    let mut scores = vec![1.0; n];
    for _ in 0..ITERATIONS {
        let mut next = vec![1.0 - DAMPING; n];
        for (i, slot) in next.iter_mut().enumerate() {
            for j in 0..n {
                if out_sums[j] > 0.0 {
                    *slot += DAMPING * weights[j][i] / out_sums[j] * scores[j];
                }
            }
        }
        let delta: f64 = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
        scores = next;
        if delta < CONVERGENCE {
            break;
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("First one. Second? Third!\n\nFourth line v1.2 here. . ");
        assert_eq!(s, vec!["First one.", "Second?", "Third!", "Fourth line v1.2 here."]);
    }

    #[test]
    fn test_short_text_returned_whole() {
        assert_eq!(summarize("Only sentence.", 3), "Only sentence.");
        assert_eq!(summarize("", 3), "");
    }

    #[test]
    fn test_picks_central_sentences_in_order() {
        let text = "The invoice for March is attached. \
                    Lunch was great today. \
                    Please pay the March invoice by Friday. \
                    The invoice total for March is 300 EUR.";
        let summary = summarize(text, 2);
        assert!(!summary.contains("Lunch"));
        let all = split_sentences(text);
        let positions: Vec<usize> = split_sentences(&summary)
            .iter()
            .map(|s| all.iter().position(|a| a == s).unwrap())
            .collect();
        assert_eq!(positions.len(), 2);
        assert!(positions[0] < positions[1]);
    }
}
