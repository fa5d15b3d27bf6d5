//! Vocabulary construction and skip-gram pair generation.

use indexmap::IndexMap;
use std::collections::HashMap;

use super::error::{TrainingError, TrainingResult};
use crate::utils::tokenize;

/// Distinct corpus tokens with dense indices `0..len`.
///
/// Indices follow first occurrence in the corpus, so the same corpus always
/// yields the same vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn from_corpus<S: AsRef<str>>(corpus: &[S]) -> Self {
        let mut vocab = Self::default();
        for text in corpus {
            for token in tokenize(text.as_ref()) {
                if !vocab.index.contains_key(&token) {
                    vocab.index.insert(token.clone(), vocab.tokens.len());
                    vocab.tokens.push(token);
                }
            }
        }
        vocab
    }

    /// Rebuild from a persisted token → index map.
    ///
    /// The indices must be exactly `0..map.len()` with no gaps or repeats.
    pub fn from_index_map(map: IndexMap<String, usize>) -> Result<Self, String> {
        let mut tokens = vec![None; map.len()];
        for (token, &idx) in &map {
            let Some(slot) = tokens.get_mut(idx) else {
                return Err(format!(
                    "index {idx} for '{token}' is out of range for {} tokens",
                    map.len()
                ));
            };
            if let Some(existing) = slot.as_ref() {
                return Err(format!(
                    "index {idx} assigned to both '{existing}' and '{token}'"
                ));
            }
            *slot = Some(token.clone());
        }

        let tokens: Vec<String> = tokens.into_iter().flatten().collect();
        let index = map.into_iter().collect();
        Ok(Self { tokens, index })
    }

    /// Token → index map in index order, as written to `vocab.json`.
    pub fn to_index_map(&self) -> IndexMap<String, usize> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect()
    }

    pub fn get(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Indices of the known tokens in `text`, unknown tokens dropped.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        tokenize(text).filter_map(|t| self.get(&t)).collect()
    }
}

/// `(centre, context)` index pairs for every chunk.
///
/// Each centre is paired with every token at most `window` positions away.
/// Pairs never cross chunk boundaries.
pub fn training_pairs<S: AsRef<str>>(
    corpus: &[S],
    vocab: &Vocabulary,
    window: usize,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for text in corpus {
        let ids = vocab.encode(text.as_ref());
        for (pos, &centre) in ids.iter().enumerate() {
            let start = pos.saturating_sub(window);
            let end = (pos + window + 1).min(ids.len());
            for (ctx_pos, &context) in ids.iter().enumerate().take(end).skip(start) {
                if ctx_pos != pos {
                    pairs.push((centre, context));
                }
            }
        }
    }
    pairs
}

/// Build the vocabulary and pairs, rejecting corpora that cannot be trained on.
pub fn prepare<S: AsRef<str>>(
    corpus: &[S],
    window: usize,
) -> TrainingResult<(Vocabulary, Vec<(usize, usize)>)> {
    let vocab = Vocabulary::from_corpus(corpus);
    if vocab.is_empty() {
        return Err(TrainingError::EmptyCorpus);
    }

    let pairs = training_pairs(corpus, &vocab, window);
    if pairs.is_empty() {
        let tokens = corpus
            .iter()
            .map(|t| tokenize(t.as_ref()).count())
            .sum::<usize>();
        return Err(TrainingError::NoTrainingPairs { tokens });
    }
    Ok((vocab, pairs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_first_occurrence() {
        let vocab = Vocabulary::from_corpus(&["the cat sat", "The dog sat on the mat"]);
        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.get("the"), Some(0));
        assert_eq!(vocab.get("cat"), Some(1));
        assert_eq!(vocab.get("sat"), Some(2));
        assert_eq!(vocab.get("dog"), Some(3));
        assert_eq!(vocab.get("mat"), Some(5));
        assert_eq!(vocab.token(4), Some("on"));
        assert_eq!(vocab.get("bird"), None);
    }

    #[test]
    fn test_index_map_round_trip() {
        let vocab = Vocabulary::from_corpus(&["alpha beta gamma beta"]);
        let map = vocab.to_index_map();
        assert_eq!(map.get_index(0), Some((&"alpha".to_string(), &0)));
        assert_eq!(Vocabulary::from_index_map(map).unwrap(), vocab);
    }

    #[test]
    fn test_index_map_rejects_gaps_and_duplicates() {
        let mut gap = IndexMap::new();
        gap.insert("a".to_string(), 0);
        gap.insert("b".to_string(), 2);
        assert!(Vocabulary::from_index_map(gap).is_err());

        let mut dup = IndexMap::new();
        dup.insert("a".to_string(), 0);
        dup.insert("b".to_string(), 0);
        assert!(Vocabulary::from_index_map(dup).is_err());
    }

    #[test]
    fn test_pairs_respect_window() {
        let corpus = ["a b c d"];
        let vocab = Vocabulary::from_corpus(&corpus);
        let pairs = training_pairs(&corpus, &vocab, 1);
        assert_eq!(
            pairs,
            vec![(0, 1), (1, 0), (1, 2), (2, 1), (2, 3), (3, 2)]
        );

        let wide = training_pairs(&corpus, &vocab, 2);
        assert_eq!(wide.len(), 10);
        assert!(wide.contains(&(0, 2)));
        assert!(!wide.contains(&(0, 3)));
    }

    #[test]
    fn test_pairs_do_not_cross_chunks() {
        let corpus = ["a b", "c d"];
        let vocab = Vocabulary::from_corpus(&corpus);
        let pairs = training_pairs(&corpus, &vocab, 5);
        assert_eq!(pairs, vec![(0, 1), (1, 0), (2, 3), (3, 2)]);
    }

    #[test]
    fn test_prepare_rejects_untrainable_corpora() {
        let empty: [&str; 2] = ["", "   "];
        assert!(matches!(prepare(&empty, 2), Err(TrainingError::EmptyCorpus)));

        let singletons = ["alpha", "beta"];
        assert!(matches!(
            prepare(&singletons, 2),
            Err(TrainingError::NoTrainingPairs { tokens: 2 })
        ));
    }
}
