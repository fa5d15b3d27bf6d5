//! Cosine similarity and result ranking shared by every store.

use super::QueryResult;

/// Added to the norm product so zero vectors score 0 instead of NaN.
pub const SIMILARITY_EPSILON: f32 = 1e-12;

/// Euclidean norm.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_with_norms(a, norm(a), b, norm(b))
}

/// Cosine similarity when both norms are already known.
pub fn cosine_with_norms(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    dot(a, b) / (norm_a * norm_b + SIMILARITY_EPSILON)
}

/// Sort descending by score and keep `top_k`.
///
/// The sort is stable, so equal scores keep the order the store produced
/// them in.
pub fn rank(mut results: Vec<QueryResult>, top_k: usize) -> Vec<QueryResult> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn result(id: &str, score: f32) -> QueryResult {
        QueryResult {
            id: id.to_string(),
            score,
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        // Identical vectors
        let v1 = vec![1.0, 0.0, 0.0];
        let v2 = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&v1, &v2) - 1.0).abs() < 0.001);

        // Orthogonal vectors
        let v3 = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&v1, &v3).abs() < 0.001);

        // Opposite vectors
        let v4 = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&v1, &v4) + 1.0).abs() < 0.001);

        // Scale does not matter
        let v5 = vec![10.0, 0.0, 0.0];
        assert!((cosine_similarity(&v1, &v5) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let zero = vec![0.0; 3];
        let v = vec![0.3, 0.4, 0.5];
        let score = cosine_similarity(&zero, &v);
        assert!(score.is_finite());
        assert_eq!(score, 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_rank_orders_descending_and_truncates() {
        let ranked = rank(
            vec![result("a", 0.1), result("b", 0.9), result("c", 0.5)],
            2,
        );
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let ranked = rank(
            vec![result("first", 0.5), result("second", 0.5), result("third", 0.5)],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rank_zero_top_k_is_empty() {
        assert!(rank(vec![result("a", 1.0)], 0).is_empty());
    }
}
