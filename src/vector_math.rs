use std::cmp::Ordering;

pub fn dot(query: &[f32], candidate: &[f32]) -> f32 {
    query.iter().zip(candidate.iter()).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; `0.0` for mismatched, empty or zero-norm inputs.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() || query.is_empty() {
        return 0.0;
    }

    let denom = l2_norm(query) * l2_norm(candidate);
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot(query, candidate) / denom
    }
}

pub fn euclidean_distance(query: &[f32], candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() {
        return f32::INFINITY;
    }
    query
        .iter()
        .zip(candidate.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Larger first; incomparable scores are treated as equal.
pub fn descending(left: f32, right: f32) -> Ordering {
    right.partial_cmp(&left).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        assert!(approx_eq(cosine_similarity(&vec, &vec), 1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_or_mismatched_vectors() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0));
    }

    #[test]
    fn euclidean_distance_matches_pythagoras() {
        assert!(approx_eq(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0));
    }

    #[test]
    fn descending_orders_highest_first() {
        let mut scores = vec![0.2, 0.9, 0.5];
        scores.sort_by(|a, b| descending(*a, *b));
        assert!(approx_eq(scores[0], 0.9));
        assert!(approx_eq(scores[2], 0.2));
    }
}
