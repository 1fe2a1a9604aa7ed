//! Vector math used by brute-force search.

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity, or `None` when it is undefined (length mismatch,
/// zero-norm input or non-finite values).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    cosine_with_norm(a, l2_norm(a), b)
}

/// Same as [`cosine_similarity`] with the left-hand norm precomputed.
pub(crate) fn cosine_with_norm(a: &[f32], a_norm: f32, b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a_norm == 0.0 {
        return None;
    }
    let b_norm = l2_norm(b);
    if b_norm == 0.0 {
        return None;
    }
    let sim = dot(a, b) / (a_norm * b_norm);
    sim.is_finite().then(|| sim.clamp(-1.0, 1.0))
}
