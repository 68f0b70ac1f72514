//! Vector math over face embeddings.
//!
//! Accumulation uses f64 intermediates so scores are stable across
//! embedding sizes from 128 to 512 dimensions.

/// Returns `v` scaled to unit L2 norm.
///
/// A zero vector is returned unchanged, so the result is not guaranteed to
/// be unit length.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out);
    out
}

/// Scales `v` to unit L2 norm in place. No-op for a zero vector.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0 when the lengths differ or either vector has zero norm, so a
/// mismatched sample scores as "no evidence" instead of failing the query.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Clamp to [-1, 1] to absorb rounding error.
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Euclidean distance. Returns [`f32::MAX`] when the lengths differ.
pub fn distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_identical() {
        let sim = similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((sim - 1.0).abs() < 1e-6, "identical vectors should have sim=1, got {sim}");
    }

    #[test]
    fn similarity_orthogonal() {
        let sim = similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6, "orthogonal vectors should have sim=0, got {sim}");
    }

    #[test]
    fn similarity_opposite() {
        let sim = similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6, "opposite vectors should have sim=-1, got {sim}");
    }

    #[test]
    fn similarity_length_mismatch_is_zero() {
        assert_eq!(similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(similarity(&[], &[1.0]), 0.0);
    }

    #[test]
    fn similarity_zero_vector_is_zero() {
        assert_eq!(similarity(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(similarity(&[], &[]), 0.0);
    }

    #[test]
    fn similarity_of_normalized_self_is_one() {
        let a = normalize(&[0.3, -1.7, 4.2, 0.01]);
        let sim = similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6, "got {sim}");
    }

    #[test]
    fn normalize_unit() {
        let v = normalize(&[3.0, 4.0]);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_is_noop() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn normalize_preserves_direction() {
        let raw = [0.9, 0.1, 0.0];
        let n = normalize(&raw);
        assert!((similarity(&raw, &n) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn distance_basic() {
        assert!((distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn distance_length_mismatch_is_max() {
        assert_eq!(distance(&[1.0], &[1.0, 2.0]), f32::MAX);
    }
}
