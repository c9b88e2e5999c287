use rand::Rng;

/// Metropolis acceptance for a maximizing search.
///
/// Non-negative `delta` is always accepted without consuming randomness; a
/// regression is accepted with probability `exp(delta / temperature)`.
#[inline]
pub fn metropolis_accept<R: Rng>(delta: f64, temperature: f64, rng: &mut R) -> bool {
    if delta >= 0.0 {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    rng.r#gen::<f64>() < (delta / temperature).exp()
}
