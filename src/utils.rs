use rand_distr::LogNormal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Seed offset applied to every simulation RNG, set per scenario iteration
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// When set, per-bid auction decisions are written to a dedicated log file
pub static VERBOSE_AUCTION: AtomicBool = AtomicBool::new(false);

/// Number of simulated requests processed since the counter was last reset
pub static TOTAL_SIMULATED_REQUESTS: AtomicU64 = AtomicU64::new(0);

/// Combine a stream-specific base seed with the global iteration seed
pub fn get_seed(base_seed: u64) -> u64 {
    base_seed.wrapping_add(RAND_SEED.load(Ordering::Relaxed).wrapping_mul(1_000_003))
}

/// Convert mean and standard deviation to log-normal distribution parameters
/// Returns (μ, σ) for LogNormal(μ, σ) that approximates the given mean and stddev
///
/// For LogNormal(μ, σ):
/// - E[X] = exp(μ + σ²/2)
/// - Var[X] = (exp(σ²) - 1) * exp(2μ + σ²)
///
/// To convert from mean (m) and stddev (s):
/// - σ = sqrt(ln(1 + s²/m²))
/// - μ = ln(m) - σ²/2
fn lognormal_from_mean_stddev(mean: f64, stddev: f64) -> (f64, f64) {
    let variance = stddev * stddev;
    let sigma_squared = (1.0 + variance / (mean * mean)).ln();
    let sigma = sigma_squared.sqrt();
    let mu = mean.ln() - sigma_squared / 2.0;
    (mu, sigma)
}

/// Create a log-normal distribution from mean and standard deviation
/// Mean must be positive and stddev non-negative, otherwise an error is returned
pub fn lognormal_dist(mean: f64, stddev: f64) -> Result<LogNormal<f64>, Box<dyn std::error::Error>> {
    if !(mean > 0.0) || !(stddev >= 0.0) {
        return Err(format!("invalid log-normal parameters: mean {} stddev {}", mean, stddev).into());
    }
    let (mu, sigma) = lognormal_from_mean_stddev(mean, stddev);
    Ok(LogNormal::new(mu, sigma)?)
}

/// Parse an integer option value, treating anything unparseable (including empty) as zero
pub fn parse_int_or_zero(value: &str) -> i64 {
    value.trim().parse::<i64>().unwrap_or(0)
}

/// Parse a float option value, treating anything unparseable (including empty) as zero
pub fn parse_float_or_zero(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Replace characters that are unsafe in file names
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_or_zero() {
        assert_eq!(parse_int_or_zero("70"), 70);
        assert_eq!(parse_int_or_zero(" 15 "), 15);
        assert_eq!(parse_int_or_zero(""), 0);
        assert_eq!(parse_int_or_zero("abc"), 0);
        assert_eq!(parse_int_or_zero("12.5"), 0);
    }

    #[test]
    fn test_parse_float_or_zero() {
        assert_eq!(parse_float_or_zero("12.5"), 12.5);
        assert_eq!(parse_float_or_zero("x"), 0.0);
        assert_eq!(parse_float_or_zero("NaN"), 0.0);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("throttle rates"), "throttle_rates");
        assert_eq!(sanitize_filename("a/b:c"), "a_b_c");
        assert_eq!(sanitize_filename("winner_order"), "winner_order");
    }

    #[test]
    fn test_lognormal_dist_rejects_bad_parameters() {
        assert!(lognormal_dist(10.0, 3.0).is_ok());
        assert!(lognormal_dist(0.0, 3.0).is_err());
        assert!(lognormal_dist(10.0, -1.0).is_err());
    }
}
