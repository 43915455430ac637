//! Web-vitals performance score
//!
//! A 0-100 score for a completed journey, derived purely from the three
//! web-vitals observations shipped with it. Starts at 100 and subtracts a
//! fixed penalty for each breached threshold.

/// Canonical attribute key for largest-contentful-paint (milliseconds)
pub const LCP_ATTR: &str = "vitals.lcp";
/// Canonical attribute key for first-input-delay (milliseconds)
pub const FID_ATTR: &str = "vitals.fid";
/// Canonical attribute key for cumulative-layout-shift (unitless)
pub const CLS_ATTR: &str = "vitals.cls";
/// Attribute key the materializer writes the computed score under
pub const SCORE_ATTR: &str = "performance.score";

/// Compute the performance score for a completed journey
///
/// `lcp` and `fid` are in milliseconds, `cls` is the unitless layout-shift
/// value. The result is clamped to the 0-100 range.
pub fn performance_score(lcp: f64, fid: f64, cls: f64) -> f64 {
    let mut score = 100.0;

    if lcp > 4000.0 {
        score -= 30.0;
    } else if lcp > 2500.0 {
        score -= 15.0;
    }

    if fid > 300.0 {
        score -= 25.0;
    } else if fid > 100.0 {
        score -= 10.0;
    }

    if cls > 0.25 {
        score -= 20.0;
    } else if cls > 0.1 {
        score -= 10.0;
    }

    score.max(0.0)
}
