//! Dynamic Time Warping matcher for user-trained gestures.
//!
//! A captured buffer is compared against every exemplar in the motion
//! profile with a banded DTW over the accelerometer axes. The closest
//! exemplar wins if its normalized distance is strictly below the profile's
//! sensitivity.
//!
//! # Algorithm
//! 1. Skip exemplars whose length differs from the candidate by more than
//!    `max_length_ratio` of the exemplar length.
//! 2. Walk the `(n+1) × (m+1)` cost grid seeded with `0` at the origin and
//!    infinity elsewhere, restricted to a diagonal band of half-width
//!    `max(min_band, |n−m|)`. Only two rows are live at a time.
//! 3. Normalize the corner cost by `n + m`.
//!
//! Cost is `O(n·w)` time and `O(m)` memory per exemplar. NOISE exemplars compete like any other
//! label; interpreting a NOISE win is the caller's job.

use tracing::debug;

use crate::config::MatcherConfig;
use crate::profile::MotionProfile;
use crate::types::MotionSample;

/// Result of matching one capture against a profile.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Best exemplar cleared the sensitivity threshold.
    Matched { id: String, distance: f32 },
    /// Closest candidate was not close enough. `best` is `None` when every
    /// exemplar was pruned or the profile is empty.
    NoMatch { best: Option<(String, f32)> },
}

impl MatchOutcome {
    /// Winning exemplar id, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            MatchOutcome::Matched { id, .. } => Some(id),
            MatchOutcome::NoMatch { .. } => None,
        }
    }

    /// Distance of the closest compared exemplar.
    pub fn best_distance(&self) -> Option<f32> {
        match self {
            MatchOutcome::Matched { distance, .. } => Some(*distance),
            MatchOutcome::NoMatch { best } => best.as_ref().map(|(_, d)| *d),
        }
    }
}

/// Normalized banded DTW distance between two sequences, with the default
/// band.
///
/// Returns `f32::INFINITY` if either sequence is empty.
pub fn calculate_dtw(candidate: &[MotionSample], template: &[MotionSample]) -> f32 {
    calculate_dtw_banded(candidate, template, MatcherConfig::default().min_band)
}

/// Normalized banded DTW distance with an explicit minimum band half-width.
pub fn calculate_dtw_banded(candidate: &[MotionSample], template: &[MotionSample], min_band: usize) -> f32 {
    let n = candidate.len();
    let m = template.len();
    if n == 0 || m == 0 {
        return f32::INFINITY;
    }

    let band = min_band.max(n.abs_diff(m));
    let mut prev = vec![f32::INFINITY; m + 1];
    let mut curr = vec![f32::INFINITY; m + 1];
    prev[0] = 0.0;

    // Columns written into each row buffer; everything else is infinity.
    let mut prev_span = 0..1;
    let mut stale = 0..0;

    for i in 1..=n {
        curr[stale].fill(f32::INFINITY);

        let lo = i.saturating_sub(band).max(1);
        let hi = m.min(i + band);
        for j in lo..=hi {
            let cost = candidate[i - 1].accel_distance(&template[j - 1]);
            curr[j] = cost + prev[j].min(curr[j - 1]).min(prev[j - 1]);
        }

        std::mem::swap(&mut prev, &mut curr);
        stale = std::mem::replace(&mut prev_span, lo..hi + 1);
    }

    prev[m] / (n + m) as f32
}

/// Matches a capture against every exemplar in the profile.
pub fn match_buffer(buffer: &[MotionSample], profile: &MotionProfile, config: &MatcherConfig) -> MatchOutcome {
    let mut best: Option<(String, f32)> = None;

    for exemplar in profile.exemplars() {
        let len = exemplar.samples.len();
        if len == 0 {
            continue;
        }
        let length_ratio = buffer.len().abs_diff(len) as f32 / len as f32;
        if length_ratio > config.max_length_ratio {
            debug!(id = %exemplar.id, length_ratio, "exemplar pruned by length");
            continue;
        }

        let distance = calculate_dtw_banded(buffer, &exemplar.samples, config.min_band);
        debug!(id = %exemplar.id, distance, "exemplar distance");
        if best.as_ref().map_or(true, |(_, d)| distance < *d) {
            best = Some((exemplar.id.clone(), distance));
        }
    }

    match best {
        Some((id, distance)) if distance < profile.sensitivity() => MatchOutcome::Matched { id, distance },
        best => MatchOutcome::NoMatch { best },
    }
}
