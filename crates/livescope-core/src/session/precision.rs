//! Precision reduction
//!
//! Nearest-sample decimation over a clipped query result. Spikes survive;
//! nothing is averaged or interpolated.

use super::Session;

/// Reduce every channel to roughly `target` points across all sessions
///
/// The stride is `total / target`, where `total` is the number of samples
/// per channel summed over every session. Each channel of each session keeps
/// the samples at `round(k * stride)` for increasing `k`, so a session
/// contributes points in proportion to its share of the whole range and no
/// channel of any session ends up with more than `target` points.
///
/// A `target` of zero, or one at least as large as the available samples,
/// leaves the data untouched.
pub fn reduce_precision(sessions: &mut [Session], target: usize) {
    let total: usize = sessions.iter().map(Session::sample_count).sum();
    if target == 0 || target >= total {
        return;
    }

    let stride = total as f64 / target as f64;

    for session in sessions.iter_mut() {
        for channel in &mut session.data {
            channel.values = decimate(&channel.values, stride);
        }
    }
}

fn decimate(values: &[f64], stride: f64) -> Vec<f64> {
    let limit = values.len() as f64 - 0.5;
    let mut reduced = Vec::with_capacity((values.len() as f64 / stride).ceil() as usize);

    for k in 0usize.. {
        let position = k as f64 * stride;
        if position >= limit {
            break;
        }
        if let Some(&value) = values.get(position.round() as usize) {
            reduced.push(value);
        }
    }

    reduced
}
