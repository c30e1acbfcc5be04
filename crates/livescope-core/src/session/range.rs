//! Range selection and clipping
//!
//! Selection runs against the live session list (under the store's read
//! lock) and only picks indices. Clipping runs on the copied slice once the
//! lock has been released. Clipping only ever removes samples from the two
//! boundary sessions; it never merges or extends sessions.

use std::ops::RangeInclusive;

use super::{Session, SessionSpan};
use crate::clock::Millis;

/// Indices of the sessions overlapping `[start, end)`
///
/// The first selected session is the first one ending after `start` (an open
/// session never ends) and the last is the last one starting before `end`.
pub fn select_sessions<T, S, E>(
    items: &[T],
    start: Millis,
    end: Millis,
    start_of: S,
    end_of: E,
) -> Option<RangeInclusive<usize>>
where
    S: Fn(&T) -> Millis,
    E: Fn(&T) -> Option<Millis>,
{
    if end <= start {
        return None;
    }

    let first = items
        .iter()
        .position(|item| end_of(item).map_or(true, |e| e > start))?;
    let last = items[first..]
        .iter()
        .rposition(|item| start_of(item) < end)
        .map(|offset| first + offset)?;

    Some(first..=last)
}

/// Clip copied sessions to `[start, end)`
///
/// Sessions without channels are dropped. The first session loses every
/// sample timestamped before `start` and the last loses every sample at or
/// after `end`; a boundary session left without samples is removed.
pub fn clip_sessions(
    mut sessions: Vec<Session>,
    start: Millis,
    end: Millis,
    sample_period: Millis,
) -> Vec<Session> {
    sessions.retain(|s| !s.data.is_empty());

    if let Some(first) = sessions.first_mut() {
        clip_start(first, start, sample_period);
        if first.sample_count() == 0 {
            sessions.remove(0);
        }
    }

    if let Some(last) = sessions.last_mut() {
        clip_end(last, end, sample_period);
        if last.sample_count() == 0 {
            sessions.pop();
        }
    }

    sessions
}

/// Drop leading samples timestamped before `start`
fn clip_start(session: &mut Session, start: Millis, sample_period: Millis) {
    if session.start_time >= start {
        return;
    }

    let len = session.sample_count();
    let drop = ((start - session.start_time) / sample_period).ceil() as usize;
    if drop >= len {
        for channel in &mut session.data {
            channel.values.clear();
        }
        return;
    }

    for channel in &mut session.data {
        channel.values.drain(..drop);
    }
    session.start_time += drop as f64 * sample_period;
}

/// Drop trailing samples timestamped at or after `end`
fn clip_end(session: &mut Session, end: Millis, sample_period: Millis) {
    if !end.is_finite() {
        return;
    }

    let len = session.sample_count();
    let keep = if end <= session.start_time {
        0
    } else {
        ((end - session.start_time) / sample_period).ceil() as usize
    };
    if keep < len {
        for channel in &mut session.data {
            channel.values.truncate(keep);
        }
    }

    if session.end_time.map_or(true, |e| e > end) {
        session.end_time = Some(end);
    }
}

/// Session metadata overlapping `[start, end)`
///
/// The first span starts no earlier than `start` and the last span ends no
/// later than `end`. An open span stays open when `end` is unbounded.
pub fn span_range(spans: &[SessionSpan], start: Millis, end: Millis) -> Vec<SessionSpan> {
    let Some(range) = select_sessions(spans, start, end, |s| s.start_time, |s| s.end_time) else {
        return Vec::new();
    };

    let mut selected = spans[range].to_vec();

    if let Some(first) = selected.first_mut() {
        if first.start_time < start {
            first.start_time = start;
        }
    }
    if let Some(last) = selected.last_mut() {
        if end.is_finite() && last.end_time.map_or(true, |e| e > end) {
            last.end_time = Some(end);
        }
    }

    selected
}
