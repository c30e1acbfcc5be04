//! Channel registry
//!
//! Channels are created on the first sample bearing a new id and are never
//! removed; they only stop being alive.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{pick_hue, ChannelInfo, Hsl};
use crate::clock::Millis;

/// Registry of all channels ever observed, in discovery order
pub struct ChannelRegistry {
    /// Channels in the order they were discovered
    channels: Vec<ChannelInfo>,
    /// Position of each channel in `channels`
    index: HashMap<String, usize>,
    /// Nominal sample rate assigned to new channels
    sample_rate: f64,
    /// Random source for the very first hue
    rng: StdRng,
}

impl ChannelRegistry {
    /// Create an empty registry for a source with the given sample rate
    pub fn new(sample_rate: f64) -> Self {
        Self::with_rng(sample_rate, StdRng::from_entropy())
    }

    /// Create an empty registry with a deterministic colour sequence
    pub fn with_seed(sample_rate: f64, seed: u64) -> Self {
        Self::with_rng(sample_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(sample_rate: f64, rng: StdRng) -> Self {
        Self {
            channels: Vec::new(),
            index: HashMap::new(),
            sample_rate,
            rng,
        }
    }

    /// Return the channel with `id`, creating it if necessary
    ///
    /// The second element is `true` when the channel was created by this call.
    pub fn ensure_channel(&mut self, id: &str, now: Millis) -> (&ChannelInfo, bool) {
        if let Some(&idx) = self.index.get(id) {
            return (&self.channels[idx], false);
        }

        let hues: Vec<u16> = self.channels.iter().map(|c| c.color.hue).collect();
        let hue = pick_hue(&hues, &mut self.rng);

        let mut channel = ChannelInfo::new(id, Hsl::from_hue(hue), self.sample_rate);
        channel.last_seen = Some(now);

        tracing::debug!("Registered channel '{}' with colour {}", id, channel.color);

        let idx = self.channels.len();
        self.channels.push(channel);
        self.index.insert(id.to_string(), idx);
        (&self.channels[idx], true)
    }

    /// Mark an existing channel as alive
    ///
    /// Returns `true` if the channel was previously not alive. Unknown ids
    /// are ignored.
    pub fn mark_alive(&mut self, id: &str, now: Millis) -> bool {
        let Some(&idx) = self.index.get(id) else {
            return false;
        };
        let channel = &mut self.channels[idx];
        channel.last_seen = Some(now);
        let revived = !channel.alive;
        channel.alive = true;
        revived
    }

    /// Mark channels silent for longer than `timeout` as not alive
    ///
    /// Returns the ids whose liveness changed.
    pub fn refresh_liveness(&mut self, now: Millis, timeout: Millis) -> Vec<String> {
        let mut changed = Vec::new();
        for channel in self.channels.iter_mut().filter(|c| c.alive) {
            let stale = match channel.last_seen {
                Some(seen) => now - seen > timeout,
                None => true,
            };
            if stale {
                channel.alive = false;
                changed.push(channel.id.clone());
            }
        }
        changed
    }

    /// Change the display colour of a channel
    pub fn set_color(&mut self, id: &str, color: Hsl) -> bool {
        match self.index.get(id) {
            Some(&idx) => {
                self.channels[idx].color = color;
                true
            }
            None => false,
        }
    }

    /// Look up a channel by id
    pub fn get(&self, id: &str) -> Option<&ChannelInfo> {
        self.index.get(id).map(|&idx| &self.channels[idx])
    }

    /// Check whether a channel id is known
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All channels that were at some point alive
    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    /// Channels that are currently alive
    pub fn alive_channels(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.channels.iter().filter(|c| c.alive)
    }

    /// Channel ids in discovery order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.id.as_str())
    }

    /// Nominal sample rate for new channels
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Change the nominal sample rate reported for channels
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        for channel in &mut self.channels {
            channel.sample_rate = sample_rate;
        }
    }

    /// Number of known channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if no channel was ever registered
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
