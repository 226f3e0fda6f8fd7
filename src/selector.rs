//! Per-frame refresh rate selection from layer votes.
//!
//! Selection is a pure function of the candidate list, the votes and the
//! default rate. Priority order:
//! - no usable vote: the default rate
//! - any `Max` vote: the highest candidate
//! - otherwise every candidate is scored and the best score wins
//!
//! Scoring adds, per `Min` vote, its weight to the lowest candidate, and per
//! `Explicit`/`Heuristic` vote, `weight * closeness(candidate, desired)` to every
//! candidate. Equal scores resolve to the lower fps, then the lower config id.

use crate::refresh_rate::{fps_equal, ConfigGroup, RefreshRate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Largest integer multiple or divisor of the content rate that still earns credit.
const MAX_FRAMES_TO_FIT: u32 = 10;

/// Width of the closeness peak, as a fraction of the desired rate.
const CLOSENESS_SPREAD: f32 = 0.05;

/// Credit factor for a display slower than the content (frames are dropped).
const DIVISOR_PENALTY: f32 = 0.5;

/// Scores closer than this are treated as a tie.
const SCORE_EPSILON: f32 = 1e-4;

/// Score factor applied to candidates that would need a seamful group switch.
const CROSS_GROUP_FACTOR: f32 = 0.8;

/// How a layer voted for the display refresh rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerVoteType {
    /// Doesn't care about the refresh rate.
    #[default]
    NoVote,
    /// Lowest refresh rate available.
    Min,
    /// Highest refresh rate available.
    Max,
    /// Specific rate estimated by the platform.
    Heuristic,
    /// Specific rate requested by the app.
    Explicit,
}

impl LayerVoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerVoteType::NoVote => "no_vote",
            LayerVoteType::Min => "min",
            LayerVoteType::Max => "max",
            LayerVoteType::Heuristic => "heuristic",
            LayerVoteType::Explicit => "explicit",
        }
    }
}

impl Serialize for LayerVoteType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LayerVoteType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "no_vote" => Ok(LayerVoteType::NoVote),
            "min" => Ok(LayerVoteType::Min),
            "max" => Ok(LayerVoteType::Max),
            "heuristic" => Ok(LayerVoteType::Heuristic),
            "explicit" => Ok(LayerVoteType::Explicit),
            _ => Err(serde::de::Error::custom(format!(
                "invalid vote type: {}, expected one of: no_vote, min, max, heuristic, explicit",
                s
            ))),
        }
    }
}

/// One layer's vote for the current frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRequirement {
    /// Layer name, for debugging only.
    #[serde(default)]
    pub name: String,
    pub vote: LayerVoteType,
    /// Meaningful for `Heuristic` and `Explicit` votes only.
    #[serde(default)]
    pub desired_refresh_rate: f32,
    /// In `[0, 1]`; higher weights have more impact.
    pub weight: f32,
}

impl LayerRequirement {
    pub fn new(
        name: impl Into<String>,
        vote: LayerVoteType,
        desired_refresh_rate: f32,
        weight: f32,
    ) -> Self {
        Self {
            name: name.into(),
            vote,
            desired_refresh_rate,
            weight,
        }
    }
}

/// A vote reduced to the parts that influence selection.
#[derive(Debug, Clone, Copy)]
struct Ballot {
    vote: LayerVoteType,
    desired: f32,
    weight: f32,
}

impl Ballot {
    fn from_layer(layer: &LayerRequirement) -> Option<Self> {
        let weight = if layer.weight.is_nan() {
            0.0
        } else {
            layer.weight.clamp(0.0, 1.0)
        };
        match layer.vote {
            LayerVoteType::NoVote => None,
            // Min and Max count at any weight; the weight only sizes the Min bias.
            LayerVoteType::Min | LayerVoteType::Max => Some(Self {
                vote: layer.vote,
                desired: 0.0,
                weight,
            }),
            LayerVoteType::Heuristic | LayerVoteType::Explicit => {
                let desired = layer.desired_refresh_rate;
                (weight > 0.0 && desired.is_finite() && desired > 0.0).then_some(Self {
                    vote: layer.vote,
                    desired,
                    weight,
                })
            }
        }
    }
}

/// How well a display running at `display_fps` presents content at `desired_fps`.
///
/// Peaks at 1.0 for an exact match. An integer multiple `n` of the content rate
/// earns `1/n`, an integer divisor `n` earns `0.5/n`, and mismatches decay
/// exponentially with their distance from the nearest such rate.
pub fn closeness(display_fps: f32, desired_fps: f32) -> f32 {
    if !(display_fps.is_finite() && display_fps > 0.0 && desired_fps.is_finite() && desired_fps > 0.0)
    {
        return 0.0;
    }
    let spread = desired_fps * CLOSENESS_SPREAD;
    let mut best = 0.0f32;
    for n in 1..=MAX_FRAMES_TO_FIT {
        let n = n as f32;
        let multiple = (-(display_fps - n * desired_fps).abs() / spread).exp() / n;
        best = best.max(multiple);
        if n >= 2.0 {
            let divisor =
                DIVISOR_PENALTY * (-(n * display_fps - desired_fps).abs() / spread).exp() / n;
            best = best.max(divisor);
        }
    }
    best
}

/// Pick the best refresh rate for the frame.
pub fn select<'a>(
    candidates: &[&'a RefreshRate],
    layers: &[LayerRequirement],
    default_rate: &'a RefreshRate,
) -> &'a RefreshRate {
    select_with(candidates, layers, default_rate, None)
}

/// Like [`select`], but candidates outside `current_group` cost more, so a
/// seamless switch wins when the content is served about equally well.
pub fn select_group_aware<'a>(
    candidates: &[&'a RefreshRate],
    layers: &[LayerRequirement],
    default_rate: &'a RefreshRate,
    current_group: ConfigGroup,
) -> &'a RefreshRate {
    select_with(candidates, layers, default_rate, Some(current_group))
}

fn select_with<'a>(
    candidates: &[&'a RefreshRate],
    layers: &[LayerRequirement],
    default_rate: &'a RefreshRate,
    current_group: Option<ConfigGroup>,
) -> &'a RefreshRate {
    let ballots: Vec<Ballot> = layers.iter().filter_map(Ballot::from_layer).collect();
    if ballots.is_empty() || candidates.is_empty() {
        return default_rate;
    }

    if ballots.iter().any(|b| b.vote == LayerVoteType::Max) {
        return highest(candidates, current_group);
    }

    let lowest = lowest_index(candidates);
    let scores: Vec<f32> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let raw: f32 = ballots
                .iter()
                .map(|ballot| match ballot.vote {
                    LayerVoteType::Min if index == lowest => ballot.weight,
                    LayerVoteType::Heuristic | LayerVoteType::Explicit => {
                        ballot.weight * closeness(candidate.fps, ballot.desired)
                    }
                    _ => 0.0,
                })
                .sum();
            match current_group {
                Some(group) if candidate.config_group != group => raw * CROSS_GROUP_FACTOR,
                _ => raw,
            }
        })
        .collect();

    let mut best = 0;
    for index in 1..candidates.len() {
        let by_score = compare_scores(scores[index], scores[best]);
        let ordering = by_score.then_with(|| {
            prefer_lower(candidates[index], candidates[best], current_group)
        });
        if ordering == Ordering::Less {
            best = index;
        }
    }
    candidates[best]
}

/// `Less` means `a` scores better than `b`.
fn compare_scores(a: f32, b: f32) -> Ordering {
    if a - b > SCORE_EPSILON {
        Ordering::Less
    } else if b - a > SCORE_EPSILON {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Tie-break order: lower fps, then the current group, then lower config id.
fn prefer_lower(a: &RefreshRate, b: &RefreshRate, current_group: Option<ConfigGroup>) -> Ordering {
    compare_fps(a.fps, b.fps)
        .then_with(|| prefer_group(a, b, current_group))
        .then(a.config_id.cmp(&b.config_id))
}

fn compare_fps(a: f32, b: f32) -> Ordering {
    if fps_equal(a, b) {
        Ordering::Equal
    } else {
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }
}

fn prefer_group(a: &RefreshRate, b: &RefreshRate, current_group: Option<ConfigGroup>) -> Ordering {
    match current_group {
        Some(group) => {
            let a_in = a.config_group == group;
            let b_in = b.config_group == group;
            b_in.cmp(&a_in)
        }
        None => Ordering::Equal,
    }
}

fn lowest_index(candidates: &[&RefreshRate]) -> usize {
    let mut lowest = 0;
    for index in 1..candidates.len() {
        if prefer_lower(candidates[index], candidates[lowest], None) == Ordering::Less {
            lowest = index;
        }
    }
    lowest
}

fn highest<'a>(candidates: &[&'a RefreshRate], current_group: Option<ConfigGroup>) -> &'a RefreshRate {
    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        let ordering = compare_fps(best.fps, candidate.fps)
            .then_with(|| prefer_group(candidate, best, current_group))
            .then(candidate.config_id.cmp(&best.config_id));
        if ordering == Ordering::Less {
            best = candidate;
        }
    }
    best
}
