//! Storyboard scenes produced by the decomposition phase.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a scene's clip should be joined to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    /// Overlap the tail of the previous clip with the head of this one.
    #[default]
    Crossfade,
    /// Hard cut, no overlap.
    Cut,
}

/// One beat of the storyboard: a single ~12s video segment plus its
/// narration line.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Position within the storyboard, starting at 0.
    pub index: u32,

    /// Visual description passed to the video segment provider.
    #[serde(alias = "scene_prompt")]
    pub visual_prompt: String,

    /// Longer-form visual description, when the storyboard author supplies
    /// one separately from the provider-facing prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_description: Option<String>,

    /// Continuity notes carried from the previous scene (lighting, subject
    /// position, etc.), folded into the continuity hint when the provider
    /// only accepts text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuity_notes: Option<String>,

    /// Narration line spoken over this scene. Empty string means silent.
    #[serde(default)]
    pub narration: String,

    /// Offset of this scene's clip within the finished video, in seconds.
    pub start_time_secs: f64,
    /// End offset of this scene's clip, in seconds. `end - start` equals the
    /// configured segment duration except possibly for the last scene.
    pub end_time_secs: f64,

    /// How this scene's clip joins to the previous one. Ignored for the
    /// first scene.
    #[serde(default)]
    pub transition: TransitionType,
}

impl Scene {
    pub fn new(index: u32, visual_prompt: impl Into<String>, start_time_secs: f64, end_time_secs: f64) -> Self {
        Self {
            index,
            visual_prompt: visual_prompt.into(),
            visual_description: None,
            continuity_notes: None,
            narration: String::new(),
            start_time_secs,
            end_time_secs,
            transition: TransitionType::default(),
        }
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_time_secs - self.start_time_secs
    }
}

/// Full storyboard returned by decomposition: an ordered list of scenes plus
/// the title used for thumbnails and delivered metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Storyboard {
    pub title: String,
    pub scenes: Vec<Scene>,
}

impl Storyboard {
    pub fn total_scenes(&self) -> u32 {
        self.scenes.len() as u32
    }

    pub fn estimated_duration_secs(&self) -> f64 {
        self.scenes.len() as f64 * crate::video_spec::SEGMENT_DURATION_SECS
    }
}
