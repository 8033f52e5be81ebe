//! Output Gain Stage
//!
//! Last stage of every channel: trim gain, mute, and the output guard that
//! keeps every sample inside [-1, 1].

use serde::{Deserialize, Serialize};

use crate::level::{clamp_param, db_to_linear};
use crate::soft_clip::{SoftClipper, DEFAULT_SOFT_CLIP_DB, SOFT_CLIP_RANGE_DB};

pub const GAIN_RANGE_DB: (f32, f32) = (-80.0, 12.0);

/// How the output guard handles overs. Stored as a flag plus a threshold
/// so blobs keep one length whatever the mode.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "ClipFields", into = "ClipFields")]
pub enum ClipMode {
    /// Hard clamp at full scale
    #[default]
    Hard,
    /// `tanh` saturation above `threshold_db`
    Soft { threshold_db: f32 },
}

impl ClipMode {
    pub fn soft() -> Self {
        Self::Soft {
            threshold_db: DEFAULT_SOFT_CLIP_DB,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ClipFields {
    soft: bool,
    threshold_db: f32,
}

impl From<ClipMode> for ClipFields {
    fn from(mode: ClipMode) -> Self {
        match mode {
            ClipMode::Hard => Self {
                soft: false,
                threshold_db: DEFAULT_SOFT_CLIP_DB,
            },
            ClipMode::Soft { threshold_db } => Self {
                soft: true,
                threshold_db,
            },
        }
    }
}

impl From<ClipFields> for ClipMode {
    fn from(fields: ClipFields) -> Self {
        if fields.soft {
            Self::Soft {
                threshold_db: fields.threshold_db,
            }
        } else {
            Self::Hard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainConfig {
    pub gain_db: f32,
    pub muted: bool,
    pub clip: ClipMode,
}

impl Default for GainConfig {
    fn default() -> Self {
        Self {
            gain_db: 0.0,
            muted: false,
            clip: ClipMode::Hard,
        }
    }
}

impl GainConfig {
    pub fn sanitized(mut self) -> Self {
        self.gain_db = clamp_param(self.gain_db, GAIN_RANGE_DB.0, GAIN_RANGE_DB.1);
        if let ClipMode::Soft { threshold_db } = &mut self.clip {
            *threshold_db = clamp_param(*threshold_db, SOFT_CLIP_RANGE_DB.0, SOFT_CLIP_RANGE_DB.1);
        }
        self
    }
}

/// Per-channel trim, mute and output guard
#[derive(Debug, Clone)]
pub struct GainStage {
    config: GainConfig,
    gain: f32,
    clipper: Option<SoftClipper>,
}

impl GainStage {
    pub fn new() -> Self {
        let mut stage = Self {
            config: GainConfig::default(),
            gain: 1.0,
            clipper: None,
        };
        stage.apply(GainConfig::default());
        stage
    }

    pub fn apply(&mut self, config: GainConfig) {
        let config = config.sanitized();
        self.gain = db_to_linear(config.gain_db);
        self.clipper = match config.clip {
            ClipMode::Hard => None,
            ClipMode::Soft { threshold_db } => Some(SoftClipper::new(threshold_db)),
        };
        self.config = config;
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.apply(GainConfig { gain_db, ..self.config });
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.config.muted = muted;
    }

    pub fn set_clip_mode(&mut self, clip: ClipMode) {
        self.apply(GainConfig { clip, ..self.config });
    }

    pub fn config(&self) -> &GainConfig {
        &self.config
    }

    pub fn is_muted(&self) -> bool {
        self.config.muted
    }

    #[inline]
    pub fn process_sample(&self, input: f32) -> f32 {
        if self.config.muted {
            return 0.0;
        }
        let y = input * self.gain;
        let y = match &self.clipper {
            Some(clipper) => clipper.process_sample(y),
            None => y,
        };
        y.clamp(-1.0, 1.0)
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new()
    }
}
