//! Coarse orientation of a video, used as the first segment of its storage key.

use serde::{Deserialize, Serialize};
use std::fmt;

const LANDSCAPE: f64 = 16.0 / 9.0;
const PORTRAIT: f64 = 9.0 / 16.0;
const TOLERANCE: f64 = 0.5;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Other,
}

impl AspectRatio {
    /// Classify frame geometry.
    ///
    /// The landscape band is tested before the portrait band, so a ratio that
    /// falls within both is reported as landscape.
    pub fn classify(width: u32, height: u32) -> Self {
        let ratio = f64::from(width) / f64::from(height);
        if (ratio - LANDSCAPE).abs() < TOLERANCE {
            AspectRatio::Landscape
        } else if (ratio - PORTRAIT).abs() < TOLERANCE {
            AspectRatio::Portrait
        } else {
            AspectRatio::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Other => "other",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
