use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Output frame size in pixels.
///
/// Serializes as the `"WxH"` string accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// 1920x1080.
    pub const FULL_HD: Self = Self::new(1920, 1080);
    /// 1280x720.
    pub const HD: Self = Self::new(1280, 720);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Reject sizes the H.264/yuv420p encode cannot take.
    pub fn validate(self) -> StoryreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StoryreelError::validation(
                "resolution width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(StoryreelError::validation(
                "resolution width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }

    /// Bytes in one tightly packed RGBA8 frame.
    pub fn rgba_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FULL_HD
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = StoryreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        match text.as_str() {
            "1080p" => return Ok(Self::FULL_HD),
            "720p" => return Ok(Self::HD),
            _ => {}
        }

        let Some((w, h)) = text.split_once('x') else {
            return Err(StoryreelError::validation(format!(
                "unsupported resolution '{s}': use WxH (e.g. 1920x1080) or 1080p/720p"
            )));
        };
        let parse = |v: &str| {
            v.trim().parse::<u32>().map_err(|_| {
                StoryreelError::validation(format!("invalid resolution component '{v}' in '{s}'"))
            })
        };
        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

impl serde::Serialize for Resolution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Resolution {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
