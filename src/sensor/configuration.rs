//! Camera stream configuration: formats, resolutions, depth modes and frame rates

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::frame::ImageFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorResolution {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "720p")]
    Res720p,
    #[serde(rename = "1080p")]
    Res1080p,
    #[serde(rename = "1440p")]
    Res1440p,
    #[serde(rename = "1536p")]
    Res1536p,
    #[serde(rename = "2160p")]
    Res2160p,
    #[serde(rename = "3072p")]
    Res3072p,
}

impl ColorResolution {
    /// Width and height in pixels, `None` when the color camera is off
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            ColorResolution::Off => None,
            ColorResolution::Res720p => Some((1280, 720)),
            ColorResolution::Res1080p => Some((1920, 1080)),
            ColorResolution::Res1440p => Some((2560, 1440)),
            ColorResolution::Res1536p => Some((2048, 1536)),
            ColorResolution::Res2160p => Some((3840, 2160)),
            ColorResolution::Res3072p => Some((4096, 3072)),
        }
    }

    /// Horizontal and vertical field of view in degrees
    pub fn field_of_view(self) -> Option<(f32, f32)> {
        let (width, height) = self.dimensions()?;
        if width * 3 == height * 4 {
            Some((90.0, 74.3))
        } else {
            Some((90.0, 59.0))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    Off,
    NfovBinned2x2,
    NfovUnbinned,
    WfovBinned2x2,
    WfovUnbinned,
    PassiveIr,
}

impl DepthMode {
    /// Width and height of depth and infrared images, `None` when off
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            DepthMode::Off => None,
            DepthMode::NfovBinned2x2 => Some((320, 288)),
            DepthMode::NfovUnbinned => Some((640, 576)),
            DepthMode::WfovBinned2x2 => Some((512, 512)),
            DepthMode::WfovUnbinned | DepthMode::PassiveIr => Some((1024, 1024)),
        }
    }

    /// Horizontal and vertical field of view in degrees
    pub fn field_of_view(self) -> Option<(f32, f32)> {
        match self {
            DepthMode::Off => None,
            DepthMode::NfovBinned2x2 | DepthMode::NfovUnbinned => Some((75.0, 65.0)),
            DepthMode::WfovBinned2x2 | DepthMode::WfovUnbinned | DepthMode::PassiveIr => {
                Some((120.0, 120.0))
            }
        }
    }

    /// Passive IR runs the infrared camera without producing depth
    pub fn produces_depth(self) -> bool {
        !matches!(self, DepthMode::Off | DepthMode::PassiveIr)
    }

    pub fn produces_ir(self) -> bool {
        self != DepthMode::Off
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Fps {
    Fps5,
    Fps15,
    Fps30,
}

impl Fps {
    pub fn hz(self) -> u32 {
        match self {
            Fps::Fps5 => 5,
            Fps::Fps15 => 15,
            Fps::Fps30 => 30,
        }
    }

    pub fn frame_period(self) -> Duration {
        Duration::from_secs(1) / self.hz()
    }
}

impl TryFrom<u32> for Fps {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Fps::Fps5),
            15 => Ok(Fps::Fps15),
            30 => Ok(Fps::Fps30),
            other => Err(format!("unsupported frame rate {other} (expected 5, 15 or 30)")),
        }
    }
}

impl From<Fps> for u32 {
    fn from(fps: Fps) -> Self {
        fps.hz()
    }
}

/// Stream configuration applied once per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub color_format: ImageFormat,
    pub color_resolution: ColorResolution,
    pub depth_mode: DepthMode,
    pub fps: Fps,
    pub synchronized_images_only: bool,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            color_format: ImageFormat::ColorBgra32,
            color_resolution: ColorResolution::Res720p,
            depth_mode: DepthMode::NfovUnbinned,
            fps: Fps::Fps30,
            synchronized_images_only: true,
        }
    }
}
