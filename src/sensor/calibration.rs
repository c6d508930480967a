//! Pinhole camera calibration relating depth and color camera spaces

use super::configuration::{ColorResolution, DepthMode};

/// Which camera's intrinsics a point cloud is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationType {
    Depth,
    Color,
}

/// Intrinsic parameters of one camera (no lens distortion)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    /// Focal length x (pixel)
    pub fx: f32,
    /// Focal length y (pixel)
    pub fy: f32,
    /// Principal point x (pixel)
    pub cx: f32,
    /// Principal point y (pixel)
    pub cy: f32,
}

impl Intrinsics {
    /// Derive focal lengths from a field of view, principal point centred
    pub fn from_field_of_view(width: u32, height: u32, hfov_deg: f32, vfov_deg: f32) -> Self {
        let fx = width as f32 / 2.0 / (hfov_deg.to_radians() / 2.0).tan();
        let fy = height as f32 / 2.0 / (vfov_deg.to_radians() / 2.0).tan();
        Self {
            width,
            height,
            fx,
            fy,
            cx: (width as f32 - 1.0) / 2.0,
            cy: (height as f32 - 1.0) / 2.0,
        }
    }

    /// Pixel coordinate plus depth (mm) to a 3D point (mm) in this camera's space
    pub fn unproject(&self, u: f32, v: f32, depth: f32) -> [f32; 3] {
        [
            (u - self.cx) / self.fx * depth,
            (v - self.cy) / self.fy * depth,
            depth,
        ]
    }

    /// 3D point to pixel coordinate, `None` behind the camera
    pub fn project(&self, point: [f32; 3]) -> Option<[f32; 2]> {
        if point[2] <= 0.0 {
            return None;
        }
        Some([
            point[0] / point[2] * self.fx + self.cx,
            point[1] / point[2] * self.fy + self.cy,
        ])
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }
}

/// Rigid transform from depth camera space to color camera space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics {
    pub rotation: [[f32; 3]; 3],
    /// Millimetres
    pub translation: [f32; 3],
}

impl Extrinsics {
    pub const IDENTITY: Extrinsics = Extrinsics {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: [0.0; 3],
    };

    pub fn apply(&self, p: [f32; 3]) -> [f32; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + t[0],
            r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + t[1],
            r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + t[2],
        ]
    }
}

/// Per-session calibration, fixed for the configured depth mode and color resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub depth_mode: DepthMode,
    pub color_resolution: ColorResolution,
    pub depth: Intrinsics,
    pub color: Intrinsics,
    pub depth_to_color: Extrinsics,
}

impl Calibration {
    /// Nominal calibration for a mode pair, `None` unless both cameras are on
    pub fn nominal(
        depth_mode: DepthMode,
        color_resolution: ColorResolution,
        depth_to_color: Extrinsics,
    ) -> Option<Self> {
        let (dw, dh) = depth_mode.dimensions()?;
        let (dh_fov, dv_fov) = depth_mode.field_of_view()?;
        let (cw, ch) = color_resolution.dimensions()?;
        let (ch_fov, cv_fov) = color_resolution.field_of_view()?;

        Some(Self {
            depth_mode,
            color_resolution,
            depth: Intrinsics::from_field_of_view(dw, dh, dh_fov, dv_fov),
            color: Intrinsics::from_field_of_view(cw, ch, ch_fov, cv_fov),
            depth_to_color,
        })
    }

    pub fn intrinsics(&self, camera: CalibrationType) -> &Intrinsics {
        match camera {
            CalibrationType::Depth => &self.depth,
            CalibrationType::Color => &self.color,
        }
    }
}
