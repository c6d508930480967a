//! Synthetic depth sensor rendering a procedural scene
//!
//! Follows the Azure Kinect mode rules so configuration errors surface the
//! same way they would on hardware. The scene is a sloped back wall with a
//! sphere swinging left and right in front of it, rendered into both camera
//! spaces using the nominal calibration.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{
    Calibration, Capture, CaptureWait, ColorResolution, DepthMode, DeviceConfiguration,
    DeviceProvider, Extrinsics, Fps, Image, ImageFormat, Intrinsics, SensorDevice,
};
use crate::error::SensorError;

/// Depth camera to color camera offset, millimetres
const COLOR_BASELINE: [f32; 3] = [-32.0, -2.0, 4.0];

const SPHERE_RADIUS_MM: f32 = 300.0;
const SPHERE_DEPTH_MM: f32 = 1500.0;
const SPHERE_SWING_MM: f32 = 450.0;
const WALL_NEAR_MM: f32 = 2600.0;
const WALL_FAR_MM: f32 = 3400.0;
/// Pixels outside this normalized radius get no illumination, so no depth
const ILLUMINATION_RADIUS: f32 = 1.2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticSettings {
    pub device_count: u32,
    /// Pace captures to the configured frame rate
    pub realtime: bool,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            device_count: 1,
            realtime: true,
        }
    }
}

pub struct SyntheticProvider {
    settings: SyntheticSettings,
}

impl SyntheticProvider {
    pub fn new(settings: SyntheticSettings) -> Self {
        Self { settings }
    }
}

impl DeviceProvider for SyntheticProvider {
    type Device = SyntheticDevice;

    fn installed_count(&self) -> u32 {
        self.settings.device_count
    }

    fn open(&self, index: u32) -> Result<SyntheticDevice, SensorError> {
        if index >= self.settings.device_count {
            return Err(SensorError::Unavailable {
                index,
                installed: self.settings.device_count,
            });
        }
        info!("Opened synthetic sensor {}", index);
        Ok(SyntheticDevice {
            index,
            realtime: self.settings.realtime,
            config: None,
            sequence: 0,
            next_frame_at: Instant::now(),
            closed: false,
        })
    }
}

pub struct SyntheticDevice {
    index: u32,
    realtime: bool,
    config: Option<DeviceConfiguration>,
    sequence: u64,
    next_frame_at: Instant,
    closed: bool,
}

/// Reject mode combinations the hardware cannot stream
pub fn validate(config: &DeviceConfiguration) -> Result<(), SensorError> {
    let color_on = config.color_resolution != ColorResolution::Off;
    let depth_on = config.depth_mode != DepthMode::Off;

    if !color_on && !depth_on {
        return Err(SensorError::Rejected(
            "color and depth cameras are both disabled".into(),
        ));
    }
    if color_on && config.color_format != ImageFormat::ColorBgra32 {
        return Err(SensorError::Rejected(format!(
            "color format {:?} is not supported, use BGRA32",
            config.color_format
        )));
    }
    if config.synchronized_images_only && !(color_on && depth_on) {
        return Err(SensorError::Rejected(
            "synchronized images require both color and depth cameras".into(),
        ));
    }
    if config.fps == Fps::Fps30 {
        if config.depth_mode == DepthMode::WfovUnbinned {
            return Err(SensorError::Rejected(
                "WFOV unbinned depth is limited to 15 fps".into(),
            ));
        }
        if config.color_resolution == ColorResolution::Res3072p {
            return Err(SensorError::Rejected(
                "3072p color is limited to 15 fps".into(),
            ));
        }
    }
    Ok(())
}

impl SyntheticDevice {
    fn active(&self) -> Result<&DeviceConfiguration, SensorError> {
        if self.closed {
            return Err(SensorError::Failed("device is closed".into()));
        }
        self.config
            .as_ref()
            .ok_or_else(|| SensorError::Failed("cameras are not running".into()))
    }

    /// Sleep until the next frame is due, or time out first
    fn pace(&mut self, period: Duration, wait: CaptureWait) -> Result<(), SensorError> {
        let now = Instant::now();
        let due = self.next_frame_at.saturating_duration_since(now);
        if let CaptureWait::Timeout(limit) = wait {
            if limit < due {
                thread::sleep(limit);
                return Err(SensorError::Timeout(limit));
            }
        }
        thread::sleep(due);
        // Do not build up a backlog when the consumer is slower than the sensor
        self.next_frame_at = (self.next_frame_at + period).max(Instant::now());
        Ok(())
    }
}

impl SensorDevice for SyntheticDevice {
    #[instrument(skip(self, config), fields(index = self.index))]
    fn start_cameras(&mut self, config: &DeviceConfiguration) -> Result<(), SensorError> {
        if self.closed {
            return Err(SensorError::Failed("device is closed".into()));
        }
        if self.config.is_some() {
            return Err(SensorError::Rejected("cameras are already running".into()));
        }
        validate(config)?;
        self.config = Some(config.clone());
        self.next_frame_at = Instant::now();
        debug!("Synthetic cameras started");
        Ok(())
    }

    fn calibration(
        &self,
        depth_mode: DepthMode,
        color_resolution: ColorResolution,
    ) -> Result<Calibration, SensorError> {
        if let Some(active) = &self.config {
            if active.depth_mode != depth_mode || active.color_resolution != color_resolution {
                return Err(SensorError::Rejected(format!(
                    "calibration requested for {:?}/{:?} but cameras run {:?}/{:?}",
                    depth_mode, color_resolution, active.depth_mode, active.color_resolution
                )));
            }
        }
        nominal_calibration(depth_mode, color_resolution).ok_or_else(|| {
            SensorError::Rejected(
                "calibration needs both the depth and the color camera enabled".into(),
            )
        })
    }

    fn get_capture(&mut self, wait: CaptureWait) -> Result<Capture, SensorError> {
        let config = self.active()?.clone();
        if self.realtime {
            self.pace(config.fps.frame_period(), wait)?;
        }

        let sequence = self.sequence;
        self.sequence += 1;
        let elapsed = config.fps.frame_period() * sequence as u32;
        let scene = Scene::at(elapsed);

        let mut capture = Capture::new(sequence).with_device_timestamp(elapsed);

        if let (Some((dw, dh)), Some((hfov, vfov))) = (
            config.depth_mode.dimensions(),
            config.depth_mode.field_of_view(),
        ) {
            let intrinsics = Intrinsics::from_field_of_view(dw, dh, hfov, vfov);
            let depth = scene.render_depth(&intrinsics, [0.0; 3]);
            if config.depth_mode.produces_ir() {
                let ir = render_ir(&depth, config.depth_mode.produces_depth());
                capture = capture.with_ir(Image::from_u16(ImageFormat::Ir16, dw, dh, &ir));
            }
            if config.depth_mode.produces_depth() {
                capture = capture.with_depth(Image::from_u16(ImageFormat::Depth16, dw, dh, &depth));
            }
        }

        if let (Some((cw, ch)), Some((hfov, vfov))) = (
            config.color_resolution.dimensions(),
            config.color_resolution.field_of_view(),
        ) {
            let intrinsics = Intrinsics::from_field_of_view(cw, ch, hfov, vfov);
            let color = scene.render_color(&intrinsics, COLOR_BASELINE);
            capture = capture.with_color(Image::new(ImageFormat::ColorBgra32, cw, ch, color));
        }

        Ok(capture)
    }

    fn stop_cameras(&mut self) {
        if self.config.take().is_some() {
            debug!("Synthetic cameras stopped");
        }
    }

    fn close(&mut self) {
        self.config = None;
        self.closed = true;
    }
}

/// Calibration the synthetic sensor reports for a mode pair
pub fn nominal_calibration(
    depth_mode: DepthMode,
    color_resolution: ColorResolution,
) -> Option<Calibration> {
    Calibration::nominal(
        depth_mode,
        color_resolution,
        Extrinsics {
            translation: COLOR_BASELINE,
            ..Extrinsics::IDENTITY
        },
    )
}

struct Scene {
    /// Sphere centre in depth camera space
    centre: [f32; 3],
}

enum Hit {
    Sphere { depth: f32, shade: f32 },
    Wall { depth: f32, x: f32, y: f32 },
}

impl Scene {
    fn at(elapsed: Duration) -> Self {
        let t = elapsed.as_secs_f32();
        Self {
            centre: [(t * 0.8).sin() * SPHERE_SWING_MM, 0.0, SPHERE_DEPTH_MM],
        }
    }

    /// Trace the pixel ray of a camera placed at `origin` (depth camera space)
    fn trace(&self, intrinsics: &Intrinsics, origin: [f32; 3], u: u32, v: u32) -> Hit {
        // Ray direction with z = 1, so the ray parameter is the z depth
        let d = intrinsics.unproject(u as f32, v as f32, 1.0);
        let oc = [
            origin[0] - self.centre[0],
            origin[1] - self.centre[1],
            origin[2] - self.centre[2],
        ];
        let a = d[0] * d[0] + d[1] * d[1] + 1.0;
        let b = 2.0 * (oc[0] * d[0] + oc[1] * d[1] + oc[2]);
        let c = oc[0] * oc[0] + oc[1] * oc[1] + oc[2] * oc[2] - SPHERE_RADIUS_MM * SPHERE_RADIUS_MM;
        let disc = b * b - 4.0 * a * c;
        if disc >= 0.0 {
            let t = (-b - disc.sqrt()) / (2.0 * a);
            if t > 0.0 {
                // Lambert term against a light at the camera
                let hit = [origin[0] + d[0] * t, origin[1] + d[1] * t, t];
                let n = [
                    (hit[0] - self.centre[0]) / SPHERE_RADIUS_MM,
                    (hit[1] - self.centre[1]) / SPHERE_RADIUS_MM,
                    (hit[2] - self.centre[2]) / SPHERE_RADIUS_MM,
                ];
                let len = a.sqrt();
                let shade = (-(n[0] * d[0] + n[1] * d[1] + n[2]) / len).clamp(0.0, 1.0);
                return Hit::Sphere {
                    depth: t + origin[2],
                    shade,
                };
            }
        }

        // Wall recedes towards the top of the image
        let row = v as f32 / intrinsics.height.max(1) as f32;
        let depth = WALL_FAR_MM - (WALL_FAR_MM - WALL_NEAR_MM) * row;
        Hit::Wall {
            depth,
            x: origin[0] + d[0] * depth,
            y: origin[1] + d[1] * depth,
        }
    }

    fn render_depth(&self, intrinsics: &Intrinsics, origin: [f32; 3]) -> Vec<u16> {
        let mut depth = Vec::with_capacity((intrinsics.width * intrinsics.height) as usize);
        for v in 0..intrinsics.height {
            for u in 0..intrinsics.width {
                let nx = (u as f32 - intrinsics.cx) / (intrinsics.width as f32 / 2.0);
                let ny = (v as f32 - intrinsics.cy) / (intrinsics.height as f32 / 2.0);
                if nx * nx + ny * ny > ILLUMINATION_RADIUS * ILLUMINATION_RADIUS {
                    depth.push(0);
                    continue;
                }
                let mm = match self.trace(intrinsics, origin, u, v) {
                    Hit::Sphere { depth, .. } | Hit::Wall { depth, .. } => depth.round() as u16,
                };
                depth.push(mm);
            }
        }
        depth
    }

    fn render_color(&self, intrinsics: &Intrinsics, baseline: [f32; 3]) -> Vec<u8> {
        // Color camera centre expressed in depth camera space
        let origin = [-baseline[0], -baseline[1], -baseline[2]];
        let mut bgra = Vec::with_capacity((intrinsics.width * intrinsics.height * 4) as usize);
        for v in 0..intrinsics.height {
            for u in 0..intrinsics.width {
                let [b, g, r] = match self.trace(intrinsics, origin, u, v) {
                    Hit::Sphere { shade, .. } => {
                        let s = 0.25 + 0.75 * shade;
                        [(40.0 * s) as u8, (140.0 * s) as u8, (250.0 * s) as u8]
                    }
                    Hit::Wall { x, y, .. } => {
                        let tile = ((x / 200.0).floor() as i32 + (y / 200.0).floor() as i32) & 1;
                        if tile == 0 {
                            [200, 190, 170]
                        } else {
                            [120, 110, 90]
                        }
                    }
                };
                bgra.extend_from_slice(&[b, g, r, 255]);
            }
        }
        bgra
    }
}

/// Active illumination falls off with the square of distance
fn render_ir(depth: &[u16], active: bool) -> Vec<u16> {
    depth
        .iter()
        .map(|&mm| {
            if !active {
                return 60;
            }
            if mm == 0 {
                return 0;
            }
            let d = mm as f32;
            (1.2e9 / (d * d)).min(u16::MAX as f32) as u16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline(count: u32) -> SyntheticProvider {
        SyntheticProvider::new(SyntheticSettings {
            device_count: count,
            realtime: false,
        })
    }

    #[test]
    fn open_out_of_range_is_unavailable() {
        let err = offline(1).open(1).err().unwrap();
        assert!(matches!(err, SensorError::Unavailable { index: 1, installed: 1 }));
    }

    #[test]
    fn wfov_unbinned_rejects_30_fps() {
        let config = DeviceConfiguration {
            depth_mode: DepthMode::WfovUnbinned,
            ..Default::default()
        };
        assert!(matches!(validate(&config), Err(SensorError::Rejected(_))));

        let config = DeviceConfiguration {
            fps: Fps::Fps15,
            ..config
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn synchronized_needs_both_cameras() {
        let config = DeviceConfiguration {
            color_resolution: ColorResolution::Off,
            ..Default::default()
        };
        assert!(validate(&config).is_err());

        let config = DeviceConfiguration {
            synchronized_images_only: false,
            ..config
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut device = offline(1).open(0).unwrap();
        let config = DeviceConfiguration::default();
        device.start_cameras(&config).unwrap();
        assert!(matches!(
            device.start_cameras(&config),
            Err(SensorError::Rejected(_))
        ));
    }

    #[test]
    fn capture_before_start_fails() {
        let mut device = offline(1).open(0).unwrap();
        assert!(device.get_capture(CaptureWait::Infinite).is_err());
    }

    #[test]
    fn captures_match_configured_modes() {
        let mut device = offline(1).open(0).unwrap();
        device
            .start_cameras(&DeviceConfiguration {
                depth_mode: DepthMode::NfovBinned2x2,
                ..Default::default()
            })
            .unwrap();

        let first = device.get_capture(CaptureWait::Infinite).unwrap();
        let second = device.get_capture(CaptureWait::Infinite).unwrap();
        assert_eq!(second.sequence, first.sequence + 1);

        let depth = second.depth().unwrap();
        assert_eq!((depth.width(), depth.height()), (320, 288));
        assert_eq!(second.ir().unwrap().width(), 320);
        let color = second.color().unwrap();
        assert_eq!((color.width(), color.height()), (1280, 720));

        // The sphere sits in front of the wall near the image centre
        let samples: Vec<u16> = depth.u16_samples().collect();
        let centre = samples[(144 * 320 + 160) as usize];
        assert!(centre > 0 && centre < WALL_NEAR_MM as u16);
        // Corners fall outside the illuminated area
        assert_eq!(samples[0], 0);
    }

    #[test]
    fn passive_ir_captures_have_no_depth() {
        let mut device = offline(1).open(0).unwrap();
        device
            .start_cameras(&DeviceConfiguration {
                depth_mode: DepthMode::PassiveIr,
                fps: Fps::Fps15,
                synchronized_images_only: false,
                ..Default::default()
            })
            .unwrap();
        let capture = device.get_capture(CaptureWait::Infinite).unwrap();
        assert!(capture.depth().is_none());
        assert!(capture.ir().is_some());
    }

    #[test]
    fn realtime_capture_times_out_before_next_frame() {
        let provider = SyntheticProvider::new(SyntheticSettings {
            device_count: 1,
            realtime: true,
        });
        let mut device = provider.open(0).unwrap();
        device
            .start_cameras(&DeviceConfiguration {
                fps: Fps::Fps5,
                depth_mode: DepthMode::NfovBinned2x2,
                ..Default::default()
            })
            .unwrap();
        device.get_capture(CaptureWait::Infinite).unwrap();
        let wait = CaptureWait::Timeout(Duration::from_millis(1));
        assert!(matches!(
            device.get_capture(wait),
            Err(SensorError::Timeout(_))
        ));
    }

    #[test]
    fn calibration_must_match_running_modes() {
        let mut device = offline(1).open(0).unwrap();
        device.start_cameras(&DeviceConfiguration::default()).unwrap();
        assert!(device
            .calibration(DepthMode::NfovUnbinned, ColorResolution::Res720p)
            .is_ok());
        assert!(device
            .calibration(DepthMode::WfovBinned2x2, ColorResolution::Res720p)
            .is_err());
    }
}
