pub mod calibration;
pub mod configuration;
pub mod frame;
pub mod session;
pub mod synthetic;

use std::time::Duration;

pub use calibration::{Calibration, CalibrationType, Extrinsics, Intrinsics};
pub use configuration::{ColorResolution, DepthMode, DeviceConfiguration, Fps};
pub use frame::{Capture, Channel, Image, ImageFormat};
pub use session::SensorSession;
pub use synthetic::{SyntheticDevice, SyntheticProvider};

use crate::error::SensorError;

/// How long `get_capture` may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureWait {
    Infinite,
    Timeout(Duration),
}

impl CaptureWait {
    /// Negative values wait forever
    pub fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            CaptureWait::Infinite
        } else {
            CaptureWait::Timeout(Duration::from_millis(ms as u64))
        }
    }
}

/// An open depth sensor
pub trait SensorDevice {
    /// Start color/depth/infrared streams with `config`
    fn start_cameras(&mut self, config: &DeviceConfiguration) -> Result<(), SensorError>;

    /// Calibration for the given modes, valid while those modes are active
    fn calibration(
        &self,
        depth_mode: DepthMode,
        color_resolution: ColorResolution,
    ) -> Result<Calibration, SensorError>;

    /// Block until the next synchronized capture is available
    fn get_capture(&mut self, wait: CaptureWait) -> Result<Capture, SensorError>;

    fn stop_cameras(&mut self);

    fn close(&mut self);
}

/// Enumerates and opens sensors
pub trait DeviceProvider {
    type Device: SensorDevice;

    fn installed_count(&self) -> u32;

    fn open(&self, index: u32) -> Result<Self::Device, SensorError>;
}
