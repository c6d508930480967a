//! Scoped ownership of an open, streaming sensor

use tracing::{info, instrument, warn};

use super::{
    Calibration, Capture, CaptureWait, DeviceConfiguration, DeviceProvider, SensorDevice,
};
use crate::error::{Error, Result, SensorError};

/// An open device with one active stream configuration.
///
/// Streams are stopped before the device is closed, each exactly once, on
/// `shutdown` or on drop, whichever comes first.
pub struct SensorSession<D: SensorDevice> {
    device: D,
    config: DeviceConfiguration,
    index: u32,
    streaming: bool,
    closed: bool,
}

impl<D: SensorDevice> SensorSession<D> {
    /// Open device `index` and start its cameras with `config`
    #[instrument(skip(provider, config))]
    pub fn open<P>(provider: &P, index: u32, config: DeviceConfiguration) -> Result<Self>
    where
        P: DeviceProvider<Device = D>,
    {
        let installed = provider.installed_count();
        if installed == 0 {
            return Err(Error::DeviceUnavailable("no depth sensor connected".into()));
        }

        let device = provider.open(index)?;
        let mut session = Self {
            device,
            config,
            index,
            streaming: false,
            closed: false,
        };

        // On rejection the session drops here and closes the device.
        session.device.start_cameras(&session.config)?;
        session.streaming = true;

        info!(
            "Sensor {} streaming: {:?} color at {:?}, {:?} depth, {} fps",
            index,
            session.config.color_format,
            session.config.color_resolution,
            session.config.depth_mode,
            session.config.fps.hz()
        );
        Ok(session)
    }

    /// Calibration matching the active configuration
    pub fn calibration(&self) -> Result<Calibration> {
        self.device
            .calibration(self.config.depth_mode, self.config.color_resolution)
            .map_err(Error::from)
    }

    pub fn capture(&mut self, wait: CaptureWait) -> Result<Capture, SensorError> {
        if !self.streaming {
            return Err(SensorError::Failed("cameras are not running".into()));
        }
        self.device.get_capture(wait)
    }

    /// Stop streams, then close the device. Idempotent.
    pub fn shutdown(&mut self) {
        if self.streaming {
            self.device.stop_cameras();
            self.streaming = false;
        }
        if !self.closed {
            self.device.close();
            self.closed = true;
            info!("Sensor {} closed", self.index);
        }
    }
}

impl<D: SensorDevice> Drop for SensorSession<D> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Sensor {} released on drop", self.index);
            self.shutdown();
        }
    }
}
