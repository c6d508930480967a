//! Scripted sensor and recording surface shared by the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use depthview::display::{DisplayFrame, Surface, SurfaceEvent};
use depthview::error::SensorError;
use depthview::pipeline::PointCloud;
use depthview::sensor::synthetic::nominal_calibration;
use depthview::sensor::{
    Calibration, Capture, CaptureWait, ColorResolution, DepthMode, DeviceConfiguration,
    DeviceProvider, Image, ImageFormat, SensorDevice,
};

/// Ordered record of every collaborator call
pub type Log = Rc<RefCell<Vec<&'static str>>>;

pub fn count(log: &Log, call: &str) -> usize {
    log.borrow().iter().filter(|c| **c == call).count()
}

pub fn position(log: &Log, call: &str) -> Option<usize> {
    log.borrow().iter().position(|c| *c == call)
}

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Frame,
    Timeout,
    Fail,
}

pub struct MockProvider {
    pub log: Log,
    pub installed: u32,
    pub reject_start: bool,
    pub frame: Capture,
    /// Consumed one step per capture, then frames forever
    pub script: Vec<Step>,
}

impl MockProvider {
    pub fn new(frame: Capture) -> Self {
        Self {
            log: Log::default(),
            installed: 1,
            reject_start: false,
            frame,
            script: Vec::new(),
        }
    }

    pub fn with_script(mut self, script: Vec<Step>) -> Self {
        self.script = script;
        self
    }
}

impl DeviceProvider for MockProvider {
    type Device = MockDevice;

    fn installed_count(&self) -> u32 {
        self.installed
    }

    fn open(&self, index: u32) -> Result<MockDevice, SensorError> {
        if index >= self.installed {
            return Err(SensorError::Unavailable {
                index,
                installed: self.installed,
            });
        }
        self.log.borrow_mut().push("open");
        Ok(MockDevice {
            log: self.log.clone(),
            reject_start: self.reject_start,
            frame: self.frame.clone(),
            script: self.script.iter().copied().collect(),
        })
    }
}

pub struct MockDevice {
    log: Log,
    reject_start: bool,
    frame: Capture,
    script: VecDeque<Step>,
}

impl SensorDevice for MockDevice {
    fn start_cameras(&mut self, _config: &DeviceConfiguration) -> Result<(), SensorError> {
        if self.reject_start {
            return Err(SensorError::Rejected("unsupported mode".into()));
        }
        self.log.borrow_mut().push("start");
        Ok(())
    }

    fn calibration(
        &self,
        depth_mode: DepthMode,
        color_resolution: ColorResolution,
    ) -> Result<Calibration, SensorError> {
        self.log.borrow_mut().push("calibration");
        nominal_calibration(depth_mode, color_resolution)
            .ok_or_else(|| SensorError::Rejected("no calibration".into()))
    }

    fn get_capture(&mut self, wait: CaptureWait) -> Result<Capture, SensorError> {
        self.log.borrow_mut().push("capture");
        match self.script.pop_front().unwrap_or(Step::Frame) {
            Step::Frame => Ok(self.frame.clone()),
            Step::Timeout => Err(SensorError::Timeout(match wait {
                CaptureWait::Timeout(limit) => limit,
                CaptureWait::Infinite => Duration::ZERO,
            })),
            Step::Fail => Err(SensorError::Failed("usb transfer failed".into())),
        }
    }

    fn stop_cameras(&mut self) {
        self.log.borrow_mut().push("stop");
    }

    fn close(&mut self) {
        self.log.borrow_mut().push("close");
    }
}

pub struct RecordingSurface {
    pub log: Log,
    pub images: Vec<(String, DisplayFrame)>,
    pub clouds: Vec<(String, PointCloud)>,
    pub polls: u32,
    /// Report this event on the given poll (1-based)
    pub event_on_poll: Option<(u32, SurfaceEvent)>,
}

impl RecordingSurface {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            images: Vec::new(),
            clouds: Vec::new(),
            polls: 0,
            event_on_poll: None,
        }
    }

    pub fn quit_on_poll(mut self, poll: u32) -> Self {
        self.event_on_poll = Some((poll, SurfaceEvent::Key('q')));
        self
    }

    pub fn event_on_poll(mut self, poll: u32, event: SurfaceEvent) -> Self {
        self.event_on_poll = Some((poll, event));
        self
    }
}

impl Surface for RecordingSurface {
    fn show(&mut self, name: &str, frame: &DisplayFrame) -> depthview::Result<()> {
        self.log.borrow_mut().push("show");
        self.images.push((name.to_owned(), frame.clone()));
        Ok(())
    }

    fn show_cloud(&mut self, name: &str, cloud: &PointCloud) -> depthview::Result<()> {
        self.log.borrow_mut().push("show");
        self.clouds.push((name.to_owned(), cloud.clone()));
        Ok(())
    }

    fn poll_event(&mut self, _wait: Duration) -> depthview::Result<Option<SurfaceEvent>> {
        self.polls += 1;
        match self.event_on_poll {
            Some((poll, event)) if poll == self.polls => Ok(Some(event)),
            _ => Ok(None),
        }
    }

    fn close(&mut self) {
        self.log.borrow_mut().push("surface_close");
    }
}

pub fn solid_color(width: u32, height: u32, bgra: [u8; 4]) -> Image {
    Image::new(
        ImageFormat::ColorBgra32,
        width,
        height,
        bgra.repeat((width * height) as usize),
    )
}

pub fn uniform_depth(width: u32, height: u32, mm: u16) -> Image {
    Image::from_u16(
        ImageFormat::Depth16,
        width,
        height,
        &vec![mm; (width * height) as usize],
    )
}

pub fn uniform_ir(width: u32, height: u32, value: u16) -> Image {
    Image::from_u16(
        ImageFormat::Ir16,
        width,
        height,
        &vec![value; (width * height) as usize],
    )
}

/// A full capture in the default NFOV unbinned / 720p geometry
pub fn default_capture() -> Capture {
    Capture::new(0)
        .with_color(solid_color(1280, 720, [30, 60, 90, 255]))
        .with_depth(uniform_depth(640, 576, 1000))
        .with_ir(uniform_ir(640, 576, 200))
}
