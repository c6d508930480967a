//! Frame pipeline: open a sensor, then capture, process, show and poll until told to stop

pub mod point_cloud;
pub mod scenario;
pub mod view;

use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

pub use point_cloud::PointCloud;
pub use scenario::Scenario;
pub use view::{ChannelPolicy, ChannelView, Output, View};

use crate::display::{Surface, SurfaceEvent};
use crate::error::{Error, Result, SensorError};
use crate::sensor::{
    Capture, CaptureWait, DeviceConfiguration, DeviceProvider, SensorDevice, SensorSession,
};
use crate::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    SessionOpen,
    Running,
    Stopped,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::SessionOpen => "session open",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }
}

/// Why a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    WindowClosed,
    FrameLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub reason: StopReason,
}

/// Loop behaviour, fixed for the life of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub device_index: u32,
    pub capture_wait: CaptureWait,
    /// Consecutive failed captures tolerated before the run aborts
    pub max_capture_retries: u32,
    pub key_wait: Duration,
    pub quit_key: char,
    pub max_frames: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            device_index: config.sensor.device_index,
            capture_wait: CaptureWait::from_millis(config.pipeline.capture_timeout_ms),
            max_capture_retries: config.pipeline.max_capture_retries,
            key_wait: Duration::from_millis(config.pipeline.key_wait_ms),
            quit_key: config.pipeline.quit_key,
            max_frames: None,
        }
    }
}

/// One sensor session driven through `Uninitialized → SessionOpen → Running → Stopped`.
///
/// Teardown (surface close, then stop cameras, then close device) runs
/// exactly once on every exit path, including drop.
pub struct FramePipeline<D: SensorDevice, S: Surface> {
    state: PipelineState,
    view: Box<dyn View>,
    surface: S,
    session: Option<SensorSession<D>>,
    device_config: DeviceConfiguration,
    settings: PipelineSettings,
}

impl<D: SensorDevice, S: Surface> FramePipeline<D, S> {
    pub fn new(
        view: Box<dyn View>,
        surface: S,
        device_config: DeviceConfiguration,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            state: PipelineState::Uninitialized,
            view,
            surface,
            session: None,
            device_config,
            settings,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn expect_state(&self, expected: PipelineState) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(Error::InvalidState {
            actual: self.state.as_str(),
            expected: expected.as_str(),
        })
    }

    /// Open and configure the sensor, and prepare the view's calibration.
    ///
    /// On failure the pipeline is `Stopped` and cannot run.
    #[instrument(skip_all, fields(view = self.view.name()))]
    pub fn start<P>(&mut self, provider: &P) -> Result<()>
    where
        P: DeviceProvider<Device = D>,
    {
        self.expect_state(PipelineState::Uninitialized)?;

        match self.open_session(provider) {
            Ok(session) => {
                self.session = Some(session);
                self.state = PipelineState::SessionOpen;
                Ok(())
            }
            Err(e) => {
                error!("Initialisation failed: {}", e);
                self.shutdown();
                Err(e)
            }
        }
    }

    fn open_session<P>(&mut self, provider: &P) -> Result<SensorSession<D>>
    where
        P: DeviceProvider<Device = D>,
    {
        let mut session = SensorSession::open(
            provider,
            self.settings.device_index,
            self.device_config.clone(),
        )?;

        if self.view.needs_calibration() {
            if let Err(e) = session
                .calibration()
                .and_then(|calibration| self.view.prepare(calibration))
            {
                session.shutdown();
                return Err(e);
            }
        }
        Ok(session)
    }

    /// Run the capture loop until quit, window close, frame limit or a fatal
    /// error, then tear down. The loop's error is returned after teardown.
    #[instrument(skip_all, fields(view = self.view.name()))]
    pub fn run(&mut self) -> Result<RunSummary> {
        self.expect_state(PipelineState::SessionOpen)?;
        self.state = PipelineState::Running;
        info!("Pipeline running");

        let result = self.run_loop();
        self.shutdown();

        match &result {
            Ok(summary) => info!(
                "Pipeline stopped after {} frame(s): {:?}",
                summary.frames, summary.reason
            ),
            Err(e) => error!("Pipeline aborted: {}", e),
        }
        result
    }

    fn run_loop(&mut self) -> Result<RunSummary> {
        let mut frames = 0u64;
        loop {
            if self.settings.max_frames.is_some_and(|limit| frames >= limit) {
                return Ok(RunSummary {
                    frames,
                    reason: StopReason::FrameLimit,
                });
            }

            let frame_start = Instant::now();

            // Update
            let capture = self.capture()?;

            // Draw
            let captured_at = capture.timestamp;
            let outputs = self.view.process(&capture)?;
            drop(capture);

            // Show
            for output in &outputs {
                match output {
                    Output::Image { surface, frame } => self.surface.show(surface, frame)?,
                    Output::Cloud { surface, cloud } => self.surface.show_cloud(surface, cloud)?,
                }
            }
            frames += 1;
            metrics::histogram!("frame_time_us").record(frame_start.elapsed().as_micros() as f64);
            let latency = captured_at.elapsed();
            metrics::histogram!("frame_latency_ms").record(latency.as_millis() as f64);

            // Wait key
            let quit_key = self.settings.quit_key;
            match self.surface.poll_event(self.settings.key_wait)? {
                Some(SurfaceEvent::Key(key)) if key.eq_ignore_ascii_case(&quit_key) => {
                    info!("Quit key pressed");
                    return Ok(RunSummary {
                        frames,
                        reason: StopReason::QuitKey,
                    });
                }
                Some(SurfaceEvent::Closed) => {
                    return Ok(RunSummary {
                        frames,
                        reason: StopReason::WindowClosed,
                    });
                }
                _ => {}
            }
        }
    }

    /// Next capture, retrying up to the configured limit
    fn capture(&mut self) -> Result<Capture> {
        let retries = self.settings.max_capture_retries;
        let wait = self.settings.capture_wait;
        let session = self.session.as_mut().ok_or(Error::InvalidState {
            actual: "without session",
            expected: PipelineState::Running.as_str(),
        })?;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match session.capture(wait) {
                Ok(capture) => {
                    metrics::counter!("captures_total").increment(1);
                    return Ok(capture);
                }
                Err(e) if attempts <= retries => {
                    warn!("Capture attempt {} failed, retrying: {}", attempts, e);
                    metrics::counter!("capture_retries_total").increment(1);
                }
                Err(SensorError::Timeout(_)) => return Err(Error::CaptureTimeout { attempts }),
                Err(e) => {
                    return Err(Error::CaptureUnavailable {
                        attempts,
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    fn shutdown(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }
        self.surface.close();
        if let Some(mut session) = self.session.take() {
            session.shutdown();
        }
        self.state = PipelineState::Stopped;
    }
}

impl<D: SensorDevice, S: Surface> Drop for FramePipeline<D, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
