//! SDL2 Window Display Module
//! One window per named surface, created on first use. Image surfaces are
//! streamed as textures; point clouds are splatted in software and streamed
//! the same way.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sdl2::event::{Event, WindowEvent};
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::{EventPump, Sdl, VideoSubsystem};
use tracing::{debug, info};

use super::cloud::{self, OrbitCamera};
use super::{DisplayFormat, DisplayFrame, Surface, SurfaceEvent};
use crate::error::{Error, Result};
use crate::pipeline::PointCloud;
use crate::DisplayConfig;

fn render_err(e: impl ToString) -> Error {
    Error::Render(e.to_string())
}

struct SurfaceWindow {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
}

impl SurfaceWindow {
    fn present(
        &mut self,
        format: PixelFormatEnum,
        width: u32,
        height: u32,
        pixels: &[u8],
        pitch: usize,
    ) -> Result<()> {
        let mut texture = self
            .texture_creator
            .create_texture_streaming(format, width, height)
            .map_err(render_err)?;

        texture.update(None, pixels, pitch).map_err(render_err)?;

        self.canvas.clear();
        self.canvas.copy(&texture, None, None).map_err(render_err)?;
        self.canvas.present();
        Ok(())
    }
}

/// SDL2 Window Display
/// Handles window creation, event polling and frame rendering for every
/// surface a pipeline shows.
pub struct Sdl2Display {
    _sdl_context: Sdl,
    video_subsystem: VideoSubsystem,
    event_pump: EventPump,
    windows: HashMap<String, SurfaceWindow>,
    config: DisplayConfig,
    /// Appended to window titles, e.g. "depth (kinect 0)"
    device_index: u32,
    quit_key: char,
    /// Set once a point cloud has been shown
    camera: Option<OrbitCamera>,
}

impl Sdl2Display {
    pub fn new(config: DisplayConfig, device_index: u32, quit_key: char) -> Result<Self> {
        let sdl_context = sdl2::init().map_err(render_err)?;
        let video_subsystem = sdl_context.video().map_err(render_err)?;
        let event_pump = sdl_context.event_pump().map_err(render_err)?;

        info!("SDL2 display initialised");
        Ok(Self {
            _sdl_context: sdl_context,
            video_subsystem,
            event_pump,
            windows: HashMap::new(),
            config,
            device_index,
            quit_key,
            camera: None,
        })
    }

    fn window(&mut self, name: &str, width: u32, height: u32) -> Result<&mut SurfaceWindow> {
        if !self.windows.contains_key(name) {
            // Shrink large streams to fit the configured window size
            let scale = (self.config.width as f32 / width as f32)
                .min(self.config.height as f32 / height as f32)
                .min(1.0);
            let title = format!("{} (kinect {})", name, self.device_index);
            let window = self
                .video_subsystem
                .window(
                    &title,
                    ((width as f32 * scale) as u32).max(1),
                    ((height as f32 * scale) as u32).max(1),
                )
                .position_centered()
                .resizable()
                .build()
                .map_err(render_err)?;

            let canvas = window.into_canvas().build().map_err(render_err)?;
            let texture_creator = canvas.texture_creator();
            debug!("Created window {:?}", title);
            self.windows.insert(
                name.to_owned(),
                SurfaceWindow {
                    canvas,
                    texture_creator,
                },
            );
        }
        self.windows
            .get_mut(name)
            .ok_or_else(|| Error::Render(format!("window {name} missing")))
    }
}

impl Surface for Sdl2Display {
    fn show(&mut self, name: &str, frame: &DisplayFrame) -> Result<()> {
        let render_start = Instant::now();
        let (width, height) = (frame.width(), frame.height());

        match frame.format() {
            DisplayFormat::Bgra32 => {
                // ARGB8888 is stored B, G, R, A in memory on little-endian hosts
                self.window(name, width, height)?.present(
                    PixelFormatEnum::ARGB8888,
                    width,
                    height,
                    frame.data(),
                    width as usize * 4,
                )?;
            }
            DisplayFormat::Gray8 => {
                let rgb: Vec<u8> = frame.data().iter().flat_map(|&v| [v, v, v]).collect();
                self.window(name, width, height)?.present(
                    PixelFormatEnum::RGB24,
                    width,
                    height,
                    &rgb,
                    width as usize * 3,
                )?;
            }
        }

        metrics::histogram!("render_time_us").record(render_start.elapsed().as_micros() as f64);
        Ok(())
    }

    fn show_cloud(&mut self, name: &str, cloud: &PointCloud) -> Result<()> {
        let render_start = Instant::now();
        let (width, height) = (self.config.width, self.config.height);
        let camera = *self.camera.get_or_insert_with(OrbitCamera::default);
        let rgb = cloud::rasterize(cloud, &camera, width, height);

        self.window(name, width, height)?.present(
            PixelFormatEnum::RGB24,
            width,
            height,
            &rgb,
            width as usize * 3,
        )?;

        metrics::histogram!("render_time_us").record(render_start.elapsed().as_micros() as f64);
        Ok(())
    }

    fn poll_event(&mut self, wait: Duration) -> Result<Option<SurfaceEvent>> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(event) = self
                .event_pump
                .wait_event_timeout(remaining.as_millis() as u32)
            else {
                return Ok(None);
            };

            match event {
                Event::Quit { .. } => {
                    info!("Quit event received");
                    return Ok(Some(SurfaceEvent::Closed));
                }
                Event::Window {
                    win_event: WindowEvent::Close,
                    ..
                } => {
                    info!("Window close requested");
                    return Ok(Some(SurfaceEvent::Closed));
                }
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => {
                    let key = keycode.name();
                    let event = cloud::route_key(&key, self.quit_key, self.camera.as_mut());
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                _ => {}
            }

            if remaining.is_zero() {
                return Ok(None);
            }
        }
    }

    fn close(&mut self) {
        if !self.windows.is_empty() {
            info!("Closing {} window(s)", self.windows.len());
            self.windows.clear();
        }
    }
}
