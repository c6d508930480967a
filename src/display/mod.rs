pub mod cloud;
#[cfg(feature = "sdl-display")]
pub mod display;
pub mod headless;

use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;
use crate::pipeline::PointCloud;

#[cfg(feature = "sdl-display")]
pub use display::Sdl2Display;
pub use headless::HeadlessSurface;

/// Pixel layouts a surface accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    Gray8,
    /// B, G, R, A bytes per pixel
    Bgra32,
}

impl DisplayFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            DisplayFormat::Gray8 => 1,
            DisplayFormat::Bgra32 => 4,
        }
    }
}

/// A display-ready, tightly packed 8-bit buffer
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    width: u32,
    height: u32,
    format: DisplayFormat,
    data: Bytes,
}

impl DisplayFrame {
    pub fn new(format: DisplayFormat, width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * format.bytes_per_pixel()
        );
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> DisplayFormat {
        self.format
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// User input reported by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Key(char),
    Closed,
}

/// Where display buffers end up
pub trait Surface {
    /// Present `frame` in the surface called `name`, creating it on first use
    fn show(&mut self, name: &str, frame: &DisplayFrame) -> Result<()>;

    /// Present a point cloud in the surface called `name`
    fn show_cloud(&mut self, name: &str, cloud: &PointCloud) -> Result<()>;

    /// Wait up to `wait` for a key press or close request
    fn poll_event(&mut self, wait: Duration) -> Result<Option<SurfaceEvent>>;

    /// Release windows; called once at pipeline shutdown
    fn close(&mut self);
}
