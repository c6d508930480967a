use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Pixel layouts a sensor image can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    ColorMjpg,
    ColorNv12,
    ColorYuy2,
    ColorBgra32,
    Depth16,
    Ir16,
    /// Three little-endian i16 per pixel (X, Y, Z in millimetres)
    Xyz16,
}

impl ImageFormat {
    /// Bytes per pixel for uncompressed formats
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            ImageFormat::ColorBgra32 => Some(4),
            ImageFormat::Depth16 | ImageFormat::Ir16 | ImageFormat::ColorYuy2 => Some(2),
            ImageFormat::Xyz16 => Some(6),
            ImageFormat::ColorMjpg | ImageFormat::ColorNv12 => None,
        }
    }
}

/// Channels a capture can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Color,
    Depth,
    Infrared,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Color => "color",
            Channel::Depth => "depth",
            Channel::Infrared => "infrared",
        })
    }
}

/// One sensor image with zero-copy semantics
#[derive(Debug, Clone)]
pub struct Image {
    /// Immutable pixel data - can be shared without copying
    data: Bytes,
    width: u32,
    height: u32,
    /// Row pitch in bytes
    stride: u32,
    format: ImageFormat,
}

impl Image {
    /// Wrap tightly packed pixel data.
    ///
    /// Panics if `data` is shorter than `width * height` pixels of `format`.
    pub fn new(format: ImageFormat, width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let bpp = format.bytes_per_pixel().unwrap_or(1);
        let stride = width * bpp;
        assert!(
            data.len() >= (stride * height) as usize,
            "{:?} image {}x{} needs {} bytes, got {}",
            format,
            width,
            height,
            stride * height,
            data.len()
        );
        Self {
            data,
            width,
            height,
            stride,
            format,
        }
    }

    /// Build a 16-bit image (depth or infrared) from native samples
    pub fn from_u16(format: ImageFormat, width: u32, height: u32, samples: &[u16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self::new(format, width, height, data)
    }

    /// Build an XYZ image from `[x, y, z]` millimetre triples
    pub fn from_xyz(width: u32, height: u32, points: &[[i16; 3]]) -> Self {
        let mut data = Vec::with_capacity(points.len() * 6);
        for point in points {
            for axis in point {
                data.extend_from_slice(&axis.to_le_bytes());
            }
        }
        Self::new(ImageFormat::Xyz16, width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// Same width and height as `other`
    pub fn same_size(&self, other: &Image) -> bool {
        self.width == other.width && self.height == other.height
    }

    fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let row_bytes = (self.width * self.format.bytes_per_pixel().unwrap_or(1)) as usize;
        self.data
            .chunks(self.stride as usize)
            .take(self.height as usize)
            .map(move |row| &row[..row_bytes])
    }

    /// Row-major 16-bit samples of a depth or infrared image
    pub fn u16_samples(&self) -> impl Iterator<Item = u16> + '_ {
        self.rows()
            .flat_map(|row| row.chunks_exact(2))
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    /// Row-major BGRA pixels of a color image
    pub fn bgra_pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.rows()
            .flat_map(|row| row.chunks_exact(4))
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Row-major points of an XYZ image
    pub fn xyz_points(&self) -> impl Iterator<Item = [i16; 3]> + '_ {
        self.rows().flat_map(|row| row.chunks_exact(6)).map(|p| {
            [
                i16::from_le_bytes([p[0], p[1]]),
                i16::from_le_bytes([p[2], p[3]]),
                i16::from_le_bytes([p[4], p[5]]),
            ]
        })
    }
}

/// One synchronized bundle of images from a single acquisition
#[derive(Debug, Clone)]
pub struct Capture {
    pub sequence: u64,

    /// Hardware timestamp if available
    pub device_timestamp: Option<Duration>,

    /// Host time of acquisition; the pipeline reports capture-to-show latency from it
    pub timestamp: Instant,

    color: Option<Image>,
    depth: Option<Image>,
    ir: Option<Image>,
}

impl Capture {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            device_timestamp: None,
            timestamp: Instant::now(),
            color: None,
            depth: None,
            ir: None,
        }
    }

    pub fn with_color(mut self, image: Image) -> Self {
        self.color = Some(image);
        self
    }

    pub fn with_depth(mut self, image: Image) -> Self {
        self.depth = Some(image);
        self
    }

    pub fn with_ir(mut self, image: Image) -> Self {
        self.ir = Some(image);
        self
    }

    pub fn with_device_timestamp(mut self, timestamp: Duration) -> Self {
        self.device_timestamp = Some(timestamp);
        self
    }

    pub fn color(&self) -> Option<&Image> {
        self.color.as_ref()
    }

    pub fn depth(&self) -> Option<&Image> {
        self.depth.as_ref()
    }

    pub fn ir(&self) -> Option<&Image> {
        self.ir.as_ref()
    }

    pub fn image(&self, channel: Channel) -> Option<&Image> {
        match channel {
            Channel::Color => self.color(),
            Channel::Depth => self.depth(),
            Channel::Infrared => self.ir(),
        }
    }
}
