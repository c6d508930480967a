use crate::error::{Error, Result};
use crate::scaling;
use crate::sensor::Image;

/// Parallel positions (mm) and RGB colors (0.0-1.0), one per grid pixel, row-major
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
}

impl PointCloud {
    /// Pair an XYZ image with the color image of the same geometry.
    ///
    /// Fails with `ConfigurationMismatch` instead of misaligning the arrays
    /// when the two grids differ.
    pub fn assemble(xyz: &Image, color: &Image) -> Result<Self> {
        if !xyz.same_size(color) {
            return Err(Error::ConfigurationMismatch {
                what: "color",
                width: color.width(),
                height: color.height(),
                expected_width: xyz.width(),
                expected_height: xyz.height(),
            });
        }
        Ok(Self {
            positions: scaling::point_positions(xyz),
            colors: scaling::point_colors(color),
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
