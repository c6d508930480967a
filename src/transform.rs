//! Calibration-bound transformations between depth and color camera spaces

use tracing::instrument;

use crate::error::{Error, Result};
use crate::sensor::{Calibration, CalibrationType, Image, ImageFormat, Intrinsics};

/// Reprojection and unprojection for one session's calibration
#[derive(Debug, Clone)]
pub struct Transformation {
    calibration: Calibration,
}

impl Transformation {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    /// Reproject a depth image into the color camera's geometry.
    ///
    /// Every valid depth pixel is splatted over the footprint its corners
    /// cover in the color image; overlaps keep the nearest depth. Color
    /// pixels no depth pixel reaches stay 0.
    #[instrument(skip_all)]
    pub fn depth_image_to_color_camera(&self, depth: &Image) -> Result<Image> {
        let depth_cam = &self.calibration.depth;
        let color_cam = &self.calibration.color;
        expect_size("depth", depth, depth_cam)?;

        let (cw, ch) = (color_cam.width as usize, color_cam.height as usize);
        let mut out = vec![0u16; cw * ch];
        let width = depth_cam.width as usize;

        for (i, mm) in depth.u16_samples().enumerate() {
            if mm == 0 {
                continue;
            }
            let (u, v) = ((i % width) as f32, (i / width) as f32);
            let d = mm as f32;

            let mut min = [f32::MAX; 2];
            let mut max = [f32::MIN; 2];
            let mut z = 0.0f32;
            for (du, dv) in [(-0.5, -0.5), (0.5, -0.5), (-0.5, 0.5), (0.5, 0.5)] {
                let p = self
                    .calibration
                    .depth_to_color
                    .apply(depth_cam.unproject(u + du, v + dv, d));
                let Some([x, y]) = color_cam.project(p) else {
                    z = 0.0;
                    break;
                };
                min = [min[0].min(x), min[1].min(y)];
                max = [max[0].max(x), max[1].max(y)];
                z = p[2];
            }
            if z <= 0.0 || z > u16::MAX as f32 {
                continue;
            }
            let value = z.round() as u16;

            // Pixel centres in [min, max); neighbouring footprints tile exactly
            let x0 = min[0].ceil().max(0.0) as i64;
            let y0 = min[1].ceil().max(0.0) as i64;
            let x1 = (max[0].ceil() as i64).min(cw as i64);
            let y1 = (max[1].ceil() as i64).min(ch as i64);
            for y in y0..y1 {
                for x in x0..x1 {
                    let slot = &mut out[y as usize * cw + x as usize];
                    if *slot == 0 || value < *slot {
                        *slot = value;
                    }
                }
            }
        }

        Ok(Image::from_u16(
            ImageFormat::Depth16,
            color_cam.width,
            color_cam.height,
            &out,
        ))
    }

    /// Resample a color image into the depth camera's geometry.
    ///
    /// Each valid depth pixel takes the color found where its 3D point lands
    /// in the color image; pixels without depth become transparent black.
    #[instrument(skip_all)]
    pub fn color_image_to_depth_camera(&self, depth: &Image, color: &Image) -> Result<Image> {
        let depth_cam = &self.calibration.depth;
        let color_cam = &self.calibration.color;
        expect_size("depth", depth, depth_cam)?;
        expect_size("color", color, color_cam)?;

        let width = depth_cam.width as usize;
        let stride = color.stride() as usize;
        let pixels = color.data();
        let mut out = vec![0u8; depth.pixel_count() * 4];

        for (i, mm) in depth.u16_samples().enumerate() {
            if mm == 0 {
                continue;
            }
            let (u, v) = ((i % width) as f32, (i / width) as f32);
            let p = self
                .calibration
                .depth_to_color
                .apply(depth_cam.unproject(u, v, mm as f32));
            let Some([x, y]) = color_cam.project(p) else {
                continue;
            };
            let (x, y) = (x.round() as i64, y.round() as i64);
            if !color_cam.contains(x, y) {
                continue;
            }
            let src = y as usize * stride + x as usize * 4;
            out[i * 4..i * 4 + 4].copy_from_slice(&pixels[src..src + 4]);
        }

        Ok(Image::new(
            ImageFormat::ColorBgra32,
            depth_cam.width,
            depth_cam.height,
            out,
        ))
    }

    /// Unproject a depth image into XYZ millimetres of `camera`'s space.
    ///
    /// The depth image must already be in that camera's geometry. Pixels
    /// without depth produce (0, 0, 0).
    #[instrument(skip_all, fields(camera = ?camera))]
    pub fn depth_image_to_point_cloud(
        &self,
        depth: &Image,
        camera: CalibrationType,
    ) -> Result<Image> {
        let intrinsics = self.calibration.intrinsics(camera);
        expect_size("depth", depth, intrinsics)?;

        let width = intrinsics.width as usize;
        let points: Vec<[i16; 3]> = depth
            .u16_samples()
            .enumerate()
            .map(|(i, mm)| {
                if mm == 0 {
                    return [0; 3];
                }
                let (u, v) = ((i % width) as f32, (i / width) as f32);
                let [x, y, z] = intrinsics.unproject(u, v, mm as f32);
                [saturate_i16(x), saturate_i16(y), saturate_i16(z)]
            })
            .collect();

        Ok(Image::from_xyz(intrinsics.width, intrinsics.height, &points))
    }
}

fn saturate_i16(v: f32) -> i16 {
    v.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn expect_size(what: &'static str, image: &Image, intrinsics: &Intrinsics) -> Result<()> {
    if image.width() == intrinsics.width && image.height() == intrinsics.height {
        return Ok(());
    }
    Err(Error::ConfigurationMismatch {
        what,
        width: image.width(),
        height: image.height(),
        expected_width: intrinsics.width,
        expected_height: intrinsics.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{ColorResolution, DepthMode, Extrinsics};

    fn calibration(extrinsics: Extrinsics) -> Calibration {
        Calibration::nominal(DepthMode::NfovBinned2x2, ColorResolution::Res720p, extrinsics)
            .unwrap()
    }

    fn uniform_depth(cal: &Calibration, mm: u16) -> Image {
        let (w, h) = (cal.depth.width, cal.depth.height);
        Image::from_u16(ImageFormat::Depth16, w, h, &vec![mm; (w * h) as usize])
    }

    #[test]
    fn reprojected_depth_has_color_geometry() {
        let cal = calibration(Extrinsics::IDENTITY);
        let transformation = Transformation::new(cal.clone());
        let out = transformation
            .depth_image_to_color_camera(&uniform_depth(&cal, 2000))
            .unwrap();
        assert_eq!((out.width(), out.height()), (1280, 720));
        assert_eq!(out.format(), ImageFormat::Depth16);

        // The color camera is wider than the depth camera: the centre is
        // covered, the far left edge is not.
        let samples: Vec<u16> = out.u16_samples().collect();
        assert_eq!(samples[360 * 1280 + 640], 2000);
        assert_eq!(samples[360 * 1280], 0);
    }

    #[test]
    fn reprojection_leaves_no_holes_inside_coverage() {
        let cal = calibration(Extrinsics::IDENTITY);
        let transformation = Transformation::new(cal.clone());
        let out = transformation
            .depth_image_to_color_camera(&uniform_depth(&cal, 1500))
            .unwrap();
        let samples: Vec<u16> = out.u16_samples().collect();
        let row = 360 * 1280;
        assert!(samples[row + 500..row + 780].iter().all(|&d| d == 1500));
    }

    #[test]
    fn invalid_depth_stays_invalid() {
        let cal = calibration(Extrinsics::IDENTITY);
        let transformation = Transformation::new(cal.clone());
        let out = transformation
            .depth_image_to_color_camera(&uniform_depth(&cal, 0))
            .unwrap();
        assert!(out.u16_samples().all(|d| d == 0));
    }

    #[test]
    fn point_cloud_unprojects_with_camera_intrinsics() {
        let cal = calibration(Extrinsics::IDENTITY);
        let transformation = Transformation::new(cal.clone());
        let xyz = transformation
            .depth_image_to_point_cloud(&uniform_depth(&cal, 1000), CalibrationType::Depth)
            .unwrap();
        assert_eq!(xyz.format(), ImageFormat::Xyz16);
        assert_eq!(xyz.pixel_count(), cal.depth.width as usize * cal.depth.height as usize);

        let first = xyz.xyz_points().next().unwrap();
        let expected = cal.depth.unproject(0.0, 0.0, 1000.0);
        assert_eq!(first[0], expected[0].round() as i16);
        assert_eq!(first[1], expected[1].round() as i16);
        assert_eq!(first[2], 1000);
        assert!(first[0] < 0 && first[1] < 0);
    }

    #[test]
    fn point_cloud_rejects_wrong_geometry() {
        let cal = calibration(Extrinsics::IDENTITY);
        let transformation = Transformation::new(cal.clone());
        let err = transformation
            .depth_image_to_point_cloud(&uniform_depth(&cal, 1000), CalibrationType::Color)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationMismatch { .. }));
    }

    #[test]
    fn color_to_depth_samples_matching_pixels() {
        let cal = calibration(Extrinsics::IDENTITY);
        let transformation = Transformation::new(cal.clone());
        let (cw, ch) = (cal.color.width, cal.color.height);
        let color = Image::new(
            ImageFormat::ColorBgra32,
            cw,
            ch,
            [10u8, 20, 30, 255].repeat((cw * ch) as usize),
        );

        let mut depth = vec![1200u16; (cal.depth.width * cal.depth.height) as usize];
        depth[0] = 0;
        let (dw, dh) = (cal.depth.width, cal.depth.height);
        let depth = Image::from_u16(ImageFormat::Depth16, dw, dh, &depth);

        let out = transformation.color_image_to_depth_camera(&depth, &color).unwrap();
        assert!(out.same_size(&depth));
        let pixels: Vec<[u8; 4]> = out.bgra_pixels().collect();
        assert_eq!(pixels[0], [0, 0, 0, 0]);
        let centre = (cal.depth.height / 2 * cal.depth.width + cal.depth.width / 2) as usize;
        assert_eq!(pixels[centre], [10, 20, 30, 255]);
    }
}
