//! Per-scenario strategies plugged into the frame pipeline

use crate::display::DisplayFrame;
use crate::error::{Error, Result};
use crate::scaling;
use crate::sensor::{Calibration, CalibrationType, Capture, Channel, Image};
use crate::transform::Transformation;

use super::PointCloud;

/// Surface names, stable across frames
pub const COLOR_SURFACE: &str = "color";
pub const DEPTH_SURFACE: &str = "depth";
pub const INFRARED_SURFACE: &str = "infrared";
pub const TRANSFORMED_COLOR_SURFACE: &str = "transformed color";
pub const TRANSFORMED_DEPTH_SURFACE: &str = "transformed depth";
pub const POINT_CLOUD_SURFACE: &str = "point cloud";

/// One buffer ready to be shown
#[derive(Debug, Clone)]
pub enum Output {
    Image {
        surface: &'static str,
        frame: DisplayFrame,
    },
    Cloud {
        surface: &'static str,
        cloud: PointCloud,
    },
}

impl Output {
    pub fn surface(&self) -> &'static str {
        match self {
            Output::Image { surface, .. } | Output::Cloud { surface, .. } => *surface,
        }
    }
}

/// What a pipeline does with each capture
pub trait View {
    fn name(&self) -> &'static str;

    /// Whether `prepare` needs the session calibration
    fn needs_calibration(&self) -> bool {
        false
    }

    /// Session-scoped setup, called once before the first capture
    fn prepare(&mut self, _calibration: Calibration) -> Result<()> {
        Ok(())
    }

    /// Extract, transform and scale one capture into display outputs
    fn process(&self, capture: &Capture) -> Result<Vec<Output>>;
}

fn require(capture: &Capture, channel: Channel) -> Result<&Image> {
    capture
        .image(channel)
        .ok_or(Error::MissingChannel(channel))
}

/// A view of exactly one channel, scaled for display
pub trait ChannelPolicy {
    const CHANNEL: Channel;

    fn surface_name(&self) -> &'static str;

    fn extract<'a>(&self, capture: &'a Capture) -> Result<&'a Image> {
        require(capture, Self::CHANNEL)
    }

    fn scale(&self, raw: &Image) -> DisplayFrame;
}

/// Adapts a `ChannelPolicy` into a `View`
#[derive(Debug, Default)]
pub struct ChannelView<P>(pub P);

impl<P: ChannelPolicy> View for ChannelView<P> {
    fn name(&self) -> &'static str {
        self.0.surface_name()
    }

    fn process(&self, capture: &Capture) -> Result<Vec<Output>> {
        let raw = self.0.extract(capture)?;
        Ok(vec![Output::Image {
            surface: self.0.surface_name(),
            frame: self.0.scale(raw),
        }])
    }
}

#[derive(Debug, Default)]
pub struct ColorPolicy;

impl ChannelPolicy for ColorPolicy {
    const CHANNEL: Channel = Channel::Color;

    fn surface_name(&self) -> &'static str {
        COLOR_SURFACE
    }

    fn scale(&self, raw: &Image) -> DisplayFrame {
        scaling::color_to_display(raw)
    }
}

#[derive(Debug, Default)]
pub struct DepthPolicy;

impl ChannelPolicy for DepthPolicy {
    const CHANNEL: Channel = Channel::Depth;

    fn surface_name(&self) -> &'static str {
        DEPTH_SURFACE
    }

    fn scale(&self, raw: &Image) -> DisplayFrame {
        scaling::depth_to_display(raw)
    }
}

#[derive(Debug, Default)]
pub struct InfraredPolicy;

impl ChannelPolicy for InfraredPolicy {
    const CHANNEL: Channel = Channel::Infrared;

    fn surface_name(&self) -> &'static str {
        INFRARED_SURFACE
    }

    fn scale(&self, raw: &Image) -> DisplayFrame {
        scaling::infrared_to_display(raw)
    }
}

fn prepared(transformation: &Option<Transformation>) -> Result<&Transformation> {
    transformation.as_ref().ok_or(Error::InvalidState {
        actual: "unprepared",
        expected: "prepared",
    })
}

/// Color and depth side by side with each reprojected into the other camera
#[derive(Debug, Default)]
pub struct TransformationView {
    transformation: Option<Transformation>,
}

impl View for TransformationView {
    fn name(&self) -> &'static str {
        "transformation"
    }

    fn needs_calibration(&self) -> bool {
        true
    }

    fn prepare(&mut self, calibration: Calibration) -> Result<()> {
        self.transformation = Some(Transformation::new(calibration));
        Ok(())
    }

    fn process(&self, capture: &Capture) -> Result<Vec<Output>> {
        let transformation = prepared(&self.transformation)?;
        let color = require(capture, Channel::Color)?;
        let depth = require(capture, Channel::Depth)?;

        let transformed_color = transformation.color_image_to_depth_camera(depth, color)?;
        let transformed_depth = transformation.depth_image_to_color_camera(depth)?;

        Ok(vec![
            Output::Image {
                surface: COLOR_SURFACE,
                frame: scaling::color_to_display(color),
            },
            Output::Image {
                surface: DEPTH_SURFACE,
                frame: scaling::depth_to_display(depth),
            },
            Output::Image {
                surface: TRANSFORMED_COLOR_SURFACE,
                frame: scaling::color_to_display(&transformed_color),
            },
            Output::Image {
                surface: TRANSFORMED_DEPTH_SURFACE,
                frame: scaling::depth_to_display(&transformed_depth),
            },
        ])
    }
}

/// Colored point cloud in color camera space, next to the color image and
/// the depth it was built from
#[derive(Debug, Default)]
pub struct PointCloudView {
    transformation: Option<Transformation>,
}

impl View for PointCloudView {
    fn name(&self) -> &'static str {
        "point cloud"
    }

    fn needs_calibration(&self) -> bool {
        true
    }

    fn prepare(&mut self, calibration: Calibration) -> Result<()> {
        self.transformation = Some(Transformation::new(calibration));
        Ok(())
    }

    fn process(&self, capture: &Capture) -> Result<Vec<Output>> {
        let transformation = prepared(&self.transformation)?;
        let color = require(capture, Channel::Color)?;
        let depth = require(capture, Channel::Depth)?;

        let transformed_depth = transformation.depth_image_to_color_camera(depth)?;
        let xyz =
            transformation.depth_image_to_point_cloud(&transformed_depth, CalibrationType::Color)?;

        let cloud = PointCloud::assemble(&xyz, color)?;

        Ok(vec![
            Output::Image {
                surface: COLOR_SURFACE,
                frame: scaling::color_to_display(color),
            },
            Output::Image {
                surface: TRANSFORMED_DEPTH_SURFACE,
                frame: scaling::depth_to_display(&transformed_depth),
            },
            Output::Cloud {
                surface: POINT_CLOUD_SURFACE,
                cloud,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::synthetic::nominal_calibration;
    use crate::sensor::{ColorResolution, DepthMode, ImageFormat};

    fn capture_for(calibration: &Calibration, depth_mm: u16) -> Capture {
        let (dw, dh) = (calibration.depth.width, calibration.depth.height);
        let (cw, ch) = (calibration.color.width, calibration.color.height);
        Capture::new(0)
            .with_depth(Image::from_u16(
                ImageFormat::Depth16,
                dw,
                dh,
                &vec![depth_mm; (dw * dh) as usize],
            ))
            .with_color(Image::new(
                ImageFormat::ColorBgra32,
                cw,
                ch,
                [255u8, 0, 0, 255].repeat((cw * ch) as usize),
            ))
    }

    fn calibration() -> Calibration {
        nominal_calibration(DepthMode::NfovBinned2x2, ColorResolution::Res720p).unwrap()
    }

    #[test]
    fn channel_view_reports_missing_channel() {
        let view = ChannelView(InfraredPolicy);
        let err = view.process(&Capture::new(0)).unwrap_err();
        assert!(matches!(err, Error::MissingChannel(Channel::Infrared)));
    }

    #[test]
    fn transformation_view_shows_four_surfaces() {
        let calibration = calibration();
        let mut view = TransformationView::default();
        view.prepare(calibration.clone()).unwrap();
        let outputs = view.process(&capture_for(&calibration, 1500)).unwrap();
        let names: Vec<_> = outputs.iter().map(Output::surface).collect();
        assert_eq!(
            names,
            vec![
                COLOR_SURFACE,
                DEPTH_SURFACE,
                TRANSFORMED_COLOR_SURFACE,
                TRANSFORMED_DEPTH_SURFACE
            ]
        );
        let Output::Image { frame, .. } = &outputs[3] else {
            panic!("transformed depth should be an image");
        };
        assert_eq!((frame.width(), frame.height()), (1280, 720));
    }

    #[test]
    fn unprepared_transformation_is_an_error() {
        let view = PointCloudView::default();
        let err = view.process(&capture_for(&calibration(), 1000)).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn point_cloud_has_one_point_per_color_pixel() {
        let calibration = calibration();
        let mut view = PointCloudView::default();
        view.prepare(calibration.clone()).unwrap();
        let outputs = view.process(&capture_for(&calibration, 1000)).unwrap();
        let names: Vec<_> = outputs.iter().map(Output::surface).collect();
        assert_eq!(
            names,
            vec![COLOR_SURFACE, TRANSFORMED_DEPTH_SURFACE, POINT_CLOUD_SURFACE]
        );
        let Some(Output::Cloud { cloud, .. }) = outputs.last() else {
            panic!("the cloud should be shown last");
        };
        assert_eq!(cloud.len(), 1280 * 720);
        assert_eq!(cloud.colors.len(), cloud.positions.len());
        // Blue in BGRA order becomes blue in RGB order
        assert_eq!(cloud.colors[0], [0.0, 0.0, 1.0]);
    }
}
