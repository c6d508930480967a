use std::fmt;

use clap::ValueEnum;

use super::view::{
    ChannelView, ColorPolicy, DepthPolicy, InfraredPolicy, PointCloudView, TransformationView,
    View,
};

/// The viewing scenarios the binary can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    Color,
    Depth,
    Infrared,
    Transformation,
    PointCloud,
}

impl Scenario {
    pub fn view(self) -> Box<dyn View> {
        match self {
            Scenario::Color => Box::new(ChannelView(ColorPolicy)),
            Scenario::Depth => Box::new(ChannelView(DepthPolicy)),
            Scenario::Infrared => Box::new(ChannelView(InfraredPolicy)),
            Scenario::Transformation => Box::<TransformationView>::default(),
            Scenario::PointCloud => Box::<PointCloudView>::default(),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.view().name())
    }
}
