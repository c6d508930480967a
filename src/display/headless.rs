//! Surface that only counts what it is shown, for runs without a display

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info};

use super::{DisplayFrame, Surface, SurfaceEvent};
use crate::error::Result;
use crate::pipeline::PointCloud;

#[derive(Debug, Default)]
pub struct HeadlessSurface {
    shown: BTreeMap<String, u64>,
    closed: bool,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers presented per surface name
    pub fn shown(&self) -> &BTreeMap<String, u64> {
        &self.shown
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn count(&mut self, name: &str) {
        *self.shown.entry(name.to_owned()).or_default() += 1;
    }
}

impl Surface for HeadlessSurface {
    fn show(&mut self, name: &str, frame: &DisplayFrame) -> Result<()> {
        debug!(
            "{}: {}x{} {:?}",
            name,
            frame.width(),
            frame.height(),
            frame.format()
        );
        self.count(name);
        Ok(())
    }

    fn show_cloud(&mut self, name: &str, cloud: &PointCloud) -> Result<()> {
        debug!("{}: {} points", name, cloud.len());
        self.count(name);
        Ok(())
    }

    fn poll_event(&mut self, _wait: Duration) -> Result<Option<SurfaceEvent>> {
        Ok(None)
    }

    fn close(&mut self) {
        if !self.closed {
            info!("Headless surface presented {:?}", self.shown);
            self.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayFormat;

    #[test]
    fn counts_per_surface_name() {
        let mut surface = HeadlessSurface::new();
        let frame = DisplayFrame::new(DisplayFormat::Gray8, 1, 1, vec![0u8]);
        surface.show("depth", &frame).unwrap();
        surface.show("depth", &frame).unwrap();
        surface.show_cloud("point cloud", &PointCloud::default()).unwrap();
        assert_eq!(surface.shown()["depth"], 2);
        assert_eq!(surface.shown()["point cloud"], 1);
        assert_eq!(surface.poll_event(Duration::ZERO).unwrap(), None);
    }
}
