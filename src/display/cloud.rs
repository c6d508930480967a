//! Software point splatting with an orbit camera

use super::SurfaceEvent;
use crate::pipeline::PointCloud;

const BACKGROUND: [u8; 3] = [24, 24, 28];
const NEAR_PLANE_MM: f32 = 50.0;
const MAX_PITCH: f32 = 85.0 * std::f32::consts::PI / 180.0;

/// Camera orbiting a target point, in sensor space (X right, Y down, Z forward)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub yaw: f32,
    pub pitch: f32,
    /// Millimetres from eye to target
    pub distance: f32,
    pub target: [f32; 3],
    /// Horizontal field of view, degrees
    pub fov: f32,
}

impl Default for OrbitCamera {
    /// Eye at the sensor origin looking down +Z
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: 1500.0,
            target: [0.0, 0.0, 1500.0],
            fov: 90.0,
        }
    }
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = dot(v, v).sqrt();
    [v[0] / len, v[1] / len, v[2] / len]
}

impl OrbitCamera {
    fn forward(&self) -> [f32; 3] {
        [
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        ]
    }

    pub fn eye(&self) -> [f32; 3] {
        let f = self.forward();
        [
            self.target[0] - f[0] * self.distance,
            self.target[1] - f[1] * self.distance,
            self.target[2] - f[2] * self.distance,
        ]
    }

    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        self.yaw += yaw;
        self.pitch = (self.pitch + pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.distance = (self.distance * factor).clamp(200.0, 20_000.0);
    }

    /// Apply a navigation key by SDL key name; false if the key is not bound
    pub fn handle_key(&mut self, key: &str) -> bool {
        const STEP: f32 = 5.0 * std::f32::consts::PI / 180.0;
        match key {
            "Left" => self.rotate(-STEP, 0.0),
            "Right" => self.rotate(STEP, 0.0),
            "Up" => self.rotate(0.0, -STEP),
            "Down" => self.rotate(0.0, STEP),
            "=" | "+" | "Keypad +" => self.zoom(0.9),
            "-" | "Keypad -" => self.zoom(1.1),
            "R" => *self = Self::default(),
            _ => return false,
        }
        true
    }
}

/// Turn an SDL key name into a surface event.
///
/// The quit key always reaches the pipeline. Other keys drive `camera` when a
/// cloud is on screen; single-character keys it does not bind are reported.
pub fn route_key(
    key: &str,
    quit_key: char,
    camera: Option<&mut OrbitCamera>,
) -> Option<SurfaceEvent> {
    let mut chars = key.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c.to_ascii_lowercase()),
        _ => None,
    };

    if let Some(c) = single.filter(|c| c.eq_ignore_ascii_case(&quit_key)) {
        return Some(SurfaceEvent::Key(c));
    }
    if camera.is_some_and(|camera| camera.handle_key(key)) {
        return None;
    }
    single.map(SurfaceEvent::Key)
}

/// Splat `cloud` into a `width` x `height` RGB24 buffer, nearest point wins.
///
/// Invalid (0, 0, 0) points are skipped.
pub fn rasterize(cloud: &PointCloud, camera: &OrbitCamera, width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut rgb = BACKGROUND.repeat(w * h);
    let mut depth = vec![f32::INFINITY; w * h];

    let f = camera.forward();
    let r = normalize(cross([0.0, 1.0, 0.0], f));
    let d = cross(f, r);
    let eye = camera.eye();
    let focal = width as f32 / 2.0 / (camera.fov.to_radians() / 2.0).tan();

    for (p, color) in cloud.positions.iter().zip(&cloud.colors) {
        if *p == [0.0; 3] {
            continue;
        }
        let rel = [p[0] - eye[0], p[1] - eye[1], p[2] - eye[2]];
        let z = dot(rel, f);
        if z < NEAR_PLANE_MM {
            continue;
        }
        let x = (dot(rel, r) / z * focal + width as f32 / 2.0).floor();
        let y = (dot(rel, d) / z * focal + height as f32 / 2.0).floor();
        if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
            continue;
        }
        let i = y as usize * w + x as usize;
        if z < depth[i] {
            depth[i] = z;
            rgb[i * 3] = (color[0] * 255.0) as u8;
            rgb[i * 3 + 1] = (color[1] * 255.0) as u8;
            rgb[i * 3 + 2] = (color[2] * 255.0) as u8;
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_eye_is_sensor_origin() {
        let eye = OrbitCamera::default().eye();
        assert!(eye.iter().all(|c| c.abs() < 1e-3));
    }

    #[test]
    fn point_on_axis_lands_in_centre() {
        let cloud = PointCloud {
            positions: vec![[0.0, 0.0, 1000.0]],
            colors: vec![[1.0, 0.0, 0.0]],
        };
        let rgb = rasterize(&cloud, &OrbitCamera::default(), 8, 8);
        let i = (4 * 8 + 4) * 3;
        assert_eq!(&rgb[i..i + 3], &[255, 0, 0]);
    }

    #[test]
    fn nearest_point_wins_and_invalid_points_are_skipped() {
        let cloud = PointCloud {
            positions: vec![[0.0, 0.0, 2000.0], [0.0, 0.0, 1000.0], [0.0; 3]],
            colors: vec![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0, 1.0]],
        };
        let rgb = rasterize(&cloud, &OrbitCamera::default(), 8, 8);
        let i = (4 * 8 + 4) * 3;
        assert_eq!(&rgb[i..i + 3], &[0, 0, 255]);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = OrbitCamera::default();
        for _ in 0..100 {
            camera.handle_key("Down");
        }
        assert!(camera.pitch <= MAX_PITCH);
        assert!(!camera.handle_key("Q"));
    }

    #[test]
    fn quit_key_is_never_taken_by_the_camera() {
        let mut camera = OrbitCamera::default();
        camera.zoom(2.0);
        assert_eq!(
            route_key("R", 'r', Some(&mut camera)),
            Some(SurfaceEvent::Key('r'))
        );
        // Still zoomed: the reset binding did not fire
        assert_eq!(camera.distance, 3000.0);
    }

    #[test]
    fn navigation_keys_only_move_a_visible_cloud() {
        let mut camera = OrbitCamera::default();
        assert_eq!(route_key("Left", 'q', Some(&mut camera)), None);
        assert!(camera.yaw < 0.0);

        // Without a cloud, bound keys pass through like any other key
        assert_eq!(route_key("=", 'q', None), Some(SurfaceEvent::Key('=')));
        assert_eq!(route_key("R", 'q', None), Some(SurfaceEvent::Key('r')));
        assert_eq!(route_key("Left", 'q', None), None);
    }
}
