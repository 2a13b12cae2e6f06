//! Orbit controls.
//!
//! Left-drag rotates the eye around a fixed target, the mouse wheel and a
//! middle-button drag dolly towards or away from it. Input only accumulates deltas in spherical
//! coordinates; [`OrbitController::update`] applies them once per frame. With
//! damping enabled each frame applies a fraction of the pending delta and the
//! rest decays, which gives the camera its inertia after releasing the mouse.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Point3, Vector3};
use instant::Duration;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

use crate::{camera::Camera, config::ControlsConfig};

const EPS: f32 = 0.000001;
/// Pixel based wheel deltas (touchpads, browsers) are folded into line steps.
const PIXELS_PER_LINE: f64 = 100.0;

/// Spherical coordinates around +Y: `theta` is the azimuth from +Z towards +X,
/// `phi` the polar angle from +Y.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Debug)]
pub struct OrbitController {
    pub target: Point3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub enable_zoom: bool,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pending: Spherical,
    scale: f32,
    rotating: bool,
    dollying: bool,
    last_cursor: Option<PhysicalPosition<f64>>,
    viewport_height: f32,
}

impl OrbitController {
    pub fn new(config: &ControlsConfig, viewport_height: u32) -> Self {
        Self {
            target: config.target.into(),
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            rotate_speed: config.rotate_speed,
            enable_zoom: config.enable_zoom,
            zoom_speed: config.zoom_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_polar_angle: config.min_polar_angle,
            max_polar_angle: config.max_polar_angle,
            pending: Spherical::default(),
            scale: 1.0,
            rotating: false,
            dollying: false,
            last_cursor: None,
            viewport_height: viewport_height.max(1) as f32,
        }
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        if height > 0 {
            self.viewport_height = height as f32;
        }
    }

    /// Feed a window event. Returns whether the controller consumed it.
    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.rotating = *state == ElementState::Pressed;
                true
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Middle,
                ..
            } => {
                self.dollying = *state == ElementState::Pressed;
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let consumed = match self.last_cursor {
                    Some(last) if self.rotating => {
                        self.handle_drag(position.x - last.x, position.y - last.y);
                        true
                    }
                    Some(last) if self.dollying => self.handle_dolly_drag(position.y - last.y),
                    _ => false,
                };
                self.last_cursor = Some(*position);
                consumed
            }
            WindowEvent::CursorLeft { .. } => {
                self.last_cursor = None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => f64::from(*y),
                    MouseScrollDelta::PixelDelta(pos) => pos.y / PIXELS_PER_LINE,
                };
                self.handle_scroll(lines)
            }
            _ => false,
        }
    }

    /// Rotate by a pointer drag of `dx`/`dy` pixels. A drag across the full
    /// viewport height is one full turn.
    pub fn handle_drag(&mut self, dx: f64, dy: f64) {
        let turn = 2.0 * PI * self.rotate_speed / self.viewport_height;
        self.rotate_left(dx as f32 * turn);
        self.rotate_up(dy as f32 * turn);
    }

    /// Positive `lines` scroll away from the user and move the camera closer.
    pub fn handle_scroll(&mut self, lines: f64) -> bool {
        if !self.enable_zoom || lines == 0.0 {
            return false;
        }
        let step = self.zoom_scale();
        if lines > 0.0 {
            self.scale *= step;
        } else {
            self.scale /= step;
        }
        true
    }

    /// Dragging down moves away from the target, dragging up moves closer.
    /// Every move is one wheel step regardless of its length.
    pub fn handle_dolly_drag(&mut self, dy: f64) -> bool {
        if !self.enable_zoom || dy == 0.0 {
            return false;
        }
        let step = self.zoom_scale();
        if dy > 0.0 {
            self.scale /= step;
        } else {
            self.scale *= step;
        }
        true
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.pending.theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.pending.phi -= angle;
    }

    fn zoom_scale(&self) -> f32 {
        0.95_f32.powf(self.zoom_speed)
    }

    /// Per-frame damping fraction. `damping_factor` is defined for a 60 Hz
    /// frame, other frame times are converted so the decay rate is the same.
    fn damping(&self, dt: Duration) -> f32 {
        let frames = dt.as_secs_f32() * 60.0;
        if frames <= 0.0 {
            return 0.0;
        }
        1.0 - (1.0 - self.damping_factor.clamp(0.0, 1.0)).powf(frames)
    }

    /// Move the camera according to the accumulated input. Returns whether the
    /// eye position changed noticeably.
    pub fn update(&mut self, camera: &mut Camera, dt: Duration) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);

        let fraction = if self.enable_damping {
            self.damping(dt)
        } else {
            1.0
        };
        spherical.theta += self.pending.theta * fraction;
        spherical.phi += self.pending.phi * fraction;

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        let position = self.target + spherical.to_offset();
        let moved = (position - camera.position).magnitude2() > EPS;
        camera.position = position;
        camera.target = self.target;

        if self.enable_damping {
            self.pending.theta *= 1.0 - fraction;
            self.pending.phi *= 1.0 - fraction;
        } else {
            self.pending = Spherical::default();
        }
        self.scale = 1.0;

        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_micros(16_667);

    fn controller(enable_damping: bool) -> OrbitController {
        let config = ControlsConfig {
            enable_damping,
            ..Default::default()
        };
        OrbitController::new(&config, 720)
    }

    fn camera() -> Camera {
        Camera::new((15.0, 5.0, 5.0), (0.0, 0.5, 0.0))
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn spherical_round_trip_recovers_offset() {
        let offset = Vector3::new(15.0, 4.5, 5.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!(approx(back.x, offset.x) && approx(back.y, offset.y) && approx(back.z, offset.z));
    }

    #[test]
    fn idle_update_keeps_camera_and_distance() {
        let mut controller = controller(true);
        let mut camera = camera();
        let before = (camera.position - controller.target).magnitude();
        assert!(!controller.update(&mut camera, FRAME));
        let after = (camera.position - controller.target).magnitude();
        assert!(approx(before, after));
    }

    #[test]
    fn undamped_drag_applies_full_rotation_at_once() {
        let mut controller = controller(false);
        let mut camera = camera();
        let before = Spherical::from_offset(camera.position - controller.target);
        // A quarter of the viewport height is a quarter turn.
        controller.handle_drag(180.0, 0.0);
        assert!(controller.update(&mut camera, FRAME));
        let after = Spherical::from_offset(camera.position - controller.target);
        assert!(approx(after.theta, before.theta - PI / 2.0));
        assert!(approx(after.radius, before.radius));
        assert!(!controller.update(&mut camera, FRAME));
    }

    #[test]
    fn damped_drag_converges_to_the_same_rotation() {
        let mut damped = controller(true);
        let mut camera = camera();
        let before = Spherical::from_offset(camera.position - damped.target);
        damped.handle_drag(36.0, 0.0);

        damped.update(&mut camera, FRAME);
        let first = Spherical::from_offset(camera.position - damped.target);
        let expected_total = 2.0 * PI * 36.0 / 720.0;
        assert!(approx(before.theta - first.theta, expected_total * 0.05));

        for _ in 0..600 {
            damped.update(&mut camera, FRAME);
        }
        let settled = Spherical::from_offset(camera.position - damped.target);
        assert!(approx(before.theta - settled.theta, expected_total));
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let mut controller = controller(false);
        let mut camera = camera();
        controller.handle_drag(0.0, 10_000.0);
        controller.update(&mut camera, FRAME);
        let spherical = Spherical::from_offset(camera.position - controller.target);
        assert!(spherical.phi < 1e-3);
        assert!(camera.position.y > controller.target.y);
    }

    #[test]
    fn scrolling_dollies_and_respects_limits() {
        let mut controller = controller(true);
        controller.min_distance = 10.0;
        let mut camera = camera();
        let start = (camera.position - controller.target).magnitude();

        assert!(controller.handle_scroll(1.0));
        controller.update(&mut camera, FRAME);
        let closer = (camera.position - controller.target).magnitude();
        assert!(approx(closer, start * 0.95));

        for _ in 0..100 {
            controller.handle_scroll(1.0);
            controller.update(&mut camera, FRAME);
        }
        assert!(approx((camera.position - controller.target).magnitude(), 10.0));

        controller.handle_scroll(-1.0);
        controller.update(&mut camera, FRAME);
        assert!(approx((camera.position - controller.target).magnitude(), 10.0 / 0.95));
    }

    #[test]
    fn disabled_zoom_ignores_the_wheel() {
        let mut controller = controller(false);
        controller.enable_zoom = false;
        assert!(!controller.handle_scroll(3.0));
    }

    #[test]
    fn cursor_moves_only_rotate_while_dragging() {
        let mut controller = controller(false);
        let moved = |x: f64| WindowEvent::CursorMoved {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            position: PhysicalPosition::new(x, 10.0),
        };
        assert!(!controller.handle_window_events(&moved(0.0)));
        assert!(!controller.handle_window_events(&moved(50.0)));

        controller.rotating = true;
        assert!(controller.handle_window_events(&moved(80.0)));
        assert!(controller.pending.theta < 0.0);
    }

    #[test]
    fn middle_drag_dollies_one_step_per_move() {
        let mut controller = controller(false);
        let mut camera = camera();
        let start = (camera.position - controller.target).magnitude();
        let moved = |y: f64| WindowEvent::CursorMoved {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            position: PhysicalPosition::new(10.0, y),
        };
        controller.handle_window_events(&moved(100.0));

        controller.dollying = true;
        assert!(controller.handle_window_events(&moved(140.0)));
        controller.update(&mut camera, FRAME);
        let farther = (camera.position - controller.target).magnitude();
        assert!(approx(farther, start / 0.95));

        assert!(controller.handle_window_events(&moved(139.0)));
        controller.update(&mut camera, FRAME);
        assert!(approx((camera.position - controller.target).magnitude(), start));
        assert_eq!(controller.pending, Spherical::default());

        controller.enable_zoom = false;
        assert!(!controller.handle_dolly_drag(5.0));
    }
}
