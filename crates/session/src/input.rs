//! Joystick-style input normalisation.
//!
//! Pointer positions over a circular control are turned into a [`GyroVector`]
//! whose components lie in `[-1, 1]`. The vector is published through a watch
//! channel so a running preview samples the latest value on every tick.

use tokio::sync::watch;

/// Normalised tilt fed into every frame request. Up is positive `y`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GyroVector {
    pub x: f32,
    pub y: f32,
}

impl GyroVector {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn as_pair(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// Visual handle displacement from the control's center, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HandleOffset {
    pub dx: f32,
    pub dy: f32,
}

/// A pointer gesture from any source (mouse, touch, script).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Moved { x: f32, y: f32 },
    Reset,
}

/// Fixed geometry of the circular control, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickGeometry {
    center_x: f32,
    center_y: f32,
    radius: f32,
}

impl JoystickGeometry {
    /// The usable radius is half the control minus half the handle, so the
    /// handle never leaves the control.
    pub fn new(center_x: f32, center_y: f32, control_size: f32, handle_size: f32) -> Self {
        Self {
            center_x,
            center_y,
            radius: control_size / 2.0 - handle_size / 2.0,
        }
    }

    /// Geometry for pointer coordinates relative to the control's top-left corner.
    pub fn local(control_size: f32, handle_size: f32) -> Self {
        Self::new(
            control_size / 2.0,
            control_size / 2.0,
            control_size,
            handle_size,
        )
    }

    pub fn center(&self) -> (f32, f32) {
        (self.center_x, self.center_y)
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Clamps the displacement to the usable radius and normalises it.
    /// A degenerate control (radius <= 0) always maps to the center.
    pub fn map(&self, x: f32, y: f32) -> (GyroVector, HandleOffset) {
        if self.radius <= 0.0 || !self.radius.is_finite() {
            return (GyroVector::ZERO, HandleOffset::default());
        }
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        let distance = dx.hypot(dy);
        if distance == 0.0 || !distance.is_finite() {
            return (GyroVector::ZERO, HandleOffset::default());
        }

        let (nx, ny) = if distance > self.radius {
            (dx / distance, dy / distance)
        } else {
            (dx / self.radius, dy / self.radius)
        };
        let nx = nx.clamp(-1.0, 1.0);
        let ny = ny.clamp(-1.0, 1.0);
        let handle = HandleOffset {
            dx: nx * self.radius,
            dy: ny * self.radius,
        };
        // Screen y grows downward.
        let gyro = GyroVector::new(nx, if ny == 0.0 { 0.0 } else { -ny });
        (gyro, handle)
    }
}

pub struct InputMapper {
    geometry: JoystickGeometry,
    handle: HandleOffset,
    gyro: watch::Sender<GyroVector>,
}

impl InputMapper {
    pub fn new(geometry: JoystickGeometry) -> Self {
        let (gyro, _) = watch::channel(GyroVector::ZERO);
        Self {
            geometry,
            handle: HandleOffset::default(),
            gyro,
        }
    }

    pub fn geometry(&self) -> &JoystickGeometry {
        &self.geometry
    }

    pub fn apply(&mut self, event: PointerEvent) -> GyroVector {
        match event {
            PointerEvent::Moved { x, y } => self.pointer_moved(x, y),
            PointerEvent::Reset => {
                self.reset();
                GyroVector::ZERO
            }
        }
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) -> GyroVector {
        let (gyro, handle) = self.geometry.map(x, y);
        self.handle = handle;
        self.gyro.send_replace(gyro);
        gyro
    }

    /// Recenters the handle. A running preview keeps running.
    pub fn reset(&mut self) {
        self.handle = HandleOffset::default();
        self.gyro.send_replace(GyroVector::ZERO);
    }

    pub fn gyro(&self) -> GyroVector {
        *self.gyro.borrow()
    }

    pub fn handle_offset(&self) -> HandleOffset {
        self.handle
    }

    pub fn subscribe(&self) -> watch::Receiver<GyroVector> {
        self.gyro.subscribe()
    }
}
