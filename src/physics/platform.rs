use super::geometry::Rect;
use super::ContactFlags;
use super::body::FRICTION;

pub const ICE_FRICTION: f64 = 0.02;
pub const DISAPPEAR_RESPAWN_SECONDS: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformKind {
    Solid,
    /// Patrols horizontally between its origin and `end_x`, carrying riders.
    Moving { end_x: f64, speed: f64, direction: f64 },
    /// Starts a countdown when landed on, vanishes, then respawns.
    Disappearing {
        delay: f64,
        timer: f64,
        activated: bool,
        visible: bool,
    },
    /// Vertical carrier that waits at each end of its track.
    Elevator {
        end_y: f64,
        speed: f64,
        wait: f64,
        wait_timer: f64,
        direction: f64,
    },
    /// Only blocks bodies coming down onto it from above.
    OneWay,
    Bouncy { strength: f64 },
    Ice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    pub rect: Rect,
    pub kind: PlatformKind,
    origin: Rect,
    initial_kind: PlatformKind,
}

impl Platform {
    pub fn new(rect: Rect, kind: PlatformKind) -> Self {
        Self {
            rect,
            origin: rect,
            initial_kind: kind.clone(),
            kind,
        }
    }

    pub fn solid(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(Rect::new(x, y, w, h), PlatformKind::Solid)
    }

    pub fn moving(x: f64, y: f64, w: f64, h: f64, end_x: f64, speed: f64) -> Self {
        Self::new(
            Rect::new(x, y, w, h),
            PlatformKind::Moving {
                end_x,
                speed,
                direction: 1.0,
            },
        )
    }

    pub fn disappearing(x: f64, y: f64, w: f64, h: f64, delay: f64) -> Self {
        Self::new(
            Rect::new(x, y, w, h),
            PlatformKind::Disappearing {
                delay,
                timer: 0.0,
                activated: false,
                visible: true,
            },
        )
    }

    pub fn elevator(x: f64, start_y: f64, w: f64, h: f64, end_y: f64, speed: f64, wait: f64) -> Self {
        Self::new(
            Rect::new(x, start_y, w, h),
            PlatformKind::Elevator {
                end_y,
                speed,
                wait,
                wait_timer: wait,
                direction: if end_y < start_y { -1.0 } else { 1.0 },
            },
        )
    }

    pub fn one_way(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(Rect::new(x, y, w, h), PlatformKind::OneWay)
    }

    pub fn bouncy(x: f64, y: f64, w: f64, h: f64, strength: f64) -> Self {
        Self::new(Rect::new(x, y, w, h), PlatformKind::Bouncy { strength })
    }

    pub fn ice(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(Rect::new(x, y, w, h), PlatformKind::Ice)
    }

    pub fn is_solid(&self) -> bool {
        !matches!(self.kind, PlatformKind::Disappearing { visible: false, .. })
    }

    pub fn is_one_way(&self) -> bool {
        matches!(self.kind, PlatformKind::OneWay)
    }

    /// Horizontal damping applied to a body standing on this platform.
    pub fn friction(&self) -> f64 {
        match self.kind {
            PlatformKind::Ice => ICE_FRICTION,
            _ => FRICTION,
        }
    }

    /// Flags raised for a body resting on this platform.
    pub fn surface_flags(&self) -> ContactFlags {
        match self.kind {
            PlatformKind::Ice => ContactFlags::ON_ICE,
            PlatformKind::Bouncy { .. } => ContactFlags::ON_BOUNCY,
            PlatformKind::OneWay => ContactFlags::ON_ONE_WAY,
            PlatformKind::Disappearing { .. } => ContactFlags::DISAPPEAR_REQUESTED,
            PlatformKind::Elevator { .. } => ContactFlags::RIDING_ELEVATOR,
            PlatformKind::Solid | PlatformKind::Moving { .. } => ContactFlags::empty(),
        }
    }

    pub fn bounce_strength(&self) -> Option<f64> {
        match self.kind {
            PlatformKind::Bouncy { strength } => Some(strength),
            _ => None,
        }
    }

    /// Starts the disappear countdown; no-op for other kinds.
    pub fn activate(&mut self) {
        if let PlatformKind::Disappearing {
            activated, visible, ..
        } = &mut self.kind
        {
            if *visible {
                *activated = true;
            }
        }
    }

    /// Advances the platform and returns the `(dx, dy)` it moved, which the
    /// level applies to a rider.
    pub fn update(&mut self, dt: f64) -> (f64, f64) {
        let origin = self.origin;
        match &mut self.kind {
            PlatformKind::Moving {
                end_x,
                speed,
                direction,
            } => {
                let before = self.rect.x;
                let (low, high) = if *end_x >= origin.x {
                    (origin.x, *end_x)
                } else {
                    (*end_x, origin.x)
                };
                self.rect.x += *speed * *direction * dt;
                if self.rect.x >= high {
                    self.rect.x = high;
                    *direction = -1.0;
                } else if self.rect.x <= low {
                    self.rect.x = low;
                    *direction = 1.0;
                }
                (self.rect.x - before, 0.0)
            }
            PlatformKind::Disappearing {
                delay,
                timer,
                activated,
                visible,
            } => {
                if *visible && *activated {
                    *timer += dt;
                    if *timer >= *delay {
                        *visible = false;
                        *timer = 0.0;
                    }
                } else if !*visible {
                    *timer += dt;
                    if *timer >= DISAPPEAR_RESPAWN_SECONDS {
                        *visible = true;
                        *activated = false;
                        *timer = 0.0;
                    }
                }
                (0.0, 0.0)
            }
            PlatformKind::Elevator {
                end_y,
                speed,
                wait,
                wait_timer,
                direction,
            } => {
                if *wait_timer > 0.0 {
                    *wait_timer -= dt;
                    return (0.0, 0.0);
                }
                let before = self.rect.y;
                let (low, high) = if *end_y <= origin.y {
                    (*end_y, origin.y)
                } else {
                    (origin.y, *end_y)
                };
                self.rect.y += *speed * *direction * dt;
                if self.rect.y <= low {
                    self.rect.y = low;
                    *direction = 1.0;
                    *wait_timer = *wait;
                } else if self.rect.y >= high {
                    self.rect.y = high;
                    *direction = -1.0;
                    *wait_timer = *wait;
                }
                (0.0, self.rect.y - before)
            }
            PlatformKind::Solid
            | PlatformKind::OneWay
            | PlatformKind::Bouncy { .. }
            | PlatformKind::Ice => (0.0, 0.0),
        }
    }

    pub fn reset(&mut self) {
        self.rect = self.origin;
        self.kind = self.initial_kind.clone();
    }
}
