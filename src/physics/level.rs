use super::body::{Body, PLAYER_HEIGHT, PLAYER_JUMP_SPEED};
use super::geometry::Rect;
use super::platform::Platform;
use super::powerup::{PowerUp, JUMP_BOOST_MULTIPLIER, JUMP_BOOST_SECONDS};
use super::{ContactFlags, ControlInput, Environment, PhysicalState, StepReport, REFERENCE_FPS};

pub const WORLD_WIDTH: f64 = 8192.0;
pub const WORLD_HEIGHT: f64 = 6144.0;
pub const GROUND_HEIGHT: f64 = 100.0;

const ONE_WAY_TOLERANCE: f64 = 1.0;

/// A static platform layout with a spawn point, a goal region and a deadly
/// floor. Implements the physics contract for a single body.
#[derive(Debug, Clone)]
pub struct Level {
    platforms: Vec<Platform>,
    powerups: Vec<PowerUp>,
    goal: Rect,
    death_y: f64,
    spawn: (f64, f64),
    world_width: f64,
    body: Body,
    support: Option<usize>,
    contacts: ContactFlags,
}

impl Level {
    pub fn new(
        platforms: Vec<Platform>,
        goal: Rect,
        death_y: f64,
        spawn: (f64, f64),
        world_width: f64,
    ) -> Self {
        Self {
            platforms,
            powerups: Vec::new(),
            goal,
            death_y,
            spawn,
            world_width,
            body: Body::new(spawn.0, spawn.1),
            support: None,
            contacts: ContactFlags::empty(),
        }
    }

    /// The large two-path climb toward the top-right victory zone.
    pub fn standard() -> Self {
        let h = WORLD_HEIGHT;
        let mut platforms = vec![Platform::solid(0.0, h - GROUND_HEIGHT, WORLD_WIDTH, GROUND_HEIGHT)];

        let statics: &[(f64, f64, f64, f64)] = &[
            (150.0, h - 180.0, 250.0, 25.0),
            (500.0, h - 180.0, 200.0, 25.0),
            (200.0, h - 280.0, 180.0, 25.0),
            (450.0, h - 380.0, 200.0, 25.0),
            (750.0, h - 480.0, 150.0, 25.0),
            (1000.0, h - 580.0, 180.0, 25.0),
            (700.0, h - 300.0, 160.0, 25.0),
            (950.0, h - 420.0, 140.0, 25.0),
            (1200.0, h - 540.0, 160.0, 25.0),
            (1500.0, h - 660.0, 150.0, 25.0),
            (1250.0, h - 780.0, 250.0, 25.0),
            (1100.0, h - 900.0, 180.0, 25.0),
            (1350.0, h - 1020.0, 160.0, 25.0),
            (1600.0, h - 1140.0, 170.0, 25.0),
            (1900.0, h - 1260.0, 160.0, 25.0),
            (1550.0, h - 950.0, 140.0, 25.0),
            (1800.0, h - 1080.0, 130.0, 25.0),
            (2100.0, h - 1210.0, 140.0, 25.0),
            (2400.0, h - 1340.0, 150.0, 25.0),
            (1750.0, h - 900.0, 120.0, 25.0),
            (2000.0, h - 1050.0, 110.0, 25.0),
            (2300.0, h - 1200.0, 120.0, 25.0),
            (2600.0, h - 1350.0, 130.0, 25.0),
            (2200.0, h - 1500.0, 300.0, 25.0),
            (2600.0, h - 1650.0, 150.0, 25.0),
            (2950.0, h - 1800.0, 140.0, 25.0),
            (3300.0, h - 1950.0, 160.0, 25.0),
            (3600.0, h - 2100.0, 180.0, 25.0),
            (3950.0, h - 2250.0, 170.0, 25.0),
            (4300.0, h - 2400.0, 160.0, 25.0),
            (4650.0, h - 2550.0, 150.0, 25.0),
            (5000.0, h - 2700.0, 200.0, 25.0),
            (5350.0, h - 2850.0, 180.0, 25.0),
            (5700.0, h - 3000.0, 160.0, 25.0),
            (6000.0, h - 3150.0, 250.0, 25.0),
            (6400.0, h - 3300.0, 300.0, 30.0),
            // checkpoints
            (4000.0, h - 2400.0, 280.0, 25.0),
        ];
        platforms.extend(statics.iter().map(|&(x, y, w, ph)| Platform::solid(x, y, w, ph)));

        let movers: &[(f64, f64, f64, f64, f64, f64)] = &[
            (800.0, h - 350.0, 120.0, 25.0, 1000.0, 80.0),
            (1600.0, h - 650.0, 80.0, 25.0, 1850.0, 60.0),
            (2800.0, h - 1100.0, 120.0, 25.0, 3100.0, 45.0),
            (4000.0, h - 1800.0, 80.0, 25.0, 4250.0, 70.0),
            (5200.0, h - 2400.0, 85.0, 25.0, 5500.0, 50.0),
            (6000.0, h - 3000.0, 95.0, 25.0, 6300.0, 60.0),
        ];
        platforms.extend(
            movers
                .iter()
                .map(|&(x, y, w, ph, end_x, speed)| Platform::moving(x, y, w, ph, end_x, speed)),
        );

        platforms.push(Platform::disappearing(1800.0, h - 1000.0, 90.0, 25.0, 4.0));
        platforms.push(Platform::disappearing(4200.0, h - 2100.0, 80.0, 25.0, 3.0));

        let elevators: &[(f64, f64, f64, f64, f64, f64, f64)] = &[
            (1500.0, h - 900.0, 90.0, 25.0, h - 1200.0, 45.0, 2.0),
            (3000.0, h - 1500.0, 100.0, 25.0, h - 1900.0, 50.0, 2.0),
            (5000.0, h - 2600.0, 90.0, 25.0, h - 3000.0, 60.0, 1.5),
        ];
        platforms.extend(elevators.iter().map(|&(x, start_y, w, ph, end_y, speed, wait)| {
            Platform::elevator(x, start_y, w, ph, end_y, speed, wait)
        }));

        // Rotating platforms only matter through their footprint.
        for &(x, y, radius) in &[(1300.0, h - 700.0, 25.0), (2900.0, h - 1400.0, 28.0), (4400.0, h - 2300.0, 25.0)] {
            platforms.push(Platform::solid(x - radius, y, radius * 2.0, 20.0));
        }

        for &(x, y, w, ph) in &[
            (1100.0, h - 600.0, 100.0, 20.0),
            (2700.0, h - 1300.0, 110.0, 20.0),
            (4600.0, h - 2400.0, 100.0, 20.0),
        ] {
            platforms.push(Platform::one_way(x, y, w, ph));
        }

        for &(x, y, w, ph, strength) in &[
            (1250.0, h - 750.0, 90.0, 25.0, 1.8),
            (3100.0, h - 1550.0, 80.0, 25.0, 2.0),
            (5100.0, h - 2650.0, 85.0, 25.0, 1.9),
        ] {
            platforms.push(Platform::bouncy(x, y, w, ph, strength));
        }

        platforms.push(Platform::ice(2500.0, h - 1250.0, 140.0, 25.0));
        platforms.push(Platform::ice(4300.0, h - 2150.0, 110.0, 25.0));

        let powerups = [(1600.0, h - 1200.0), (4500.0, h - 2500.0)]
            .iter()
            .map(|&(x, y)| PowerUp::jump_boost(x, y, JUMP_BOOST_MULTIPLIER, JUMP_BOOST_SECONDS))
            .collect();

        Self::new(
            platforms,
            Rect::new(6350.0, h - 3400.0, 400.0, 150.0),
            h - GROUND_HEIGHT,
            (200.0, h - 180.0 - PLAYER_HEIGHT - 5.0),
            WORLD_WIDTH,
        )
        .with_powerups(powerups)
    }

    pub fn with_powerups(mut self, powerups: Vec<PowerUp>) -> Self {
        self.powerups = powerups;
        self
    }

    pub fn powerups(&self) -> &[PowerUp] {
        &self.powerups
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn goal(&self) -> Rect {
        self.goal
    }

    pub fn death_y(&self) -> f64 {
        self.death_y
    }

    pub fn contacts(&self) -> ContactFlags {
        self.contacts
    }

    fn carry_rider(&mut self, dt: f64) {
        for (index, platform) in self.platforms.iter_mut().enumerate() {
            let (dx, dy) = platform.update(dt);
            if self.support == Some(index) {
                self.body.rect.x += dx;
                self.body.rect.y += dy;
            }
        }
    }

    fn resolve_horizontal(&mut self) {
        let body = &mut self.body;
        for platform in &self.platforms {
            if !platform.is_solid() || platform.is_one_way() {
                continue;
            }
            if body.rect.intersects(&platform.rect) {
                if body.vel_x > 0.0 {
                    body.rect.set_right(platform.rect.left());
                } else if body.vel_x < 0.0 {
                    body.rect.x = platform.rect.right();
                }
                body.vel_x = 0.0;
            }
        }
    }

    fn resolve_vertical(&mut self, previous_bottom: f64) -> Option<usize> {
        let body = &mut self.body;
        body.on_ground = false;
        let mut support = None;
        for (index, platform) in self.platforms.iter().enumerate() {
            if !platform.is_solid() || !body.rect.intersects(&platform.rect) {
                continue;
            }
            if platform.is_one_way() {
                if body.vel_y > 0.0 && previous_bottom <= platform.rect.top() + ONE_WAY_TOLERANCE {
                    body.land_on(platform.rect.top());
                    support = Some(index);
                }
                continue;
            }
            if body.vel_y > 0.0 {
                body.land_on(platform.rect.top());
                support = Some(index);
            } else if body.vel_y < 0.0 {
                body.rect.y = platform.rect.bottom();
                body.vel_y = 0.0;
            }
        }
        support
    }

    fn collect_powerups(&mut self) -> ContactFlags {
        let mut flags = ContactFlags::empty();
        for powerup in &mut self.powerups {
            if let Some(boost) = powerup.try_collect(&self.body.rect) {
                tracing::debug!(kind = powerup.kind.as_str(), multiplier = boost.multiplier, "power-up collected");
                self.body.grant_jump_boost(boost);
                flags |= ContactFlags::POWERUP_COLLECTED;
            }
        }
        flags
    }

    fn apply_support_effects(&mut self, support: Option<usize>) -> ContactFlags {
        let Some(index) = support else {
            return ContactFlags::empty();
        };
        let flags = self.platforms[index].surface_flags();
        if let Some(strength) = self.platforms[index].bounce_strength() {
            self.body.vel_y = PLAYER_JUMP_SPEED * strength;
            self.body.on_ground = false;
        }
        if flags.contains(ContactFlags::DISAPPEAR_REQUESTED) {
            self.platforms[index].activate();
        }
        flags
    }
}

impl Environment for Level {
    fn observe(&self) -> PhysicalState {
        self.body.physical_state()
    }

    fn goal_x(&self) -> f64 {
        self.goal.center_x()
    }

    fn spawn_x(&self) -> f64 {
        self.spawn.0
    }

    fn step(&mut self, input: ControlInput, dt: f64) -> StepReport {
        let frames = dt * REFERENCE_FPS;
        self.body.tick_boost(dt);
        self.carry_rider(dt);

        let friction = self
            .support
            .map(|index| self.platforms[index].friction())
            .unwrap_or(super::body::FRICTION);
        self.body.apply_input(input, friction, frames);
        self.body.apply_gravity(frames);

        self.body.rect.x += self.body.vel_x * frames;
        self.resolve_horizontal();

        let previous_bottom = self.body.rect.bottom();
        self.body.rect.y += self.body.vel_y * frames;
        let support = self.resolve_vertical(previous_bottom);
        self.contacts = self.apply_support_effects(support);
        self.support = support;

        let max_x = self.world_width - self.body.rect.w;
        self.body.rect.x = self.body.rect.x.clamp(0.0, max_x);
        let powerups = self.collect_powerups();
        self.contacts |= powerups;

        StepReport {
            state: self.body.physical_state(),
            can_double_jump: self.body.can_jump(),
            contacts: self.contacts,
        }
    }

    fn is_dead(&self) -> bool {
        self.body.rect.bottom() >= self.death_y
    }

    fn reached_goal(&self) -> bool {
        self.goal.intersects(&self.body.rect)
    }

    fn respawn(&mut self) {
        self.body.reset_to(self.spawn.0, self.spawn.1);
        for platform in &mut self.platforms {
            platform.reset();
        }
        for powerup in &mut self.powerups {
            powerup.reset();
        }
        self.support = None;
        self.contacts = ContactFlags::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::PLAYER_SPEED;

    const DT: f64 = 1.0 / 60.0;

    fn flat_level(platform: Platform) -> Level {
        Level::new(
            vec![platform],
            Rect::new(900.0, 0.0, 50.0, 50.0),
            1000.0,
            (100.0, 400.0),
            1000.0,
        )
    }

    fn settle(level: &mut Level) {
        for _ in 0..120 {
            level.step(ControlInput::default(), DT);
        }
    }

    #[test]
    fn body_lands_on_platform() {
        let mut level = flat_level(Platform::solid(0.0, 500.0, 1000.0, 20.0));
        settle(&mut level);
        let state = level.observe();
        assert!(state.on_ground);
        assert!((level.body().rect.bottom() - 500.0).abs() < 1e-9);
        assert!(!level.is_dead());
    }

    #[test]
    fn running_right_moves_at_player_speed() {
        let mut level = flat_level(Platform::solid(0.0, 500.0, 1000.0, 20.0));
        settle(&mut level);
        let x0 = level.observe().x;
        let right = ControlInput {
            right: true,
            ..Default::default()
        };
        for _ in 0..10 {
            level.step(right, DT);
        }
        assert!((level.observe().x - x0 - 10.0 * PLAYER_SPEED).abs() < 1e-6);
    }

    #[test]
    fn ice_reports_flag_and_slides_further() {
        let mut ice = flat_level(Platform::ice(0.0, 500.0, 1000.0, 20.0));
        let mut rock = flat_level(Platform::solid(0.0, 500.0, 1000.0, 20.0));
        for level in [&mut ice, &mut rock] {
            settle(level);
            level.body_mut().vel_x = PLAYER_SPEED;
            for _ in 0..20 {
                level.step(ControlInput::default(), DT);
            }
        }
        assert!(ice.contacts().contains(ContactFlags::ON_ICE));
        assert!(ice.observe().x > rock.observe().x);
    }

    #[test]
    fn bouncy_platform_launches_upward() {
        let mut level = flat_level(Platform::bouncy(0.0, 500.0, 1000.0, 20.0, 1.8));
        let mut launched = false;
        for _ in 0..120 {
            let report = level.step(ControlInput::default(), DT);
            if report.contacts.contains(ContactFlags::ON_BOUNCY) {
                assert!(report.state.vel_y < 0.0);
                launched = true;
                break;
            }
        }
        assert!(launched);
    }

    #[test]
    fn one_way_platform_lets_body_pass_from_below() {
        let mut level = flat_level(Platform::one_way(0.0, 380.0, 1000.0, 20.0));
        level.body_mut().rect.y = 405.0;
        level.body_mut().vel_y = -18.0;
        level.step(ControlInput::default(), DT);
        assert!(level.body().vel_y < 0.0, "no head bump on a one-way platform");
    }

    #[test]
    fn falling_onto_the_floor_is_death() {
        let mut level = flat_level(Platform::solid(0.0, 1000.0, 1000.0, 100.0));
        settle(&mut level);
        assert!(level.is_dead());
        level.respawn();
        assert!(!level.is_dead());
        assert_eq!(level.observe().x, 100.0);
    }

    #[test]
    fn disappearing_platform_is_activated_on_landing() {
        let mut level = flat_level(Platform::disappearing(0.0, 500.0, 1000.0, 20.0, 0.5));
        let mut requested = false;
        for _ in 0..200 {
            let report = level.step(ControlInput::default(), DT);
            requested |= report.contacts.contains(ContactFlags::DISAPPEAR_REQUESTED);
        }
        assert!(requested);
        assert!(level.body().rect.bottom() > 500.0, "body falls once platform vanishes");
    }

    #[test]
    fn jump_boost_pickup_lasts_ten_seconds_and_resets_on_respawn() {
        let mut level = flat_level(Platform::solid(0.0, 500.0, 1000.0, 20.0))
            .with_powerups(vec![PowerUp::jump_boost(300.0, 476.0, 1.5, JUMP_BOOST_SECONDS)]);
        settle(&mut level);
        let right = ControlInput {
            right: true,
            ..Default::default()
        };
        let mut collected = false;
        for _ in 0..60 {
            let report = level.step(right, DT);
            if report.contacts.contains(ContactFlags::POWERUP_COLLECTED) {
                collected = true;
                break;
            }
        }
        assert!(collected);
        assert!(level.powerups()[0].is_collected());
        assert_eq!(level.body().jump_velocity(), PLAYER_JUMP_SPEED * 1.5);

        for _ in 0..(9 * 60) {
            level.step(ControlInput::default(), DT);
        }
        assert!(level.body().jump_boost.is_some());
        for _ in 0..(2 * 60) {
            level.step(ControlInput::default(), DT);
        }
        assert!(level.body().jump_boost.is_none());

        level.respawn();
        assert!(!level.powerups()[0].is_collected());
        assert!(level.body().jump_boost.is_none());
    }

    #[test]
    fn respawn_clears_an_active_boost() {
        let mut level = flat_level(Platform::solid(0.0, 500.0, 1000.0, 20.0))
            .with_powerups(vec![PowerUp::jump_boost(116.0, 476.0, 2.0, JUMP_BOOST_SECONDS)]);
        settle(&mut level);
        assert!(level.body().jump_boost.is_some());
        level.respawn();
        assert_eq!(level.body().jump_velocity(), PLAYER_JUMP_SPEED);
        assert_eq!(Level::standard().powerups().len(), 2);
    }

    #[test]
    fn standard_level_spawn_is_safe() {
        let mut level = Level::standard();
        settle(&mut level);
        assert!(level.observe().on_ground);
        assert!(!level.is_dead());
        assert!(!level.reached_goal());
        assert!(level.goal_x() > level.spawn_x());
    }

    #[test]
    fn body_is_clamped_to_world() {
        let mut level = flat_level(Platform::solid(0.0, 500.0, 1000.0, 20.0));
        settle(&mut level);
        let left = ControlInput {
            left: true,
            ..Default::default()
        };
        for _ in 0..200 {
            level.step(left, DT);
        }
        assert_eq!(level.observe().x, 0.0);
    }
}
