//! Fixed-timestep physics for players and the ball.
//!
//! A step updates every player, then the ball. Collisions use squared
//! distances for the overlap test and only take a square root when a
//! correction is actually applied.

use crate::player::{Player, Team};
use crate::registry::SessionRegistry;
use soccer_shared::config::{BallPhysics, CollisionResolution, FieldConfig, GameConfig};
use soccer_shared::protocol::{BallWire, Controls};
use soccer_shared::vec2::{add, distance_sq, length, scale, sub, Vec2};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Id of the last player to touch the ball. The player may have left.
    pub last_hit_by: Option<u32>,
}

impl Ball {
    /// A resting ball at the field centre
    pub fn kickoff(field: &FieldConfig) -> Self {
        Self {
            pos: Vec2::new(field.width / 2.0, field.height / 2.0),
            vel: Vec2::ZERO,
            last_hit_by: None,
        }
    }

    pub fn to_wire(&self) -> BallWire {
        BallWire {
            pos: self.pos,
            vel: self.vel,
            last_hit_by: self.last_hit_by,
        }
    }
}

/// Goals per team, indexed by `Team::index`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score(pub [u32; 2]);

impl Score {
    pub fn award(&mut self, team: Team) {
        let slot = &mut self.0[team.index()];
        *slot = slot.saturating_add(1);
    }
}

/// Emitted by `step` when the ball lands in a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalEvent {
    pub team: Team,
    /// Last toucher before the reset
    pub scorer: Option<u32>,
}

/// Acceleration from held directions. Opposite directions cancel.
pub fn control_acceleration(controls: &Controls, acceleration: f64) -> Vec2 {
    let axis = |neg: bool, pos: bool| (pos as i8 - neg as i8) as f64 * acceleration;
    Vec2::new(
        axis(controls.left, controls.right),
        axis(controls.up, controls.down),
    )
}

/// Keep a circle of `radius` inside the field.
pub fn clamp_to_field(pos: Vec2, radius: f64, field: &FieldConfig) -> Vec2 {
    Vec2::new(
        pos.x.max(radius).min(field.width - radius),
        pos.y.max(radius).min(field.height - radius),
    )
}

/// Push `a` and `b` apart so their centres end up `min_dist` apart, each
/// moving half the overlap. Coincident centres are left alone.
fn separate(a: &mut Vec2, b: &mut Vec2, min_dist: f64) {
    let dist_sq = distance_sq(*a, *b);
    if dist_sq >= min_dist * min_dist || dist_sq == 0.0 {
        return;
    }
    let dist = dist_sq.sqrt();
    let overlap = min_dist - dist;
    let push = scale(sub(*b, *a), 0.5 * overlap / dist);
    *a = sub(*a, push);
    *b = add(*b, push);
}

pub struct SimulationEngine {
    config: GameConfig,
    ball: Ball,
    score: Score,
}

impl SimulationEngine {
    pub fn new(config: GameConfig) -> Self {
        Self {
            ball: Ball::kickoff(&config.field),
            score: Score::default(),
            config,
        }
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn ball_mut(&mut self) -> &mut Ball {
        &mut self.ball
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn reset_ball(&mut self) {
        self.ball = Ball::kickoff(&self.config.field);
    }

    /// Advance everything by `dt` seconds.
    pub fn step(&mut self, dt: f64, registry: &mut SessionRegistry) -> Option<GoalEvent> {
        let players = registry.players_mut();
        match self.config.collision_resolution {
            CollisionResolution::Sequential => self.update_players_sequential(dt, players),
            CollisionResolution::Symmetric => self.update_players_symmetric(dt, players),
        }
        self.update_ball(dt, players)
    }

    fn integrate_velocity(&self, player: &mut Player, dt: f64) {
        let p = &self.config.player;
        let acc = control_acceleration(&player.controls, p.acceleration);
        player.vel = scale(add(player.vel, scale(acc, dt)), 1.0 - p.friction);
    }

    /// Each player in id order: its tentative position is separated from the
    /// stored positions of the others, which are corrected in place.
    fn update_players_sequential(&self, dt: f64, players: &mut BTreeMap<u32, Player>) {
        let field = &self.config.field;
        let radius = self.config.player.radius;
        let ids: Vec<u32> = players.keys().copied().collect();

        for id in ids {
            let mut next = match players.get_mut(&id) {
                Some(player) => {
                    self.integrate_velocity(player, dt);
                    add(player.pos, scale(player.vel, dt))
                }
                None => continue,
            };

            for (other_id, other) in players.iter_mut() {
                if *other_id == id {
                    continue;
                }
                separate(&mut next, &mut other.pos, 2.0 * radius);
                other.pos = clamp_to_field(other.pos, radius, field);
            }

            if let Some(player) = players.get_mut(&id) {
                player.pos = clamp_to_field(next, radius, field);
            }
        }
    }

    /// All tentative positions first, then one round of pairwise corrections
    /// computed against that snapshot.
    fn update_players_symmetric(&self, dt: f64, players: &mut BTreeMap<u32, Player>) {
        let field = &self.config.field;
        let radius = self.config.player.radius;
        let min_dist = 2.0 * radius;

        let mut tentative: Vec<Vec2> = players
            .values_mut()
            .map(|player| {
                self.integrate_velocity(player, dt);
                add(player.pos, scale(player.vel, dt))
            })
            .collect();

        let snapshot = tentative.clone();
        for i in 0..snapshot.len() {
            for j in (i + 1)..snapshot.len() {
                let mut a = snapshot[i];
                let mut b = snapshot[j];
                separate(&mut a, &mut b, min_dist);
                tentative[i] = add(tentative[i], sub(a, snapshot[i]));
                tentative[j] = add(tentative[j], sub(b, snapshot[j]));
            }
        }

        for (player, next) in players.values_mut().zip(tentative) {
            player.pos = clamp_to_field(next, radius, field);
        }
    }

    fn update_ball(&mut self, dt: f64, players: &mut BTreeMap<u32, Player>) -> Option<GoalEvent> {
        let field = self.config.field;
        let b: BallPhysics = self.config.ball;
        let player_radius = self.config.player.radius;
        let min_dist = b.radius + player_radius;
        let mass_factor = self.config.player.mass / b.mass;
        let ball = &mut self.ball;

        ball.vel = scale(ball.vel, 1.0 - b.friction);
        let mut next = add(ball.pos, scale(ball.vel, dt));

        for (id, player) in players.iter_mut() {
            let offset = sub(next, player.pos);
            let dist_sq = offset.x * offset.x + offset.y * offset.y;
            if dist_sq >= min_dist * min_dist || dist_sq == 0.0 {
                continue;
            }

            let dist = dist_sq.sqrt();
            let normal = scale(offset, 1.0 / dist);

            // Rebound along the contact normal with the relative speed
            let relative = sub(ball.vel, scale(player.vel, mass_factor));
            ball.vel = scale(normal, length(relative) * b.bounciness);

            let half_overlap = 0.5 * (min_dist - dist);
            next = add(next, scale(normal, half_overlap));
            player.pos = clamp_to_field(
                sub(player.pos, scale(normal, half_overlap)),
                player_radius,
                &field,
            );
            ball.last_hit_by = Some(*id);
        }

        if next.x < b.radius {
            next.x = b.radius;
            ball.vel.x *= -b.bounciness;
        }
        if next.y < b.radius {
            next.y = b.radius;
            ball.vel.y *= -b.bounciness;
        }
        if next.x + b.radius > field.width {
            next.x = field.width - b.radius;
            ball.vel.x *= -b.bounciness;
        }
        if next.y + b.radius > field.height {
            next.y = field.height - b.radius;
            ball.vel.y *= -b.bounciness;
        }
        ball.pos = next;

        self.check_goal()
    }

    fn check_goal(&mut self) -> Option<GoalEvent> {
        let field = &self.config.field;
        let goals = &self.config.goals;
        let margin = (field.width - goals.width) / 2.0;
        let pos = self.ball.pos;

        if pos.x <= margin || pos.x >= field.width - margin {
            return None;
        }

        let team = if pos.y < goals.height {
            Team::Red
        } else if pos.y > field.height - goals.height {
            Team::Blue
        } else {
            return None;
        };

        let scorer = self.ball.last_hit_by;
        self.score.award(team);
        self.reset_ball();
        Some(GoalEvent { team, scorer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soccer_shared::config::{BallPhysics, GoalConfig, PlayerPhysics};
    use soccer_shared::vec2::{is_finite, length};

    const DT: f64 = 1.0 / 60.0;
    const EPS: f64 = 1e-9;

    fn test_config() -> GameConfig {
        GameConfig {
            field: FieldConfig {
                width: 800.0,
                height: 600.0,
            },
            goals: GoalConfig {
                width: 200.0,
                height: 30.0,
            },
            player: PlayerPhysics {
                radius: 20.0,
                acceleration: 1000.0,
                friction: 0.05,
                mass: 1.0,
            },
            ball: BallPhysics {
                radius: 10.0,
                friction: 0.01,
                mass: 0.5,
                bounciness: 0.8,
            },
            collision_resolution: CollisionResolution::Sequential,
        }
    }

    fn setup(config: GameConfig) -> (SimulationEngine, SessionRegistry) {
        (
            SimulationEngine::new(config),
            SessionRegistry::new(&config, 1),
        )
    }

    fn spawn(registry: &mut SessionRegistry, pos: Vec2, vel: Vec2) -> u32 {
        let id = registry.create_player().id;
        let player = registry.get_mut(id).unwrap();
        player.pos = pos;
        player.vel = vel;
        id
    }

    fn controls(up: bool, down: bool, left: bool, right: bool) -> Controls {
        Controls {
            up,
            down,
            left,
            right,
        }
    }

    #[test]
    fn opposing_controls_cancel() {
        for bits in 0u8..16 {
            let c = controls(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0);
            let acc = control_acceleration(&c, 500.0);
            if c.up == c.down {
                assert_eq!(acc.y, 0.0, "{:?}", c);
            } else {
                assert_eq!(acc.y.abs(), 500.0);
            }
            if c.left == c.right {
                assert_eq!(acc.x, 0.0, "{:?}", c);
            } else {
                assert_eq!(acc.x.abs(), 500.0);
            }
        }
        assert_eq!(
            control_acceleration(&controls(true, false, false, true), 2.0),
            Vec2::new(2.0, -2.0)
        );
    }

    #[test]
    fn held_direction_accelerates_then_friction_applies() {
        let (mut engine, mut registry) = setup(test_config());
        let id = spawn(&mut registry, Vec2::new(100.0, 500.0), Vec2::ZERO);
        registry.get_mut(id).unwrap().controls = controls(false, false, false, true);
        engine.step(DT, &mut registry);

        let p = registry.get(id).unwrap();
        let expected_vx = 1000.0 * DT * 0.95;
        assert!((p.vel.x - expected_vx).abs() < EPS);
        assert!((p.pos.x - (100.0 + expected_vx * DT)).abs() < EPS);
        assert_eq!(p.pos.y, 500.0);
    }

    #[test]
    fn empty_field_ball_stays_in_bounds_and_slows() {
        let config = test_config();
        let (mut engine, mut registry) = setup(config);
        engine.ball_mut().pos = Vec2::new(60.0, 300.0);
        engine.ball_mut().vel = Vec2::new(-900.0, 700.0);

        let mut last_speed = length(engine.ball().vel);
        for _ in 0..600 {
            engine.step(DT, &mut registry);
            let ball = engine.ball();
            let r = config.ball.radius;
            assert!(ball.pos.x >= r && ball.pos.x <= config.field.width - r);
            assert!(ball.pos.y >= r && ball.pos.y <= config.field.height - r);
            let speed = length(ball.vel);
            assert!(speed <= last_speed + EPS);
            last_speed = speed;
        }
        assert!(last_speed < 900.0);
    }

    #[test]
    fn overlapping_players_are_separated_evenly() {
        let (mut engine, mut registry) = setup(test_config());
        let a = spawn(&mut registry, Vec2::new(100.0, 100.0), Vec2::new(60.0, 0.0));
        let b = spawn(&mut registry, Vec2::new(115.0, 100.0), Vec2::new(-60.0, 0.0));
        engine.step(DT, &mut registry);

        let pa = registry.get(a).unwrap().pos;
        let pb = registry.get(b).unwrap().pos;
        assert!((length(sub(pb, pa)) - 40.0).abs() < 1e-6);
        // Both moved by the same amount in opposite directions
        assert!(((pa.x - 100.0) + (pb.x - 115.0)).abs() < 1e-6);
        assert!((pa.y - 100.0).abs() < EPS && (pb.y - 100.0).abs() < EPS);
    }

    #[test]
    fn symmetric_resolution_separates_players() {
        let mut config = test_config();
        config.collision_resolution = CollisionResolution::Symmetric;
        let (mut engine, mut registry) = setup(config);
        let a = spawn(&mut registry, Vec2::new(100.0, 100.0), Vec2::new(60.0, 0.0));
        let b = spawn(&mut registry, Vec2::new(115.0, 100.0), Vec2::new(-60.0, 0.0));
        engine.step(DT, &mut registry);

        let pa = registry.get(a).unwrap().pos;
        let pb = registry.get(b).unwrap().pos;
        assert!(length(sub(pb, pa)) >= 40.0 - 1e-6);
        assert!(((pa.x - 100.0) + (pb.x - 115.0)).abs() < 1e-6);
    }

    #[test]
    fn symmetric_resolution_ignores_id_order() {
        let mut config = test_config();
        config.collision_resolution = CollisionResolution::Symmetric;

        let run = |first: Vec2, second: Vec2| {
            let (mut engine, mut registry) = setup(config);
            let a = spawn(&mut registry, first, Vec2::ZERO);
            let b = spawn(&mut registry, second, Vec2::ZERO);
            engine.step(DT, &mut registry);
            (registry.get(a).unwrap().pos, registry.get(b).unwrap().pos)
        };

        let (a1, b1) = run(Vec2::new(300.0, 200.0), Vec2::new(310.0, 205.0));
        let (b2, a2) = run(Vec2::new(310.0, 205.0), Vec2::new(300.0, 200.0));
        assert!(length(sub(a1, a2)) < EPS);
        assert!(length(sub(b1, b2)) < EPS);
    }

    #[test]
    fn coincident_players_stay_finite() {
        let (mut engine, mut registry) = setup(test_config());
        let a = spawn(&mut registry, Vec2::new(200.0, 200.0), Vec2::ZERO);
        let b = spawn(&mut registry, Vec2::new(200.0, 200.0), Vec2::ZERO);
        engine.step(DT, &mut registry);
        assert!(is_finite(registry.get(a).unwrap().pos));
        assert!(is_finite(registry.get(b).unwrap().pos));
    }

    #[test]
    fn players_are_clamped_inside_field() {
        let (mut engine, mut registry) = setup(test_config());
        let id = spawn(&mut registry, Vec2::new(21.0, 579.0), Vec2::new(-3000.0, 3000.0));
        engine.step(DT, &mut registry);
        let p = registry.get(id).unwrap().pos;
        assert_eq!(p, Vec2::new(20.0, 580.0));
    }

    #[test]
    fn pushed_player_stays_inside_field() {
        let (mut engine, mut registry) = setup(test_config());
        let wall = spawn(&mut registry, Vec2::new(20.0, 300.0), Vec2::ZERO);
        spawn(&mut registry, Vec2::new(45.0, 300.0), Vec2::new(-600.0, 0.0));
        for _ in 0..30 {
            engine.step(DT, &mut registry);
            let p = registry.get(wall).unwrap().pos;
            assert!(p.x >= 20.0 - EPS);
        }
    }

    #[test]
    fn ball_touch_records_last_toucher() {
        let (mut engine, mut registry) = setup(test_config());
        let id = spawn(&mut registry, Vec2::new(400.0, 320.0), Vec2::ZERO);
        engine.step(DT, &mut registry);

        let ball = engine.ball();
        assert_eq!(ball.last_hit_by, Some(id));
        // Split overlap: ball up 5, player down 5
        assert!((ball.pos.y - 295.0).abs() < EPS);
        assert!((registry.get(id).unwrap().pos.y - 325.0).abs() < EPS);
    }

    #[test]
    fn moving_player_kicks_ball_away() {
        let (mut engine, mut registry) = setup(test_config());
        spawn(&mut registry, Vec2::new(400.0, 330.0), Vec2::new(0.0, -300.0));
        engine.step(DT, &mut registry);
        // Ball was hit from below: velocity points up and scales with mass ratio
        let vel = engine.ball().vel;
        assert!(vel.y < 0.0);
        assert!(length(vel) > 300.0);
    }

    #[test]
    fn last_toucher_survives_player_leaving() {
        let (mut engine, mut registry) = setup(test_config());
        let id = spawn(&mut registry, Vec2::new(400.0, 320.0), Vec2::ZERO);
        engine.step(DT, &mut registry);
        registry.remove_player(id);
        engine.step(DT, &mut registry);
        assert_eq!(engine.ball().last_hit_by, Some(id));
        assert_eq!(engine.ball().to_wire().last_hit_by, Some(id));
    }

    #[test]
    fn ball_coincident_with_player_is_skipped() {
        let (mut engine, mut registry) = setup(test_config());
        spawn(&mut registry, Vec2::new(400.0, 300.0), Vec2::ZERO);
        engine.step(DT, &mut registry);
        assert!(is_finite(engine.ball().pos));
        assert!(is_finite(engine.ball().vel));
        assert_eq!(engine.ball().last_hit_by, None);
    }

    #[test]
    fn top_goal_scores_for_first_team_and_resets() {
        let (mut engine, mut registry) = setup(test_config());
        engine.ball_mut().pos = Vec2::new(400.0, 40.0);
        engine.ball_mut().vel = Vec2::new(0.0, -1200.0);

        let event = engine.step(DT, &mut registry);
        assert_eq!(
            event,
            Some(GoalEvent {
                team: Team::Red,
                scorer: None
            })
        );
        assert_eq!(engine.score(), Score([1, 0]));
        assert_eq!(engine.ball().pos, Vec2::new(400.0, 300.0));
        assert_eq!(engine.ball().vel, Vec2::ZERO);
    }

    #[test]
    fn bottom_goal_scores_for_second_team() {
        let (mut engine, mut registry) = setup(test_config());
        engine.ball_mut().pos = Vec2::new(350.0, 560.0);
        engine.ball_mut().vel = Vec2::new(0.0, 1200.0);
        let event = engine.step(DT, &mut registry);
        assert_eq!(event.map(|e| e.team), Some(Team::Blue));
        assert_eq!(engine.score(), Score([0, 1]));
        assert_eq!(engine.ball().last_hit_by, None);
    }

    #[test]
    fn ball_beside_goal_bounces_instead() {
        let (mut engine, mut registry) = setup(test_config());
        engine.ball_mut().pos = Vec2::new(50.0, 40.0);
        engine.ball_mut().vel = Vec2::new(0.0, -1200.0);

        let mut bounced = false;
        for _ in 0..10 {
            assert_eq!(engine.step(DT, &mut registry), None);
            let ball = engine.ball();
            assert!(ball.pos.y >= 10.0);
            bounced |= ball.vel.y > 0.0;
        }
        assert!(bounced);
        assert_eq!(engine.score(), Score([0, 0]));
    }

    #[test]
    fn score_only_increments_by_one_per_goal() {
        let (mut engine, mut registry) = setup(test_config());
        let mut goals = 0;
        for i in 0..20 {
            let top = i % 2 == 0;
            engine.ball_mut().pos = Vec2::new(400.0, if top { 40.0 } else { 560.0 });
            engine.ball_mut().vel = Vec2::new(0.0, if top { -1200.0 } else { 1200.0 });
            if engine.step(DT, &mut registry).is_some() {
                goals += 1;
            }
            let Score([red, blue]) = engine.score();
            assert_eq!(red + blue, goals);
        }
        assert_eq!(engine.score(), Score([10, 10]));
    }
}
