/// Field dimensions in world units
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(default)]
pub struct FieldConfig {
    pub width: f64,
    pub height: f64,
}

/// Goal regions, centered horizontally on the top and bottom edges.
/// `height` is the goal depth measured from the edge into the field.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(default)]
pub struct GoalConfig {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(default)]
pub struct PlayerPhysics {
    pub radius: f64,
    /// Acceleration per held direction (units/s^2)
    pub acceleration: f64,
    /// Fraction of velocity lost per tick
    pub friction: f64,
    pub mass: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(default)]
pub struct BallPhysics {
    pub radius: f64,
    /// Fraction of velocity lost per tick
    pub friction: f64,
    pub mass: f64,
    /// Restitution applied on player hits and wall bounces
    pub bounciness: f64,
}

/// How overlapping players are pushed apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(rename_all = "camelCase")]
pub enum CollisionResolution {
    /// Each player is resolved in id order against the stored positions of
    /// the others. Results depend on iteration order.
    #[default]
    Sequential,
    /// All corrections are computed against one snapshot of tentative
    /// positions and applied together.
    Symmetric,
}

/// Static game geometry and physics constants
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub field: FieldConfig,
    pub goals: GoalConfig,
    pub player: PlayerPhysics,
    pub ball: BallPhysics,
    pub collision_resolution: CollisionResolution,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            width: 240.0,
            height: 30.0,
        }
    }
}

impl Default for PlayerPhysics {
    fn default() -> Self {
        Self {
            radius: 20.0,
            acceleration: 1200.0,
            friction: 0.05,
            mass: 1.0,
        }
    }
}

impl Default for BallPhysics {
    fn default() -> Self {
        Self {
            radius: 12.0,
            friction: 0.01,
            mass: 0.5,
            bounciness: 0.8,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            field: FieldConfig::default(),
            goals: GoalConfig::default(),
            player: PlayerPhysics::default(),
            ball: BallPhysics::default(),
            collision_resolution: CollisionResolution::Sequential,
        }
    }
}

fn positive(value: f64, name: &str) -> Result<(), String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{} must be finite and > 0", name));
    }
    Ok(())
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), String> {
        positive(self.field.width, "field.width")?;
        positive(self.field.height, "field.height")?;
        positive(self.goals.width, "goals.width")?;
        positive(self.goals.height, "goals.height")?;
        positive(self.player.radius, "player.radius")?;
        positive(self.player.mass, "player.mass")?;
        positive(self.ball.radius, "ball.radius")?;
        positive(self.ball.mass, "ball.mass")?;

        if !self.player.acceleration.is_finite() || self.player.acceleration < 0.0 {
            return Err("player.acceleration must be finite and >= 0".to_string());
        }
        if !(0.0..1.0).contains(&self.player.friction) {
            return Err("player.friction must be in [0, 1)".to_string());
        }
        if !(0.0..1.0).contains(&self.ball.friction) {
            return Err("ball.friction must be in [0, 1)".to_string());
        }
        if !(0.0..=1.0).contains(&self.ball.bounciness) {
            return Err("ball.bounciness must be in [0, 1]".to_string());
        }
        if 2.0 * self.player.radius > self.field.width.min(self.field.height) {
            return Err("field must fit a player".to_string());
        }
        if self.goals.width > self.field.width {
            return Err("goals.width must be <= field.width".to_string());
        }
        // The ball is clamped to its radius before goals are checked
        if self.goals.height <= self.ball.radius {
            return Err("goals.height must be > ball.radius".to_string());
        }
        if 2.0 * self.goals.height >= self.field.height {
            return Err("goals.height must be < field.height / 2".to_string());
        }
        Ok(())
    }
}
