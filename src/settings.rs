//! Physics, rules and AI tuning
//!
//! Every empirical constant (rewards, learning rate, buffer sizes, speeds)
//! lives here as a default so it can be retuned without code changes.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::persistence::{KeyValueStore, StoreError};

/// AI difficulty preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "med" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// AI paddle speed relative to the human paddle
    pub fn paddle_speed_scale(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.7,
            Difficulty::Medium => 0.85,
            Difficulty::Hard => 1.0,
        }
    }

    /// Lowest exploration rate the AI decays to
    pub fn epsilon_floor(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.15,
            Difficulty::Medium => 0.05,
            Difficulty::Hard => 0.01,
        }
    }
}

/// Ball and paddle physics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    pub ball_start_speed: f32,
    pub ball_max_speed: f32,
    /// Fraction of ball velocity removed per tick
    pub ball_drag: f32,
    /// Multiplicative ball velocity factor per tick
    pub ball_friction: f32,
    pub ball_restitution: f32,
    pub paddle_restitution: f32,
    pub wall_restitution: f32,
    pub obstacle_restitution: f32,
    /// Sideways force per unit of spin and speed
    pub magnus: f32,
    /// Spin added per unit of paddle offset
    pub spin_factor: f32,
    /// Spin kept per tick
    pub spin_damping: f32,
    /// Share of paddle velocity transferred to the ball on a hit
    pub english: f32,
    /// Half-width (as a fraction of paddle half height) of the perfect-hit band
    pub perfect_band: f32,
    /// Extra speed multiplier on a perfect hit
    pub perfect_boost: f32,
    /// Speed multiplier on every paddle hit
    pub paddle_boost: f32,
    /// Human paddle speed (pixels/s)
    pub paddle_speed: f32,
    /// Serve direction cone half-angle (radians)
    pub serve_angle: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            ball_start_speed: BALL_START_SPEED,
            ball_max_speed: BALL_MAX_SPEED,
            ball_drag: 0.0,
            ball_friction: 1.0,
            ball_restitution: 1.0,
            paddle_restitution: 1.0,
            wall_restitution: 1.0,
            obstacle_restitution: 0.9,
            magnus: 0.02,
            spin_factor: 6.0,
            spin_damping: 0.995,
            english: 0.2,
            perfect_band: 0.1,
            perfect_boost: 1.1,
            paddle_boost: PADDLE_BOOST,
            paddle_speed: 420.0,
            serve_angle: 0.5,
        }
    }
}

/// Field size and match rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    pub width: f32,
    pub height: f32,
    /// First side to this many points wins (0 = endless)
    pub win_score: u32,
    /// Ticks between a point and the next serve
    pub serve_delay_ticks: u64,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            width: FIELD_WIDTH,
            height: FIELD_HEIGHT,
            win_score: 11,
            serve_delay_ticks: 120,
        }
    }
}

/// Neural controller tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Hidden layer widths between the features and the 3 actions
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f32,
    /// Reward factor when the AI scores
    pub score_reward: f32,
    /// Reward factor when the AI concedes
    pub concede_reward: f32,
    pub buffer_capacity: usize,
    /// Fewer samples than this and training is skipped
    pub min_samples: usize,
    /// Most recent samples replayed per training call
    pub batch_size: usize,
    /// Epsilon-greedy exploration; off keeps decisions a pure function of weights and input
    pub exploration: bool,
    pub epsilon_start: f32,
    /// Geometric decay applied after every decision
    pub epsilon_decay: f32,
    pub epsilon_min: f32,
    /// Weight of the trajectory heuristic mixed into the network output
    pub heuristic_blend: f32,
    /// Seed for weight init and exploration
    pub seed: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            hidden_layers: vec![32, 16],
            learning_rate: 0.01,
            score_reward: 1.0,
            concede_reward: -0.5,
            buffer_capacity: 200,
            min_samples: 20,
            batch_size: 30,
            exploration: false,
            epsilon_start: 0.3,
            epsilon_decay: 0.995,
            epsilon_min: 0.05,
            heuristic_blend: 0.0,
            seed: 0x5eed,
        }
    }
}

impl AiSettings {
    /// Full layer sizes: features, hidden..., actions
    pub fn topology(&self) -> Vec<usize> {
        std::iter::once(FEATURE_COUNT)
            .chain(self.hidden_layers.iter().copied())
            .chain(std::iter::once(ACTION_COUNT))
            .collect()
    }
}

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub difficulty: Difficulty,
    pub physics: PhysicsSettings,
    pub rules: RuleSettings,
    pub ai: AiSettings,
}

impl Settings {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "quantum_pong_settings";

    /// Create settings from a difficulty preset (applies preset defaults)
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        let mut settings = Self::default();
        settings.apply_difficulty(difficulty);
        settings
    }

    /// Apply a difficulty preset (updates difficulty-dependent settings)
    pub fn apply_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.ai.epsilon_min = difficulty.epsilon_floor();
        self.ai.epsilon_start = self.ai.epsilon_start.max(self.ai.epsilon_min);
    }

    /// AI paddle speed after the difficulty scale
    pub fn ai_paddle_speed(&self) -> f32 {
        self.physics.paddle_speed * self.difficulty.paddle_speed_scale()
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a store, falling back to defaults on any failure
    pub fn load<S: KeyValueStore>(store: &S) -> Self {
        match store.get(Self::STORAGE_KEY) {
            Ok(Some(json)) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings ({})", settings.difficulty.as_str());
                    return settings;
                }
                Err(e) => log::warn!("Ignoring unreadable settings: {}", e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Settings storage unavailable: {}", e),
        }

        log::info!("Using default settings");
        Self::default()
    }

    pub fn save<S: KeyValueStore>(&self, store: &mut S) -> Result<(), StoreError> {
        store.set(Self::STORAGE_KEY, &self.to_json()?)?;
        log::info!("Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("HARD"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("med"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::parse("nightmare"), None);
        assert_eq!(Difficulty::Easy.as_str(), "Easy");
    }

    #[test]
    fn test_default_topology() {
        assert_eq!(AiSettings::default().topology(), vec![FEATURE_COUNT, 32, 16, ACTION_COUNT]);
    }

    #[test]
    fn test_difficulty_adjusts_ai() {
        let easy = Settings::from_difficulty(Difficulty::Easy);
        let hard = Settings::from_difficulty(Difficulty::Hard);
        assert!(easy.ai_paddle_speed() < hard.ai_paddle_speed());
        assert!(easy.ai.epsilon_min > hard.ai.epsilon_min);
        assert!(easy.ai.epsilon_start >= easy.ai.epsilon_min);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings = Settings::from_json(r#"{"ai": {"learning_rate": 0.05}}"#).unwrap();
        assert_eq!(settings.ai.learning_rate, 0.05);
        assert_eq!(settings.ai.buffer_capacity, 200);
        assert_eq!(settings.rules, RuleSettings::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut store = MemoryStore::default();
        let settings = Settings::from_difficulty(Difficulty::Hard);
        settings.save(&mut store).unwrap();
        assert_eq!(Settings::load(&store), settings);
    }

    #[test]
    fn test_corrupt_settings_fall_back_to_default() {
        let mut store = MemoryStore::default();
        store.set(Settings::STORAGE_KEY, "{not json").unwrap();
        assert_eq!(Settings::load(&store), Settings::default());
    }
}
