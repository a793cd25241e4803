//! Quantum Pong entry point
//!
//! Native: headless self-play that trains the AI against a tracking paddle
//! and saves the model. Web: a `Game` handle driven by the page's frame loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use wasm_bindgen::prelude::*;

    use quantum_pong::ai::NeuralController;
    use quantum_pong::consts::*;
    use quantum_pong::persistence::{LocalStorage, clear_model, load_controller, save_model};
    use quantum_pong::sim::{GamePhase, MatchState, Side, TickInput, tick};
    use quantum_pong::{Difficulty, Settings};

    /// Game state owned by the page
    #[wasm_bindgen]
    pub struct Game {
        state: MatchState,
        ai: NeuralController,
        settings: Settings,
        store: LocalStorage,
        accumulator: f32,
        input: TickInput,
        // Track phase for auto-save
        last_phase: GamePhase,
    }

    #[wasm_bindgen]
    impl Game {
        #[wasm_bindgen(constructor)]
        pub fn new(seed: u64) -> Result<Game, JsValue> {
            let store = LocalStorage;
            let settings = Settings::load(&store);
            let ai = load_controller(&store, &settings.ai).map_err(|e| JsValue::from_str(&e.to_string()))?;
            Ok(Self {
                state: MatchState::new(seed, &settings),
                ai,
                settings,
                store,
                accumulator: 0.0,
                input: TickInput::default(),
                last_phase: GamePhase::Serve,
            })
        }

        /// Run simulation ticks for `dt` seconds of wall time
        pub fn update(&mut self, dt: f32) -> Result<(), JsValue> {
            self.accumulator += dt.min(0.1);

            let mut substeps = 0;
            while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                let input = self.input.clone();
                tick(&mut self.state, &mut self.ai, &input, SIM_DT)
                    .map_err(|e| JsValue::from_str(&e.to_string()))?;
                self.accumulator -= SIM_DT;
                substeps += 1;

                // Clear one-shot inputs after processing
                self.input.launch = false;
                self.input.pause = false;
            }

            // Save the model whenever a match ends or the game is paused
            let phase = self.state.phase;
            if phase != self.last_phase {
                if matches!(phase, GamePhase::GameOver | GamePhase::Paused) {
                    self.save_model();
                }
                self.last_phase = phase;
            }
            Ok(())
        }

        /// Human paddle axis in [-1, 1]
        pub fn set_axis(&mut self, axis: f32) {
            self.input.paddle_axis = axis;
        }

        pub fn launch(&mut self) {
            self.input.launch = true;
        }

        pub fn toggle_pause(&mut self) {
            self.input.pause = true;
        }

        pub fn restart(&mut self, seed: u64) {
            self.state.restart(seed);
            self.accumulator = 0.0;
            self.input = TickInput::default();
        }

        pub fn set_difficulty(&mut self, name: &str) -> bool {
            let Some(difficulty) = Difficulty::parse(name) else {
                return false;
            };
            self.settings.apply_difficulty(difficulty);
            self.state.paddle_mut(Side::Right).speed = self.settings.ai_paddle_speed();
            if let Err(e) = self.settings.save(&mut self.store) {
                log::warn!("Failed to save settings: {}", e);
            }
            true
        }

        pub fn score_left(&self) -> u32 {
            self.state.score_of(Side::Left)
        }

        pub fn score_right(&self) -> u32 {
            self.state.score_of(Side::Right)
        }

        /// Full match state as JSON, for the renderer
        pub fn state_json(&self) -> Result<String, JsValue> {
            serde_json::to_string(&self.state).map_err(|e| JsValue::from_str(&e.to_string()))
        }

        /// Events from the last tick as JSON (sounds, flashes)
        pub fn events_json(&self) -> Result<String, JsValue> {
            serde_json::to_string(&self.state.events).map_err(|e| JsValue::from_str(&e.to_string()))
        }

        pub fn save_model(&mut self) {
            if let Err(e) = save_model(&mut self.store, self.ai.network()) {
                log::warn!("Failed to save model: {}", e);
            }
        }

        /// Forget everything the AI learned
        pub fn reset_ai(&mut self) -> Result<(), JsValue> {
            if let Err(e) = clear_model(&mut self.store) {
                log::warn!("Failed to clear saved model: {}", e);
            }
            self.ai = NeuralController::new(&self.settings.ai).map_err(|e| JsValue::from_str(&e.to_string()))?;
            Ok(())
        }
    }

    pub fn init() {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Logger init failed: {e}").into());
        }
        log::info!("Quantum Pong starting...");
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::init();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use clap::Parser;
    use quantum_pong::consts::SIM_DT;
    use quantum_pong::persistence::{FileStore, load_controller, save_model};
    use quantum_pong::sim::{GamePhase, MatchState, Side, TickInput, tick};
    use quantum_pong::{Difficulty, NeuralController, Settings};

    /// Headless self-play trainer for the Quantum Pong AI
    #[derive(Debug, Parser)]
    #[command(name = "quantum-pong")]
    #[command(about = "Train the Quantum Pong AI against a tracking paddle")]
    pub struct Cli {
        /// Matches to play
        #[arg(long, default_value_t = 10)]
        matches: u32,
        /// Seed of the first match; later matches add their index
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Difficulty preset (easy, medium, hard); saved with the settings
        #[arg(long, value_parser = parse_difficulty)]
        difficulty: Option<Difficulty>,
        /// Directory holding the saved model and settings
        #[arg(long, default_value = "saves")]
        save_dir: PathBuf,
        /// Give up on a match after this many simulated seconds
        #[arg(long, default_value_t = 600)]
        max_secs: u32,
        /// Ignore any saved model and start from fresh weights
        #[arg(long)]
        fresh: bool,
        /// Epsilon-greedy exploration while training
        #[arg(long)]
        explore: bool,
    }

    fn parse_difficulty(value: &str) -> Result<Difficulty, String> {
        Difficulty::parse(value).ok_or_else(|| format!("unknown difficulty: {value} (easy|medium|hard)"))
    }

    /// Left paddle input that chases the closest ball
    fn tracking_axis(state: &MatchState) -> f32 {
        let paddle_y = state.paddle(Side::Left).body.position.y;
        let target = state
            .balls
            .iter()
            .min_by(|a, b| a.body.position.x.total_cmp(&b.body.position.x))
            .map(|b| b.body.position.y)
            .unwrap_or(paddle_y);
        ((target - paddle_y) / 20.0).clamp(-1.0, 1.0)
    }

    fn play_match(
        seed: u64,
        settings: &Settings,
        ai: &mut NeuralController,
        max_ticks: u64,
    ) -> Result<MatchState, Box<dyn std::error::Error>> {
        let mut state = MatchState::new(seed, settings);
        let launch = TickInput {
            launch: true,
            ..Default::default()
        };
        tick(&mut state, ai, &launch, SIM_DT)?;

        while state.phase != GamePhase::GameOver && state.time_ticks < max_ticks {
            let input = TickInput {
                paddle_axis: tracking_axis(&state),
                ..Default::default()
            };
            tick(&mut state, ai, &input, SIM_DT)?;
        }
        Ok(state)
    }

    pub fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
        let mut store = FileStore::new(cli.save_dir.clone());
        let mut settings = Settings::load(&store);
        if let Some(difficulty) = cli.difficulty {
            settings.apply_difficulty(difficulty);
            settings.save(&mut store)?;
        }
        settings.ai.exploration |= cli.explore;

        let mut ai = if cli.fresh {
            NeuralController::new(&settings.ai)?
        } else {
            load_controller(&store, &settings.ai)?
        };

        let max_ticks = (cli.max_secs as f32 / SIM_DT) as u64;
        let mut ai_wins = 0;
        for i in 0..cli.matches {
            let state = play_match(cli.seed.wrapping_add(i as u64), &settings, &mut ai, max_ticks)?;
            let [left, right] = state.score;
            if right > left {
                ai_wins += 1;
            }
            log::info!(
                "Match {}/{}: tracker {} - {} AI ({:.0}s, {} training rounds, epsilon {:.3})",
                i + 1,
                cli.matches,
                left,
                right,
                state.elapsed,
                ai.training_rounds(),
                ai.epsilon()
            );
        }

        log::info!("AI won {}/{} matches", ai_wins, cli.matches);
        save_model(&mut store, ai.network())?;
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_cli_defaults() {
            let cli = Cli::try_parse_from(["quantum-pong"]).unwrap();
            assert_eq!(cli.matches, 10);
            assert_eq!(cli.seed, 1);
            assert_eq!(cli.difficulty, None);
            assert_eq!(cli.save_dir, PathBuf::from("saves"));
            assert!(!cli.fresh && !cli.explore);
        }

        #[test]
        fn test_cli_flags() {
            let cli = Cli::try_parse_from([
                "quantum-pong",
                "--matches",
                "3",
                "--difficulty",
                "hard",
                "--save-dir",
                "/tmp/qp",
                "--fresh",
                "--explore",
            ])
            .unwrap();
            assert_eq!(cli.matches, 3);
            assert_eq!(cli.difficulty, Some(Difficulty::Hard));
            assert_eq!(cli.save_dir, PathBuf::from("/tmp/qp"));
            assert!(cli.fresh && cli.explore);
        }

        #[test]
        fn test_cli_rejects_bad_values() {
            assert!(Cli::try_parse_from(["quantum-pong", "--difficulty", "nightmare"]).is_err());
            assert!(Cli::try_parse_from(["quantum-pong", "--matches", "many"]).is_err());
            assert!(Cli::try_parse_from(["quantum-pong", "--bogus"]).is_err());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Quantum Pong (native self-play) starting...");

    let cli = <native::Cli as clap::Parser>::parse();
    match native::run(cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
