use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::prelude::*;

use crate::ai::eval::{EvalWeights, Evaluator};
use crate::ai::search::HeuristicSelector;
use crate::board::{Source, Target};
use crate::config::MatchConfig;
use crate::dice::{Roll, SeededDice};
use crate::error::EngineError;
use crate::game::{Continuation, Engine};
use crate::opening::{self, OpeningDrill};
use crate::pipdrill::{Difficulty, DrillRecord, PipDrill, SessionStats};
use crate::types::{CommandOutcome, PositionView};

/// Move endpoint as sent by the page: a point number or `"bar"` / `"off"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Endpoint {
    Point(u8),
    Named(String),
}

impl Endpoint {
    fn source(&self) -> Result<Source, EngineError> {
        match self {
            Self::Point(point @ 1..=24) => Ok(Source::Point(*point)),
            Self::Named(name) if name == "bar" => Ok(Source::Bar),
            other => Err(EngineError::InvalidEndpoint(other.describe())),
        }
    }

    fn target(&self) -> Result<Target, EngineError> {
        match self {
            Self::Point(point @ 1..=24) => Ok(Target::Point(*point)),
            Self::Named(name) if name == "off" => Ok(Target::Off),
            other => Err(EngineError::InvalidEndpoint(other.describe())),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Point(point) => point.to_string(),
            Self::Named(name) => name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    from: Endpoint,
    to: Endpoint,
}

impl MoveRequest {
    fn endpoints(&self) -> Result<(Source, Target), EngineError> {
        Ok((self.from.source()?, self.to.target()?))
    }
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    Ok(value.serialize(&Serializer::json_compatible())?)
}

/// `undefined` and `null` fall back to the default value.
fn from_js_or_default<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_wasm_bindgen::from_value(value)?)
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsError::new(&err.to_string()).into()
}

/// Match against the computer, driven by the page.
#[wasm_bindgen]
pub struct BackgammonEngine {
    engine: Engine,
}

#[wasm_bindgen]
impl BackgammonEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, seed: u64) -> Result<BackgammonEngine, JsValue> {
        let config: MatchConfig = from_js_or_default(config)?;
        let engine = Engine::with_seed(config, seed).map_err(js_error)?;
        Ok(Self { engine })
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.state())
    }

    pub fn new_match(&mut self, config: JsValue) -> Result<JsValue, JsValue> {
        let config: MatchConfig = from_js_or_default(config)?;
        let result = self.engine.new_match(config);
        self.outcome(result)
    }

    pub fn start_match(&mut self) -> Result<JsValue, JsValue> {
        let result = self.engine.start_match();
        self.outcome(result)
    }

    pub fn roll(&mut self) -> Result<JsValue, JsValue> {
        let result = self.engine.roll();
        self.outcome(result)
    }

    /// Expects `{ from, to }` with points as numbers and `"bar"` / `"off"`.
    pub fn play(&mut self, mv: JsValue) -> Result<JsValue, JsValue> {
        let request: MoveRequest = serde_wasm_bindgen::from_value(mv)?;
        let result = request
            .endpoints()
            .and_then(|(from, to)| self.engine.play(from, to));
        self.outcome(result)
    }

    /// Click-to-move: plays the highest die available from `from`.
    pub fn play_from(&mut self, from: JsValue) -> Result<JsValue, JsValue> {
        let endpoint: Endpoint = serde_wasm_bindgen::from_value(from)?;
        let result = endpoint
            .source()
            .and_then(|from| self.engine.play_from(from));
        self.outcome(result)
    }

    pub fn undo(&mut self) -> Result<JsValue, JsValue> {
        let result = self.engine.undo();
        self.outcome(result)
    }

    pub fn confirm_turn(&mut self) -> Result<JsValue, JsValue> {
        let result = self.engine.confirm_turn();
        self.outcome(result)
    }

    pub fn offer_double(&mut self) -> Result<JsValue, JsValue> {
        let result = self.engine.offer_double();
        self.outcome(result)
    }

    pub fn respond_double(&mut self, take: bool) -> Result<JsValue, JsValue> {
        let result = self.engine.respond_double(take);
        self.outcome(result)
    }

    /// Call once per second. Returns `true` when a side lost on time.
    pub fn tick(&mut self) -> bool {
        self.engine.tick()
    }

    /// Runs the continuation found in `state().pending` once its delay has
    /// elapsed. Stale continuations return `false`.
    pub fn resume(&mut self, continuation: JsValue) -> Result<bool, JsValue> {
        let continuation: Continuation = serde_wasm_bindgen::from_value(continuation)?;
        Ok(self.engine.resume(continuation))
    }

    /// Replaces the computer's evaluator with a weights blob.
    pub fn load_weights(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        let weights = EvalWeights::from_bytes(bytes).map_err(js_error)?;
        let timeout = Duration::from_millis(self.engine.config().ai.search_timeout_ms);
        self.engine.set_selector(Box::new(HeuristicSelector::new(
            Evaluator::new(weights),
            timeout,
        )));
        Ok(())
    }
}

impl BackgammonEngine {
    fn outcome<T, E: std::fmt::Display>(&self, result: Result<T, E>) -> Result<JsValue, JsValue> {
        to_js(&CommandOutcome::from_result(result, self.engine.state()))
    }
}

#[derive(Debug, Serialize)]
struct PipDrillState {
    difficulty: Difficulty,
    position: PositionView,
    last: Option<DrillRecord>,
    stats: SessionStats,
}

/// Pip-counting practice with running session statistics.
#[wasm_bindgen]
pub struct PipDrillSession {
    rng: ChaCha8Rng,
    drill: PipDrill,
    last: Option<DrillRecord>,
    stats: SessionStats,
}

#[wasm_bindgen]
impl PipDrillSession {
    #[wasm_bindgen(constructor)]
    pub fn new(difficulty: JsValue, seed: u64) -> Result<PipDrillSession, JsValue> {
        let difficulty: Difficulty = from_js_or_default(difficulty)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let drill = PipDrill::new(difficulty, &mut rng).map_err(js_error)?;
        Ok(Self {
            rng,
            drill,
            last: None,
            stats: SessionStats::default(),
        })
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.snapshot())
    }

    /// Checks `answer` against the pip count and records the result.
    pub fn submit(&mut self, answer: u16) -> Result<JsValue, JsValue> {
        let result = self.drill.submit(answer).map(|record| {
            self.stats.record(&record);
            self.last = Some(record);
        });
        to_js(&CommandOutcome::from_result(result, self.snapshot()))
    }

    /// New position; `difficulty` may be omitted to keep the current one.
    pub fn next(&mut self, difficulty: JsValue) -> Result<JsValue, JsValue> {
        let difficulty = if difficulty.is_undefined() || difficulty.is_null() {
            self.drill.difficulty()
        } else {
            serde_wasm_bindgen::from_value(difficulty)?
        };
        self.drill = PipDrill::new(difficulty, &mut self.rng).map_err(js_error)?;
        self.last = None;
        self.state()
    }

    pub fn reset_stats(&mut self) {
        self.stats = SessionStats::default();
    }
}

impl PipDrillSession {
    fn snapshot(&self) -> PipDrillState {
        PipDrillState {
            difficulty: self.drill.difficulty(),
            position: self.drill.position(),
            last: self.last.clone(),
            stats: self.stats,
        }
    }
}

/// Opening-move practice against the book.
#[wasm_bindgen]
pub struct OpeningTrainer {
    drill: OpeningDrill,
    dice: SeededDice,
}

#[wasm_bindgen]
impl OpeningTrainer {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> OpeningTrainer {
        Self {
            drill: OpeningDrill::new(),
            dice: SeededDice::new(seed),
        }
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.drill.view())
    }

    pub fn roll(&mut self) -> Result<JsValue, JsValue> {
        self.drill.roll(&mut self.dice);
        self.state()
    }

    pub fn play(&mut self, mv: JsValue) -> Result<JsValue, JsValue> {
        let request: MoveRequest = serde_wasm_bindgen::from_value(mv)?;
        let result = request
            .endpoints()
            .and_then(|(from, to)| self.drill.play(from, to));
        self.outcome(result)
    }

    pub fn play_from(&mut self, from: JsValue) -> Result<JsValue, JsValue> {
        let endpoint: Endpoint = serde_wasm_bindgen::from_value(from)?;
        let result = endpoint
            .source()
            .and_then(|from| self.drill.play_from(from));
        self.outcome(result)
    }

    pub fn try_again(&mut self) -> Result<JsValue, JsValue> {
        let result = self.drill.try_again();
        self.outcome(result)
    }

    /// Book play as `[{ mv, position }]`, one entry per checker move.
    pub fn reveal(&self) -> Result<JsValue, JsValue> {
        let result = self.drill.reveal();
        let steps = result.clone().unwrap_or_default();
        to_js(&CommandOutcome::from_result(result, steps))
    }
}

impl OpeningTrainer {
    fn outcome<T>(&self, result: Result<T, EngineError>) -> Result<JsValue, JsValue> {
        to_js(&CommandOutcome::from_result(result, self.drill.view()))
    }
}

/// Book plays for the opening roll `a`-`b`, in either order.
#[wasm_bindgen]
pub fn opening_book_entry(a: u8, b: u8) -> Result<JsValue, JsValue> {
    to_js(opening::lookup(Roll::new(a, b)))
}
