use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

pub const ROUND_SECONDS: u32 = 30;
pub const HIT_RADIUS: f64 = 50.0;
pub const FIELD_WIDTH: f64 = 800.0;
pub const FIELD_HEIGHT: f64 = 600.0;

const TARGET_MARGIN: f64 = 50.0;
const BASE_HIT_SCORE: f64 = 10.0;
const COMBO_STEP: f64 = 0.1;
const MAX_MULTIPLIER: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetPosition {
    pub x: f64,
    pub y: f64,
}

type TargetPlacer = Arc<dyn Fn() -> TargetPosition + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    NotStarted,
    Running,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Click arrived outside a running round.
    Ignored,
    Miss,
    Hit { scored: i64 },
}

/// Time-boxed clicking game: NotStarted -> Running -> Ended. The round
/// countdown is driven by explicit once-per-second ticks.
pub struct TargetGame {
    phase: GamePhase,
    score: i64,
    combo: u32,
    time_left: u32,
    target: TargetPosition,
    target_placer: TargetPlacer,
}

fn random_target() -> TargetPosition {
    let mut rng = rand::thread_rng();
    TargetPosition {
        x: rng.gen_range(TARGET_MARGIN..=FIELD_WIDTH - TARGET_MARGIN),
        y: rng.gen_range(TARGET_MARGIN..=FIELD_HEIGHT - TARGET_MARGIN),
    }
}

impl Default for TargetGame {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetGame {
    pub fn new() -> Self {
        Self {
            phase: GamePhase::NotStarted,
            score: 0,
            combo: 0,
            time_left: 0,
            target: TargetPosition { x: 0.0, y: 0.0 },
            target_placer: Arc::new(random_target),
        }
    }

    pub fn with_target_placer(mut self, target_placer: TargetPlacer) -> Self {
        self.target_placer = target_placer;
        self
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn target(&self) -> TargetPosition {
        self.target
    }

    /// Starts a fresh round; an ended game can be restarted.
    pub fn start(&mut self) {
        self.phase = GamePhase::Running;
        self.score = 0;
        self.combo = 0;
        self.time_left = ROUND_SECONDS;
        self.target = (self.target_placer)();
    }

    /// The multiplier comes from the combo built up before this hit, so the
    /// first hit of a round always scores the base 10.
    pub fn register_click(&mut self, x: f64, y: f64) -> ClickOutcome {
        if self.phase != GamePhase::Running {
            return ClickOutcome::Ignored;
        }

        let dx = x - self.target.x;
        let dy = y - self.target.y;
        if dx * dx + dy * dy > HIT_RADIUS * HIT_RADIUS {
            return ClickOutcome::Miss;
        }

        let multiplier = (1.0 + COMBO_STEP * self.combo as f64).min(MAX_MULTIPLIER);
        let scored = (BASE_HIT_SCORE * multiplier).floor() as i64;
        self.score += scored;
        self.combo += 1;
        self.target = (self.target_placer)();
        ClickOutcome::Hit { scored }
    }

    /// Counts the round down by one second; returns true when this tick
    /// ended the round (the caller then credits the final score).
    pub fn tick(&mut self) -> bool {
        if self.phase != GamePhase::Running {
            return false;
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.phase = GamePhase::Ended;
            return true;
        }
        false
    }

    /// Ends the round immediately with the current score.
    pub fn finish_early(&mut self) -> bool {
        if self.phase != GamePhase::Running {
            return false;
        }
        self.phase = GamePhase::Ended;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed_placer() -> TargetPlacer {
        Arc::new(|| TargetPosition { x: 400.0, y: 300.0 })
    }

    fn game() -> TargetGame {
        let mut game = TargetGame::new().with_target_placer(fixed_placer());
        game.start();
        game
    }

    #[test]
    fn start_resets_round_state() {
        let mut game = game();
        game.register_click(400.0, 300.0);
        game.tick();

        game.start();
        assert_eq!(game.phase(), GamePhase::Running);
        assert_eq!(game.score(), 0);
        assert_eq!(game.combo(), 0);
        assert_eq!(game.time_left(), ROUND_SECONDS);
    }

    #[test]
    fn five_consecutive_hits_score_sixty() {
        let mut game = game();
        let mut total = 0;
        for expected in [10, 11, 12, 13, 14] {
            match game.register_click(400.0, 300.0) {
                ClickOutcome::Hit { scored } => {
                    assert_eq!(scored, expected);
                    total += scored;
                }
                other => panic!("expected hit, got {other:?}"),
            }
        }
        assert_eq!(total, 60);
        assert_eq!(game.score(), 60);
        assert_eq!(game.combo(), 5);
    }

    #[test]
    fn multiplier_caps_at_five() {
        let mut game = game();
        for _ in 0..45 {
            game.register_click(400.0, 300.0);
        }
        // Combo 45 would give 1 + 4.5 = 5.5 without the cap.
        match game.register_click(400.0, 300.0) {
            ClickOutcome::Hit { scored } => assert_eq!(scored, 50),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn hit_boundary_is_inclusive_and_misses_change_nothing() {
        let mut game = game();
        match game.register_click(400.0 + HIT_RADIUS, 300.0) {
            ClickOutcome::Hit { scored } => assert_eq!(scored, 10),
            other => panic!("expected boundary hit, got {other:?}"),
        }

        assert_eq!(game.register_click(400.0, 300.0 + HIT_RADIUS + 0.1), ClickOutcome::Miss);
        assert_eq!(game.score(), 10);
        assert_eq!(game.combo(), 1);
    }

    #[test]
    fn hits_relocate_the_target() {
        let positions = [
            TargetPosition { x: 100.0, y: 100.0 },
            TargetPosition { x: 700.0, y: 500.0 },
        ];
        let cursor = Arc::new(AtomicUsize::new(0));
        let placer_cursor = Arc::clone(&cursor);
        let mut game = TargetGame::new().with_target_placer(Arc::new(move || {
            let index = placer_cursor.fetch_add(1, Ordering::Relaxed);
            positions[index % positions.len()]
        }));
        game.start();
        assert_eq!(game.target(), positions[0]);

        game.register_click(100.0, 100.0);
        assert_eq!(game.target(), positions[1]);
    }

    #[test]
    fn countdown_reaches_ended_after_round_seconds() {
        let mut game = game();
        for _ in 0..ROUND_SECONDS - 1 {
            assert!(!game.tick());
        }
        assert!(game.tick());
        assert_eq!(game.phase(), GamePhase::Ended);

        assert!(!game.tick());
        assert_eq!(game.register_click(400.0, 300.0), ClickOutcome::Ignored);
    }

    #[test]
    fn clicks_before_start_are_ignored() {
        let mut game = TargetGame::new().with_target_placer(fixed_placer());
        assert_eq!(game.register_click(400.0, 300.0), ClickOutcome::Ignored);
        assert!(!game.tick());
    }

    #[test]
    fn finish_early_ends_a_running_round_once() {
        let mut game = game();
        game.register_click(400.0, 300.0);
        assert!(game.finish_early());
        assert_eq!(game.phase(), GamePhase::Ended);
        assert!(!game.finish_early());
        assert_eq!(game.score(), 10);
    }

    #[test]
    fn random_targets_stay_in_bounds() {
        for _ in 0..200 {
            let target = random_target();
            assert!(target.x >= TARGET_MARGIN && target.x <= FIELD_WIDTH - TARGET_MARGIN);
            assert!(target.y >= TARGET_MARGIN && target.y <= FIELD_HEIGHT - TARGET_MARGIN);
        }
    }
}
