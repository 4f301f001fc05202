use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::board::{Color, PerColor};
use crate::error::ConfigError;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeMode {
    Blitz,
    Rapid,
    Standard,
    Custom { initial: f64, increment: f64 },
}

impl TimeMode {
    /// `(initial seconds, increment seconds)`
    pub fn budget(&self) -> (f64, f64) {
        match *self {
            TimeMode::Blitz => (180.0, 2.0),
            TimeMode::Rapid => (600.0, 5.0),
            TimeMode::Standard => (1800.0, 0.0),
            TimeMode::Custom { initial, increment } => (initial, increment),
        }
    }
}

impl Default for TimeMode {
    fn default() -> Self {
        TimeMode::Standard
    }
}

impl fmt::Display for TimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeMode::Blitz => write!(f, "Blitz (3min + 2sec)"),
            TimeMode::Rapid => write!(f, "Rapid (10min + 5sec)"),
            TimeMode::Standard => write!(f, "Standard (30min)"),
            TimeMode::Custom { initial, increment } => write!(f, "Custom ({}s + {}s)", initial, increment),
        }
    }
}

impl FromStr for TimeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blitz" | "b" => Ok(TimeMode::Blitz),
            "rapid" | "r" => Ok(TimeMode::Rapid),
            "standard" | "s" => Ok(TimeMode::Standard),
            other => Err(ConfigError::UnknownTimeMode(other.to_string())),
        }
    }
}

/// The part of a clock that travels in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockState {
    pub remaining: PerColor<f64>,
    pub increment: f64,
    pub active_color: Option<Color>,
    pub running: bool,
    pub game_over: bool,
    pub timeout_color: Option<Color>,
}

/// Countdown clock for both sides. Time only elapses when one of the `_at`
/// operations is called.
#[derive(Debug, Clone)]
pub struct Clock {
    pub state: ClockState,
    last_update: Option<Instant>,
}

impl Clock {
    pub fn new(initial_seconds: f64, increment_seconds: f64) -> Clock {
        Clock {
            state: ClockState {
                remaining: PerColor::new(initial_seconds, initial_seconds),
                increment: increment_seconds,
                active_color: None,
                running: false,
                game_over: false,
                timeout_color: None,
            },
            last_update: None,
        }
    }

    pub fn for_mode(mode: TimeMode) -> Clock {
        let (initial, increment) = mode.budget();
        Clock::new(initial, increment)
    }

    /// Rebuilds a clock from a received state, measuring from `now`.
    pub fn from_state(state: ClockState, now: Instant) -> Clock {
        Clock { state, last_update: Some(now) }
    }

    pub fn remaining(&self, color: Color) -> f64 {
        self.state.remaining[color]
    }

    pub fn start_at(&mut self, color: Color, now: Instant) {
        self.state.active_color = Some(color);
        self.state.running = true;
        self.last_update = Some(now);
    }

    pub fn stop_at(&mut self, now: Instant) {
        self.tick_at(now);
        self.state.running = false;
        self.state.active_color = None;
    }

    pub fn pause_at(&mut self, now: Instant) {
        self.tick_at(now);
        self.state.running = false;
    }

    /// Restarts a paused clock for `color`, the side to move.
    pub fn resume_at(&mut self, color: Color, now: Instant) {
        if !self.state.game_over {
            self.state.active_color = Some(color);
            self.last_update = Some(now);
            self.state.running = true;
        }
    }

    /// Charges the elapsed time, credits the increment to the side that just
    /// moved and hands the clock to the other side.
    pub fn switch_at(&mut self, now: Instant) {
        if !self.state.running || self.state.game_over {
            return;
        }
        self.tick_at(now);
        if self.state.game_over {
            return;
        }
        if let Some(mover) = self.state.active_color {
            self.state.remaining[mover] += self.state.increment;
            self.state.active_color = Some(mover.opposite());
        }
        self.last_update = Some(now);
    }

    /// Charges the time elapsed since the last update to the active side and
    /// flags it when it runs out. Returns true when this call caused the flag.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        let active = match self.state.active_color {
            Some(color) if self.state.running && !self.state.game_over => color,
            _ => return false,
        };
        let elapsed = match self.last_update {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => 0.0,
        };
        self.last_update = Some(now);

        let remaining = &mut self.state.remaining[active];
        *remaining -= elapsed;
        if *remaining <= 0.0 {
            *remaining = 0.0;
            self.state.game_over = true;
            self.state.timeout_color = Some(active);
            self.state.running = false;
            log::info!("{} ran out of time", active);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use crate::board::Color::{Black, White};
    use crate::clock::{Clock, TimeMode};

    #[test]
    fn test_time_modes() {
        assert_eq!(TimeMode::Blitz.budget(), (180.0, 2.0));
        assert_eq!(TimeMode::Rapid.budget(), (600.0, 5.0));
        assert_eq!(TimeMode::Standard.budget(), (1800.0, 0.0));
        assert_eq!("Rapid".parse::<TimeMode>().unwrap(), TimeMode::Rapid);
        assert!("bullet".parse::<TimeMode>().is_err());
    }

    #[test]
    fn test_timeout() {
        let t0 = Instant::now();
        let mut clock = Clock::new(10.0, 0.0);
        clock.start_at(White, t0);
        assert!(!clock.tick_at(t0 + Duration::from_secs(5)));
        assert!((clock.remaining(White) - 5.0).abs() < 1e-9);

        assert!(clock.tick_at(t0 + Duration::from_millis(10_100)));
        assert_eq!(clock.remaining(White), 0.0);
        assert!(clock.state.game_over);
        assert!(!clock.state.running);
        assert_eq!(clock.state.timeout_color, Some(White));
        assert!(!clock.tick_at(t0 + Duration::from_secs(20)));
    }

    #[test]
    fn test_switch_adds_increment_to_mover() {
        let t0 = Instant::now();
        let mut clock = Clock::new(60.0, 2.0);
        clock.start_at(White, t0);
        clock.switch_at(t0 + Duration::from_secs(3));
        assert!((clock.remaining(White) - 59.0).abs() < 1e-9);
        assert_eq!(clock.state.active_color, Some(Black));

        clock.switch_at(t0 + Duration::from_secs(13));
        assert!((clock.remaining(Black) - 52.0).abs() < 1e-9);
        assert!((clock.remaining(White) - 59.0).abs() < 1e-9);
        assert_eq!(clock.state.active_color, Some(White));
    }

    #[test]
    fn test_pause_resume() {
        let t0 = Instant::now();
        let mut clock = Clock::new(30.0, 0.0);
        clock.switch_at(t0);
        assert_eq!(clock.state.active_color, None);

        clock.start_at(Black, t0);
        clock.pause_at(t0 + Duration::from_secs(1));
        clock.tick_at(t0 + Duration::from_secs(20));
        assert!((clock.remaining(Black) - 29.0).abs() < 1e-9);

        clock.resume_at(Black, t0 + Duration::from_secs(20));
        clock.tick_at(t0 + Duration::from_secs(22));
        assert!((clock.remaining(Black) - 27.0).abs() < 1e-9);

        clock.stop_at(t0 + Duration::from_secs(23));
        assert!(!clock.state.running);
        assert_eq!(clock.state.active_color, None);
    }
}
