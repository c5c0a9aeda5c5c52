use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Duration tracks running in parallel. Each track produces one outcome per
/// period and is numbered independently of the others.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Track {
    #[serde(rename = "30s")]
    Sec30,
    #[serde(rename = "1min")]
    Min1,
    #[serde(rename = "3min")]
    Min3,
    #[serde(rename = "5min")]
    Min5,
}

impl Track {
    pub const ALL: [Track; 4] = [Track::Sec30, Track::Min1, Track::Min3, Track::Min5];

    pub fn duration_secs(&self) -> u64 {
        match self {
            Track::Sec30 => 30,
            Track::Min1 => 60,
            Track::Min3 => 180,
            Track::Min5 => 300,
        }
    }

    /// Period window in milliseconds.
    pub fn window_ms(&self) -> i64 {
        self.duration_secs() as i64 * 1000
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Sec30 => write!(f, "30s"),
            Track::Min1 => write!(f, "1min"),
            Track::Min3 => write!(f, "3min"),
            Track::Min5 => write!(f, "5min"),
        }
    }
}

impl FromStr for Track {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "30s" => Ok(Track::Sec30),
            "1min" => Ok(Track::Min1),
            "3min" => Ok(Track::Min3),
            "5min" => Ok(Track::Min5),
            other => Err(EngineError::InvalidSelection(format!(
                "unknown track: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Violet,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Green => write!(f, "green"),
            Color::Violet => write!(f, "violet"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Big,
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Small => write!(f, "small"),
            Size::Big => write!(f, "big"),
        }
    }
}

/// Color derived from a drawn digit: violet for 0 and 5, red for the other
/// even digits, green for the other odd digits.
pub fn color_of(number: u8) -> Color {
    if number == 0 || number == 5 {
        Color::Violet
    } else if number % 2 == 0 {
        Color::Red
    } else {
        Color::Green
    }
}

/// Size derived from a drawn digit: big for 5-9, small for 0-4.
pub fn size_of(number: u8) -> Size {
    if number >= 5 {
        Size::Big
    } else {
        Size::Small
    }
}

/// What a wager predicts. Exactly one kind per wager; match logic dispatches
/// on the tag, never on runtime inspection of a loosely typed value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Selection {
    Digit(u8),
    Color(Color),
    Size(Size),
}

impl Selection {
    pub fn validate(&self) -> EngineResult<()> {
        match self {
            Selection::Digit(d) if *d > 9 => Err(EngineError::InvalidSelection(format!(
                "digit must be 0-9, got {}",
                d
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Digit(d) => write!(f, "{}", d),
            Selection::Color(c) => write!(f, "{}", c),
            Selection::Size(s) => write!(f, "{}", s),
        }
    }
}

/// The published result for one closed period. At most one outcome may exist
/// per `(track, period_id)`; `size` and `color` are derived from `number`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outcome {
    pub track: Track,
    pub period_id: u64,
    pub number: u8,
    pub size: Size,
    pub color: Color,
}

impl Outcome {
    pub fn from_number(track: Track, period_id: u64, number: u8) -> Self {
        Self {
            track,
            period_id,
            number,
            size: size_of(number),
            color: color_of(number),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WagerStatus {
    Pending,
    Won,
    Lost,
}

/// A user's stake against a specific period of a track. Transitions
/// pending -> won|lost exactly once, performed solely by the settlement
/// engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wager {
    pub id: Uuid,
    pub user_id: String,
    pub track: Track,
    pub period_id: u64,
    pub selection: Selection,
    pub amount: f64,
    pub status: WagerStatus,
    pub payout_amount: f64,
    pub placed_at_ms: i64,
}

impl Wager {
    pub fn pending(
        user_id: impl Into<String>,
        track: Track,
        period_id: u64,
        selection: Selection,
        amount: f64,
        placed_at_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            track,
            period_id,
            selection,
            amount,
            status: WagerStatus::Pending,
            payout_amount: 0.0,
            placed_at_ms,
        }
    }
}

/// Balance and turnover state for one user.
///
/// `required_turnover` and `completed_turnover` only ever increase; a
/// withdrawal is permitted only once completed catches up with required.
/// `version` is the optimistic-locking counter bumped on every stored write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub user_id: String,
    pub balance: f64,
    pub required_turnover: f64,
    pub completed_turnover: f64,
    #[serde(default)]
    pub last_spin_ms: Option<i64>,
    #[serde(default)]
    pub version: u64,
}

impl Account {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            balance: 0.0,
            required_turnover: 0.0,
            completed_turnover: 0.0,
            last_spin_ms: None,
            version: 0,
        }
    }

    pub fn can_withdraw(&self) -> bool {
        self.completed_turnover >= self.required_turnover
    }

    pub fn turnover_remaining(&self) -> f64 {
        (self.required_turnover - self.completed_turnover).max(0.0)
    }
}

/// Operator override for the next draw of one targeted track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultOverride {
    Auto,
    Small,
    Big,
    Red,
    Green,
}

const ALL_DIGITS: [u8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
const SMALL_DIGITS: [u8; 5] = [0, 1, 2, 3, 4];
const BIG_DIGITS: [u8; 5] = [5, 6, 7, 8, 9];
const RED_DIGITS: [u8; 4] = [2, 4, 6, 8];
const GREEN_DIGITS: [u8; 4] = [1, 3, 7, 9];

impl ResultOverride {
    /// Digits the draw is restricted to under this override.
    pub fn digit_pool(&self) -> &'static [u8] {
        match self {
            ResultOverride::Auto => &ALL_DIGITS,
            ResultOverride::Small => &SMALL_DIGITS,
            ResultOverride::Big => &BIG_DIGITS,
            ResultOverride::Red => &RED_DIGITS,
            ResultOverride::Green => &GREEN_DIGITS,
        }
    }
}

/// The operator-editable settings document. The override biases only the
/// targeted track; every other track keeps the unbiased draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSettings {
    pub next_result: ResultOverride,
    #[serde(default)]
    pub override_track: Option<Track>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            next_result: ResultOverride::Auto,
            override_track: None,
        }
    }
}
