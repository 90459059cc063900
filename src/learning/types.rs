use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::physics::ControlInput;

const COMPOSITE_SEPARATOR: char = '|';
const COMPOSITE_ESCAPE: char = '\\';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    MoveRight,
    MoveLeft,
    JumpRight,
    JumpLeft,
    JumpOnly,
    Wait,
}

impl Action {
    /// Declaration order doubles as the tie-break order everywhere.
    pub const ALL: [Action; 6] = [
        Action::MoveRight,
        Action::MoveLeft,
        Action::JumpRight,
        Action::JumpLeft,
        Action::JumpOnly,
        Action::Wait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoveRight => "move_right",
            Self::MoveLeft => "move_left",
            Self::JumpRight => "jump_right",
            Self::JumpLeft => "jump_left",
            Self::JumpOnly => "jump_only",
            Self::Wait => "wait",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "move_right" => Some(Self::MoveRight),
            "move_left" => Some(Self::MoveLeft),
            "jump_right" => Some(Self::JumpRight),
            "jump_left" => Some(Self::JumpLeft),
            "jump_only" => Some(Self::JumpOnly),
            "wait" => Some(Self::Wait),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn is_rightward(&self) -> bool {
        matches!(self, Self::MoveRight | Self::JumpRight)
    }

    pub fn is_leftward(&self) -> bool {
        matches!(self, Self::MoveLeft | Self::JumpLeft)
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, Self::JumpRight | Self::JumpLeft | Self::JumpOnly)
    }

    /// Actions that push toward the goal or upward.
    pub fn is_progressive(&self) -> bool {
        matches!(self, Self::MoveRight | Self::JumpRight | Self::JumpOnly)
    }

    pub fn control_input(&self) -> ControlInput {
        ControlInput {
            left: self.is_leftward(),
            right: self.is_rightward(),
            jump: self.is_jump(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalMotion {
    Still,
    Right,
    Left,
}

impl HorizontalMotion {
    fn code(&self) -> char {
        match self {
            Self::Still => 'S',
            Self::Right => 'R',
            Self::Left => 'L',
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(Self::Still),
            "R" => Some(Self::Right),
            "L" => Some(Self::Left),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalMotion {
    Rising,
    Falling,
    Neutral,
}

impl VerticalMotion {
    fn code(&self) -> char {
        match self {
            Self::Rising => 'U',
            Self::Falling => 'D',
            Self::Neutral => 'N',
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "U" => Some(Self::Rising),
            "D" => Some(Self::Falling),
            "N" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Discretised situation of the body. Produced only by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub grid_x: i32,
    pub grid_y: i32,
    pub on_ground: bool,
    pub horizontal: HorizontalMotion,
    pub vertical: VerticalMotion,
    pub goal_bucket: u8,
}

impl StateKey {
    /// Same motion buckets and ground flag, grid cells within `tolerance`.
    pub fn is_near(&self, other: &StateKey, tolerance: i32) -> bool {
        self.on_ground == other.on_ground
            && self.horizontal == other.horizontal
            && self.vertical == other.vertical
            && self.grid_x.abs_diff(other.grid_x) <= tolerance.unsigned_abs()
            && self.grid_y.abs_diff(other.grid_y) <= tolerance.unsigned_abs()
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.grid_x,
            self.grid_y,
            u8::from(self.on_ground),
            self.horizontal.code(),
            self.vertical.code(),
            self.goal_bucket
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("expected 6 comma separated fields, got {0}")]
    FieldCount(usize),
    #[error("invalid field `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
    #[error("malformed composite key: {0}")]
    Composite(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

fn invalid(field: &'static str, value: &str) -> KeyParseError {
    KeyParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

impl FromStr for StateKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 6 {
            return Err(KeyParseError::FieldCount(parts.len()));
        }
        let on_ground = match parts[2] {
            "0" => false,
            "1" => true,
            other => return Err(invalid("on_ground", other)),
        };
        Ok(Self {
            grid_x: parts[0].parse().map_err(|_| invalid("grid_x", parts[0]))?,
            grid_y: parts[1].parse().map_err(|_| invalid("grid_y", parts[1]))?,
            on_ground,
            horizontal: HorizontalMotion::from_code(parts[3])
                .ok_or_else(|| invalid("horizontal", parts[3]))?,
            vertical: VerticalMotion::from_code(parts[4]).ok_or_else(|| invalid("vertical", parts[4]))?,
            goal_bucket: parts[5].parse().map_err(|_| invalid("goal_bucket", parts[5]))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryKey {
    pub state: StateKey,
    pub action: Action,
}

impl MemoryKey {
    pub fn new(state: StateKey, action: Action) -> Self {
        Self { state, action }
    }

    pub fn to_composite(&self) -> String {
        encode_composite(&[&self.state.to_string(), self.action.as_str()])
    }

    pub fn from_composite(s: &str) -> Result<Self, KeyParseError> {
        let parts = decode_composite(s)?;
        let [state, action] = parts.as_slice() else {
            return Err(KeyParseError::Composite(s.to_string()));
        };
        Ok(Self {
            state: state.parse()?,
            action: Action::parse(action).ok_or_else(|| KeyParseError::UnknownAction(action.clone()))?,
        })
    }
}

/// Joins parts with `|`, escaping `\` and `|` inside each part.
pub fn encode_composite(parts: &[&str]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(COMPOSITE_SEPARATOR);
        }
        for c in part.chars() {
            if c == COMPOSITE_SEPARATOR || c == COMPOSITE_ESCAPE {
                out.push(COMPOSITE_ESCAPE);
            }
            out.push(c);
        }
    }
    out
}

pub fn decode_composite(s: &str) -> Result<Vec<String>, KeyParseError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            COMPOSITE_ESCAPE => match chars.next() {
                Some(next) if next == COMPOSITE_SEPARATOR || next == COMPOSITE_ESCAPE => {
                    current.push(next)
                }
                _ => return Err(KeyParseError::Composite(s.to_string())),
            },
            COMPOSITE_SEPARATOR => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);
    Ok(parts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Frustrated,
    #[default]
    Neutral,
    Content,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frustrated => "frustrated",
            Self::Neutral => "neutral",
            Self::Content => "content",
        }
    }
}

/// Which branch of the policy produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Explore,
    Exploit,
    Recovery,
    Fallback,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explore => "explore",
            Self::Exploit => "exploit",
            Self::Recovery => "recovery",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EpisodePhase {
    #[default]
    Running,
    Dying,
    Winning,
    Resetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutePhase {
    #[default]
    Building,
    ExtendingRecord,
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StateKey {
        StateKey {
            grid_x: -3,
            grid_y: 204,
            on_ground: true,
            horizontal: HorizontalMotion::Right,
            vertical: VerticalMotion::Neutral,
            goal_bucket: 50,
        }
    }

    #[test]
    fn state_key_text_form_parses_back() {
        let text = key().to_string();
        assert_eq!(text, "-3,204,1,R,N,50");
        assert_eq!(text.parse::<StateKey>(), Ok(key()));
    }

    #[test]
    fn state_key_rejects_garbage() {
        assert!(matches!("1,2,3".parse::<StateKey>(), Err(KeyParseError::FieldCount(3))));
        assert!("1,2,2,R,N,5".parse::<StateKey>().is_err());
        assert!("1,2,1,X,N,5".parse::<StateKey>().is_err());
    }

    #[test]
    fn composite_escapes_separator_and_escape() {
        let encoded = encode_composite(&["a|b", "c\\d"]);
        assert_eq!(encoded, "a\\|b|c\\\\d");
        assert_eq!(decode_composite(&encoded).unwrap(), vec!["a|b", "c\\d"]);
    }

    #[test]
    fn composite_rejects_dangling_escape() {
        assert!(decode_composite("abc\\").is_err());
        assert!(decode_composite("a\\xb").is_err());
    }

    #[test]
    fn memory_key_composite_round_trip() {
        let k = MemoryKey::new(key(), Action::JumpRight);
        assert_eq!(k.to_composite(), "-3,204,1,R,N,50|jump_right");
        assert_eq!(MemoryKey::from_composite(&k.to_composite()), Ok(k));
        assert!(MemoryKey::from_composite("-3,204,1,R,N,50|fly").is_err());
        assert!(MemoryKey::from_composite("-3,204,1,R,N,50").is_err());
    }

    #[test]
    fn action_inputs_are_consistent() {
        for action in Action::ALL {
            let input = action.control_input();
            assert!(!(input.left && input.right));
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::Wait.control_input(), ControlInput::default());
    }

    #[test]
    fn nearby_states_respect_tolerance() {
        let a = key();
        let mut b = key();
        b.grid_x += 1;
        assert!(a.is_near(&b, 1));
        b.grid_x += 1;
        assert!(!a.is_near(&b, 1));
    }

    #[test]
    fn nearness_is_total_at_the_cell_extremes() {
        let low = StateKey {
            grid_x: i32::MIN,
            grid_y: i32::MIN,
            ..key()
        };
        let high = StateKey {
            grid_x: i32::MAX,
            grid_y: i32::MAX,
            ..key()
        };
        assert!(!low.is_near(&high, 1));
        assert!(!high.is_near(&low, i32::MAX));
        assert!(low.is_near(&low, 0));
        let parsed: StateKey = "-2147483648,0,1,R,N,10".parse().unwrap();
        assert!(!parsed.is_near(&key(), 1));
    }
}
