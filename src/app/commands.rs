//! Inbound command tokens.
//!
//! The switch box and the companion app send one short ASCII token per
//! line.  Tokens are case-sensitive; anything unknown is kept as
//! [`Token::Other`] so modal screens can still see it.

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `OK`: switch box heartbeat.
    Heartbeat,
    /// `+1`
    PlusOne,
    /// `-1`
    MinusOne,
    /// `+10`
    PlusTen,
    /// `-10`
    MinusTen,
    /// `OV`: override / confirm / exit, depending on the screen.
    Override,
    /// `PS`: pump stop / cancel.
    PumpStop,
    /// `TU`: thumbs up.
    ThumbsUp,
    /// `MIX`
    Mix,
    /// `FILL`
    Fill,
    /// Anything else (trimmed).
    Other(String),
}

impl Token {
    /// Parse one line; surrounding whitespace and line terminators are
    /// ignored.
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "OK" => Self::Heartbeat,
            "+1" => Self::PlusOne,
            "-1" => Self::MinusOne,
            "+10" => Self::PlusTen,
            "-10" => Self::MinusTen,
            "OV" => Self::Override,
            "PS" => Self::PumpStop,
            "TU" => Self::ThumbsUp,
            "MIX" => Self::Mix,
            "FILL" => Self::Fill,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Gallon delta for the four adjust tokens.
    pub fn gallon_delta(&self) -> Option<f64> {
        match self {
            Self::PlusOne => Some(1.0),
            Self::MinusOne => Some(-1.0),
            Self::PlusTen => Some(10.0),
            Self::MinusTen => Some(-10.0),
            _ => None,
        }
    }

    /// Wire form, for logging.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "OK",
            Self::PlusOne => "+1",
            Self::MinusOne => "-1",
            Self::PlusTen => "+10",
            Self::MinusTen => "-10",
            Self::Override => "OV",
            Self::PumpStop => "PS",
            Self::ThumbsUp => "TU",
            Self::Mix => "MIX",
            Self::Fill => "FILL",
            Self::Other(s) => s,
        }
    }
}
