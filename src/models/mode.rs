use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::estimates::EstimateError;

/// Flavor of estimate the user wants back.
///
/// `Work` and `Generic` are user-selectable and persisted. `Humorous` is only
/// ever reached through the long-shake override and is never stored as a
/// preference.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    #[default]
    Work,
    Generic,
    Humorous,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Work => "work",
            Mode::Generic => "generic",
            Mode::Humorous => "humorous",
        }
    }

    pub fn is_user_selectable(&self) -> bool {
        matches!(self, Mode::Work | Mode::Generic)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = EstimateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "work" => Ok(Mode::Work),
            "generic" => Ok(Mode::Generic),
            "humorous" => Ok(Mode::Humorous),
            other => Err(EstimateError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_mode_from_its_string() {
        for mode in [Mode::Work, Mode::Generic, Mode::Humorous] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = "serious".parse::<Mode>().unwrap_err();
        assert!(matches!(err, EstimateError::UnknownMode(ref v) if v == "serious"));
    }

    #[test]
    fn defaults_to_work() {
        assert_eq!(Mode::default(), Mode::Work);
    }

    #[test]
    fn humorous_is_not_selectable() {
        assert!(Mode::Work.is_user_selectable());
        assert!(Mode::Generic.is_user_selectable());
        assert!(!Mode::Humorous.is_user_selectable());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Mode::Generic).unwrap(), "\"generic\"");
        let parsed: Mode = serde_json::from_str("\"humorous\"").unwrap();
        assert_eq!(parsed, Mode::Humorous);
    }
}
