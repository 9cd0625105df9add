//! Per-page indicator shown next to the control surface icon.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    On,
    Off,
}

impl Badge {
    #[must_use]
    pub fn for_decision(enabled: bool) -> Self {
        if enabled { Self::On } else { Self::Off }
    }

    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    /// Background color for the badge, as `#rrggbb`.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::On => "#4CAF50",
            Self::Off => "#757575",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_follows_decision() {
        assert_eq!(Badge::for_decision(true), Badge::On);
        assert_eq!(Badge::for_decision(false), Badge::Off);
        assert_eq!(Badge::On.text(), "ON");
        assert_eq!(Badge::Off.color(), "#757575");
    }
}
