use serde::{Deserialize, Serialize};

/// Australian states that carry school catchment data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateCode {
    #[serde(rename = "NSW")] Nsw,
    #[serde(rename = "VIC")] Vic,
    #[serde(rename = "QLD")] Qld,
    #[serde(rename = "ACT")] Act,
}

impl StateCode {
    pub const ALL: [StateCode; 4] = [StateCode::Nsw, StateCode::Vic, StateCode::Qld, StateCode::Act];

    /// Code used in the `state` attribute of catchment features.
    pub fn to_str(&self) -> &'static str {
        match self {
            StateCode::Nsw => "NSW",
            StateCode::Vic => "VIC",
            StateCode::Qld => "QLD",
            StateCode::Act => "ACT",
        }
    }

    /// Full name, as it appears in geocoder labels.
    pub fn name(&self) -> &'static str {
        match self {
            StateCode::Nsw => "New South Wales",
            StateCode::Vic => "Victoria",
            StateCode::Qld => "Queensland",
            StateCode::Act => "Australian Capital Territory",
        }
    }

    /// Parse either the short code or the full name, case-insensitively.
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|state| {
            state.to_str().eq_ignore_ascii_case(s) || state.name().eq_ignore_ascii_case(s)
        })
    }
}
