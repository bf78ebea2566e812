use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::types::StateCode;

/// The two categories the global toggles act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Primary,
    Secondary,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Primary, Category::Secondary];

    /// Value of the `level` attribute on school points.
    pub fn school_level(&self) -> &'static str {
        match self {
            Category::Primary => "primary",
            Category::Secondary => "secondary",
        }
    }
}

/// One catchment type as stored in the `type` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolType {
    pub name: &'static str,
    /// `None` for types no global toggle covers (e.g. future catchments).
    pub category: Option<Category>,
    /// Year levels covered, for states with year granularity.
    pub years: Option<RangeInclusive<u8>>,
}

impl SchoolType {
    const fn new(name: &'static str, category: Option<Category>, years: Option<RangeInclusive<u8>>) -> Self {
        Self { name, category, years }
    }

    #[inline] pub fn covers(&self, year: u8) -> bool { self.years.as_ref().is_some_and(|r| r.contains(&year)) }
}

/// What a state's catchment data supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRules {
    pub state: StateCode,
    pub types: &'static [SchoolType],
    /// Selectable year levels; `None` when the data has no year granularity.
    pub years: Option<RangeInclusive<u8>>,
}

const PRIMARY: SchoolType = SchoolType::new("Primary", Some(Category::Primary), None);

static NSW_TYPES: [SchoolType; 3] = [
    PRIMARY,
    // Records carry `year_level: null`.
    SchoolType::new("Secondary", Some(Category::Secondary), None),
    SchoolType::new("Future", None, None),
];

static VIC_TYPES: [SchoolType; 2] = [
    PRIMARY,
    SchoolType::new("Secondary", Some(Category::Secondary), Some(7..=12)),
];

static QLD_TYPES: [SchoolType; 4] = [
    PRIMARY,
    SchoolType::new("Junior Secondary", Some(Category::Secondary), Some(7..=9)),
    SchoolType::new("Senior Secondary", Some(Category::Secondary), Some(10..=12)),
    SchoolType::new("Single Sex", Some(Category::Secondary), Some(7..=7)),
];

static ACT_TYPES: [SchoolType; 1] = [PRIMARY];

static RULES: [StateRules; 4] = [
    StateRules { state: StateCode::Nsw, types: &NSW_TYPES, years: None },
    StateRules { state: StateCode::Vic, types: &VIC_TYPES, years: Some(7..=12) },
    StateRules { state: StateCode::Qld, types: &QLD_TYPES, years: Some(7..=12) },
    StateRules { state: StateCode::Act, types: &ACT_TYPES, years: None },
];

/// Rule table of `state`.
pub fn rules(state: StateCode) -> &'static StateRules {
    match state {
        StateCode::Nsw => &RULES[0],
        StateCode::Vic => &RULES[1],
        StateCode::Qld => &RULES[2],
        StateCode::Act => &RULES[3],
    }
}

/// Every state's rule table.
#[inline] pub fn all_rules() -> &'static [StateRules] { &RULES }

impl StateRules {
    pub fn school_type(&self, name: &str) -> Option<&'static SchoolType> {
        self.types.iter().find(|t| t.name == name)
    }

    #[inline] pub fn has_years(&self) -> bool { self.years.is_some() }

    pub fn year_levels(&self) -> impl Iterator<Item = u8> + '_ {
        self.years.clone().into_iter().flatten()
    }

    pub fn types_in(&self, category: Category) -> impl Iterator<Item = &'static SchoolType> {
        self.types.iter().filter(move |t| t.category == Some(category))
    }

    #[inline] pub fn supports(&self, category: Category) -> bool { self.types_in(category).next().is_some() }

    /// Types whose year range includes `year`.
    pub fn covering(&self, year: u8) -> impl Iterator<Item = &'static SchoolType> {
        self.types.iter().filter(move |t| t.covers(year))
    }
}
