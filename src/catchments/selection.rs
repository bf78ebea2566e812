use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::rules::{all_rules, rules, Category};
use crate::types::StateCode;

/// A per-state checkbox: a catchment type, or a year level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectionKey {
    Type(String),
    Year(u8),
}

impl SelectionKey {
    pub fn ty(name: &str) -> Self { SelectionKey::Type(name.to_string()) }

    /// Parse the stored form: `Year 7` or a type name.
    pub fn parse(key: &str) -> Self {
        match key.strip_prefix("Year ").and_then(|y| y.trim().parse().ok()) {
            Some(year) => SelectionKey::Year(year),
            None => SelectionKey::Type(key.to_string()),
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKey::Type(name) => f.write_str(name),
            SelectionKey::Year(year) => write!(f, "Year {year}"),
        }
    }
}

impl Serialize for SelectionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SelectionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::parse(&String::deserialize(deserializer)?))
    }
}

/// Summary checkboxes. Always derived from the per-state entries by [`CatchmentSelection::revalidate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalTypes {
    pub primary: bool,
    pub secondary: bool,
}

impl GlobalTypes {
    #[inline]
    pub fn get(&self, category: Category) -> bool {
        match category {
            Category::Primary => self.primary,
            Category::Secondary => self.secondary,
        }
    }

    fn set(&mut self, category: Category, value: bool) {
        match category {
            Category::Primary => self.primary = value,
            Category::Secondary => self.secondary = value,
        }
    }
}

/// The catchment sidebar's selection tree.
///
/// Per-state entries are authoritative. Global toggles fan out into them on write and are
/// recomputed from them after every mutation, so the two never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatchmentSelection {
    global_types: GlobalTypes,
    state_selections: BTreeMap<StateCode, BTreeMap<SelectionKey, bool>>,
    accordion_open: BTreeMap<StateCode, bool>,
}

impl CatchmentSelection {
    pub fn new() -> Self { Self::default() }

    #[inline] pub fn global_types(&self) -> GlobalTypes { self.global_types }

    #[inline] pub fn global(&self, category: Category) -> bool { self.global_types.get(category) }

    pub fn is_selected(&self, state: StateCode, key: &SelectionKey) -> bool {
        self.state_selections.get(&state).and_then(|m| m.get(key)).copied().unwrap_or(false)
    }

    #[inline]
    pub fn is_type_selected(&self, state: StateCode, name: &str) -> bool {
        self.is_selected(state, &SelectionKey::ty(name))
    }

    /// Names of the selected types of `state` that its rules know about, in rule order.
    pub fn selected_types(&self, state: StateCode) -> Vec<&'static str> {
        rules(state).types.iter()
            .filter(|t| self.is_type_selected(state, t.name))
            .map(|t| t.name)
            .collect()
    }

    /// Selected year levels of `state` inside its year range, ascending.
    pub fn selected_years(&self, state: StateCode) -> Vec<u8> {
        rules(state).year_levels()
            .filter(|y| self.is_selected(state, &SelectionKey::Year(*y)))
            .collect()
    }

    /// Whether nothing at all is checked.
    pub fn is_empty(&self) -> bool {
        !self.global_types.primary
            && !self.global_types.secondary
            && self.state_selections.values().all(|m| m.values().all(|v| !v))
    }

    #[inline] pub fn is_accordion_open(&self, state: StateCode) -> bool { self.accordion_open.get(&state).copied().unwrap_or(false) }

    /// Pure UI state; never affects the filter.
    pub fn toggle_accordion(&mut self, state: StateCode) {
        let open = !self.is_accordion_open(state);
        self.accordion_open.insert(state, open);
    }

    fn write(&mut self, state: StateCode, key: SelectionKey, value: bool) {
        self.state_selections.entry(state).or_default().insert(key, value);
    }

    fn fan_out(&mut self, category: Category, value: bool) {
        for r in all_rules().iter().filter(|r| r.supports(category)) {
            for t in r.types_in(category) {
                self.write(r.state, SelectionKey::ty(t.name), value);
            }
            if category == Category::Secondary {
                for year in r.year_levels() {
                    self.write(r.state, SelectionKey::Year(year), value);
                }
            }
        }
    }

    /// Global toggle: writes every applicable per-state entry.
    pub fn set_global(&mut self, category: Category, value: bool) {
        self.fan_out(category, value);
        self.revalidate();
    }

    /// Check or uncheck a type of `state`. Checking selects the years it covers; unchecking
    /// releases those of its years no other checked type still covers. Returns `false` (and does
    /// nothing) for a type the state does not have.
    pub fn set_type(&mut self, state: StateCode, name: &str, value: bool) -> bool {
        let r = rules(state);
        let Some(ty) = r.school_type(name) else { return false };

        self.write(state, SelectionKey::ty(ty.name), value);
        if let Some(range) = ty.years.clone().filter(|_| r.has_years()) {
            for year in range {
                let claimed = r.covering(year).any(|other| other.name != ty.name && self.is_type_selected(state, other.name));
                if value || !claimed {
                    self.write(state, SelectionKey::Year(year), value);
                }
            }
        }
        self.revalidate();
        true
    }

    /// Check or uncheck a year level of `state`. Unchecking a year also unchecks the type that
    /// covers it, but only when that type is the sole checked type covering the year. Returns
    /// `false` (and does nothing) when the state has no such year level.
    pub fn set_year(&mut self, state: StateCode, year: u8, value: bool) -> bool {
        let r = rules(state);
        if !r.years.as_ref().is_some_and(|range| range.contains(&year)) {
            return false;
        }

        self.write(state, SelectionKey::Year(year), value);
        if !value {
            let claimants: Vec<&str> = r.covering(year)
                .filter(|t| self.is_type_selected(state, t.name))
                .map(|t| t.name)
                .collect();
            if let [only] = claimants.as_slice() {
                self.write(state, SelectionKey::ty(only), false);
            }
        }
        self.revalidate();
        true
    }

    /// Recompute the global toggles: a category reads as checked only if, in every state that
    /// supports it, all of its types (and, for secondary, all year levels) are checked.
    pub fn revalidate(&mut self) {
        for category in Category::ALL {
            let mut supporting = all_rules().iter().filter(|r| r.supports(category)).peekable();
            let any = supporting.peek().is_some();
            let all = supporting.all(|r| {
                r.types_in(category).all(|t| self.is_type_selected(r.state, t.name))
                    && (category == Category::Primary
                        || r.year_levels().all(|y| self.is_selected(r.state, &SelectionKey::Year(y))))
            });
            self.global_types.set(category, any && all);
        }
    }

    /// Bring a deserialized selection back to a consistent state: drop entries the state's rules
    /// do not know, re-apply the fan-out of stored global toggles, then recompute them.
    pub fn normalize(&mut self) {
        for (state, entries) in self.state_selections.iter_mut() {
            let r = rules(*state);
            entries.retain(|key, _| match key {
                SelectionKey::Type(name) => r.school_type(name).is_some(),
                SelectionKey::Year(year) => r.years.as_ref().is_some_and(|range| range.contains(year)),
            });
        }
        self.state_selections.retain(|_, entries| !entries.is_empty());

        for category in Category::ALL {
            if self.global_types.get(category) {
                self.fan_out(category, true);
            }
        }
        self.revalidate();
    }

    /// Uncheck everything (accordion state is kept).
    pub fn clear(&mut self) {
        self.global_types = GlobalTypes::default();
        self.state_selections.clear();
    }
}
