use tracing::warn;

use super::{
    compile::{active_categories, compile},
    filter::FilterExpression,
    rules::Category,
    selection::CatchmentSelection,
    store::{load_selection, save_selection, PreferenceStore},
};
use crate::types::StateCode;

/// The catchment sidebar: a selection tree remembered in a preference store across sessions.
/// Every edit is persisted immediately; a failed write is logged and the edit kept.
pub struct CatchmentPanel {
    selection: CatchmentSelection,
    store: Box<dyn PreferenceStore>,
}

impl std::fmt::Debug for CatchmentPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchmentPanel").field("selection", &self.selection).finish_non_exhaustive()
    }
}

impl CatchmentPanel {
    /// Restore the last selection from `store`.
    pub fn load(store: impl PreferenceStore + 'static) -> Self {
        let selection = load_selection(&store);
        Self { selection, store: Box::new(store) }
    }

    #[inline] pub fn selection(&self) -> &CatchmentSelection { &self.selection }

    fn persist(&mut self) {
        if let Err(e) = save_selection(self.store.as_mut(), &self.selection) {
            warn!(error = %e, "could not save catchment selection");
        }
    }

    pub fn set_global(&mut self, category: Category, value: bool) {
        self.selection.set_global(category, value);
        self.persist();
    }

    pub fn set_type(&mut self, state: StateCode, name: &str, value: bool) -> bool {
        let changed = self.selection.set_type(state, name, value);
        if changed { self.persist() }
        changed
    }

    pub fn set_year(&mut self, state: StateCode, year: u8, value: bool) -> bool {
        let changed = self.selection.set_year(state, year, value);
        if changed { self.persist() }
        changed
    }

    pub fn toggle_accordion(&mut self, state: StateCode) {
        self.selection.toggle_accordion(state);
        self.persist();
    }

    /// The filter the Apply button sends to the map (`None`: show suburbs).
    #[inline] pub fn compiled(&self) -> Option<FilterExpression> { compile(&self.selection) }

    /// School point levels to show alongside the catchments.
    pub fn school_levels(&self) -> Vec<&'static str> {
        active_categories(&self.selection).iter().map(Category::school_level).collect()
    }

    /// Uncheck everything and forget the stored selection's checkboxes.
    pub fn reset(&mut self) {
        self.selection.clear();
        self.persist();
    }
}
