//! School catchments: per-state rule tables, the sidebar selection tree, and its compilation
//! into a filter expression over catchment features.

mod compile;
mod filter;
mod panel;
mod rules;
mod schools;
mod selection;
mod store;

pub use compile::{active_categories, compile};
pub use filter::{Attr, FilterExpression, Literal};
pub use panel::CatchmentPanel;
pub use rules::{all_rules, rules, Category, SchoolType, StateRules};
pub use schools::{parse_schools, CatchmentDetails, School};
pub use selection::{CatchmentSelection, GlobalTypes, SelectionKey};
pub use store::{load_selection, save_selection, FileStore, MemoryStore, PreferenceStore, SELECTION_KEY};
