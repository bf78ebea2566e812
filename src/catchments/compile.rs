use std::collections::BTreeSet;

use super::{
    filter::{Attr, FilterExpression, Literal},
    rules::{all_rules, Category, SchoolType, StateRules},
    selection::CatchmentSelection,
};

/// The types and years that are in effect for one state: its own entries plus everything the
/// enabled global toggles cover.
struct Effective {
    types: Vec<&'static SchoolType>,
    years: BTreeSet<u8>,
}

fn effective(selection: &CatchmentSelection, r: &StateRules) -> Effective {
    let global = |t: &SchoolType| t.category.is_some_and(|c| selection.global(c));

    let mut types: Vec<&'static SchoolType> = r.types.iter()
        .filter(|t| global(*t) || selection.is_type_selected(r.state, t.name))
        .collect();

    let mut years: BTreeSet<u8> = selection.selected_years(r.state).into_iter().collect();
    if selection.global(Category::Secondary) && r.supports(Category::Secondary) {
        years.extend(r.year_levels());
    }

    // Years without a year-typed type read as "secondary catchments for these years": every
    // type covering one of them is in, whether or not it was ever checked. This is what the
    // sidebar shows after the last claimant of a year range loses a boundary year.
    if r.has_years() && !years.is_empty() && !types.iter().any(|t| t.years.is_some()) {
        types.extend(r.types_in(Category::Secondary).filter(|t| years.iter().any(|y| t.covers(*y))));
    }

    Effective { types, years }
}

fn clause(r: &StateRules, t: &SchoolType, extra: Option<FilterExpression>) -> FilterExpression {
    let mut parts = vec![
        FilterExpression::eq_str(Attr::State, r.state.to_str()),
        FilterExpression::eq_str(Attr::Type, t.name),
    ];
    parts.extend(extra);
    FilterExpression::All(parts)
}

fn compile_state(selection: &CatchmentSelection, r: &StateRules) -> Option<FilterExpression> {
    let Effective { types, years } = effective(selection, r);

    let clauses: Vec<FilterExpression> = types.into_iter().filter_map(|t| {
        match (&t.years, t.category) {
            // Secondary data without year granularity carries `year_level: null`; it stands for
            // "all years" and is dropped once specific years are chosen.
            (None, Some(Category::Secondary)) => years.is_empty()
                .then(|| clause(r, t, Some(FilterExpression::Eq(Attr::YearLevel, Literal::Null)))),
            (None, _) => Some(clause(r, t, None)),
            (Some(_), _) if years.is_empty() => Some(clause(r, t, None)),
            (Some(range), _) => {
                let ys: Vec<u8> = years.iter().copied().filter(|y| range.contains(y)).collect();
                if ys.is_empty() {
                    None
                } else if range.clone().all(|y| ys.contains(&y)) {
                    Some(clause(r, t, None))
                } else {
                    Some(clause(r, t, Some(FilterExpression::year_in(&ys))))
                }
            }
        }
    }).collect();

    (!clauses.is_empty()).then_some(FilterExpression::Any(clauses))
}

/// Compile the sidebar selection into one filter over catchment features, or `None` when
/// nothing is selected (the suburb overlay should be shown instead).
///
/// Within a state with year levels, types and years intersect: "Junior Secondary" plus year 11
/// matches nothing for that state, never junior-secondary year 7.
pub fn compile(selection: &CatchmentSelection) -> Option<FilterExpression> {
    let states: Vec<FilterExpression> = all_rules().iter()
        .filter_map(|r| compile_state(selection, r))
        .collect();
    (!states.is_empty()).then_some(FilterExpression::Any(states))
}

/// Which school categories have any effective selection (drives the school point layers).
pub fn active_categories(selection: &CatchmentSelection) -> Vec<Category> {
    Category::ALL.into_iter()
        .filter(|c| all_rules().iter().any(|r| effective(selection, r).types.iter().any(|t| t.category == Some(*c))))
        .collect()
}
