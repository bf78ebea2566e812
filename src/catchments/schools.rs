use serde::Serialize;
use serde_json::{Map, Value};

use super::rules::Category;

/// A school attached to a catchment polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct School {
    pub id: String,
    pub name: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

/// What a click on a catchment polygon reveals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchmentDetails {
    /// First associated school, else the catchment's own name.
    pub display_name: String,
    pub school_type: String,
    pub state: Option<String>,
    pub grades: String,
    pub catchment_id: Option<String>,
    pub schools: Vec<School>,
}

fn text(props: &Map<String, Value>, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn pipe_list(props: &Map<String, Value>, key: &str) -> Vec<String> {
    text(props, key)
        .map(|s| s.split('|').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Schools listed in the pipe-separated `{level}_school_{ids,names,lons,lats}` attributes.
pub fn parse_schools(props: &Map<String, Value>, category: Category) -> Vec<School> {
    let level = category.school_level();
    let ids = pipe_list(props, &format!("{level}_school_ids"));
    let names = pipe_list(props, &format!("{level}_school_names"));
    if names.is_empty() { return Vec::new() }
    let lons = pipe_list(props, &format!("{level}_school_lons"));
    let lats = pipe_list(props, &format!("{level}_school_lats"));

    ids.into_iter().enumerate()
        .map(|(i, id)| School {
            id,
            name: names.get(i).cloned().unwrap_or_else(|| "Unknown School".to_string()),
            lon: lons.get(i).and_then(|v| v.parse().ok()),
            lat: lats.get(i).and_then(|v| v.parse().ok()),
        })
        .collect()
}

impl CatchmentDetails {
    /// Build the details of a clicked catchment feature.
    pub fn from_properties(props: &Map<String, Value>) -> Self {
        let school_type = text(props, "type").unwrap_or_else(|| "Unknown".to_string());
        let category = match school_type.as_str() {
            "Primary" => Some(Category::Primary),
            "Future" | "Unknown" => None,
            _ => Some(Category::Secondary),
        };
        let schools = category.map(|c| parse_schools(props, c)).unwrap_or_default();

        let display_name = schools.first().map(|s| s.name.clone())
            .or_else(|| text(props, "name"))
            .unwrap_or_else(|| "Unknown Catchment".to_string());
        let grades = text(props, "grades")
            .or_else(|| text(props, "year_level").map(|y| format!("Year {y}")))
            .unwrap_or_else(|| "Coverage not specified".to_string());

        Self {
            display_name,
            school_type,
            state: text(props, "state"),
            grades,
            catchment_id: text(props, "catchment_id"),
            schools,
        }
    }
}
