use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Vector tile source definition, serialized in the engine's style format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    /// Feature attribute promoted to the feature id, so feature state can be addressed by it.
    #[serde(rename = "promoteId", default, skip_serializing_if = "Option::is_none")]
    pub promote_id: Option<String>,
}

impl SourceSpec {
    pub fn vector(url: impl Into<String>) -> Self {
        Self { kind: "vector".to_string(), url: url.into(), promote_id: None }
    }

    pub fn with_promote_id(mut self, property: impl Into<String>) -> Self {
        self.promote_id = Some(property.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Fill,
    Line,
    Circle,
    Symbol,
}

/// Style layer definition, serialized in the engine's style format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(rename = "source-layer")]
    pub source_layer: String,
    #[serde(rename = "minzoom", default, skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<f64>,
    #[serde(default)]
    pub paint: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, kind: LayerKind, source: impl Into<String>, source_layer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            source_layer: source_layer.into(),
            min_zoom: None,
            paint: Map::new(),
            layout: Map::new(),
            filter: None,
        }
    }

    pub fn min_zoom(mut self, zoom: f64) -> Self {
        self.min_zoom = Some(zoom);
        self
    }

    pub fn paint(mut self, key: &str, value: Value) -> Self {
        self.paint.insert(key.to_string(), value);
        self
    }

    pub fn layout(mut self, key: &str, value: Value) -> Self {
        self.layout.insert(key.to_string(), value);
        self
    }

    /// Whether the layout starts out hidden.
    pub fn initially_hidden(&self) -> bool {
        self.layout.get("visibility").and_then(Value::as_str) == Some("none")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn layer_serializes_in_style_format() {
        let layer = LayerSpec::new("localities-fill-z12", LayerKind::Fill, "localities", "localities_z12")
            .min_zoom(12.0)
            .paint("fill-color", json!("#3b82f6"));

        let value = serde_json::to_value(&layer).unwrap();
        assert_eq!(value["type"], json!("fill"));
        assert_eq!(value["source-layer"], json!("localities_z12"));
        assert_eq!(value["minzoom"], json!(12.0));
        assert!(value.get("layout").is_none());
        assert!(value.get("filter").is_none());
    }

    #[test]
    fn source_serializes_promote_id() {
        let source = SourceSpec::vector("mapbox://example.tiles").with_promote_id("LOC_PID");
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value, json!({ "type": "vector", "url": "mapbox://example.tiles", "promoteId": "LOC_PID" }));
    }
}
