use ahash::AHashMap;
use anyhow::{anyhow, Context, Result};
use geo::{Point, Rect};
use growmap_core::{
    Cursor, FeatureRef, LayerSpec, MapEngine, MoveTag, PointerEventKind, RenderedFeature,
    ScreenPoint, SourceSpec, StateFlag, Visibility,
};
use js_sys::{Array, Function, Reflect};
use serde_json::{json, Map, Value};
use wasm_bindgen::{JsCast, JsValue};

use crate::common::{call_method, describe, to_js};

/// Event-data field carrying a camera command's tag; mapbox copies it onto that move's `moveend`.
pub const MOVE_TAG_FIELD: &str = "growmapMove";

/// [`MapEngine`] over a mapbox-gl `Map` object.
///
/// Pointer listeners are created by the page: `make_listener(kind, layerId)` must return a
/// function that forwards the event to the overlay. The returned functions are kept so they can
/// be removed again with `map.off`. Camera commands pass `{ growmapMove: tag }` as event data;
/// the page's `moveend` listener hands `event.growmapMove` to `handleMoveEnd`.
pub struct JsEngine {
    map: JsValue,
    make_listener: Function,
    listeners: AHashMap<(PointerEventKind, String), Function>,
}

fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

fn is_present(value: &JsValue) -> bool { !value.is_undefined() && !value.is_null() }

/// Feature ids may be numbers or strings in the engine; they are text here.
fn id_text(value: &JsValue) -> Option<String> {
    value.as_string().or_else(|| value.as_f64().map(|n| if n.fract() == 0.0 { format!("{}", n as i64) } else { n.to_string() }))
}

fn to_feature(value: &JsValue) -> Result<RenderedFeature> {
    let properties = get(value, "properties");
    let properties: Map<String, Value> = if is_present(&properties) {
        serde_wasm_bindgen::from_value(properties).map_err(|e| anyhow!("feature properties: {e}"))?
    } else {
        Map::new()
    };
    Ok(RenderedFeature {
        id: id_text(&get(value, "id")),
        layer: get(&get(value, "layer"), "id").as_string().unwrap_or_default(),
        source_layer: get(value, "sourceLayer").as_string(),
        properties,
    })
}

fn to_features(value: JsValue) -> Result<Vec<RenderedFeature>> {
    let array: Array = value.dyn_into().map_err(|_| anyhow!("feature query did not return an array"))?;
    array.iter().map(|f| to_feature(&f)).collect()
}

impl JsEngine {
    pub fn new(map: JsValue, make_listener: Function) -> Self {
        Self { map, make_listener, listeners: AHashMap::new() }
    }

    fn call(&self, method: &str, args: &[JsValue]) -> Result<JsValue> {
        call_method(&self.map, method, args)
    }

    fn move_data(tag: MoveTag) -> Result<JsValue> {
        to_js(&json!({ MOVE_TAG_FIELD: tag }))
    }
}

impl MapEngine for JsEngine {
    fn is_style_loaded(&self) -> bool {
        self.call("isStyleLoaded", &[]).map(|v| v.is_truthy()).unwrap_or(false)
    }

    fn zoom(&self) -> f64 {
        self.call("getZoom", &[]).ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
    }

    fn style_layer_ids(&self) -> Vec<String> {
        let Ok(style) = self.call("getStyle", &[]) else { return Vec::new() };
        match get(&style, "layers").dyn_into::<Array>() {
            Ok(layers) => layers.iter().filter_map(|layer| get(&layer, "id").as_string()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn has_source(&self, id: &str) -> bool {
        self.call("getSource", &[id.into()]).is_ok_and(|v| is_present(&v))
    }

    fn add_source(&mut self, id: &str, source: &SourceSpec) -> Result<()> {
        self.call("addSource", &[id.into(), to_js(source)?]).map(drop)
    }

    fn remove_source(&mut self, id: &str) -> Result<()> {
        self.call("removeSource", &[id.into()]).map(drop)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.call("getLayer", &[id.into()]).is_ok_and(|v| is_present(&v))
    }

    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<()> {
        let before = before.map(JsValue::from_str).unwrap_or(JsValue::UNDEFINED);
        self.call("addLayer", &[to_js(layer)?, before]).map(drop)
    }

    fn remove_layer(&mut self, id: &str) -> Result<()> {
        self.call("removeLayer", &[id.into()]).map(drop)
    }

    fn set_visibility(&mut self, layer: &str, visibility: Visibility) -> Result<()> {
        self.call("setLayoutProperty", &[layer.into(), "visibility".into(), visibility.to_str().into()]).map(drop)
    }

    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) -> Result<()> {
        let filter = match filter {
            Some(filter) => to_js(filter)?,
            None => JsValue::NULL,
        };
        self.call("setFilter", &[layer.into(), filter]).map(drop)
    }

    fn set_feature_state(&mut self, feature: &FeatureRef, flag: StateFlag, value: bool) -> Result<()> {
        let target = to_js(&json!({
            "source": feature.source,
            "sourceLayer": feature.source_layer,
            "id": feature.id.as_str(),
        }))?;
        let state = to_js(&json!({ flag.key(): value }))?;
        self.call("setFeatureState", &[target, state]).map(drop)
    }

    fn query_rendered_features(&self, at: Option<ScreenPoint>, layers: &[&str]) -> Result<Vec<RenderedFeature>> {
        let options = to_js(&json!({ "layers": layers }))?;
        let result = match at {
            Some(point) => self.call("queryRenderedFeatures", &[to_js(&[point.x, point.y])?, options])?,
            None => self.call("queryRenderedFeatures", &[options])?,
        };
        to_features(result)
    }

    fn query_source_features(&self, source: &str, source_layer: &str) -> Result<Vec<RenderedFeature>> {
        let options = to_js(&json!({ "sourceLayer": source_layer }))?;
        to_features(self.call("querySourceFeatures", &[source.into(), options])?)
    }

    fn fly_to(&mut self, center: Point<f64>, zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()> {
        let options = to_js(&json!({ "center": [center.x(), center.y()], "zoom": zoom, "duration": duration_ms, "essential": true }))?;
        self.call("flyTo", &[options, Self::move_data(tag)?]).map(drop)
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>, padding: f64, max_zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()> {
        let (min, max) = (bounds.min(), bounds.max());
        let corners = to_js(&[[min.x, min.y], [max.x, max.y]])?;
        let options = to_js(&json!({ "padding": padding, "maxZoom": max_zoom, "duration": duration_ms }))?;
        self.call("fitBounds", &[corners, options, Self::move_data(tag)?]).map(drop)
    }

    fn zoom_to(&mut self, zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()> {
        let options = to_js(&json!({ "duration": duration_ms }))?;
        self.call("zoomTo", &[zoom.into(), options, Self::move_data(tag)?]).map(drop)
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        let style = self.call("getCanvas", &[]).map(|canvas| get(&canvas, "style"));
        match style {
            Ok(style) if style.is_object() => {
                let _ = Reflect::set(&style, &"cursor".into(), &cursor.to_css().into());
            }
            _ => tracing::debug!("map canvas unavailable, cursor not set"),
        }
    }

    fn subscribe(&mut self, kind: PointerEventKind, layer: &str) -> Result<()> {
        let key = (kind, layer.to_string());
        if self.listeners.contains_key(&key) { return Ok(()) }

        let listener: Function = self.make_listener
            .call2(&JsValue::NULL, &kind.to_str().into(), &layer.into())
            .map_err(|e| anyhow!("make_listener: {}", describe(&e)))?
            .dyn_into()
            .map_err(|_| anyhow!("make_listener must return a function"))?;
        self.call("on", &[kind.to_str().into(), layer.into(), listener.clone().into()])
            .with_context(|| format!("listen for {} on {layer}", kind.to_str()))?;
        self.listeners.insert(key, listener);
        Ok(())
    }

    fn unsubscribe(&mut self, kind: PointerEventKind, layer: &str) -> Result<()> {
        let Some(listener) = self.listeners.remove(&(kind, layer.to_string())) else { return Ok(()) };
        self.call("off", &[kind.to_str().into(), layer.into(), listener.into()]).map(drop)
    }
}

impl std::fmt::Debug for JsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsEngine").field("listeners", &self.listeners.len()).finish_non_exhaustive()
    }
}
