use std::{cell::RefCell, collections::VecDeque};

use anyhow::{anyhow, Result};
use growmap_core::{
    parse_response, CatchmentPanel, CatchmentToggle, Category, EngineEvent, GeocodeError,
    MemoryStore, Millis, MoveTag, OverlayConfig, OverlayController, PlaceCandidate,
    PointerEventKind, ScreenPoint, StateCode, SuggestionSession,
};
use js_sys::Function;
use serde::Serialize;
use tracing::debug;
use wasm_bindgen::{prelude::wasm_bindgen, JsValue};

use crate::{
    common::{js_err, to_js},
    engine::JsEngine,
    storage::LocalStorageStore,
};

/// A geocoding request for the page to fetch.
#[derive(Serialize)]
struct FetchRequest {
    seq: u64,
    url: String,
}

#[derive(Serialize)]
struct SearchTerms {
    name: String,
    state: Option<String>,
}

fn millis(now: f64) -> Millis { now.max(0.0) as Millis }

fn parse_state(state: &str) -> Result<StateCode> {
    StateCode::from_str(state).ok_or_else(|| anyhow!("Unknown state {state:?}. Expected one of: NSW, VIC, QLD, ACT"))
}

fn parse_category(category: &str) -> Result<Category> {
    match category.to_ascii_lowercase().as_str() {
        "primary" => Ok(Category::Primary),
        "secondary" => Ok(Category::Secondary),
        _ => Err(anyhow!("Unknown category {category:?}. Expected primary or secondary")),
    }
}

struct State {
    controller: OverlayController<JsEngine>,
    panel: CatchmentPanel,
    suggestions: SuggestionSession,
}

/// The overlay as seen by the page: the map commands, the catchment sidebar and the search box.
///
/// mapbox-gl fires some events synchronously from inside map calls (an interrupted `flyTo` ends
/// with a `moveend` before the new flight starts). Events that arrive while a command is running
/// are queued and handled as soon as the command returns.
#[wasm_bindgen]
pub struct WasmOverlay {
    state: RefCell<State>,
    deferred: RefCell<VecDeque<(EngineEvent, Millis)>>,
}

impl WasmOverlay {
    /// Run `f` on the overlay state, then any engine events it triggered.
    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> Result<R, JsValue> {
        let mut state = self.state.try_borrow_mut()
            .map_err(|_| js_err("overlay commands cannot be issued from inside an overlay call"))?;
        let out = f(&mut *state);
        self.drain_deferred(&mut state);
        Ok(out)
    }

    fn dispatch(&self, event: EngineEvent, now: Millis) {
        match self.state.try_borrow_mut() {
            Ok(mut state) => {
                state.controller.handle_event(event, now);
                self.drain_deferred(&mut state);
            }
            Err(_) => {
                debug!(?event, "engine event during an overlay command, deferring");
                self.deferred.borrow_mut().push_back((event, now));
            }
        }
    }

    fn drain_deferred(&self, state: &mut State) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            let Some((event, now)) = next else { return };
            state.controller.handle_event(event, now);
        }
    }
}

#[wasm_bindgen]
impl WasmOverlay {
    /// `config`: partial overlay config object, or `undefined` for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmOverlay, JsValue> {
        let config: OverlayConfig = if config.is_undefined() || config.is_null() {
            OverlayConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_err)?
        };
        let panel = match LocalStorageStore::open() {
            Ok(store) => CatchmentPanel::load(store),
            Err(e) => {
                tracing::warn!(error = %e, "catchment selection will not be remembered");
                CatchmentPanel::load(MemoryStore::new())
            }
        };
        let suggestions = SuggestionSession::new(config.timings.suggest_debounce_ms);
        let controller = OverlayController::new(config).map_err(js_err)?;
        Ok(WasmOverlay {
            state: RefCell::new(State { controller, panel, suggestions }),
            deferred: RefCell::new(VecDeque::new()),
        })
    }

    /// Attach to a mapbox-gl map. `makeListener(kind, layerId)` must return the function the map
    /// calls for that event; it should forward to `handlePointer`.
    pub fn attach(&self, map: JsValue, make_listener: Function, now: f64) -> Result<String, JsValue> {
        self.with(|s| format!("{:?}", s.controller.attach(JsEngine::new(map, make_listener), millis(now))))
    }

    pub fn detach(&self) -> Result<(), JsValue> {
        self.with(|s| { s.controller.detach(); })
    }

    #[wasm_bindgen(js_name = "handlePointer")]
    pub fn handle_pointer(&self, kind: &str, layer: String, x: f64, y: f64, now: f64) -> Result<(), JsValue> {
        let kind = PointerEventKind::from_str(kind).ok_or_else(|| js_err(format!("Unknown pointer event {kind:?}")))?;
        self.dispatch(EngineEvent::Pointer { kind, layer, point: ScreenPoint::new(x, y) }, millis(now));
        Ok(())
    }

    #[wasm_bindgen(js_name = "handleStyleData")]
    pub fn handle_style_data(&self, now: f64) { self.dispatch(EngineEvent::StyleData, millis(now)); }

    /// `tag`: the `growmapMove` field of the `moveend` event, if any.
    #[wasm_bindgen(js_name = "handleMoveEnd")]
    pub fn handle_move_end(&self, now: f64, tag: Option<f64>) {
        let tag = tag.filter(|t| *t >= 0.0).map(|t| t as MoveTag);
        self.dispatch(EngineEvent::MoveEnd { tag }, millis(now));
    }

    /// Run deferred work; call from a timer or animation frame.
    pub fn tick(&self, now: f64) -> Result<(), JsValue> {
        self.with(|s| s.controller.tick(millis(now)))
    }

    #[wasm_bindgen(js_name = "drainNotices")]
    pub fn drain_notices(&self) -> Result<JsValue, JsValue> {
        self.with(|s| to_js(&s.controller.drain_notices()))?.map_err(js_err)
    }

    /// Start `zoomToSuburb`: returns `{ seq, url }` to fetch, or `null` when nothing to search.
    #[wasm_bindgen(js_name = "zoomToSuburb")]
    pub fn zoom_to_suburb(&self, name: &str, state: Option<String>) -> Result<JsValue, JsValue> {
        self.with(|s| -> Result<JsValue> {
            s.suggestions.mark_search_executed();
            let Some(request) = s.controller.begin_search(name, state.as_deref()) else { return Ok(JsValue::NULL) };
            let url = request.query.url(s.controller.config())?;
            to_js(&FetchRequest { seq: request.seq, url: url.into() })
        })?.map_err(js_err)
    }

    /// Finish `zoomToSuburb` with the fetched response body. Returns the outcome, or `null` when
    /// the request was superseded.
    #[wasm_bindgen(js_name = "completeSearch")]
    pub fn complete_search(&self, seq: u32, body: &str, now: f64) -> Result<JsValue, JsValue> {
        self.with(|s| to_js(&s.controller.complete_search(u64::from(seq), parse_response(body), millis(now))))?
            .map_err(js_err)
    }

    /// Finish `zoomToSuburb` after a failed fetch.
    #[wasm_bindgen(js_name = "failSearch")]
    pub fn fail_search(&self, seq: u32, message: String, now: f64) -> Result<JsValue, JsValue> {
        self.with(|s| to_js(&s.controller.complete_search(u64::from(seq), Err(GeocodeError::Request(message)), millis(now))))?
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = "highlightSearchedSuburb")]
    pub fn highlight_searched_suburb(&self, name: &str) -> Result<bool, JsValue> {
        self.with(|s| s.controller.highlight_searched_suburb(name))
    }

    #[wasm_bindgen(js_name = "clearSearchHighlight")]
    pub fn clear_search_highlight(&self) -> Result<bool, JsValue> {
        self.with(|s| s.controller.clear_search_highlight())
    }

    #[wasm_bindgen(js_name = "highlightByCode")]
    pub fn highlight_by_code(&self, code: &str) -> Result<bool, JsValue> {
        self.with(|s| s.controller.highlight_by_code(code))
    }

    /// `options`: `{ primary?, secondary?, future? }`.
    #[wasm_bindgen(js_name = "toggleCatchments")]
    pub fn toggle_catchments(&self, options: JsValue) -> Result<bool, JsValue> {
        let toggle: CatchmentToggle = serde_wasm_bindgen::from_value(options).map_err(js_err)?;
        self.with(|s| s.controller.toggle_catchments(toggle))
    }

    /// Apply the sidebar selection: catchments when anything is selected, suburbs otherwise.
    #[wasm_bindgen(js_name = "applyCatchmentsFilter")]
    pub fn apply_catchments_filter(&self) -> Result<bool, JsValue> {
        self.with(|s| s.controller.apply_catchments_filter(s.panel.compiled().as_ref()))
    }

    /// Clear the sidebar selection and go back to suburbs.
    #[wasm_bindgen(js_name = "resetCatchments")]
    pub fn reset_catchments(&self) -> Result<bool, JsValue> {
        self.with(|s| {
            s.panel.reset();
            s.controller.reset()
        })
    }

    #[wasm_bindgen(js_name = "setGlobal")]
    pub fn set_global(&self, category: &str, value: bool) -> Result<(), JsValue> {
        let category = parse_category(category).map_err(js_err)?;
        self.with(|s| s.panel.set_global(category, value))
    }

    #[wasm_bindgen(js_name = "setType")]
    pub fn set_type(&self, state: &str, name: &str, value: bool) -> Result<bool, JsValue> {
        let state = parse_state(state).map_err(js_err)?;
        self.with(|s| s.panel.set_type(state, name, value))
    }

    #[wasm_bindgen(js_name = "setYear")]
    pub fn set_year(&self, state: &str, year: u8, value: bool) -> Result<bool, JsValue> {
        let state = parse_state(state).map_err(js_err)?;
        self.with(|s| s.panel.set_year(state, year, value))
    }

    #[wasm_bindgen(js_name = "toggleAccordion")]
    pub fn toggle_accordion(&self, state: &str) -> Result<(), JsValue> {
        let state = parse_state(state).map_err(js_err)?;
        self.with(|s| s.panel.toggle_accordion(state))
    }

    /// The sidebar selection in its stored shape.
    pub fn selection(&self) -> Result<JsValue, JsValue> {
        self.with(|s| to_js(s.panel.selection()))?.map_err(js_err)
    }

    #[wasm_bindgen(js_name = "suggestInput")]
    pub fn suggest_input(&self, text: &str, now: f64) -> Result<(), JsValue> {
        self.with(|s| s.suggestions.input(text, millis(now)))
    }

    /// `{ seq, url }` once the input has settled, else `null`.
    #[wasm_bindgen(js_name = "suggestPoll")]
    pub fn suggest_poll(&self, now: f64) -> Result<JsValue, JsValue> {
        self.with(|s| -> Result<JsValue> {
            let Some(request) = s.suggestions.poll(millis(now)) else { return Ok(JsValue::NULL) };
            let url = request.query.url(s.controller.config())?;
            to_js(&FetchRequest { seq: request.seq, url: url.into() })
        })?.map_err(js_err)
    }

    /// Returns whether the suggestion list changed.
    #[wasm_bindgen(js_name = "suggestComplete")]
    pub fn suggest_complete(&self, seq: u32, body: &str) -> Result<bool, JsValue> {
        self.with(|s| s.suggestions.complete(u64::from(seq), parse_response(body)))
    }

    pub fn suggestions(&self) -> Result<JsValue, JsValue> {
        self.with(|s| {
            let visible: &[PlaceCandidate] = if s.suggestions.is_visible() { s.suggestions.suggestions() } else { &[] };
            to_js(visible)
        })?.map_err(js_err)
    }

    /// Search terms of the chosen suggestion (`{ name, state }`), or `null` for a bad index.
    #[wasm_bindgen(js_name = "selectSuggestion")]
    pub fn select_suggestion(&self, index: usize) -> Result<JsValue, JsValue> {
        self.with(|s| match s.suggestions.select(index) {
            Some((name, state)) => to_js(&SearchTerms { name, state }),
            None => Ok(JsValue::NULL),
        })?.map_err(js_err)
    }

    #[wasm_bindgen(js_name = "dismissSuggestions")]
    pub fn dismiss_suggestions(&self) -> Result<(), JsValue> {
        self.with(|s| s.suggestions.dismiss())
    }

    /// Loaded feature count per tier, for debugging tile coverage.
    #[wasm_bindgen(js_name = "sourceFeatureCounts")]
    pub fn source_feature_counts(&self) -> Result<JsValue, JsValue> {
        self.with(|s| to_js(&s.controller.source_feature_counts()))?.map_err(js_err)
    }
}
