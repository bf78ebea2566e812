use std::{cell::Cell, rc::Rc};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::style::{locality_insertion_point, LocalityLayer};
use crate::{
    config::OverlayConfig,
    engine::{MapEngine, PointerEventKind, SourceSpec},
    types::{Millis, Tier},
};

/// Shared "layers already registered" flag.
///
/// Controllers that drive the same engine (e.g. an old and a new instance during a hot remount)
/// share one guard so only one copy of the locality source and layers is ever registered.
/// Controllers created independently get independent guards and never interfere.
#[derive(Debug, Clone, Default)]
pub struct InitGuard(Rc<Cell<bool>>);

impl InitGuard {
    pub fn new() -> Self { Self::default() }

    #[inline] pub fn is_set(&self) -> bool { self.0.get() }

    #[inline] fn set(&self, value: bool) { self.0.set(value) }
}

/// Result of an initialization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryStatus {
    /// Source, layers and listeners are in place.
    Ready,
    /// Another initialization (this registry or one sharing its guard) already ran.
    AlreadyInitialized,
    /// The style is still loading; initialization waits for style data or the fallback timeout.
    AwaitingStyle,
    /// Layer insertion failed; it is retried once on style data or after the fallback timeout.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingStyle { deadline: Millis },
    RetryPending { deadline: Millis },
    Ready,
}

/// Owns creation and teardown of the locality source, the per-tier fill/outline/search layers and
/// the pointer listeners on them.
#[derive(Debug)]
pub struct LayerRegistry {
    source_id: String,
    source: SourceSpec,
    guard: InitGuard,
    initialized: bool, // per-instance flag, paired with the shared guard
    phase: Phase,
    layer_retry_ms: Millis,
    style_wait_ms: Millis,
    subscribed: Vec<(PointerEventKind, String)>,
}

impl LayerRegistry {
    pub fn new(config: &OverlayConfig, guard: InitGuard) -> Self {
        let localities = &config.localities;
        Self {
            source_id: localities.source_id.clone(),
            source: SourceSpec::vector(&localities.tileset_url).with_promote_id(&localities.id_property),
            guard,
            initialized: false,
            phase: Phase::Idle,
            layer_retry_ms: config.timings.layer_retry_ms,
            style_wait_ms: config.timings.style_wait_ms,
            subscribed: Vec::new(),
        }
    }

    #[inline] pub fn source_id(&self) -> &str { &self.source_id }

    #[inline] pub fn guard(&self) -> &InitGuard { &self.guard }

    #[inline] pub fn is_initialized(&self) -> bool { self.initialized }

    /// Whether layers and listeners are fully in place.
    #[inline] pub fn is_ready(&self) -> bool { self.phase == Phase::Ready }

    /// Whether `layer_id` is one of the locality layers managed here.
    #[inline] pub fn owns_layer(&self, layer_id: &str) -> bool { LocalityLayer::parse(layer_id).is_some() }

    /// The guard flags are only a hint: if the source is gone (style reloaded, map recreated),
    /// forget the earlier initialization so it can run again.
    fn verify_guard(&mut self, engine: &dyn MapEngine) {
        if (self.initialized || self.guard.is_set()) && !engine.has_source(&self.source_id) {
            warn!(source = %self.source_id, "locality source missing despite initialization guard, resetting");
            self.initialized = false;
            self.guard.set(false);
            self.phase = Phase::Idle;
        }
    }

    /// Entry point when the map is mounted: initialize now, or wait for the style to load.
    pub fn mount(&mut self, engine: &mut dyn MapEngine, now: Millis) -> RegistryStatus {
        self.verify_guard(engine);
        if self.initialized || self.guard.is_set() {
            debug!(local = self.initialized, shared = self.guard.is_set(), "localities already initialized, skipping");
            return RegistryStatus::AlreadyInitialized;
        }
        if !engine.is_style_loaded() {
            debug!("waiting for map style before adding localities");
            self.phase = Phase::AwaitingStyle { deadline: now + self.style_wait_ms };
            return RegistryStatus::AwaitingStyle;
        }
        self.initialize(engine, now)
    }

    /// Add source, layers and listeners. Idempotent: a second call (from this registry or any
    /// registry sharing the guard) is a no-op while the source is present.
    pub fn initialize(&mut self, engine: &mut dyn MapEngine, now: Millis) -> RegistryStatus {
        self.verify_guard(engine);
        if self.initialized || self.guard.is_set() {
            debug!("localities already initialized, skipping");
            return RegistryStatus::AlreadyInitialized;
        }

        let status = match self.add_source(engine).and_then(|_| self.add_layers(engine, true)) {
            Ok(()) => {
                self.subscribe(engine);
                self.phase = Phase::Ready;
                info!(source = %self.source_id, "localities layers initialized");
                RegistryStatus::Ready
            }
            Err(e) => {
                debug!(error = %e, "immediate layer insertion failed, waiting for style data");
                self.phase = Phase::RetryPending { deadline: now + self.layer_retry_ms };
                RegistryStatus::Deferred
            }
        };

        self.initialized = true;
        self.guard.set(true);
        status
    }

    /// The engine reported style data. Runs a pending initialization or the single layer retry.
    pub fn on_style_data(&mut self, engine: &mut dyn MapEngine, now: Millis) -> Option<RegistryStatus> {
        match self.phase {
            Phase::AwaitingStyle { .. } => {
                self.phase = Phase::Idle;
                Some(self.initialize(engine, now))
            }
            Phase::RetryPending { .. } => Some(self.retry(engine)),
            Phase::Idle | Phase::Ready => None,
        }
    }

    /// Fire the fallback timeouts for when the style-ready notification never arrives.
    pub fn poll(&mut self, engine: &mut dyn MapEngine, now: Millis) -> Option<RegistryStatus> {
        match self.phase {
            Phase::AwaitingStyle { deadline } | Phase::RetryPending { deadline } if now >= deadline => {
                info!("style notification timed out, initializing localities anyway");
                self.on_style_data(engine, now)
            }
            _ => None,
        }
    }

    /// Second and last attempt: failures are logged per layer and the registry is considered ready.
    fn retry(&mut self, engine: &mut dyn MapEngine) -> RegistryStatus {
        if let Err(e) = self.add_source(engine) {
            warn!(error = %e, source = %self.source_id, "could not add localities source");
        }
        if let Err(e) = self.add_layers(engine, false) {
            warn!(error = %e, "could not add localities layers");
        }
        self.subscribe(engine);
        self.phase = Phase::Ready;
        RegistryStatus::Ready
    }

    fn add_source(&self, engine: &mut dyn MapEngine) -> Result<()> {
        if engine.has_source(&self.source_id) {
            debug!(source = %self.source_id, "localities source already exists");
            return Ok(());
        }
        engine.add_source(&self.source_id, &self.source)
            .with_context(|| format!("add source {}", self.source_id))
    }

    /// Add every missing locality layer. In `strict` mode the first failure aborts; otherwise
    /// failures are logged and the remaining layers are still attempted.
    fn add_layers(&self, engine: &mut dyn MapEngine, strict: bool) -> Result<()> {
        let before = locality_insertion_point(&engine.style_layer_ids())
            .filter(|anchor| LocalityLayer::parse(anchor).is_none());

        for layer in LocalityLayer::ALL {
            for tier in Tier::ALL {
                let spec = layer.spec(tier, &self.source_id);
                if engine.has_layer(&spec.id) { continue }

                match engine.add_layer(&spec, before.as_deref()) {
                    Ok(()) => debug!(layer = %spec.id, "added layer"),
                    Err(e) if strict => return Err(e.context(format!("add layer {}", spec.id))),
                    Err(e) => warn!(error = %e, layer = %spec.id, "could not add layer"),
                }
            }
        }
        Ok(())
    }

    fn subscribe(&mut self, engine: &mut dyn MapEngine) {
        if !self.subscribed.is_empty() { return }

        for tier in Tier::ALL {
            for layer in LocalityLayer::interactive_ids(tier) {
                for kind in PointerEventKind::ALL {
                    match engine.subscribe(kind, &layer) {
                        Ok(()) => self.subscribed.push((kind, layer.clone())),
                        Err(e) => warn!(error = %e, layer = %layer, event = kind.to_str(), "could not subscribe"),
                    }
                }
            }
        }
    }

    /// Tear everything down in an order the engine accepts (listeners, then layers, then the
    /// source) and reset both guard flags.
    pub fn cleanup(&mut self, engine: &mut dyn MapEngine) {
        for (kind, layer) in self.subscribed.drain(..) {
            if let Err(e) = engine.unsubscribe(kind, &layer) {
                warn!(error = %e, layer = %layer, "could not remove listener");
            }
        }

        for id in LocalityLayer::all_ids() {
            if engine.has_layer(&id) {
                if let Err(e) = engine.remove_layer(&id) {
                    warn!(error = %e, layer = %id, "could not remove layer");
                }
            }
        }

        if engine.has_source(&self.source_id) {
            if let Err(e) = engine.remove_source(&self.source_id) {
                warn!(error = %e, source = %self.source_id, "could not remove source");
            }
        }

        self.initialized = false;
        self.guard.set(false);
        self.phase = Phase::Idle;
    }
}
