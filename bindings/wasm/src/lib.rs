use wasm_bindgen::prelude::*;

mod common;
mod engine;
mod overlay;
mod storage;

pub use overlay::WasmOverlay;

/// Called automatically when the WASM module is instantiated.
/// Sets up panic hook so Rust panics appear as console.error in the browser, and sends
/// `tracing` output to the console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    common::init_console_tracing();
}
