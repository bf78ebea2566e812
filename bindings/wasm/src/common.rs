use std::io;

use anyhow::{anyhow, Result};
use js_sys::{Array, Function, Reflect};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::{JsCast, JsValue};

pub(crate) fn js_err(e: impl ToString) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Readable text of a thrown JS value (an `Error`'s message, or its string form).
pub(crate) fn describe(value: &JsValue) -> String {
    if let Some(message) = Reflect::get(value, &JsValue::from_str("message")).ok().and_then(|m| m.as_string()) {
        return message;
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// Serialize to a plain JS object (maps become objects, not `Map`s).
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| anyhow!("serialize: {e}"))
}

/// Call `target[method](...args)`.
pub(crate) fn call_method(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue> {
    let function: Function = Reflect::get(target, &JsValue::from_str(method))
        .map_err(|e| anyhow!("{method}: {}", describe(&e)))?
        .dyn_into()
        .map_err(|_| anyhow!("{method} is not a function"))?;
    let args: Array = args.iter().collect();
    function.apply(target, &args).map_err(|e| anyhow!("{method}: {}", describe(&e)))
}

/// Buffers one formatted event and writes it to the console when dropped.
pub(crate) struct ConsoleWriter {
    level: Level,
    buffer: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        let line = JsValue::from_str(line.trim_end());
        match self.level {
            Level::ERROR => web_sys::console::error_1(&line),
            Level::WARN => web_sys::console::warn_1(&line),
            Level::INFO => web_sys::console::info_1(&line),
            _ => web_sys::console::debug_1(&line),
        }
    }
}

pub(crate) struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter { level: Level::INFO, buffer: Vec::new() }
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        ConsoleWriter { level: *meta.level(), buffer: Vec::new() }
    }
}

/// Route `tracing` events at INFO and above to the browser console. A second call is a no-op.
pub(crate) fn init_console_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter)
        .with_max_level(Level::INFO)
        .with_ansi(false)
        .without_time()
        .try_init();
}
