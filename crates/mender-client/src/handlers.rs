//! Artifact payload type handlers: dispatch table keyed by the
//! payload's `type` string (e.g. "rootfs-image"), each one driving a
//! `FlashWriter` through begin/write/end as the artifact parser streams
//! chunks past.

use mender_flash::FlashWriter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Handles one artifact payload type's chunk stream. `&self` rather than
/// `&mut self` because handlers are stored behind `Arc` in a shared
/// registry and dispatched through a `dyn` trait object; handlers that
/// need to track an open flash handle across calls do so with their own
/// interior mutability (see `RootfsImageHandler`).
pub trait PayloadTypeHandler: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn on_chunk(
        &self,
        flash: &mut dyn FlashWriter,
        filename: Option<&str>,
        total_size: u64,
        chunk: Option<&[u8]>,
        absolute_offset: u64,
        chunk_length: usize,
    ) -> Result<(), String>;

    /// Called when a download fails partway through, so a handler with an
    /// open flash handle can release it. Default no-op, since most
    /// handlers only accumulate in `on_chunk`.
    fn abort(&self, _flash: &mut dyn FlashWriter) {}
}

/// One entry of the registry `Client::register_artifact_handler` builds.
#[derive(Clone)]
pub struct HandlerEntry {
    pub handler: Arc<dyn PayloadTypeHandler>,
    pub needs_restart: bool,
    pub validation_name: Option<String>,
}

/// The built-in "rootfs-image" handler: opens the flash writer on
/// the first chunk of the inner file, writes every chunk at its absolute
/// offset, and closes the writer once the offset plus the chunk length
/// reaches the total size. A filename-less invocation (the artifact
/// parser's "begin" signal for a zero-length payload bundle) is a no-op —
/// it must never open a writer on its own.
#[derive(Default)]
pub struct RootfsImageHandler {
    open_handle: Mutex<Option<mender_flash::FlashHandle>>,
}

impl RootfsImageHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PayloadTypeHandler for RootfsImageHandler {
    fn on_chunk(
        &self,
        flash: &mut dyn FlashWriter,
        filename: Option<&str>,
        total_size: u64,
        chunk: Option<&[u8]>,
        absolute_offset: u64,
        chunk_length: usize,
    ) -> Result<(), String> {
        let Some(name) = filename else {
            return Ok(());
        };

        if absolute_offset == 0 {
            let handle = flash.begin(name, total_size).map_err(|e| e.to_string())?;
            *self.open_handle.lock().unwrap() = Some(handle);
        }

        if let Some(data) = chunk {
            let guard = self.open_handle.lock().unwrap();
            let handle = guard.as_ref().ok_or_else(|| "flash writer has no open handle".to_string())?;
            flash
                .write(handle, &data[..chunk_length], absolute_offset)
                .map_err(|e| e.to_string())?;
        }

        if absolute_offset + chunk_length as u64 >= total_size {
            if let Some(handle) = self.open_handle.lock().unwrap().take() {
                flash.end(handle).map_err(|e| e.to_string())?;
            }
        }

        Ok(())
    }

    fn abort(&self, flash: &mut dyn FlashWriter) {
        if let Some(handle) = self.open_handle.lock().unwrap().take() {
            let _ = flash.abort(handle);
        }
    }
}

/// A snapshot of the handler registry, taken under lock once per update
/// firing and then used without holding the registry's mutex across the
/// download's `.await` points.
pub type HandlerTable = HashMap<String, HandlerEntry>;

/// Adapts the artifact parser's `PayloadSink` callbacks to the handler
/// registry: looks up the handler for the payload's `type_name` and
/// forwards the call, tracking whether any dispatched handler requires a
/// restart once the download completes.
pub struct DispatchSink<'a> {
    handlers: &'a HandlerTable,
    flash: &'a Arc<Mutex<Box<dyn FlashWriter>>>,
    pub restart_needed: bool,
}

impl<'a> DispatchSink<'a> {
    pub fn new(handlers: &'a HandlerTable, flash: &'a Arc<Mutex<Box<dyn FlashWriter>>>) -> Self {
        Self {
            handlers,
            flash,
            restart_needed: false,
        }
    }
}

impl mender_artifact::PayloadSink for DispatchSink<'_> {
    fn on_payload_chunk(
        &mut self,
        type_name: &str,
        _meta_data: Option<&serde_json::Value>,
        filename: Option<&str>,
        total_size: u64,
        chunk: Option<&[u8]>,
        absolute_offset: u64,
        chunk_length: usize,
    ) -> Result<(), String> {
        let entry = self
            .handlers
            .get(type_name)
            .ok_or_else(|| format!("no handler registered for payload type \"{type_name}\""))?;

        let mut flash = self.flash.lock().unwrap();
        entry
            .handler
            .on_chunk(&mut **flash, filename, total_size, chunk, absolute_offset, chunk_length)?;

        if entry.needs_restart {
            self.restart_needed = true;
        }
        Ok(())
    }
}
