//! The Flash writer collaborator: accepts (open, write(offset, chunk),
//! commit, abort, set-boot-slot), called from the artifact parser's payload
//! callback via the built-in "rootfs-image" handler.

mod file_backed;
mod recording;

pub use file_backed::FileFlashWriter;
pub use recording::{RecordedWrite, RecordingFlashWriter};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlashError {
    #[error("flash writer already has an open handle")]
    AlreadyOpen,
    #[error("flash writer has no open handle")]
    NotOpen,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FlashResult<T> = Result<T, FlashError>;

/// An opaque handle to a single in-progress write, returned by `begin` and
/// threaded back through `write`/`abort`/`end`. Unlike the source's
/// `void*` handle, this is a typed, owned value: there is exactly one
/// live handle at a time and the type system enforces that `write` cannot
/// be called before `begin` or after `end`/`abort`.
pub struct FlashHandle {
    pub(crate) id: u64,
}

/// `Flash.begin/write/abort/end/set_boot_slot`.
pub trait FlashWriter: Send + Sync {
    fn begin(&mut self, name: &str, total_size: u64) -> FlashResult<FlashHandle>;
    fn write(&mut self, handle: &FlashHandle, data: &[u8], offset: u64) -> FlashResult<()>;
    fn abort(&mut self, handle: FlashHandle) -> FlashResult<()>;
    fn end(&mut self, handle: FlashHandle) -> FlashResult<()>;
    fn set_boot_slot(&mut self) -> FlashResult<()>;
}
