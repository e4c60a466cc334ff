//! Test double recording every call made to it, used to assert the flash
//! interaction sequence from the end-to-end happy-path and rollback scenarios.

use crate::{FlashError, FlashHandle, FlashResult, FlashWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub offset: u64,
    pub length: usize,
}

#[derive(Default)]
pub struct RecordingFlashWriter {
    next_id: u64,
    open_handle_id: Option<u64>,
    pub begins: Vec<(String, u64)>,
    pub writes: Vec<RecordedWrite>,
    pub ends: u32,
    pub aborts: u32,
    pub boot_slot_sets: u32,
}

impl RecordingFlashWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlashWriter for RecordingFlashWriter {
    fn begin(&mut self, name: &str, total_size: u64) -> FlashResult<FlashHandle> {
        if self.open_handle_id.is_some() {
            return Err(FlashError::AlreadyOpen);
        }
        self.next_id += 1;
        self.open_handle_id = Some(self.next_id);
        self.begins.push((name.to_string(), total_size));
        Ok(FlashHandle { id: self.next_id })
    }

    fn write(&mut self, handle: &FlashHandle, data: &[u8], offset: u64) -> FlashResult<()> {
        if self.open_handle_id != Some(handle.id) {
            return Err(FlashError::NotOpen);
        }
        self.writes.push(RecordedWrite {
            offset,
            length: data.len(),
        });
        Ok(())
    }

    fn abort(&mut self, handle: FlashHandle) -> FlashResult<()> {
        if self.open_handle_id != Some(handle.id) {
            return Err(FlashError::NotOpen);
        }
        self.open_handle_id = None;
        self.aborts += 1;
        Ok(())
    }

    fn end(&mut self, handle: FlashHandle) -> FlashResult<()> {
        if self.open_handle_id != Some(handle.id) {
            return Err(FlashError::NotOpen);
        }
        self.open_handle_id = None;
        self.ends += 1;
        Ok(())
    }

    fn set_boot_slot(&mut self) -> FlashResult<()> {
        self.boot_slot_sets += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_write_end_sequence_is_recorded() {
        let mut writer = RecordingFlashWriter::new();
        let handle = writer.begin("rootfs", 1024).unwrap();
        writer.write(&handle, &[0u8; 512], 0).unwrap();
        writer.write(&handle, &[0u8; 512], 512).unwrap();
        writer.end(handle).unwrap();

        assert_eq!(writer.begins, vec![("rootfs".to_string(), 1024)]);
        assert_eq!(writer.writes.len(), 2);
        assert_eq!(writer.ends, 1);
    }

    #[test]
    fn cannot_begin_twice_without_closing() {
        let mut writer = RecordingFlashWriter::new();
        let _handle = writer.begin("rootfs", 1024).unwrap();
        assert!(writer.begin("other", 512).is_err());
    }

    #[test]
    fn write_after_abort_fails() {
        let mut writer = RecordingFlashWriter::new();
        let handle = writer.begin("rootfs", 1024).unwrap();
        writer.abort(handle).unwrap();
        assert_eq!(writer.aborts, 1);
    }
}
