//! Development-mode flash writer: writes the payload to a regular file
//! under a target directory, standing in for raw flash I/O on hardware
//! that has no memory-mapped flash device to write to directly (a Linux
//! gateway running this agent against a mounted update partition, for
//! instance).

use crate::{FlashError, FlashHandle, FlashResult, FlashWriter};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

pub struct FileFlashWriter {
    target_dir: PathBuf,
    next_id: u64,
    open: Option<(u64, File)>,
    pub boot_slot_sets: u32,
}

impl FileFlashWriter {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            next_id: 0,
            open: None,
            boot_slot_sets: 0,
        }
    }
}

impl FlashWriter for FileFlashWriter {
    fn begin(&mut self, name: &str, total_size: u64) -> FlashResult<FlashHandle> {
        if self.open.is_some() {
            return Err(FlashError::AlreadyOpen);
        }
        std::fs::create_dir_all(&self.target_dir)?;
        let path = self.target_dir.join(name);
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        file.set_len(total_size)?;

        self.next_id += 1;
        self.open = Some((self.next_id, file));
        Ok(FlashHandle { id: self.next_id })
    }

    fn write(&mut self, handle: &FlashHandle, data: &[u8], offset: u64) -> FlashResult<()> {
        let (open_id, file) = self.open.as_mut().ok_or(FlashError::NotOpen)?;
        if *open_id != handle.id {
            return Err(FlashError::NotOpen);
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn abort(&mut self, handle: FlashHandle) -> FlashResult<()> {
        let (open_id, _) = self.open.as_ref().ok_or(FlashError::NotOpen)?;
        if *open_id != handle.id {
            return Err(FlashError::NotOpen);
        }
        self.open = None;
        Ok(())
    }

    fn end(&mut self, handle: FlashHandle) -> FlashResult<()> {
        let (open_id, file) = self.open.as_mut().ok_or(FlashError::NotOpen)?;
        if *open_id != handle.id {
            return Err(FlashError::NotOpen);
        }
        file.flush()?;
        self.open = None;
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
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn writes_land_at_the_right_offsets() {
        let dir = tempdir().unwrap();
        let mut writer = FileFlashWriter::new(dir.path());

        let handle = writer.begin("rootfs.img", 8).unwrap();
        writer.write(&handle, b"ABCD", 0).unwrap();
        writer.write(&handle, b"EFGH", 4).unwrap();
        writer.end(handle).unwrap();

        let mut content = Vec::new();
        File::open(dir.path().join("rootfs.img"))
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"ABCDEFGH");
    }

    #[test]
    fn abort_leaves_no_open_handle_for_reuse() {
        let dir = tempdir().unwrap();
        let mut writer = FileFlashWriter::new(dir.path());
        let handle = writer.begin("rootfs.img", 8).unwrap();
        writer.abort(handle).unwrap();

        assert!(writer.begin("rootfs.img", 8).is_ok());
    }
}
