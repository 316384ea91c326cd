use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Named-slot key/value storage holding serialized state
///
/// A slot is either absent or holds the full text last written to it.
/// Writes replace the whole value.
pub trait SlotStore: Send {
    /// Read a slot, `Ok(None)` when it was never written
    fn read(&self, slot: &str) -> io::Result<Option<String>>;

    /// Overwrite a slot in full
    fn write(&self, slot: &str, contents: &str) -> io::Result<()>;
}

impl<S: SlotStore + ?Sized> SlotStore for Box<S> {
    fn read(&self, slot: &str) -> io::Result<Option<String>> {
        (**self).read(slot)
    }

    fn write(&self, slot: &str, contents: &str) -> io::Result<()> {
        (**self).write(slot, contents)
    }
}

/// Slots stored as `<dir>/<slot>.json`
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }

    fn lock_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", slot))
    }
}

impl SlotStore for FileSlotStore {
    fn read(&self, slot: &str) -> io::Result<Option<String>> {
        let path = self.slot_path(slot);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, slot: &str, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Held until the end of the function
        let lock_file = File::create(self.lock_path(slot))?;
        lock_file.lock_exclusive()?;

        // Write beside the target, then rename over it
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.slot_path(slot)).map_err(|e| e.error)?;

        FileExt::unlock(&lock_file)?;
        Ok(())
    }
}

/// In-process slots, used by tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one slot value
    pub fn with_slot(slot: &str, contents: &str) -> Self {
        let store = Self::default();
        store
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(slot.to_string(), contents.to_string());
        store
    }

    /// Current value of a slot
    pub fn contents(&self, slot: &str) -> Option<String> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(slot)
            .cloned()
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self, slot: &str) -> io::Result<Option<String>> {
        Ok(self.contents(slot))
    }

    fn write(&self, slot: &str, contents: &str) -> io::Result<()> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(slot.to_string(), contents.to_string());
        Ok(())
    }
}
