use std::{
    collections::HashMap,
    fs,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Pluggable persistence for consumer offsets. A store is keyed by
/// `(consumer_name, topic_id)`; a missing or corrupt entry is treated as "no
/// stored offset", never a hard error.
pub trait OffsetStore: Send {
    fn load(&self, consumer_name: &str, topic_id: u32) -> io::Result<Option<u64>>;
    fn store(&self, consumer_name: &str, topic_id: u32, offset: u64) -> io::Result<()>;
}

/// In-memory store, useful for tests and for consumers that don't need
/// offsets to survive a restart.
#[derive(Default)]
pub struct InMemoryOffsetStore {
    offsets: Mutex<HashMap<(String, u32), u64>>,
}

impl InMemoryOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OffsetStore for InMemoryOffsetStore {
    fn load(&self, consumer_name: &str, topic_id: u32) -> io::Result<Option<u64>> {
        let offsets = self.offsets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(offsets.get(&(consumer_name.to_string(), topic_id)).copied())
    }

    fn store(&self, consumer_name: &str, topic_id: u32, offset: u64) -> io::Result<()> {
        let mut offsets = self.offsets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        offsets.insert((consumer_name.to_string(), topic_id), offset);
        Ok(())
    }
}

/// File-backed store: one file per `(consumer_name, topic_id)` holding the
/// decimal ASCII offset followed by a newline. Writes go to a sibling temp
/// file in the same directory and are atomically renamed into place, so a
/// crash mid-write never leaves a truncated or partially-written offset file
/// behind.
pub struct FileOffsetStore {
    dir: PathBuf,
}

impl FileOffsetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, consumer_name: &str, topic_id: u32) -> PathBuf {
        self.dir.join(format!("{consumer_name}.{topic_id}.offset"))
    }
}

impl OffsetStore for FileOffsetStore {
    fn load(&self, consumer_name: &str, topic_id: u32) -> io::Result<Option<u64>> {
        let path = self.path_for(consumer_name, topic_id);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(contents.trim().parse::<u64>().ok()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn store(&self, consumer_name: &str, topic_id: u32, offset: u64) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(consumer_name, topic_id);
        write_atomic(&self.dir, &path, format!("{offset}\n").as_bytes())
    }
}

fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryOffsetStore::new();
        assert_eq!(store.load("c1", 1).unwrap(), None);
        store.store("c1", 1, 42).unwrap();
        assert_eq!(store.load("c1", 1).unwrap(), Some(42));
    }

    #[test]
    fn file_store_round_trips_and_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOffsetStore::new(dir.path());
        assert_eq!(store.load("c1", 7).unwrap(), None);
        store.store("c1", 7, 12345).unwrap();

        let reloaded = FileOffsetStore::new(dir.path());
        assert_eq!(reloaded.load("c1", 7).unwrap(), Some(12345));
    }

    #[test]
    fn file_store_treats_corrupt_contents_as_no_offset() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOffsetStore::new(dir.path());
        store.store("c1", 1, 1).unwrap();
        fs::write(store.path_for("c1", 1), b"not-a-number").unwrap();
        assert_eq!(store.load("c1", 1).unwrap(), None);
    }
}
