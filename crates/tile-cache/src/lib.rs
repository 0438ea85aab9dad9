//! Disk-backed cache for rendered map tiles.
//!
//! Guarantees at most one in-flight producer per tile key: concurrent
//! requests for the same key block until the first caller has rendered
//! and published the file, then observe the same path. Publication is
//! atomic via a staging directory and a chain of renames, so a reader
//! never sees a partially written tile.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use map_common::{MapError, MapResult};
use renderer::Canvas;

/// Entries idle longer than this are eligible for eviction; also the
/// sweep period.
const MAX_AGE: Duration = Duration::from_millis(120_000);

/// The sweeper only runs once this many keys are tracked.
const MAX_TRACKED_REQUESTS: usize = 1000;

/// A keyed, disk-backed tile store shared between rendering threads.
pub struct TileCache {
    inner: Arc<CacheInner>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

struct CacheInner {
    dir: PathBuf,
    tiles: Mutex<HashMap<String, Arc<CacheEntry>>>,
    requests: Mutex<HashMap<String, Instant>>,
    shutdown: AtomicBool,
    sweep_signal: Condvar,
    sweep_lock: Mutex<()>,
}

/// Per-key production state machine.
///
/// `file` is set exactly once per cache generation, after the tile has
/// been published; `producing` marks the single thread allowed to run
/// the producer. Waiters park on the condvar.
struct CacheEntry {
    state: Mutex<EntryState>,
    ready: Condvar,
}

#[derive(Default)]
struct EntryState {
    file: Option<PathBuf>,
    producing: bool,
}

impl CacheEntry {
    /// A new entry starts ready when the tile already exists on disk.
    fn new(path: &Path) -> Self {
        let file = path.exists().then(|| path.to_path_buf());
        Self {
            state: Mutex::new(EntryState {
                file,
                producing: false,
            }),
            ready: Condvar::new(),
        }
    }
}

/// Re-opens an entry for production on every exit path. Dropping the
/// guard after a panic or error leaves the entry absent so the next
/// caller retries; dropping after success wakes waiters into the ready
/// state.
struct ProducerGuard<'a> {
    entry: &'a CacheEntry,
}

impl Drop for ProducerGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.entry.state);
        state.producing = false;
        drop(state);
        self.entry.ready.notify_all();
    }
}

/// Poison-tolerant lock: a panicked producer must not wedge the cache.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TileCache {
    /// Open a cache rooted at `dir`, creating the directory if needed,
    /// and start the background sweeper.
    pub fn new(dir: impl AsRef<Path>) -> MapResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| MapError::InvalidCacheDir(format!("{}: {}", dir.display(), e)))?;
        if !dir.is_dir() {
            return Err(MapError::InvalidCacheDir(dir.display().to_string()));
        }

        let inner = Arc::new(CacheInner {
            dir,
            tiles: Mutex::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
            sweep_signal: Condvar::new(),
            sweep_lock: Mutex::new(()),
        });

        let sweeper_inner = Arc::clone(&inner);
        let sweeper = std::thread::Builder::new()
            .name("tile-cache-sweeper".into())
            .spawn(move || run_sweeper(sweeper_inner))
            .map_err(MapError::Io)?;

        Ok(Self {
            inner,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// Root directory of the cache.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Return the on-disk tile for `key`, invoking `producer` to render
    /// it if no thread has done so yet.
    ///
    /// Exactly one of any number of concurrent callers runs the
    /// producer; the rest block until the file is published and then
    /// return the same path. A `None` or fully transparent image counts
    /// as empty: with `save_empty_tiles` a zero-byte file is written,
    /// otherwise the nominal path is returned with no file behind it.
    pub fn get_or_create<F>(
        &self,
        key: &str,
        producer: F,
        save_empty_tiles: bool,
    ) -> MapResult<PathBuf>
    where
        F: FnOnce() -> MapResult<Option<Canvas>>,
    {
        self.inner.get_or_create(key, producer, save_empty_tiles)
    }

    /// Delete the tile for `key`, waiting out any in-flight producer
    /// first. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> MapResult<()> {
        lock(&self.inner.requests).remove(key);
        let entry = lock(&self.inner.tiles).remove(key);

        if let Some(entry) = entry {
            let mut state = lock(&entry.state);
            while state.producing {
                state = entry.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        }

        match fs::remove_file(self.inner.file_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Cache key for a tile coordinate: `/z/` plus, from zoom 8 up, the
    /// zoom-8 ancestor indices to bound directory fan-out, then `x/y`.
    pub fn relative_path(x: u32, y: u32, z: u32) -> String {
        let mut path = format!("/{}/", z);
        if z >= 8 {
            let shift = z - 8;
            path.push_str(&format!("{}/{}/", x >> shift, y >> shift));
        }
        path.push_str(&format!("{}/{}", x, y));
        path
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        {
            let _guard = lock(&self.inner.sweep_lock);
            self.inner.shutdown.store(true, Ordering::Release);
        }
        self.inner.sweep_signal.notify_all();
        if let Some(handle) = lock(&self.sweeper).take() {
            let _ = handle.join();
        }
    }
}

impl CacheInner {
    fn get_or_create<F>(&self, key: &str, producer: F, save_empty_tiles: bool) -> MapResult<PathBuf>
    where
        F: FnOnce() -> MapResult<Option<Canvas>>,
    {
        lock(&self.requests).insert(key.to_string(), Instant::now());

        let path = self.file_path(key);
        let entry = {
            let mut tiles = lock(&self.tiles);
            Arc::clone(
                tiles
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(CacheEntry::new(&path))),
            )
        };

        // Wait until the tile is ready, or claim production of it
        let mut state = lock(&entry.state);
        loop {
            if let Some(file) = &state.file {
                return Ok(file.clone());
            }
            if !state.producing {
                state.producing = true;
                break;
            }
            state = entry.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        drop(state);

        // This thread owns production. The guard clears the producing
        // flag and wakes waiters on every exit, including unwinds.
        let _guard = ProducerGuard { entry: &entry };

        let image = producer().map_err(|e| MapError::ProducerFailed(e.to_string()))?;
        self.publish(&path, image.as_ref(), save_empty_tiles)?;

        lock(&entry.state).file = Some(path.clone());
        debug!(key, path = %path.display(), "published tile");
        Ok(path)
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.png", key.trim_start_matches('/')))
    }

    /// Write the tile next to its final location and move it into place
    /// with renames only, so concurrent readers never observe a partial
    /// file: `<dir>_temp/<name>` -> `<dir>_temp/<name>.tmp` ->
    /// `<dir>/<name>.tmp` -> `<dir>/<name>`.
    fn publish(
        &self,
        final_path: &Path,
        image: Option<&Canvas>,
        save_empty_tiles: bool,
    ) -> MapResult<()> {
        let bytes = match image {
            Some(img) if !img.is_blank() => Some(img.to_png()?),
            _ => None,
        };

        let data = match (bytes, save_empty_tiles) {
            (Some(data), _) => data,
            (None, true) => Vec::new(),
            (None, false) => {
                debug!(path = %final_path.display(), "empty tile, nothing written");
                return Ok(());
            }
        };

        let parent = final_path
            .parent()
            .ok_or_else(|| MapError::InvalidCacheDir(final_path.display().to_string()))?;
        let name = final_path
            .file_name()
            .ok_or_else(|| MapError::InvalidCacheDir(final_path.display().to_string()))?;
        fs::create_dir_all(parent)?;

        let mut temp_dir = parent.as_os_str().to_os_string();
        temp_dir.push("_temp");
        let temp_dir = PathBuf::from(temp_dir);
        fs::create_dir_all(&temp_dir)?;

        let staged = temp_dir.join(name);
        fs::write(&staged, &data)?;

        let mut tmp_name = name.to_os_string();
        tmp_name.push(".tmp");
        let staged_tmp = temp_dir.join(&tmp_name);
        fs::rename(&staged, &staged_tmp)?;

        let landing = parent.join(&tmp_name);
        fs::rename(&staged_tmp, &landing)?;
        fs::rename(&landing, final_path)?;
        Ok(())
    }

    /// Evict entries whose last request is older than `max_age` from
    /// both maps. Runs only while at least `min_tracked` keys are
    /// tracked; entries mid-production are left for the next pass.
    fn sweep(&self, max_age: Duration, min_tracked: usize) {
        let mut requests = lock(&self.requests);
        if requests.len() < min_tracked {
            return;
        }
        let now = Instant::now();
        let stale: Vec<String> = requests
            .iter()
            .filter(|(_, last)| now.duration_since(**last) >= max_age)
            .map(|(key, _)| key.clone())
            .collect();
        if stale.is_empty() {
            return;
        }

        let mut tiles = lock(&self.tiles);
        let mut evicted = 0usize;
        for key in &stale {
            let producing = tiles
                .get(key)
                .map(|entry| lock(&entry.state).producing)
                .unwrap_or(false);
            if producing {
                continue;
            }
            requests.remove(key);
            tiles.remove(key);
            evicted += 1;
        }
        debug!(evicted, tracked = requests.len(), "swept tile index");
    }
}

fn run_sweeper(inner: Arc<CacheInner>) {
    let mut guard = lock(&inner.sweep_lock);
    while !inner.shutdown.load(Ordering::Acquire) {
        let (next, _) = inner
            .sweep_signal
            .wait_timeout(guard, MAX_AGE)
            .unwrap_or_else(PoisonError::into_inner);
        guard = next;
        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }
        inner.sweep(MAX_AGE, MAX_TRACKED_REQUESTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tile-cache-unit-{}-{}",
            std::process::id(),
            name
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn red_tile() -> MapResult<Option<Canvas>> {
        let mut canvas = Canvas::new(1, 1)?;
        canvas.fill_rgb(255, 0, 0);
        Ok(Some(canvas))
    }

    #[test]
    fn test_relative_path_low_zoom() {
        assert_eq!(TileCache::relative_path(3, 5, 4), "/4/3/5");
        assert_eq!(TileCache::relative_path(0, 0, 0), "/0/0/0");
    }

    #[test]
    fn test_relative_path_shards_above_zoom_8() {
        // zoom 8 is its own ancestor
        assert_eq!(TileCache::relative_path(200, 100, 8), "/8/200/100/200/100");
        // zoom 10: ancestor indices are x >> 2, y >> 2
        assert_eq!(TileCache::relative_path(1023, 512, 10), "/10/255/128/1023/512");
    }

    #[test]
    fn test_invalid_cache_dir() {
        let file = test_dir("not-a-dir");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"occupied").unwrap();
        assert!(matches!(
            TileCache::new(&file),
            Err(MapError::InvalidCacheDir(_))
        ));
        let _ = fs::remove_file(&file);
    }

    #[test]
    fn test_entry_starts_ready_when_file_exists() {
        let dir = test_dir("preexisting");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("warm.png"), b"tile").unwrap();

        let cache = TileCache::new(&dir).unwrap();
        let path = cache
            .get_or_create("warm", || panic!("producer must not run"), false)
            .unwrap();
        assert_eq!(path, dir.join("warm.png"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sweep_evicts_only_stale_entries() {
        let dir = test_dir("sweep");
        let cache = TileCache::new(&dir).unwrap();
        cache.get_or_create("old", red_tile, false).unwrap();
        cache.get_or_create("fresh", red_tile, false).unwrap();

        // backdate one request past the age limit
        let age = Duration::from_secs(300);
        if let Some(last) = lock(&cache.inner.requests).get_mut("old") {
            *last -= age;
        }

        cache.inner.sweep(Duration::from_secs(200), 0);

        let tiles = lock(&cache.inner.tiles);
        assert!(!tiles.contains_key("old"));
        assert!(tiles.contains_key("fresh"));
        drop(tiles);
        assert!(!lock(&cache.inner.requests).contains_key("old"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sweep_respects_min_tracked() {
        let dir = test_dir("sweep-min");
        let cache = TileCache::new(&dir).unwrap();
        cache.get_or_create("only", red_tile, false).unwrap();
        if let Some(last) = lock(&cache.inner.requests).get_mut("only") {
            *last -= Duration::from_secs(300);
        }

        // below the tracking threshold nothing is evicted
        cache.inner.sweep(Duration::from_secs(1), 10);
        assert!(lock(&cache.inner.tiles).contains_key("only"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sweep_skips_in_flight_producers() {
        let dir = test_dir("sweep-producing");
        let cache = TileCache::new(&dir).unwrap();
        cache.get_or_create("busy", red_tile, false).unwrap();
        if let Some(last) = lock(&cache.inner.requests).get_mut("busy") {
            *last -= Duration::from_secs(300);
        }
        {
            let tiles = lock(&cache.inner.tiles);
            lock(&tiles["busy"].state).producing = true;
        }

        cache.inner.sweep(Duration::from_secs(1), 0);
        assert!(lock(&cache.inner.tiles).contains_key("busy"));

        {
            let tiles = lock(&cache.inner.tiles);
            lock(&tiles["busy"].state).producing = false;
        }
        let _ = fs::remove_dir_all(&dir);
    }
}
