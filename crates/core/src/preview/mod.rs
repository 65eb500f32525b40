//! Scoped preview references for locally selected files.
//!
//! A [`PreviewUrl`] is acquired when a file is selected and released when it
//! is dropped, so replacement and teardown both release it exactly once.

use std::{
    collections::HashSet,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

/// Tracks which preview references are currently alive.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    shared: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a preview reference for the file at `path`.
    pub fn acquire(&self, path: &Path) -> PreviewUrl {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut live) = self.shared.live.lock() {
            live.insert(id);
        }
        let url = file_url(path);
        tracing::debug!(id, %url, "acquired preview");

        PreviewUrl {
            id,
            url,
            registry: self.shared.clone(),
        }
    }

    /// Number of preview references not yet released.
    pub fn live_count(&self) -> usize {
        self.shared.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    pub fn is_live(&self, id: u64) -> bool {
        self.shared
            .live
            .lock()
            .map(|live| live.contains(&id))
            .unwrap_or(false)
    }
}

/// Percent-encoded `file://` URL for `path`, resolved against the working
/// directory when relative.
fn file_url(path: &Path) -> String {
    match std::path::absolute(path)
        .ok()
        .and_then(|absolute| url::Url::from_file_path(absolute).ok())
    {
        Some(url) => url.into(),
        None => {
            tracing::warn!(?path, "could not build a file URL for preview");
            format!("file://{}", path.display())
        }
    }
}

/// Exclusively owned preview reference. Not `Clone`: whoever holds it is the
/// only one who releases it.
#[derive(Debug)]
pub struct PreviewUrl {
    id: u64,
    url: String,
    registry: Arc<RegistryInner>,
}

impl PreviewUrl {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewUrl {
    fn drop(&mut self) {
        let released = match self.registry.live.lock() {
            Ok(mut live) => live.remove(&self.id),
            Err(poisoned) => poisoned.into_inner().remove(&self.id),
        };
        if released {
            tracing::debug!(id = self.id, "released preview");
        } else {
            tracing::warn!(id = self.id, "preview released twice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_on_drop() {
        let registry = PreviewRegistry::new();
        let preview = registry.acquire(Path::new("/tmp/song.mp3"));
        assert_eq!(preview.url(), "file:///tmp/song.mp3");
        assert!(registry.is_live(preview.id()));
        assert_eq!(registry.live_count(), 1);

        let id = preview.id();
        drop(preview);
        assert!(!registry.is_live(id));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let registry = PreviewRegistry::new();
        let preview = registry.acquire(Path::new("my song.mp3"));

        let url = url::Url::parse(preview.url()).unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(url.host_str(), None);
        assert!(url.path().starts_with('/'));
        assert!(preview.url().ends_with("/my%20song.mp3"));
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let registry = PreviewRegistry::new();
        let preview = registry.acquire(Path::new("/tmp/my song #1.mp3"));
        assert_eq!(preview.url(), "file:///tmp/my%20song%20%231.mp3");
    }

    #[test]
    fn previews_of_the_same_file_are_distinct() {
        let registry = PreviewRegistry::new();
        let first = registry.acquire(Path::new("a.wav"));
        let second = registry.acquire(Path::new("a.wav"));

        assert_ne!(first.id(), second.id());
        drop(first);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.is_live(second.id()));
    }
}
