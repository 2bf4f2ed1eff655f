use std::{collections::BTreeMap, fmt, io, path::PathBuf};

use crate::types::Collection;

#[derive(Debug)]
pub enum StateError {
    IoError(io::Error),
    SerdeError(serde_json::Error),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::IoError(e) => write!(f, "origin map i/o error: {e}"),
            StateError::SerdeError(e) => write!(f, "origin map is corrupt: {e}"),
        }
    }
}

impl std::error::Error for StateError {}

impl From<io::Error> for StateError {
    fn from(err: io::Error) -> Self {
        StateError::IoError(err)
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::SerdeError(err)
    }
}

/// Remembers which backup playlist each imported playlist was created from.
///
/// Spotify has no field to carry the `originId` back-reference, so the map
/// `remote playlist id -> source playlist id` lives in the data directory and
/// is stamped onto every fresh snapshot before reconciliation.
pub struct OriginManager {
    path: PathBuf,
    origins: BTreeMap<String, String>,
}

impl OriginManager {
    /// Origin map stored under the data directory.
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            origins: BTreeMap::new(),
        }
    }

    /// Loads the map; a missing file is an empty map.
    pub async fn load(mut self) -> Result<Self, StateError> {
        match async_fs::read_to_string(&self.path).await {
            Ok(json) => {
                self.origins = serde_json::from_str(&json)?;
                Ok(self)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(self),
            Err(e) => Err(StateError::IoError(e)),
        }
    }

    /// Writes the map, creating the state directory first.
    pub async fn persist(&self) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.origins)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Remembers that `playlist_id` was created from backup playlist `origin_id`.
    pub fn record(&mut self, playlist_id: String, origin_id: String) {
        self.origins.insert(playlist_id, origin_id);
    }

    pub fn get(&self, playlist_id: &str) -> Option<&String> {
        self.origins.get(playlist_id)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Sets `origin_id` on every known playlist of `collection` and forgets
    /// playlists that no longer exist remotely.
    pub fn apply(&mut self, collection: &mut Collection) {
        self.origins
            .retain(|playlist_id, _| collection.playlists.contains_key(playlist_id));
        for (playlist_id, origin_id) in &self.origins {
            if let Some(playlist) = collection.playlists.get_mut(playlist_id) {
                playlist.origin_id = Some(origin_id.clone());
            }
        }
    }

    fn default_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("myspotbackup/state/origins.json");
        path
    }
}

impl Default for OriginManager {
    fn default() -> Self {
        Self::new()
    }
}
