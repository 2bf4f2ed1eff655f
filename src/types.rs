use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tabled::Tabled;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

/// Raw body of the accounts service token endpoint.
///
/// Every field is optional because the same shape carries both the success
/// payload and the `{error, error_description}` failure payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// A pending login attempt, keyed by its state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateEntry {
    pub code_verifier: String,
    pub created_at: u64,
}

/// Name of the playlist that receives the `starred` tracks of old backups.
pub const IMPORTED_STARRED: &str = "importedStarred";

/// Reads a missing or `null` field as its default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One track reference as stored in snapshots and backup files.
///
/// Missing or `null` fields read as empty strings so that a backup with a
/// local file (`"id": null`) still parses; such entries are skipped during
/// reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Track {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uri: String,
}

impl Track {
    pub fn from_id(id: &str) -> Self {
        Track {
            id: id.to_string(),
            uri: format!("spotify:track:{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Playlist {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tracks: Vec<Track>,
    #[serde(
        rename = "originId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_id: Option<String>,
}

/// Full exportable state of one account: the backup file format.
///
/// `starred` only appears in backups of the old Spotify "Starred" list. It is
/// read for import and never written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub playlists: BTreeMap<String, Playlist>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub saved: Vec<Track>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub starred: Vec<Track>,
}

impl Collection {
    pub fn playlist_count(&self) -> usize {
        self.playlists.len()
    }

    pub fn track_count(&self) -> usize {
        self.playlists
            .values()
            .map(|p| p.tracks.len())
            .sum::<usize>()
            + self.saved.len()
            + self.starred.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationAction {
    CreatePlaylistAndAdd {
        name: String,
        uris: Vec<String>,
        origin_id: Option<String>,
    },
    AddToPlaylist {
        id: String,
        name: String,
        uris: Vec<String>,
    },
    SaveTracks {
        ids: Vec<String>,
    },
}

impl MutationAction {
    pub fn track_count(&self) -> usize {
        match self {
            MutationAction::CreatePlaylistAndAdd { uris, .. } => uris.len(),
            MutationAction::AddToPlaylist { uris, .. } => uris.len(),
            MutationAction::SaveTracks { ids } => ids.len(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            MutationAction::CreatePlaylistAndAdd { name, uris, .. } => {
                format!("create playlist \"{}\" with {} tracks", name, uris.len())
            }
            MutationAction::AddToPlaylist { name, uris, .. } => {
                format!("add {} tracks to playlist \"{}\"", uris.len(), name)
            }
            MutationAction::SaveTracks { ids } => format!("save {} tracks", ids.len()),
        }
    }
}

#[derive(Tabled)]
pub struct PlanTableRow {
    pub action: String,
    pub playlist: String,
    pub tracks: usize,
}

impl From<&MutationAction> for PlanTableRow {
    fn from(action: &MutationAction) -> Self {
        let (kind, playlist) = match action {
            MutationAction::CreatePlaylistAndAdd { name, .. } => ("create", name.clone()),
            MutationAction::AddToPlaylist { name, .. } => ("add", name.clone()),
            MutationAction::SaveTracks { .. } => ("save", "(saved tracks)".to_string()),
        };
        PlanTableRow {
            action: kind.to_string(),
            playlist,
            tracks: action.track_count(),
        }
    }
}

#[derive(Tabled)]
pub struct SummaryTableRow {
    pub source: String,
    pub playlists: usize,
    pub tracks: usize,
}

// Spotify Web API wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackObject {
    pub id: Option<String>,
    pub uri: String,
}

/// Item of both `/me/tracks` and playlist track listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackItem {
    pub track: Option<TrackObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracksRef {
    pub href: String,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    pub tracks: TracksRef,
}

/// Playlist metadata before its tracks are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaylistResponse {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTrackToPlaylistRequest {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveTracksRequest {
    pub ids: Vec<String>,
}
