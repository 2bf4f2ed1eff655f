use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
};

use crate::{
    types::{Collection, IMPORTED_STARRED, MutationAction, Playlist},
    utils::{is_valid_spotify_id, is_valid_track_uri},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingName,
    MalformedUri,
    MalformedId,
}

/// An entry of the imported backup that was left out of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub reason: SkipReason,
    /// Playlist the entry belongs to, `None` for saved tracks.
    pub playlist: Option<String>,
    pub value: String,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let place = self
            .playlist
            .as_deref()
            .map(|p| format!("playlist {p}"))
            .unwrap_or_else(|| "saved tracks".to_string());
        match self.reason {
            SkipReason::MissingName => write!(f, "Skipping playlist {} with missing name", self.value),
            SkipReason::MalformedUri => {
                write!(f, "Skipping invalid track uri {:?} in {}", self.value, place)
            }
            SkipReason::MalformedId => {
                write!(f, "Skipping invalid track id {:?} in {}", self.value, place)
            }
        }
    }
}

/// Mutations needed to converge an account toward a backup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<MutationAction>,
    pub skipped: Vec<SkippedEntry>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn track_count(&self) -> usize {
        self.actions.iter().map(MutationAction::track_count).sum()
    }
}

/// Computes the additive mutations that bring `target` up to `source`.
///
/// Saved tracks are compared by id, playlist tracks by uri. A source
/// playlist corresponds to the target playlist that was created from it
/// (`originId`), else to a target playlist of the same name, unless that
/// name is used by more than one source playlist. Order is not reconciled.
/// `SaveTracks`, when present, is the first action.
///
/// Legacy `starred` tracks are imported into a playlist named
/// `importedStarred`.
pub fn reconcile(target: &Collection, source: &Collection) -> Plan {
    let mut plan = Plan::default();

    let saved_ids = missing_saved_ids(target, source, &mut plan.skipped);
    if !saved_ids.is_empty() {
        plan.actions.push(MutationAction::SaveTracks { ids: saved_ids });
    }

    let playlists = with_starred(source);

    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for playlist in playlists.values() {
        *name_counts.entry(playlist.name.as_str()).or_default() += 1;
    }

    for (key, playlist) in playlists.iter() {
        if playlist.name.trim().is_empty() {
            plan.skipped.push(SkippedEntry {
                reason: SkipReason::MissingName,
                playlist: None,
                value: source_id(key, playlist).to_string(),
            });
            continue;
        }

        let uris = valid_uris(playlist, &mut plan.skipped);
        let ambiguous = name_counts.get(playlist.name.as_str()).copied().unwrap_or(0) > 1;

        match find_match(target, source_id(key, playlist), &playlist.name, ambiguous) {
            Some(existing) => {
                let present: HashSet<&str> =
                    existing.tracks.iter().map(|t| t.uri.as_str()).collect();
                let missing: Vec<String> = uris
                    .into_iter()
                    .filter(|uri| !present.contains(uri.as_str()))
                    .collect();
                if !missing.is_empty() {
                    plan.actions.push(MutationAction::AddToPlaylist {
                        id: existing.id.clone(),
                        name: existing.name.clone(),
                        uris: missing,
                    });
                }
            }
            None if !uris.is_empty() => {
                plan.actions.push(MutationAction::CreatePlaylistAndAdd {
                    name: playlist.name.clone(),
                    uris,
                    origin_id: Some(source_id(key, playlist).to_string())
                        .filter(|id| !id.is_empty()),
                });
            }
            None => {}
        }
    }

    plan
}

/// Source playlists with the starred tracks folded into the
/// `importedStarred` playlist, created if the backup has none.
fn with_starred(source: &Collection) -> Cow<'_, BTreeMap<String, Playlist>> {
    if source.starred.is_empty() {
        return Cow::Borrowed(&source.playlists);
    }

    let mut playlists = source.playlists.clone();
    let key = playlists
        .iter()
        .find(|(_, p)| p.name == IMPORTED_STARRED)
        .map(|(k, _)| k.clone())
        .unwrap_or_else(|| IMPORTED_STARRED.to_string());
    playlists
        .entry(key)
        .or_insert_with(|| Playlist {
            id: IMPORTED_STARRED.to_string(),
            name: IMPORTED_STARRED.to_string(),
            tracks: Vec::new(),
            origin_id: None,
        })
        .tracks
        .extend(source.starred.iter().cloned());

    Cow::Owned(playlists)
}

fn missing_saved_ids(
    target: &Collection,
    source: &Collection,
    skipped: &mut Vec<SkippedEntry>,
) -> Vec<String> {
    let mut known: HashSet<&str> = target.saved.iter().map(|t| t.id.as_str()).collect();
    let mut ids = Vec::new();

    for track in &source.saved {
        if !is_valid_spotify_id(&track.id) {
            skipped.push(SkippedEntry {
                reason: SkipReason::MalformedId,
                playlist: None,
                value: track.id.clone(),
            });
            continue;
        }
        if known.insert(track.id.as_str()) {
            ids.push(track.id.clone());
        }
    }

    ids
}

/// Well-formed, deduplicated uris of a source playlist in their original order.
fn valid_uris(playlist: &Playlist, skipped: &mut Vec<SkippedEntry>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut uris = Vec::new();

    for track in &playlist.tracks {
        if !is_valid_track_uri(&track.uri) {
            skipped.push(SkippedEntry {
                reason: SkipReason::MalformedUri,
                playlist: Some(playlist.name.clone()),
                value: track.uri.clone(),
            });
            continue;
        }
        if seen.insert(track.uri.as_str()) {
            uris.push(track.uri.clone());
        }
    }

    uris
}

fn find_match<'a>(
    target: &'a Collection,
    source_id: &str,
    name: &str,
    ambiguous: bool,
) -> Option<&'a Playlist> {
    if !source_id.is_empty() {
        let by_origin = target
            .playlists
            .values()
            .find(|p| p.origin_id.as_deref() == Some(source_id));
        if by_origin.is_some() {
            return by_origin;
        }
    }

    if ambiguous {
        return None;
    }
    target.playlists.values().find(|p| p.name == name)
}

/// The playlist's own id, falling back to its key in the backup map.
fn source_id<'a>(key: &'a str, playlist: &'a Playlist) -> &'a str {
    if playlist.id.is_empty() { key } else { &playlist.id }
}
