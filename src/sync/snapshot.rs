use std::{collections::BTreeMap, fmt};

use super::{Progress, ProgressSink};
use crate::{
    spotify::{ApiError, SpotifyClient},
    types::{Collection, Playlist},
    utils,
};

/// A snapshot could not be completed.
///
/// Carries the stage that failed and how far the build got; no partial
/// collection is ever returned.
#[derive(Debug)]
pub struct SnapshotError {
    pub stage: String,
    pub progress: Progress,
    pub source: ApiError,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed while {} ({} of {} playlists loaded): {}",
            self.stage, self.progress.playlists_done, self.progress.playlists_total, self.source
        )
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Loads the account's playlists (with all tracks) and saved tracks.
pub async fn build_snapshot(
    api: &SpotifyClient,
    sink: &dyn ProgressSink,
) -> Result<Collection, SnapshotError> {
    let mut progress = Progress::new("Fetching Playlists");
    sink.report(&progress);

    let fail = |stage: String, progress: &Progress| {
        let progress = progress.clone();
        move |source: ApiError| SnapshotError {
            stage,
            progress,
            source,
        }
    };

    let profile = api
        .get_profile()
        .await
        .map_err(fail("fetching the profile".to_string(), &progress))?;

    let report_playlists = |count: usize, total: Option<u64>| {
        sink.report(&Progress {
            step: "Fetching Playlists".to_string(),
            playlists_done: count,
            playlists_total: total.map_or(count, |t| t as usize),
            ..Default::default()
        });
    };
    let refs = api
        .get_my_playlists(&profile.id, Some(&report_playlists))
        .await
        .map_err(fail("fetching playlists".to_string(), &progress))?;

    progress.playlists_total = refs.len();
    let mut playlists = BTreeMap::new();
    for (index, playlist_ref) in refs.into_iter().enumerate() {
        progress.step = format!("Fetching Tracks for {}", playlist_ref.name);
        progress.playlists_done = index + 1;
        sink.report(&progress);

        let tracks = api
            .get_playlist_tracks(&playlist_ref.href, None)
            .await
            .map_err(fail(
                format!("fetching tracks of playlist \"{}\"", playlist_ref.name),
                &progress,
            ))?;
        progress.tracks_done += tracks.len();

        playlists.insert(
            playlist_ref.id.clone(),
            Playlist {
                id: playlist_ref.id,
                name: playlist_ref.name,
                tracks,
                origin_id: None,
            },
        );
    }

    progress.step = "Fetching Saved Tracks".to_string();
    sink.report(&progress);
    let base = progress.clone();
    let report_saved = |count: usize, total: Option<u64>| {
        sink.report(&Progress {
            step: "Fetching Saved Tracks".to_string(),
            tracks_done: base.tracks_done + count,
            tracks_total: base.tracks_done + total.map_or(count, |t| t as usize),
            ..base.clone()
        });
    };
    let mut saved = api
        .get_my_tracks(Some(&report_saved))
        .await
        .map_err(fail("fetching saved tracks".to_string(), &progress))?;
    utils::remove_duplicate_tracks(&mut saved);

    Ok(Collection {
        playlists,
        saved,
        ..Default::default()
    })
}
