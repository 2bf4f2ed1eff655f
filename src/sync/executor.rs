use std::fmt;

use super::{Plan, Progress, ProgressSink, SnapshotError, build_snapshot};
use crate::{
    spotify::{ApiError, SpotifyClient},
    types::{Collection, MutationAction},
};

/// A playlist created during an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPlaylist {
    pub id: String,
    pub name: String,
    pub origin_id: Option<String>,
}

/// What an import run managed to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub applied: usize,
    pub tracks_sent: usize,
    pub created: Vec<CreatedPlaylist>,
}

#[derive(Debug)]
pub enum ImportError {
    /// An action failed; the ones before it stay applied.
    Action {
        index: usize,
        total: usize,
        description: String,
        report: ImportReport,
        source: ApiError,
    },
    /// Every action was applied but the account could not be re-read.
    Refresh {
        report: ImportReport,
        source: SnapshotError,
    },
}

impl ImportError {
    pub fn report(&self) -> &ImportReport {
        match self {
            ImportError::Action { report, .. } => report,
            ImportError::Refresh { report, .. } => report,
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Action {
                index,
                total,
                description,
                source,
                ..
            } => write!(
                f,
                "Import failed at step {}/{} ({}): {}",
                index + 1,
                total,
                description,
                source
            ),
            ImportError::Refresh { source, .. } => {
                write!(f, "Import finished but reloading the account failed: {source}")
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Action { source, .. } => Some(source),
            ImportError::Refresh { source, .. } => Some(source),
        }
    }
}

/// Applies the plan one action at a time, saved tracks first.
pub async fn execute_plan(
    api: &SpotifyClient,
    plan: &Plan,
    sink: &dyn ProgressSink,
) -> Result<ImportReport, ImportError> {
    let ordered: Vec<&MutationAction> = plan
        .actions
        .iter()
        .filter(|a| matches!(a, MutationAction::SaveTracks { .. }))
        .chain(
            plan.actions
                .iter()
                .filter(|a| !matches!(a, MutationAction::SaveTracks { .. })),
        )
        .collect();

    let total = ordered.len();
    let mut report = ImportReport::default();
    let mut user_id: Option<String> = None;
    let mut progress = Progress {
        playlists_total: total,
        tracks_total: plan.track_count(),
        ..Progress::new("Importing")
    };

    for (index, action) in ordered.into_iter().enumerate() {
        progress.step = match action {
            MutationAction::SaveTracks { .. } => "Importing Saved Tracks".to_string(),
            MutationAction::CreatePlaylistAndAdd { name, .. }
            | MutationAction::AddToPlaylist { name, .. } => format!("Processing Playlist: {name}"),
        };
        progress.playlists_done = index + 1;
        sink.report(&progress);

        if let Err(source) = apply(api, action, &mut user_id, &mut report).await {
            return Err(ImportError::Action {
                index,
                total,
                description: action.describe(),
                report,
                source,
            });
        }

        report.applied += 1;
        report.tracks_sent += action.track_count();
        progress.tracks_done = report.tracks_sent;
        sink.report(&progress);
    }

    progress.step = "Import Finished!".to_string();
    sink.report(&progress);
    Ok(report)
}

async fn apply(
    api: &SpotifyClient,
    action: &MutationAction,
    user_id: &mut Option<String>,
    report: &mut ImportReport,
) -> Result<(), ApiError> {
    match action {
        MutationAction::SaveTracks { ids } => api.save_tracks(ids).await,
        MutationAction::AddToPlaylist { id, uris, .. } => {
            api.add_tracks_to_playlist(id, uris).await
        }
        MutationAction::CreatePlaylistAndAdd {
            name,
            uris,
            origin_id,
        } => {
            let owner = match user_id.clone() {
                Some(id) => id,
                None => {
                    let id = api.get_profile().await?.id;
                    *user_id = Some(id.clone());
                    id
                }
            };

            let created = api.create_playlist(&owner, name).await?;
            report.created.push(CreatedPlaylist {
                id: created.id.clone(),
                name: name.clone(),
                origin_id: origin_id.clone(),
            });
            api.add_tracks_to_playlist(&created.id, uris).await
        }
    }
}

/// Executes the plan, then re-reads the account.
///
/// `import_api` carries the import slowdown, `export_api` the export one.
/// Playlists created by the run get their `origin_id` set in the returned
/// snapshot.
pub async fn import_and_refresh(
    import_api: &SpotifyClient,
    export_api: &SpotifyClient,
    plan: &Plan,
    sink: &dyn ProgressSink,
) -> Result<(Collection, ImportReport), ImportError> {
    let report = execute_plan(import_api, plan, sink).await?;

    let mut collection = match build_snapshot(export_api, sink).await {
        Ok(collection) => collection,
        Err(source) => return Err(ImportError::Refresh { report, source }),
    };

    for created in &report.created {
        if let (Some(origin), Some(playlist)) = (
            created.origin_id.as_ref(),
            collection.playlists.get_mut(&created.id),
        ) {
            playlist.origin_id = Some(origin.clone());
        }
    }

    Ok((collection, report))
}
