use std::path::PathBuf;

use tabled::Table;

use super::{access_token, spinner, summary_table};
use crate::{
    config::Config,
    error, info,
    management::{BackupManager, OriginManager},
    spotify::SpotifyClient,
    success,
    sync::{build_snapshot, import_and_refresh, reconcile},
    types::PlanTableRow,
    warning,
};

pub async fn import(config: Config, file: PathBuf, dry_run: bool, token: Option<String>) {
    // a broken file is rejected before the account is touched
    let source = match BackupManager::new(file).load().await {
        Ok(collection) => collection,
        Err(e) => error!("{}", e),
    };

    let access = access_token(&config, token).await;
    let export_api = SpotifyClient::new(access, &config);
    let import_api = export_api.clone().with_slowdown(config.import_delay());

    let pb = spinner("Loading your playlists and tracks...");
    let mut target = match build_snapshot(&export_api, &pb).await {
        Ok(collection) => collection,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to load account data: {}", e);
        }
    };
    pb.finish_and_clear();

    let mut origins = match OriginManager::new().load().await {
        Ok(origins) => origins,
        Err(e) => {
            warning!("Ignoring origin map: {}", e);
            OriginManager::new()
        }
    };
    origins.apply(&mut target);

    let plan = reconcile(&target, &source);
    for skipped in &plan.skipped {
        warning!("{}", skipped);
    }

    println!(
        "{}",
        summary_table(vec![("account", &target), ("import", &source)])
    );

    if plan.is_empty() {
        success!("No new tracks found in import");
        return;
    }

    println!("{}", Table::new(plan.actions.iter().map(PlanTableRow::from)));
    if dry_run {
        info!(
            "Dry run: {} actions with {} tracks, nothing was changed.",
            plan.actions.len(),
            plan.track_count()
        );
        return;
    }

    let pb = spinner("Importing...");
    let result = import_and_refresh(&import_api, &export_api, &plan, &pb).await;
    pb.finish_and_clear();

    let report = match &result {
        Ok((_, report)) => report,
        Err(e) => e.report(),
    };
    for created in &report.created {
        if let Some(origin_id) = &created.origin_id {
            origins.record(created.id.clone(), origin_id.clone());
        }
    }
    if let Err(e) = origins.persist().await {
        warning!("Failed to save origin map: {}", e);
    }

    match result {
        Ok((collection, report)) => {
            println!("{}", summary_table(vec![("account", &collection)]));
            success!(
                "Import complete: {} actions, {} tracks, {} playlists created",
                report.applied,
                report.tracks_sent,
                report.created.len()
            );
        }
        Err(e) => error!("{}", e),
    }
}
