use std::path::PathBuf;

use chrono::Local;

use super::{access_token, spinner, summary_table};
use crate::{
    config::Config,
    error,
    management::BackupManager,
    spotify::SpotifyClient,
    success,
    sync::build_snapshot,
    utils,
};

pub async fn export(config: Config, output: Option<PathBuf>, token: Option<String>) {
    let access = access_token(&config, token).await;
    let api = SpotifyClient::new(access, &config);

    let pb = spinner("Loading your playlists and tracks...");
    let collection = match build_snapshot(&api, &pb).await {
        Ok(collection) => collection,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to load account data: {}", e);
        }
    };
    pb.finish_and_clear();

    let path = output
        .unwrap_or_else(|| PathBuf::from(utils::backup_filename(Local::now().date_naive())));
    let manager = BackupManager::new(path);
    if let Err(e) = manager.save(&collection).await {
        error!("Failed to write backup: {}", e);
    }

    println!("{}", summary_table(vec![("account", &collection)]));
    success!("Backup written to {}", manager.path().display());
}
