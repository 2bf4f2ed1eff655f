use reqwest::Method;

use super::{ApiError, PAGE_LIMIT, PLAYLIST_CHUNK_SIZE, PageProgress, SpotifyClient};
use crate::types::{
    AddTrackToPlaylistRequest, CreatePlaylistRequest, CreatePlaylistResponse, PlaylistRef,
    SimplifiedPlaylist, Track, TrackItem,
};

impl SpotifyClient {
    /// Lists the playlists of `user_id` without their tracks.
    pub async fn get_my_playlists(
        &self,
        user_id: &str,
        progress: Option<PageProgress<'_>>,
    ) -> Result<Vec<PlaylistRef>, ApiError> {
        let url = self.url(&format!("/users/{user_id}/playlists?limit={PAGE_LIMIT}"));
        let playlists: Vec<SimplifiedPlaylist> = self.get_all_pages(&url, progress).await?;

        Ok(playlists
            .into_iter()
            .map(|p| PlaylistRef {
                id: p.id,
                name: p.name,
                href: p.tracks.href,
            })
            .collect())
    }

    /// Resolves the full track list behind a playlist's tracks `href`.
    ///
    /// Entries without a track id (local files, removed tracks) are dropped.
    pub async fn get_playlist_tracks(
        &self,
        href: &str,
        progress: Option<PageProgress<'_>>,
    ) -> Result<Vec<Track>, ApiError> {
        let items: Vec<TrackItem> = self.get_all_pages(href, progress).await?;
        Ok(tracks_from_items(items))
    }

    /// Creates a private playlist owned by `user_id`.
    pub async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<CreatePlaylistResponse, ApiError> {
        let url = self.url(&format!("/users/{user_id}/playlists"));
        let body = serde_json::to_value(CreatePlaylistRequest {
            name: name.to_string(),
            public: false,
        })?;

        match self.request(Method::POST, &url, Some(body)).await? {
            Some(created) => Ok(serde_json::from_value(created)?),
            None => Err(ApiError::EmptyBody { url }),
        }
    }

    /// Appends `uris` to a playlist, at most 100 per request.
    pub async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("/playlists/{playlist_id}/tracks"));
        for chunk in uris.chunks(PLAYLIST_CHUNK_SIZE) {
            let body = serde_json::to_value(AddTrackToPlaylistRequest {
                uris: chunk.to_vec(),
            })?;
            self.request(Method::POST, &url, Some(body)).await?;
            self.pause().await;
        }
        Ok(())
    }
}

pub(super) fn tracks_from_items(items: Vec<TrackItem>) -> Vec<Track> {
    items
        .into_iter()
        .filter_map(|item| item.track)
        .filter_map(|track| track.id.map(|id| Track { id, uri: track.uri }))
        .collect()
}
