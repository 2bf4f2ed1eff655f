use reqwest::Method;

use super::{
    ApiError, PAGE_LIMIT, PageProgress, SAVED_TRACKS_CHUNK_SIZE, SpotifyClient,
    playlists::tracks_from_items,
};
use crate::types::{SaveTracksRequest, Track, TrackItem};

impl SpotifyClient {
    /// Lists the tracks in the user's library ("Liked Songs").
    pub async fn get_my_tracks(
        &self,
        progress: Option<PageProgress<'_>>,
    ) -> Result<Vec<Track>, ApiError> {
        let url = self.url(&format!("/me/tracks?limit={PAGE_LIMIT}"));
        let items: Vec<TrackItem> = self.get_all_pages(&url, progress).await?;
        Ok(tracks_from_items(items))
    }

    /// Saves tracks to the user's library, at most 50 ids per request.
    pub async fn save_tracks(&self, ids: &[String]) -> Result<(), ApiError> {
        let url = self.url("/me/tracks");
        for chunk in ids.chunks(SAVED_TRACKS_CHUNK_SIZE) {
            let body = serde_json::to_value(SaveTracksRequest {
                ids: chunk.to_vec(),
            })?;
            self.request(Method::PUT, &url, Some(body)).await?;
            self.pause().await;
        }
        Ok(())
    }
}
