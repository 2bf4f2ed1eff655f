use axum::response::Html;

pub async fn index() -> Html<&'static str> {
    Html(
        "<!doctype html><html><body><h2>MySpotBackup</h2>\
         <p><a href=\"/login\">Login with Spotify</a></p>\
         <p>Started from <code>myspotbackup auth</code>? The token has been handed to your terminal.</p>\
         </body></html>",
    )
}
