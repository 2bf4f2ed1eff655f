use std::collections::HashSet;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Datelike, NaiveDate, Utc};
use rand::RngCore;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::types::Track;

pub const CODE_VERIFIER_LENGTH: usize = 128;
pub const STATE_LENGTH: usize = 16;

const SPOTIFY_ID_LENGTH: usize = 22;
const TRACK_URI_PREFIX: &str = "spotify:track:";

/// Source of random bytes for verifiers and state tokens.
///
/// Production code uses [`SystemRandom`]; tests inject a fixed source so
/// generated state tokens are predictable.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Thread-local CSPRNG from `rand`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rng().fill_bytes(dest);
    }
}

/// Wall clock in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Generates a URL-safe random string of exactly `length` characters.
///
/// Draws `length` random bytes, encodes them as unpadded base64url and keeps
/// the first `length` characters. The alphabet (`A-Z a-z 0-9 - _`) is a
/// subset of the characters RFC 7636 allows in a code verifier.
pub fn generate_random_string(length: usize, random: &dyn RandomSource) -> String {
    let mut bytes = vec![0u8; length];
    random.fill_bytes(&mut bytes);
    let mut encoded = URL_SAFE_NO_PAD.encode(bytes);
    encoded.truncate(length);
    encoded
}

/// PKCE code verifier of 128 characters.
///
/// # Arguments
///
/// * `random` - Source of the random bytes.
///
/// # Example
///
/// ```
/// use myspotbackup::utils::{SystemRandom, generate_code_verifier};
///
/// let verifier = generate_code_verifier(&SystemRandom);
/// assert_eq!(verifier.len(), 128);
/// ```
pub fn generate_code_verifier(random: &dyn RandomSource) -> String {
    generate_random_string(CODE_VERIFIER_LENGTH, random)
}

/// Opaque OAuth `state` value, 16 random characters.
pub fn generate_state(random: &dyn RandomSource) -> String {
    generate_random_string(STATE_LENGTH, random)
}

/// base64url(SHA-256(verifier)) without padding, the `S256` challenge.
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Checks a bare Spotify id: exactly 22 ASCII alphanumerics.
pub fn is_valid_spotify_id(id: &str) -> bool {
    id.len() == SPOTIFY_ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Checks a track URI of the form `spotify:track:<22 alphanumerics>`.
pub fn is_valid_track_uri(uri: &str) -> bool {
    uri.strip_prefix(TRACK_URI_PREFIX)
        .is_some_and(is_valid_spotify_id)
}

/// Keeps the first occurrence of every track id.
pub fn remove_duplicate_tracks(tracks: &mut Vec<Track>) {
    let mut seen_ids = HashSet::new();
    tracks.retain(|track| seen_ids.insert(track.id.clone()));
}

/// Scheme, host and port of `uri`, e.g. `https://example.com:8443`.
///
/// Returns `None` for unparsable URIs and for opaque origins.
pub fn origin_of(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    let origin = url.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

/// Default export file name for `date`.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use myspotbackup::utils::backup_filename;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
/// assert_eq!(backup_filename(date), "spotify_backup_2024_3_7.json");
/// ```
pub fn backup_filename(date: NaiveDate) -> String {
    format!(
        "spotify_backup_{}_{}_{}.json",
        date.year(),
        date.month(),
        date.day()
    )
}
