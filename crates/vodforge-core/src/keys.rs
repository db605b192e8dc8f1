//! Object-storage key layout.
//!
//! The layout is a published contract consumed directly by HLS players:
//!
//! ```text
//! videos/hls/{video_id}/master.m3u8
//! videos/hls/{video_id}/{quality}/playlist.m3u8
//! videos/hls/{video_id}/{quality}/*.ts
//! videos/thumbnails/{video_id}/thumbnail.jpg
//! videos/sources/{video_id}/{filename}
//! ```
//!
//! Key generation is centralized here so the transcoder, publisher, and
//! source resolver stay consistent.

use uuid::Uuid;

/// Prefix under which all HLS artifacts for a video are published.
pub fn hls_prefix(video_id: Uuid) -> String {
    format!("videos/hls/{}", video_id)
}

/// Key of the master playlist; its presence is the publish commit marker.
pub fn master_playlist_key(video_id: Uuid) -> String {
    format!("videos/hls/{}/master.m3u8", video_id)
}

/// Key of one rendition's variant playlist.
pub fn variant_playlist_key(video_id: Uuid, quality: &str) -> String {
    format!("videos/hls/{}/{}/playlist.m3u8", video_id, quality)
}

/// Prefix for one rendition's segments.
pub fn rendition_prefix(video_id: Uuid, quality: &str) -> String {
    format!("videos/hls/{}/{}", video_id, quality)
}

/// Key of the extracted thumbnail.
pub fn thumbnail_key(video_id: Uuid) -> String {
    format!("videos/thumbnails/{}/thumbnail.jpg", video_id)
}

/// Key under which the original upload is retained for reprocessing.
pub fn source_key(video_id: Uuid, filename: &str) -> String {
    format!("videos/sources/{}/{}", video_id, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_player_contract() {
        let id = Uuid::nil();
        assert_eq!(
            master_playlist_key(id),
            "videos/hls/00000000-0000-0000-0000-000000000000/master.m3u8"
        );
        assert_eq!(
            variant_playlist_key(id, "720p"),
            "videos/hls/00000000-0000-0000-0000-000000000000/720p/playlist.m3u8"
        );
        assert_eq!(
            thumbnail_key(id),
            "videos/thumbnails/00000000-0000-0000-0000-000000000000/thumbnail.jpg"
        );
    }
}
