//! Master playlist generation.

use uuid::Uuid;

use vodforge_core::keys;
use vodforge_core::models::QualityPreset;

/// Render the HLS master playlist for a set of renditions.
///
/// Variants are listed in ascending bitrate order with absolute URLs under
/// `base_url`, one `#EXT-X-STREAM-INF` entry per rendition.
pub fn master_playlist(video_id: Uuid, presets: &[QualityPreset], base_url: &str) -> String {
    let mut ordered: Vec<&QualityPreset> = presets.iter().collect();
    ordered.sort_by_key(|p| p.bitrate);

    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for preset in ordered {
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n",
            preset.bitrate, preset.width, preset.height
        ));
        out.push_str(&format!(
            "{}/{}\n",
            base_url,
            keys::variant_playlist_key(video_id, preset.label)
        ));
    }
    out
}
