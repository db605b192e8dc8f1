use serde::Serialize;

/// A fixed resolution/bitrate target for one adaptive rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityPreset {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// Video bitrate in bits per second.
    pub bitrate: u64,
}

impl QualityPreset {
    pub const Q360P: QualityPreset = QualityPreset {
        label: "360p",
        width: 640,
        height: 360,
        bitrate: 800_000,
    };

    pub const Q480P: QualityPreset = QualityPreset {
        label: "480p",
        width: 854,
        height: 480,
        bitrate: 1_400_000,
    };

    pub const Q720P: QualityPreset = QualityPreset {
        label: "720p",
        width: 1280,
        height: 720,
        bitrate: 2_800_000,
    };

    pub const Q1080P: QualityPreset = QualityPreset {
        label: "1080p",
        width: 1920,
        height: 1080,
        bitrate: 5_000_000,
    };

    /// Look up a preset by its label.
    pub fn named(label: &str) -> Option<QualityPreset> {
        match label {
            "360p" => Some(Self::Q360P),
            "480p" => Some(Self::Q480P),
            "720p" => Some(Self::Q720P),
            "1080p" => Some(Self::Q1080P),
            _ => None,
        }
    }

    /// Default rendition ladder.
    pub fn default_ladder() -> Vec<QualityPreset> {
        vec![Self::Q360P, Self::Q480P, Self::Q720P]
    }

    /// Resolve quality labels to presets; unknown labels are an error.
    pub fn resolve(labels: &[String]) -> Result<Vec<QualityPreset>, String> {
        labels
            .iter()
            .map(|l| Self::named(l).ok_or_else(|| format!("unknown quality label: {}", l)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_resolves_known_labels() {
        assert_eq!(QualityPreset::named("720p"), Some(QualityPreset::Q720P));
        assert_eq!(QualityPreset::named("4320p"), None);
    }

    #[test]
    fn resolve_rejects_unknown_labels() {
        let labels = vec!["360p".to_string(), "999p".to_string()];
        assert!(QualityPreset::resolve(&labels).is_err());

        let labels = vec!["360p".to_string(), "480p".to_string(), "720p".to_string()];
        let presets = QualityPreset::resolve(&labels).unwrap();
        assert_eq!(presets.len(), 3);
        assert_eq!(presets[2].width, 1280);
    }
}
