//! Type de conteneur audio déduit du MIME ou de l'extension

use std::fmt;

/// Conteneur/codec annoncé par la source, transmis tel quel au décodeur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioFileType {
    Mp3,
    Wave,
    Aiff,
    Aifc,
    M4a,
    Mpeg4,
    AacAdts,
    ThreeGp,
    ThreeGp2,
    Caf,
    Flac,
    Ogg,
    Opus,
    #[default]
    Unknown,
}

/// Table MIME → type (comparaison insensible à la casse, paramètres ignorés)
const MIME_TYPES: &[(&str, AudioFileType)] = &[
    ("audio/mp3", AudioFileType::Mp3),
    ("audio/mpg", AudioFileType::Mp3),
    ("audio/mpeg", AudioFileType::Mp3),
    ("audio/mpeg3", AudioFileType::Mp3),
    ("audio/x-mp3", AudioFileType::Mp3),
    ("audio/x-mpeg", AudioFileType::Mp3),
    ("audio/x-mpeg3", AudioFileType::Mp3),
    ("audio/x-mpegaudio", AudioFileType::Mp3),
    ("audio/x-mpg", AudioFileType::Mp3),
    ("audio/wav", AudioFileType::Wave),
    ("audio/x-wav", AudioFileType::Wave),
    ("audio/vnd.wave", AudioFileType::Wave),
    ("audio/aiff", AudioFileType::Aiff),
    ("audio/x-aiff", AudioFileType::Aiff),
    ("audio/aifc", AudioFileType::Aifc),
    ("audio/x-aifc", AudioFileType::Aifc),
    ("audio/x-m4a", AudioFileType::M4a),
    ("audio/mp4", AudioFileType::Mpeg4),
    ("audio/aac", AudioFileType::AacAdts),
    ("audio/aacp", AudioFileType::AacAdts),
    ("audio/x-aac", AudioFileType::AacAdts),
    ("audio/3gpp", AudioFileType::ThreeGp),
    ("audio/3gpp2", AudioFileType::ThreeGp2),
    ("audio/x-caf", AudioFileType::Caf),
    ("audio/flac", AudioFileType::Flac),
    ("audio/x-flac", AudioFileType::Flac),
    ("audio/ogg", AudioFileType::Ogg),
    ("application/ogg", AudioFileType::Ogg),
    ("audio/vorbis", AudioFileType::Ogg),
    ("audio/opus", AudioFileType::Opus),
];

impl AudioFileType {
    /// Déduit le type depuis un `Content-Type` (ex: `audio/mpeg; charset=...`)
    pub fn from_mime(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        MIME_TYPES
            .iter()
            .find(|(candidate, _)| *candidate == mime)
            .map(|(_, file_type)| *file_type)
            .unwrap_or(AudioFileType::Unknown)
    }

    /// Déduit le type depuis une extension de fichier (sans le point)
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" => AudioFileType::Mp3,
            "wav" | "wave" => AudioFileType::Wave,
            "aif" | "aiff" => AudioFileType::Aiff,
            "aifc" => AudioFileType::Aifc,
            "m4a" => AudioFileType::M4a,
            "mp4" => AudioFileType::Mpeg4,
            "aac" => AudioFileType::AacAdts,
            "3gp" => AudioFileType::ThreeGp,
            "3g2" => AudioFileType::ThreeGp2,
            "caf" => AudioFileType::Caf,
            "flac" => AudioFileType::Flac,
            "ogg" | "oga" => AudioFileType::Ogg,
            "opus" => AudioFileType::Opus,
            _ => AudioFileType::Unknown,
        }
    }

    pub fn is_ogg(&self) -> bool {
        matches!(self, AudioFileType::Ogg)
    }
}

impl fmt::Display for AudioFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioFileType::Mp3 => "mp3",
            AudioFileType::Wave => "wave",
            AudioFileType::Aiff => "aiff",
            AudioFileType::Aifc => "aifc",
            AudioFileType::M4a => "m4a",
            AudioFileType::Mpeg4 => "mp4",
            AudioFileType::AacAdts => "aac",
            AudioFileType::ThreeGp => "3gp",
            AudioFileType::ThreeGp2 => "3g2",
            AudioFileType::Caf => "caf",
            AudioFileType::Flac => "flac",
            AudioFileType::Ogg => "ogg",
            AudioFileType::Opus => "opus",
            AudioFileType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime_ignores_case_and_parameters() {
        assert_eq!(AudioFileType::from_mime("audio/mpeg"), AudioFileType::Mp3);
        assert_eq!(
            AudioFileType::from_mime("Audio/AACP; charset=binary"),
            AudioFileType::AacAdts
        );
        assert_eq!(AudioFileType::from_mime("application/ogg"), AudioFileType::Ogg);
        assert_eq!(AudioFileType::from_mime("text/html"), AudioFileType::Unknown);
        assert_eq!(AudioFileType::from_mime(""), AudioFileType::Unknown);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(AudioFileType::from_extension("OGG"), AudioFileType::Ogg);
        assert_eq!(AudioFileType::from_extension("m4a"), AudioFileType::M4a);
        assert_eq!(AudioFileType::from_extension("txt"), AudioFileType::Unknown);
    }
}
