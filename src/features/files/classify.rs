use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Semantic file categories derived from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Document,
    Image,
    Video,
    Audio,
    Other,
}

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "xls", "xlsx", "csv", "rtf", "ods", "ppt", "odp", "md", "html",
    "htm", "epub", "pages", "fig", "psd", "ai", "indd", "xd", "sketch", "afdesign", "afphoto",
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Document => "document",
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Audio => "audio",
            FileKind::Other => "other",
        }
    }

    /// Parse a stored kind name; unknown values map to `Other`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "document" => FileKind::Document,
            "image" => FileKind::Image,
            "video" => FileKind::Video,
            "audio" => FileKind::Audio,
            _ => FileKind::Other,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for FileKind {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(FileKind::from_name(&value))
    }
}

/// Classify a filename by the substring after its last dot.
///
/// Total function: a file without an extension (or with an unrecognized one)
/// classifies as `Other`, carrying the literal lowercased extension string.
pub fn classify(filename: &str) -> (FileKind, String) {
    let extension = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    };

    let kind = if DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
        FileKind::Document
    } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        FileKind::Image
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        FileKind::Video
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        FileKind::Audio
    } else {
        FileKind::Other
    };

    (kind, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_category() {
        assert_eq!(classify("report.pdf"), (FileKind::Document, "pdf".into()));
        assert_eq!(classify("photo.png"), (FileKind::Image, "png".into()));
        assert_eq!(classify("clip.mp4"), (FileKind::Video, "mp4".into()));
        assert_eq!(classify("song.flac"), (FileKind::Audio, "flac".into()));
        assert_eq!(classify("data.bin"), (FileKind::Other, "bin".into()));
    }

    #[test]
    fn uppercase_extensions_match() {
        assert_eq!(classify("SCAN.PDF"), (FileKind::Document, "pdf".into()));
        assert_eq!(classify("IMG.JPEG"), (FileKind::Image, "jpeg".into()));
    }

    #[test]
    fn last_dot_wins_for_multi_dot_names() {
        assert_eq!(
            classify("archive.tar.gz"),
            (FileKind::Other, "gz".into())
        );
        assert_eq!(
            classify("notes.final.docx"),
            (FileKind::Document, "docx".into())
        );
    }

    #[test]
    fn degenerate_inputs_classify_as_other() {
        assert_eq!(classify(""), (FileKind::Other, String::new()));
        assert_eq!(classify("README"), (FileKind::Other, String::new()));
        assert_eq!(classify("trailing."), (FileKind::Other, String::new()));
        assert_eq!(classify(".env"), (FileKind::Other, "env".into()));
    }

    #[test]
    fn unknown_kind_names_map_to_other() {
        assert_eq!(FileKind::from_name("document"), FileKind::Document);
        assert_eq!(FileKind::from_name("archive"), FileKind::Other);
    }
}
