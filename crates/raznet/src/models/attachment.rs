use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// What an uploaded file is, decided once when the message is received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Pdf,
    Other,
}

impl AttachmentKind {
    pub fn from_media_type(media_type: &str) -> Self {
        let media_type = media_type.trim().to_ascii_lowercase();
        if media_type == PDF_MEDIA_TYPE {
            AttachmentKind::Pdf
        } else if media_type.starts_with("image/") {
            AttachmentKind::Image
        } else {
            AttachmentKind::Other
        }
    }
}

/// A file uploaded alongside a message, already stored on local disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub media_type: String,
    pub storage_path: PathBuf,
}

impl Attachment {
    pub fn new<M: Into<String>, P: Into<PathBuf>>(media_type: M, storage_path: P) -> Self {
        let media_type = media_type.into();
        Self {
            kind: AttachmentKind::from_media_type(&media_type),
            media_type,
            storage_path: storage_path.into(),
        }
    }

    /// Build an attachment for a file on disk, guessing the media type from its extension
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let media_type = guess_media_type(&path);
        Self::new(media_type, path)
    }

    pub fn is_pdf(&self) -> bool {
        self.kind == AttachmentKind::Pdf
    }

    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }
}

fn guess_media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => PDF_MEDIA_TYPE,
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// A message received from the user, with any uploaded files in upload order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl InboundMessage {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// The first uploaded PDF, if any
    pub fn first_pdf(&self) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.is_pdf())
    }

    pub fn images(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.is_image())
    }
}
