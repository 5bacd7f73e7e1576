use serde::{Deserialize, Serialize};
use time::Date;

/// A file or folder record stored in a directory listing.
///
/// `path` is always the listing key of the parent joined with `name`; the
/// engine recomputes it on every rename or move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(with = "crate::date_format")]
    pub modified: Date,
    pub icon: String,
    #[serde(flatten)]
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    File {
        size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    Folder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Folder,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::File => "file",
            ItemType::Folder => "folder",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(ItemType::File),
            "folder" => Some(ItemType::Folder),
            _ => None,
        }
    }
}

impl Item {
    pub fn folder(id: impl Into<String>, name: &str, path: String, modified: Date) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            path,
            modified,
            icon: icon_for(name, ItemType::Folder).to_string(),
            kind: ItemKind::Folder,
        }
    }

    pub fn file(
        id: impl Into<String>,
        name: &str,
        path: String,
        modified: Date,
        size: u64,
        content: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            path,
            modified,
            icon: icon_for(name, ItemType::File).to_string(),
            kind: ItemKind::File { size, content },
        }
    }

    pub fn item_type(&self) -> ItemType {
        match self.kind {
            ItemKind::File { .. } => ItemType::File,
            ItemKind::Folder => ItemType::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder)
    }

    pub fn size(&self) -> Option<u64> {
        match self.kind {
            ItemKind::File { size, .. } => Some(size),
            ItemKind::Folder => None,
        }
    }
}

/// Presentation hint derived from the item type and file extension.
pub fn icon_for(name: &str, item_type: ItemType) -> &'static str {
    if item_type == ItemType::Folder {
        return "folder";
    }
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return "file";
    };
    if stem.is_empty() {
        return "file";
    }
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "md" | "log" | "csv" | "json" => "file-text",
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "bmp" => "image",
        "mp3" | "wav" | "ogg" | "flac" => "audio",
        "mp4" | "mov" | "mkv" | "webm" => "video",
        "zip" | "tar" | "gz" | "7z" | "rar" => "archive",
        _ => "file",
    }
}
