use serde::{Deserialize, Serialize};

/// Unique identifier for an uploaded media asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaAssetId(pub String);

impl MediaAssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for MediaAssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a media asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Logo,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Logo => write!(f, "logo"),
        }
    }
}

/// A previously-uploaded media asset, owned by the external asset registry.
/// This crate only ever reads these records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: MediaAssetId,
    /// Canonical URL of the uploaded file.
    pub url: String,
    pub kind: MediaKind,
    /// Names users have called this asset ("the logo", "hero shot").
    pub reference_names: Vec<String>,
    /// Free-form descriptive tags.
    pub tags: Vec<String>,
}

impl MediaAsset {
    pub fn new(id: impl Into<String>, url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: MediaAssetId::new(id),
            url: url.into(),
            kind,
            reference_names: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_reference_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reference_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Read-only view of a project's uploaded assets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetCatalog {
    assets: Vec<MediaAsset>,
}

impl AssetCatalog {
    pub fn new(assets: Vec<MediaAsset>) -> Self {
        Self { assets }
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn all(&self) -> &[MediaAsset] {
        &self.assets
    }

    /// True when `url` belongs to a catalog asset.
    pub fn contains_url(&self, url: &str) -> bool {
        self.assets.iter().any(|a| a.url == url)
    }

    pub fn by_kind(&self, kind: MediaKind) -> impl Iterator<Item = &MediaAsset> {
        self.assets.iter().filter(move |a| a.kind == kind)
    }
}
