use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A category of exportable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Message,
    Image,
    Video,
    Audio,
    File,
}

/// Canonical ordering used for deterministic iteration and name tags.
pub const ALL_KINDS: [ContentKind; 5] = [
    ContentKind::Message,
    ContentKind::Image,
    ContentKind::Video,
    ContentKind::Audio,
    ContentKind::File,
];

impl ContentKind {
    /// Parses a filter token. Returns None for unrecognized tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "message" | "messages" | "text" => Some(ContentKind::Message),
            "image" | "images" => Some(ContentKind::Image),
            "video" | "videos" => Some(ContentKind::Video),
            "audio" | "voice" => Some(ContentKind::Audio),
            "file" | "files" => Some(ContentKind::File),
            _ => None,
        }
    }

    /// Short tag used in export file names.
    /// Image and video share the "media" tag.
    pub fn tag(self) -> &'static str {
        match self {
            ContentKind::Message => "messages",
            ContentKind::Image | ContentKind::Video => "media",
            ContentKind::Audio => "audio",
            ContentKind::File => "files",
        }
    }
}

/// The set of content kinds included in an export attempt.
///
/// Members are unique and order-irrelevant; iteration always happens in
/// canonical [`ALL_KINDS`] order so downstream output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSet {
    kinds: HashSet<ContentKind>,
}

impl FilterSet {
    /// The default filter: every content kind selected.
    pub fn all() -> Self {
        Self {
            kinds: ALL_KINDS.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_kinds<I: IntoIterator<Item = ContentKind>>(kinds: I) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// Builds a filter from raw tokens, ignoring anything unrecognized.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kinds = HashSet::new();
        for token in tokens {
            match ContentKind::from_token(token.as_ref()) {
                Some(kind) => {
                    kinds.insert(kind);
                }
                None => {
                    tracing::debug!(token = token.as_ref(), "ignoring unknown content type token");
                }
            }
        }
        Self { kinds }
    }

    pub fn contains(&self, kind: ContentKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// True when every content kind is selected.
    pub fn is_all(&self) -> bool {
        ALL_KINDS.iter().all(|kind| self.kinds.contains(kind))
    }

    /// Selected kinds in canonical order.
    pub fn kinds(&self) -> impl Iterator<Item = ContentKind> + '_ {
        ALL_KINDS
            .into_iter()
            .filter(move |kind| self.kinds.contains(kind))
    }

    /// Name tags for the selected kinds: "all" when everything is selected,
    /// otherwise the deduplicated short tags in canonical order.
    pub fn tags(&self) -> Vec<&'static str> {
        if self.is_all() {
            return vec!["all"];
        }
        let mut tags = Vec::new();
        for kind in self.kinds() {
            let tag = kind.tag();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}
