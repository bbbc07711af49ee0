//! Wire types returned by the remote metadata API.

use crate::tags::TagCategory;
use serde::Deserialize;

/// One record of the tag listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TagDto {
    pub id: u64,
    pub name: String,
    /// Category code; the wire field is `type`.
    #[serde(rename = "type")]
    pub category: TagCategory,
    /// Post count for the tag. Carried for completeness, unused by the
    /// engine.
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub ambiguous: bool,
}

/// One record of the artist listing.
///
/// A record with `alias_of == None` defines an artist's primary name; a
/// record with `alias_of == Some(parent)` is an alternate name for that
/// parent artist (the wire field is `alias_id`).
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistDto {
    pub id: u64,
    pub name: String,
    #[serde(rename = "alias_id", default)]
    pub alias_of: Option<u64>,
    #[serde(default)]
    pub urls: Vec<String>,
}
