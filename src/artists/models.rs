//! Artist identity model: multilingual aliases, artist records and the
//! persisted archive with its name index.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Languages an alias can be tagged with, in display-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Jp,
    Zh,
    Ko,
    Ru,
    El,
    Ar,
    En,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Jp,
        Language::Zh,
        Language::Ko,
        Language::Ru,
        Language::El,
        Language::Ar,
        Language::En,
    ];
}

/// One alternate name for an artist, with at most one spelling per
/// language. Partial records for the same alias id arrive on different
/// listing pages and are merged slot by slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ko: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ru: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub el: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

impl AliasRecord {
    pub fn new(id: u64, language: Language, name: String) -> Self {
        let mut record = Self {
            id,
            jp: None,
            zh: None,
            ko: None,
            ru: None,
            el: None,
            ar: None,
            en: None,
        };
        record.fill(language, name);
        record
    }

    pub fn get(&self, language: Language) -> Option<&str> {
        let slot = match language {
            Language::Jp => &self.jp,
            Language::Zh => &self.zh,
            Language::Ko => &self.ko,
            Language::Ru => &self.ru,
            Language::El => &self.el,
            Language::Ar => &self.ar,
            Language::En => &self.en,
        };
        slot.as_deref()
    }

    /// Set the slot for `language` unless it is already populated
    /// (first non-empty value wins).
    pub fn fill(&mut self, language: Language, name: String) {
        let slot = match language {
            Language::Jp => &mut self.jp,
            Language::Zh => &mut self.zh,
            Language::Ko => &mut self.ko,
            Language::Ru => &mut self.ru,
            Language::El => &mut self.el,
            Language::Ar => &mut self.ar,
            Language::En => &mut self.en,
        };
        if slot.is_none() && !name.is_empty() {
            *slot = Some(name);
        }
    }

    /// All populated spellings of this alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        Language::ALL.into_iter().filter_map(|lang| self.get(lang))
    }

    /// Highest-priority spelling (jp > zh > ko > ru > el > ar > en).
    pub fn preferred_name(&self) -> Option<&str> {
        self.names().next()
    }

    /// Merge two partial records for the same alias id. The receiver's
    /// slots take precedence; `other` fills the gaps.
    pub fn merged_with(&self, other: &AliasRecord) -> AliasRecord {
        let mut merged = self.clone();
        for language in Language::ALL {
            if let Some(name) = other.get(language) {
                merged.fill(language, name.to_string());
            }
        }
        merged
    }
}

/// One artist: primary name, aliases and associated URLs.
///
/// `name` is empty while only alias pages for the id have been seen;
/// such records are kept so learned translations survive until a later
/// page supplies the primary record, but contribute nothing to the
/// name index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<AliasRecord>,
    #[serde(default)]
    pub urls: BTreeSet<String>,
}

impl ArtistRecord {
    /// Every non-empty name of this artist: the primary name plus all
    /// alias spellings.
    pub fn all_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if !self.name.is_empty() {
            names.push(self.name.as_str());
        }
        for alias in &self.aliases {
            names.extend(alias.names());
        }
        names
    }

    /// Deep merge: `incoming` wins where it has data, the receiver
    /// where it does not. Alias lists merge by alias id; URLs union.
    pub fn merged_with(&self, incoming: &ArtistRecord) -> ArtistRecord {
        let name = if incoming.name.is_empty() {
            self.name.clone()
        } else {
            incoming.name.clone()
        };

        let mut by_id: BTreeMap<u64, AliasRecord> = self
            .aliases
            .iter()
            .map(|alias| (alias.id, alias.clone()))
            .collect();
        for alias in &incoming.aliases {
            by_id
                .entry(alias.id)
                .and_modify(|existing| *existing = alias.merged_with(existing))
                .or_insert_with(|| alias.clone());
        }

        let mut urls = self.urls.clone();
        urls.extend(incoming.urls.iter().cloned());

        ArtistRecord {
            name,
            aliases: by_id.into_values().collect(),
            urls,
        }
    }
}

/// The persisted artist dataset: records by id plus the derived
/// `name -> id` index covering every primary name and alias spelling.
/// `artists` is keyed by the decimal id so the JSON layout matches the
/// bundled archive snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistArchive {
    #[serde(default)]
    pub max_id: u64,
    #[serde(default)]
    pub artists: BTreeMap<String, ArtistRecord>,
    #[serde(default)]
    pub name_index: BTreeMap<String, u64>,
}

impl ArtistArchive {
    pub fn lookup_id(&self, name: &str) -> Option<u64> {
        self.name_index.get(name).copied()
    }

    pub fn lookup_record(&self, id: u64) -> Option<&ArtistRecord> {
        self.artists.get(&id.to_string())
    }

    /// All indexed names, for autocomplete.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.name_index.keys().map(String::as_str)
    }

    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    /// Recompute the name index from the artist records. Called after
    /// every merge so the index invariant holds even when a merge
    /// changed a primary name.
    pub fn rebuild_index(&mut self) {
        let mut index = BTreeMap::new();
        for (id_key, record) in &self.artists {
            let Ok(id) = id_key.parse::<u64>() else {
                continue;
            };
            for name in record.all_names() {
                index.insert(name.to_string(), id);
            }
        }
        self.name_index = index;
    }

    /// Merge `incoming` artist-by-artist (per [`ArtistRecord::merged_with`]),
    /// take the larger `max_id` and rebuild the index. Idempotent.
    pub fn merged_with(&self, incoming: &ArtistArchive) -> ArtistArchive {
        let mut artists = self.artists.clone();
        for (id_key, record) in &incoming.artists {
            artists
                .entry(id_key.clone())
                .and_modify(|existing| *existing = existing.merged_with(record))
                .or_insert_with(|| record.clone());
        }

        let mut merged = ArtistArchive {
            max_id: self.max_id.max(incoming.max_id),
            artists,
            name_index: BTreeMap::new(),
        };
        merged.rebuild_index();
        merged
    }
}
