//! Tag classification model.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Semantic category of a tag, used by the UI for chip coloring.
///
/// Serialized as the remote API's numeric code so the on-disk
/// dictionary, the bundled seed snapshot and the listing wire format all
/// share one representation. Codes not assigned upstream fold to
/// `Unknown`, which is also the render fallback while a tag is
/// unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    General,
    Artist,
    Copyright,
    Character,
    Style,
    Unknown,
}

impl TagCategory {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => TagCategory::General,
            1 => TagCategory::Artist,
            3 => TagCategory::Copyright,
            4 => TagCategory::Character,
            5 => TagCategory::Style,
            _ => TagCategory::Unknown,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            TagCategory::General => 0,
            TagCategory::Artist => 1,
            TagCategory::Copyright => 3,
            TagCategory::Character => 4,
            TagCategory::Style => 5,
            // 2 is unassigned upstream
            TagCategory::Unknown => 2,
        }
    }
}

impl Serialize for TagCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for TagCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Ok(TagCategory::from_code(code))
    }
}
