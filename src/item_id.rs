//! Canonical good identifiers.
//!
//! Raw identifiers are trimmed, uppercased and mapped through a fixed alias
//! table so that legacy spellings land on one key. Every map in the crate is
//! keyed by [`ItemId`], which can only be built through [`ItemId::new`].

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Legacy or alternate spellings and the canonical id they map to.
const ALIASES: &[(&str, &str)] = &[
    ("LOG", "OAK_LOG"),
    ("LOG-1", "SPRUCE_LOG"),
    ("LOG-2", "BIRCH_LOG"),
    ("LOG-3", "JUNGLE_LOG"),
    ("LOG_2", "ACACIA_LOG"),
    ("LOG_2-0", "ACACIA_LOG"),
    ("LOG_2-1", "DARK_OAK_LOG"),
    ("WOOD", "OAK_PLANKS"),
    ("WOOD-1", "SPRUCE_PLANKS"),
    ("WOOD-2", "BIRCH_PLANKS"),
    ("WOOD-3", "JUNGLE_PLANKS"),
    ("WOOD-4", "ACACIA_PLANKS"),
    ("WOOD-5", "DARK_OAK_PLANKS"),
    ("SAND-1", "RED_SAND"),
    ("INK_SACK", "INK_SAC"),
    ("INK_SACK-1", "RED_DYE"),
    ("INK_SACK-2", "GREEN_DYE"),
    ("INK_SACK-3", "COCOA"),
    ("INK_SACK-4", "LAPIS_LAZULI"),
    ("INK_SACK-15", "BONE_MEAL"),
    ("WOOL", "WHITE_WOOL"),
    ("WOOL-1", "ORANGE_WOOL"),
    ("WOOL-2", "MAGENTA_WOOL"),
    ("WOOL-3", "LIGHT_BLUE_WOOL"),
    ("WOOL-4", "YELLOW_WOOL"),
    ("WOOL-5", "LIME_WOOL"),
    ("WOOL-6", "PINK_WOOL"),
    ("WOOL-7", "GRAY_WOOL"),
    ("WOOL-8", "LIGHT_GRAY_WOOL"),
    ("WOOL-9", "CYAN_WOOL"),
    ("WOOL-10", "PURPLE_WOOL"),
    ("WOOL-11", "BLUE_WOOL"),
    ("WOOL-12", "BROWN_WOOL"),
    ("WOOL-13", "GREEN_WOOL"),
    ("WOOL-14", "RED_WOOL"),
    ("WOOL-15", "BLACK_WOOL"),
    ("RAW_FISH-1", "RAW_SALMON"),
    ("RAW_FISH-2", "CLOWNFISH"),
    ("RAW_FISH-3", "PUFFERFISH"),
    ("HUGE_MUSHROOM_1", "BROWN_MUSHROOM_BLOCK"),
    ("HUGE_MUSHROOM_2", "RED_MUSHROOM_BLOCK"),
    ("QUARTZ_BLOCK-1", "CHISELED_QUARTZ_BLOCK"),
    ("QUARTZ_BLOCK-2", "PILLAR_QUARTZ_BLOCK"),
    ("POTION", "WATER_BOTTLE"),
    ("ENCHANTED_CARROT_STICK", "ENCHANTED_CARROT_ON_A_STICK"),
    ("SULPHUR", "GUNPOWDER"),
    ("SLIME_BALL", "SLIMEBALL"),
];

/// A normalized good identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        match ALIASES.iter().find(|(alias, _)| *alias == upper) {
            Some((_, canonical)) => Self((*canonical).to_string()),
            None => Self(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}
