//! Character trait model.
//!
//! A character is identified by `(group_name, char_name)` and carries a fixed
//! set of numeric and text traits. [`CharacterTrait`] is the closed list of
//! trait names a `CharacterUpdateMessage` may target; it doubles as the column
//! whitelist for the persistence layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{MessageError, Result};

/// Full trait set of one character. Missing fields default to zero / empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterTraits {
    /// Wound threshold.
    pub wound_limit: i64,
    /// Wounds currently suffered.
    pub wound_current: i64,
    /// Strain threshold.
    pub strain_limit: i64,
    /// Strain currently suffered.
    pub strain_current: i64,
    /// Melee defense.
    pub defense_melee: i64,
    /// Ranged defense.
    pub defense_ranged: i64,
    /// Soak value.
    pub soak: i64,
    /// Comma-separated status flags.
    pub status_flags: String,
    /// Portrait URL.
    pub image_url: String,
    /// Initiative triumphs.
    pub initiative_triumph: i64,
    /// Initiative successes.
    pub initiative_success: i64,
    /// Initiative advantages.
    pub initiative_advantage: i64,
}

impl CharacterTraits {
    /// Status flags split on commas, blanks removed.
    pub fn status_list(&self) -> Vec<&str> {
        self.status_flags
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Current value of a single trait.
    pub fn get(&self, name: CharacterTrait) -> TraitValue {
        match name {
            CharacterTrait::WoundLimit => TraitValue::Integer(self.wound_limit),
            CharacterTrait::WoundCurrent => TraitValue::Integer(self.wound_current),
            CharacterTrait::StrainLimit => TraitValue::Integer(self.strain_limit),
            CharacterTrait::StrainCurrent => TraitValue::Integer(self.strain_current),
            CharacterTrait::DefenseMelee => TraitValue::Integer(self.defense_melee),
            CharacterTrait::DefenseRanged => TraitValue::Integer(self.defense_ranged),
            CharacterTrait::Soak => TraitValue::Integer(self.soak),
            CharacterTrait::StatusFlags => TraitValue::Text(self.status_flags.clone()),
            CharacterTrait::ImageUrl => TraitValue::Text(self.image_url.clone()),
            CharacterTrait::InitiativeTriumph => TraitValue::Integer(self.initiative_triumph),
            CharacterTrait::InitiativeSuccess => TraitValue::Integer(self.initiative_success),
            CharacterTrait::InitiativeAdvantage => TraitValue::Integer(self.initiative_advantage),
        }
    }

    /// Overwrite a single trait, coercing `value` to the trait's kind.
    pub fn set(&mut self, name: CharacterTrait, value: &TraitValue) -> Result<()> {
        match name.coerce(value)? {
            TraitValue::Integer(n) => {
                if let Some(slot) = self.integer_slot(name) {
                    *slot = n;
                }
            }
            TraitValue::Text(s) => {
                if let Some(slot) = self.text_slot(name) {
                    *slot = s;
                }
            }
        }
        Ok(())
    }

    fn integer_slot(&mut self, name: CharacterTrait) -> Option<&mut i64> {
        match name {
            CharacterTrait::WoundLimit => Some(&mut self.wound_limit),
            CharacterTrait::WoundCurrent => Some(&mut self.wound_current),
            CharacterTrait::StrainLimit => Some(&mut self.strain_limit),
            CharacterTrait::StrainCurrent => Some(&mut self.strain_current),
            CharacterTrait::DefenseMelee => Some(&mut self.defense_melee),
            CharacterTrait::DefenseRanged => Some(&mut self.defense_ranged),
            CharacterTrait::Soak => Some(&mut self.soak),
            CharacterTrait::InitiativeTriumph => Some(&mut self.initiative_triumph),
            CharacterTrait::InitiativeSuccess => Some(&mut self.initiative_success),
            CharacterTrait::InitiativeAdvantage => Some(&mut self.initiative_advantage),
            CharacterTrait::StatusFlags | CharacterTrait::ImageUrl => None,
        }
    }

    fn text_slot(&mut self, name: CharacterTrait) -> Option<&mut String> {
        match name {
            CharacterTrait::StatusFlags => Some(&mut self.status_flags),
            CharacterTrait::ImageUrl => Some(&mut self.image_url),
            _ => None,
        }
    }
}

/// Name of a single character trait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CharacterTrait {
    /// `wound_limit`
    WoundLimit,
    /// `wound_current`
    WoundCurrent,
    /// `strain_limit`
    StrainLimit,
    /// `strain_current`
    StrainCurrent,
    /// `defense_melee`
    DefenseMelee,
    /// `defense_ranged`
    DefenseRanged,
    /// `soak`
    Soak,
    /// `status_flags`
    StatusFlags,
    /// `image_url`
    ImageUrl,
    /// `initiative_triumph`
    InitiativeTriumph,
    /// `initiative_success`
    InitiativeSuccess,
    /// `initiative_advantage`
    InitiativeAdvantage,
}

/// Every trait, in storage column order.
pub const ALL_TRAITS: [CharacterTrait; 12] = [
    CharacterTrait::WoundLimit,
    CharacterTrait::WoundCurrent,
    CharacterTrait::StrainLimit,
    CharacterTrait::StrainCurrent,
    CharacterTrait::DefenseMelee,
    CharacterTrait::DefenseRanged,
    CharacterTrait::Soak,
    CharacterTrait::StatusFlags,
    CharacterTrait::ImageUrl,
    CharacterTrait::InitiativeTriumph,
    CharacterTrait::InitiativeSuccess,
    CharacterTrait::InitiativeAdvantage,
];

impl CharacterTrait {
    /// Wire / column name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WoundLimit => "wound_limit",
            Self::WoundCurrent => "wound_current",
            Self::StrainLimit => "strain_limit",
            Self::StrainCurrent => "strain_current",
            Self::DefenseMelee => "defense_melee",
            Self::DefenseRanged => "defense_ranged",
            Self::Soak => "soak",
            Self::StatusFlags => "status_flags",
            Self::ImageUrl => "image_url",
            Self::InitiativeTriumph => "initiative_triumph",
            Self::InitiativeSuccess => "initiative_success",
            Self::InitiativeAdvantage => "initiative_advantage",
        }
    }

    /// Whether the trait stores an integer.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::StatusFlags | Self::ImageUrl)
    }

    /// Normalize `value` to the representation this trait stores.
    ///
    /// Integer traits accept integers or strings that parse as integers.
    /// Text traits accept anything and store its text form.
    pub fn coerce(self, value: &TraitValue) -> Result<TraitValue> {
        if self.is_numeric() {
            value
                .as_integer()
                .map(TraitValue::Integer)
                .ok_or_else(|| MessageError::InvalidTraitValue {
                    trait_name: self.as_str().to_owned(),
                    value: value.to_string(),
                })
        } else {
            Ok(TraitValue::Text(value.to_string()))
        }
    }
}

impl fmt::Display for CharacterTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CharacterTrait {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self> {
        ALL_TRAITS
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MessageError::UnknownTrait(s.to_owned()))
    }
}

/// Value carried by a trait update; clients send either numbers or text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraitValue {
    /// JSON integer.
    Integer(i64),
    /// JSON string.
    Text(String),
}

impl TraitValue {
    /// Integer view: integers as-is, strings if they parse.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for TraitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}
