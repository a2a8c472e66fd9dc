//! Entity kinds fetched from the FPL API.
//!
//! Reference kinds (positions, teams, gameweeks, players) are small
//! collections reconciled row-by-row. Fact kinds (fixtures, history,
//! history_past) are one-to-many children of a player and are reloaded
//! wholesale on every run.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One category of fetched data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Positions,
    Teams,
    Gameweeks,
    Players,
    Fixtures,
    History,
    HistoryPast,
}

impl EntityKind {
    /// Every kind, in the order tables are reconciled.
    ///
    /// Reference kinds precede fact kinds because fact rows reference
    /// reference-kind keys.
    pub const ALL: [Self; 7] = [
        Self::Positions,
        Self::Teams,
        Self::Gameweeks,
        Self::Players,
        Self::Fixtures,
        Self::History,
        Self::HistoryPast,
    ];

    /// Get the string representation, which is also the table name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Positions => "positions",
            Self::Teams => "teams",
            Self::Gameweeks => "gameweeks",
            Self::Players => "players",
            Self::Fixtures => "fixtures",
            Self::History => "history",
            Self::HistoryPast => "history_past",
        }
    }

    /// True for the one-to-many kinds materialized from player detail records.
    #[must_use]
    pub const fn is_fact(&self) -> bool {
        matches!(self, Self::Fixtures | Self::History | Self::HistoryPast)
    }

    /// Key of the top-level array in `bootstrap-static` holding this kind,
    /// or the sub-collection name in a player detail record for fact kinds.
    #[must_use]
    pub const fn source_key(&self) -> &'static str {
        match self {
            Self::Positions => "element_types",
            Self::Teams => "teams",
            Self::Gameweeks => "events",
            Self::Players => "elements",
            Self::Fixtures => "fixtures",
            Self::History => "history",
            Self::HistoryPast => "history_past",
        }
    }

    /// Position of this kind in the declared processing order.
    #[must_use]
    pub fn order(&self) -> usize {
        Self::ALL.iter().position(|k| k == self).unwrap_or(usize::MAX)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positions" => Ok(Self::Positions),
            "teams" => Ok(Self::Teams),
            "gameweeks" => Ok(Self::Gameweeks),
            "players" => Ok(Self::Players),
            "fixtures" => Ok(Self::Fixtures),
            "history" => Ok(Self::History),
            "history_past" => Ok(Self::HistoryPast),
            _ => Err(Error::UnknownKind(s.to_string())),
        }
    }
}

/// Which kinds a pipeline run processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every requested kind.
    #[default]
    Full,
    /// Reference kinds only; fact kinds are skipped.
    KeyEntitiesOnly,
}

impl RunMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::KeyEntitiesOnly => "key_entities_only",
        }
    }

    /// Whether `kind` takes part in a run of this mode.
    #[must_use]
    pub const fn includes(&self, kind: EntityKind) -> bool {
        match self {
            Self::Full => true,
            Self::KeyEntitiesOnly => !kind.is_fact(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "managers".parse::<EntityKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownKind(ref s) if s == "managers"));
    }

    #[test]
    fn test_reference_kinds_precede_fact_kinds() {
        let last_reference = EntityKind::ALL
            .iter()
            .filter(|k| !k.is_fact())
            .map(EntityKind::order)
            .max()
            .unwrap();
        let first_fact = EntityKind::ALL
            .iter()
            .filter(|k| k.is_fact())
            .map(EntityKind::order)
            .min()
            .unwrap();
        assert!(last_reference < first_fact);
    }

    #[test]
    fn test_key_entities_only_excludes_facts() {
        let mode = RunMode::KeyEntitiesOnly;
        assert!(mode.includes(EntityKind::Players));
        assert!(!mode.includes(EntityKind::History));
        assert!(RunMode::Full.includes(EntityKind::HistoryPast));
    }
}
