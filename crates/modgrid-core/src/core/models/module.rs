use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The neighbour shape a module scans when collecting its adjacency bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdjacencyKind {
    /// No adjacency interaction.
    #[default]
    None,
    /// The four orthogonal neighbours ("+" shape).
    Cross,
    /// The left and right neighbours in the same row.
    Linear,
    /// The four orthogonal neighbours, at a reduced weight.
    Lesser,
}

const CROSS_OFFSETS: [(isize, isize); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const LINEAR_OFFSETS: [(isize, isize); 2] = [(1, 0), (-1, 0)];

impl AdjacencyKind {
    /// Neighbour offsets `(dx, dy)` in their fixed scan order.
    pub fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            AdjacencyKind::None => &[],
            AdjacencyKind::Cross | AdjacencyKind::Lesser => &CROSS_OFFSETS,
            AdjacencyKind::Linear => &LINEAR_OFFSETS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdjacencyKind::None => "none",
            AdjacencyKind::Cross => "cross",
            AdjacencyKind::Linear => "linear",
            AdjacencyKind::Lesser => "lesser",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown adjacency kind '{0}'. Expected one of: none, cross, greater, linear, lesser")]
pub struct ParseAdjacencyError(pub String);

impl FromStr for AdjacencyKind {
    type Err = ParseAdjacencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "false" => Ok(AdjacencyKind::None),
            "cross" | "greater" | "true" => Ok(AdjacencyKind::Cross),
            "linear" => Ok(AdjacencyKind::Linear),
            "lesser" => Ok(AdjacencyKind::Lesser),
            _ => Err(ParseAdjacencyError(s.to_string())),
        }
    }
}

impl fmt::Display for AdjacencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AdjacencyKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Clients send either a boolean flag or a named shape.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAdjacency {
    Flag(bool),
    Name(String),
}

impl<'de> Deserialize<'de> for AdjacencyKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<RawAdjacency>::deserialize(deserializer)? {
            None | Some(RawAdjacency::Flag(false)) => Ok(AdjacencyKind::None),
            Some(RawAdjacency::Flag(true)) => Ok(AdjacencyKind::Cross),
            Some(RawAdjacency::Name(name)) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

fn default_count() -> usize {
    1
}

fn is_one(count: &usize) -> bool {
    *count == 1
}

/// A placeable technology module. Immutable reference data looked up by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub tech: String,
    #[serde(rename = "type", default)]
    pub module_type: String,
    #[serde(default)]
    pub bonus: f64,
    #[serde(default)]
    pub adjacency: AdjacencyKind,
    #[serde(default)]
    pub sc_eligible: bool,
    #[serde(default)]
    pub image: String,
    /// How many instances of this module a build may hold.
    #[serde(default = "default_count", skip_serializing_if = "is_one")]
    pub count: usize,
    /// Reward modules are only candidates once the player owns them.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reward: bool,
}

impl Module {
    pub fn new(id: &str, tech: &str, bonus: f64) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            tech: tech.to_string(),
            module_type: String::new(),
            bonus,
            adjacency: AdjacencyKind::None,
            sc_eligible: false,
            image: String::new(),
            count: 1,
            reward: false,
        }
    }

    pub fn with_adjacency(mut self, adjacency: AdjacencyKind) -> Self {
        self.adjacency = adjacency;
        self
    }

    pub fn with_sc_eligible(mut self, eligible: bool) -> Self {
        self.sc_eligible = eligible;
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_reward(mut self, reward: bool) -> Self {
        self.reward = reward;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_aliased_kinds() {
        assert_eq!("cross".parse::<AdjacencyKind>(), Ok(AdjacencyKind::Cross));
        assert_eq!("greater".parse::<AdjacencyKind>(), Ok(AdjacencyKind::Cross));
        assert_eq!("Linear".parse::<AdjacencyKind>(), Ok(AdjacencyKind::Linear));
        assert_eq!("".parse::<AdjacencyKind>(), Ok(AdjacencyKind::None));
        assert!("diagonal".parse::<AdjacencyKind>().is_err());
    }

    #[test]
    fn deserializes_boolean_and_null_flags() {
        let kinds: Vec<AdjacencyKind> =
            serde_json::from_str(r#"[true, false, null, "lesser"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![
                AdjacencyKind::Cross,
                AdjacencyKind::None,
                AdjacencyKind::None,
                AdjacencyKind::Lesser
            ]
        );
    }

    #[test]
    fn linear_scans_only_the_row() {
        assert!(AdjacencyKind::Linear.offsets().iter().all(|&(_, dy)| dy == 0));
        assert_eq!(AdjacencyKind::Cross.offsets().len(), 4);
        assert!(AdjacencyKind::None.offsets().is_empty());
    }

    #[test]
    fn module_defaults_fill_missing_fields() {
        let module: Module = serde_json::from_str(r#"{"id": "Xa", "bonus": 0.4}"#).unwrap();
        assert_eq!(module.count, 1);
        assert!(!module.reward);
        assert_eq!(module.adjacency, AdjacencyKind::None);
        assert_eq!(module.bonus, 0.4);
    }
}
