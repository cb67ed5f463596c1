//! Selection policy: what a caller asks to see.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::RelationType;

/// Ordinal over part kinds, used as a selection threshold.
///
/// Top-level domains rank as `Zone`, nested domains as `Domain`, modules and
/// external peers as `Module`, components as `Component`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Nothing,
    #[serde(alias = "top")]
    Zone,
    Domain,
    Module,
    Component,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Nothing => "nothing",
            Level::Zone => "zone",
            Level::Domain => "domain",
            Level::Module => "module",
            Level::Component => "component",
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nothing" => Ok(Level::Nothing),
            "zone" | "top" => Ok(Level::Zone),
            "domain" => Ok(Level::Domain),
            "module" => Ok(Level::Module),
            "component" => Ok(Level::Component),
            other => Err(Error::UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many hops relation-following may take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FollowRepr", into = "FollowRepr")]
pub enum Follow {
    #[default]
    Off,
    Hops(u32),
    All,
}

impl Follow {
    /// Whether another hop may be taken after `taken` hops.
    pub fn allows(self, taken: u32) -> bool {
        match self {
            Follow::Off => false,
            Follow::Hops(limit) => taken < limit,
            Follow::All => true,
        }
    }
}

/// Wire form of [`Follow`]: `false`, a hop count, or `"all"`.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum FollowRepr {
    Flag(bool),
    Hops(u32),
    Keyword(String),
}

impl TryFrom<FollowRepr> for Follow {
    type Error = Error;

    fn try_from(repr: FollowRepr) -> Result<Self> {
        match repr {
            FollowRepr::Flag(false) => Ok(Follow::Off),
            FollowRepr::Flag(true) => Ok(Follow::All),
            FollowRepr::Hops(0) => Ok(Follow::Off),
            FollowRepr::Hops(n) => Ok(Follow::Hops(n)),
            FollowRepr::Keyword(k) if k == "all" => Ok(Follow::All),
            FollowRepr::Keyword(k) => Err(Error::InvalidFollow(k)),
        }
    }
}

impl From<Follow> for FollowRepr {
    fn from(follow: Follow) -> Self {
        match follow {
            Follow::Off => FollowRepr::Flag(false),
            Follow::Hops(n) => FollowRepr::Hops(n),
            Follow::All => FollowRepr::Keyword("all".to_string()),
        }
    }
}

/// Which parts of a system a view shows. Every field is optional and the
/// fields combine independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewPolicy {
    /// Uids that are always selected
    pub include: Vec<String>,
    /// Uids whose direct children are selected; the part itself is displayed
    pub open: Vec<String>,
    /// Uids that are never selected themselves (their descendants may be)
    pub exclude: Vec<String>,
    /// Uids whose whole subtree is hidden, overriding every other rule
    pub exclude_deep: Vec<String>,
    /// Default selection threshold: "nothing", "zone", "domain", "module" or "component"
    pub level: Level,
    /// Deepest level a relation endpoint may be pulled in at, even when hidden
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_level: Option<Level>,
    /// Hops to follow along relations: false, a number, or "all"
    #[schemars(with = "FollowRepr")]
    pub follow_relations: Follow,
    /// Hops to follow against relation direction: false, a number, or "all"
    #[schemars(with = "FollowRepr")]
    pub follow_inverse_relations: Follow,
    /// Relation types that may be drawn reversed when forward routing fails
    pub reverse_relation_types: Vec<RelationType>,
}

fn to_strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl ViewPolicy {
    /// Parse a policy from JSON. Unknown level tokens and malformed follow
    /// limits are rejected here, before any pruning starts.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Parse a policy from YAML.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn include<I, S>(mut self, uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = to_strings(uids);
        self
    }

    pub fn open<I, S>(mut self, uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.open = to_strings(uids);
        self
    }

    pub fn exclude<I, S>(mut self, uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = to_strings(uids);
        self
    }

    pub fn exclude_deep<I, S>(mut self, uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_deep = to_strings(uids);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn relation_level(mut self, level: Level) -> Self {
        self.relation_level = Some(level);
        self
    }

    pub fn follow_relations(mut self, follow: Follow) -> Self {
        self.follow_relations = follow;
        self
    }

    pub fn follow_inverse_relations(mut self, follow: Follow) -> Self {
        self.follow_inverse_relations = follow;
        self
    }

    pub fn reverse_relation_types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = RelationType>,
    {
        self.reverse_relation_types = types.into_iter().collect();
        self
    }

    /// Whether relations of this type may fall back to reversed routing.
    pub fn reverses(&self, kind: RelationType) -> bool {
        self.reverse_relation_types.contains(&kind)
    }

    /// Every uid the policy mentions, for validation against a model.
    pub fn mentioned_uids(&self) -> impl Iterator<Item = &str> {
        self.include
            .iter()
            .chain(&self.open)
            .chain(&self.exclude)
            .chain(&self.exclude_deep)
            .map(String::as_str)
    }
}
