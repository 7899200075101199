use crate::error::{
    Error,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use strum::{
    Display,
    EnumIter,
    EnumString,
    IntoEnumIterator,
};

/// A highscore category exposed by the public API.
///
/// The stored string form (`as_str`) is part of the snapshot identity key and must never change
/// for an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MetricType {
    Global,
    Economy,
    Research,
    Military,
    MilitaryLost,
    MilitaryBuilt,
    MilitaryDestroyed,
    Honor,
}

impl MetricType {
    /// The `type` query parameter of `highscore.xml`.
    pub fn highscore_type(&self) -> u8 {
        match self {
            MetricType::Global => 0,
            MetricType::Economy => 1,
            MetricType::Research => 2,
            MetricType::Military => 3,
            MetricType::MilitaryLost => 4,
            MetricType::MilitaryBuilt => 5,
            MetricType::MilitaryDestroyed => 6,
            MetricType::Honor => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Global => "global",
            MetricType::Economy => "economy",
            MetricType::Research => "research",
            MetricType::Military => "military",
            MetricType::MilitaryLost => "military_lost",
            MetricType::MilitaryBuilt => "military_built",
            MetricType::MilitaryDestroyed => "military_destroyed",
            MetricType::Honor => "honor",
        }
    }

    /// Human readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            MetricType::Global => "Global",
            MetricType::Economy => "Economy",
            MetricType::Research => "Research",
            MetricType::Military => "Military",
            MetricType::MilitaryLost => "Military lost",
            MetricType::MilitaryBuilt => "Military built",
            MetricType::MilitaryDestroyed => "Military destroyed",
            MetricType::Honor => "Honor",
        }
    }

    pub fn all() -> Vec<MetricType> {
        MetricType::iter().collect()
    }

    /// Parses configured category names, keeping their order and dropping repeats.
    /// An empty selection means every category.
    pub fn parse_selection<S: AsRef<str>>(names: &[S]) -> Result<Vec<MetricType>> {
        if names.is_empty() {
            return Ok(Self::all());
        }
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            let metric_type = name
                .parse::<MetricType>()
                .map_err(|_| Error::UnknownMetric(name.to_string()))?;
            if !selected.contains(&metric_type) {
                selected.push(metric_type);
            }
        }
        Ok(selected)
    }
}
