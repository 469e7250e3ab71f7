//! Dataset data type identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serialization format of a dataset, as named by the service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataTypeId {
    /// Attribute-Relation File Format (raw upload only)
    Arff,

    /// One value per line, no header
    PlainText,

    /// Comma separated with a header row
    GenericCsv,

    /// Tab separated with a header row
    GenericTsv,

    /// Comma separated without a header row
    GenericCsvNoHeader,

    /// Tab separated without a header row
    GenericTsvNoHeader,

    /// Any other identifier the service reports
    Other(String),
}

impl DataTypeId {
    /// Identifier string used on the wire
    pub fn as_str(&self) -> &str {
        match self {
            DataTypeId::Arff => "ARFF",
            DataTypeId::PlainText => "PlainText",
            DataTypeId::GenericCsv => "GenericCSV",
            DataTypeId::GenericTsv => "GenericTSV",
            DataTypeId::GenericCsvNoHeader => "GenericCSVNoHeader",
            DataTypeId::GenericTsvNoHeader => "GenericTSVNoHeader",
            DataTypeId::Other(id) => id,
        }
    }
}

impl From<&str> for DataTypeId {
    fn from(id: &str) -> Self {
        match id {
            "ARFF" => DataTypeId::Arff,
            "PlainText" => DataTypeId::PlainText,
            "GenericCSV" => DataTypeId::GenericCsv,
            "GenericTSV" => DataTypeId::GenericTsv,
            "GenericCSVNoHeader" => DataTypeId::GenericCsvNoHeader,
            "GenericTSVNoHeader" => DataTypeId::GenericTsvNoHeader,
            other => DataTypeId::Other(other.to_string()),
        }
    }
}

impl FromStr for DataTypeId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DataTypeId::from(s))
    }
}

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DataTypeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataTypeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Ok(DataTypeId::from(id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ids_round_trip() {
        for id in ["ARFF", "PlainText", "GenericCSV", "GenericTSV", "GenericCSVNoHeader", "GenericTSVNoHeader"] {
            let parsed = DataTypeId::from(id);
            assert!(!matches!(parsed, DataTypeId::Other(_)), "{} parsed as Other", id);
            assert_eq!(parsed.as_str(), id);
        }
    }

    #[test]
    fn test_unknown_id_is_preserved() {
        let parsed: DataTypeId = serde_json::from_str("\"Zip\"").unwrap();
        assert_eq!(parsed, DataTypeId::Other("Zip".into()));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"Zip\"");
    }
}
