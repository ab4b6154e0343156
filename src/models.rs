use serde::de::Visitor;
use serde::{Deserialize, Serialize};

/// Paging header. In the `[header, records]` envelope this is element 0; in
/// the `source` envelopes the fields live at the top level of the object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default, deserialize_with = "de_opt_u64_from_string_or_number")]
    pub page: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u64_from_string_or_number")]
    pub pages: Option<u64>,
    /// Some responses encode `per_page` as a string, others as a number.
    #[serde(deserialize_with = "de_u64_from_string_or_number")]
    pub per_page: u64,
    #[serde(deserialize_with = "de_u64_from_string_or_number")]
    pub total: u64,
}

/// One entry of a header's `message` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Sent as a string by most endpoints, as a number by a few.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeName {
    pub id: String,
    #[serde(default)]
    pub value: String,
}

/// A row of the `country` endpoint.
///
/// Classifications of aggregates, and the coordinates of economies without a
/// capital, come back as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRow {
    pub id: String,
    #[serde(rename = "iso2Code", default)]
    pub iso2_code: String,
    pub name: String,
    pub region: CodeName,
    #[serde(default)]
    pub adminregion: CodeName,
    #[serde(rename = "incomeLevel", default)]
    pub income_level: CodeName,
    #[serde(rename = "lendingType", default)]
    pub lending_type: CodeName,
    #[serde(rename = "capitalCity", default)]
    pub capital_city: String,
    #[serde(default)]
    pub longitude: String,
    #[serde(default)]
    pub latitude: String,
}

impl CountryRow {
    /// Regional, income and lending rollups carry the region id `NA`.
    pub fn is_aggregate(&self) -> bool {
        self.region.id == "NA"
    }
}

/// One coordinate of a data observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub concept: String,
    pub id: String,
    #[serde(default)]
    pub value: String,
}

/// Raw observation from the `sources/.../data` style endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, deserialize_with = "de_opt_f64_lenient")]
    pub value: Option<f64>,
    #[serde(default)]
    pub variable: Vec<Variable>,
}

fn de_u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_any(U64Visitor)
}

fn de_opt_u64_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_any(OptU64Visitor)
}

struct U64Visitor;

impl<'de> Visitor<'de> for U64Visitor {
    type Value = u64;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "a string or integer representing a non-negative number")
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom("negative value for u64"))
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<u64, E> {
        if v >= 0.0 && v.fract() == 0.0 {
            Ok(v as u64)
        } else {
            Err(E::custom("expected a non-negative integer"))
        }
    }

    fn visit_str<E: serde::de::Error>(self, s: &str) -> Result<u64, E> {
        s.trim().parse::<u64>().map_err(E::custom)
    }
}

struct OptU64Visitor;

impl<'de> Visitor<'de> for OptU64Visitor {
    type Value = Option<u64>;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "null, a string or an integer")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        U64Visitor.visit_u64(v).map(Some)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        U64Visitor.visit_i64(v).map(Some)
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
        U64Visitor.visit_f64(v).map(Some)
    }

    fn visit_str<E: serde::de::Error>(self, s: &str) -> Result<Self::Value, E> {
        if s.trim().is_empty() {
            return Ok(None);
        }
        U64Visitor.visit_str(s).map(Some)
    }
}

/// Observations are numbers or null; a few databases send numeric strings.
fn de_opt_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;
    struct F64Visitor;

    impl<'de> Visitor<'de> for F64Visitor {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "null, a number or a numeric string")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(F64Visitor)
}
