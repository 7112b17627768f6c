use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("payload is not valid json: {0}")]
    InvalidJson(String),
    #[error("payload is not a json object")]
    NotAnObject,
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("field {field} is not a valid integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },
    #[error("field {field} is not a valid float: {value:?}")]
    InvalidFloat { field: &'static str, value: String },
    #[error("field {field} has unexpected json type {found}")]
    UnexpectedType {
        field: &'static str,
        found: &'static str,
    },
}

/// The kind of event a report describes. Upstream feeds are not consistent about this,
/// so anything outside the known set is carried through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StormType {
    Tornado,
    Hail,
    Wind,
    Other(String),
}

impl StormType {
    pub fn as_str(&self) -> &str {
        match self {
            StormType::Tornado => "tornado",
            StormType::Hail => "hail",
            StormType::Wind => "wind",
            StormType::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, StormType::Other(_))
    }
}

impl From<String> for StormType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "tornado" => StormType::Tornado,
            "hail" => StormType::Hail,
            "wind" => StormType::Wind,
            _ => StormType::Other(value),
        }
    }
}

impl From<&str> for StormType {
    fn from(value: &str) -> Self {
        StormType::from(value.to_string())
    }
}

impl From<StormType> for String {
    fn from(value: StormType) -> Self {
        match value {
            StormType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StormType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single severe weather observation.
///
/// Serializes to the canonical form published on the processed topic. Deserializing goes
/// through [`StormReport::from_map`], so both canonical and historical producer payloads
/// are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct StormReport {
    pub date: String,
    pub time: i32,
    pub size: f64,
    #[serde(rename = "fScale")]
    pub f_scale: String,
    pub speed: i32,
    pub location: String,
    pub county: String,
    pub state: String,
    pub lat: f64,
    pub lon: f64,
    pub comments: String,
    #[serde(rename = "type")]
    pub kind: StormType,
}

/// The fields that identify one physical event, independent of where it is stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NaturalKey {
    pub time: i32,
    pub kind: StormType,
    pub location: String,
    pub lat: f64,
    pub lon: f64,
}

impl NaturalKey {
    /// Stable text form, used as the kafka message key so every version of an event
    /// lands on the same partition.
    pub fn to_message_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.time, self.kind, self.location, self.lat, self.lon
        )
    }
}

// Canonical key first, then the capitalized key older producers send.
const DATE: (&str, &str) = ("date", "Date");
const TIME: (&str, &str) = ("time", "Time");
const SIZE: (&str, &str) = ("size", "Size");
const F_SCALE: (&str, &str) = ("fScale", "F_Scale");
const SPEED: (&str, &str) = ("speed", "Speed");
const LOCATION: (&str, &str) = ("location", "Location");
const COUNTY: (&str, &str) = ("county", "County");
const STATE: (&str, &str) = ("state", "State");
const LAT: (&str, &str) = ("lat", "Lat");
const LON: (&str, &str) = ("lon", "Lon");
const COMMENTS: (&str, &str) = ("comments", "Comments");
const TYPE: (&str, &str) = ("type", "Type");

impl StormReport {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        match value {
            Value::Object(map) => Self::from_map(&map),
            _ => Err(DecodeError::NotAnObject),
        }
    }

    /// Builds a report from an already parsed object. Numeric fields are converted in a
    /// fixed order and the first failure is returned.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let time = integer(TIME.0, lookup(map, TIME), true)?;
        let size = float(SIZE.0, lookup(map, SIZE), false)?;
        let speed = integer(SPEED.0, lookup(map, SPEED), false)?;
        let lat = float(LAT.0, lookup(map, LAT), true)?;
        let lon = float(LON.0, lookup(map, LON), true)?;

        Ok(StormReport {
            date: text(DATE.0, lookup(map, DATE))?,
            time,
            size,
            f_scale: text(F_SCALE.0, lookup(map, F_SCALE))?,
            speed,
            location: text(LOCATION.0, lookup(map, LOCATION))?,
            county: text(COUNTY.0, lookup(map, COUNTY))?,
            state: text(STATE.0, lookup(map, STATE))?,
            lat,
            lon,
            comments: text(COMMENTS.0, lookup(map, COMMENTS))?,
            kind: StormType::from(text(TYPE.0, lookup(map, TYPE))?),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            time: self.time,
            kind: self.kind.clone(),
            location: self.location.clone(),
            lat: self.lat,
            lon: self.lon,
        }
    }
}

impl TryFrom<Map<String, Value>> for StormReport {
    type Error = DecodeError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        StormReport::from_map(&map)
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: (&str, &str)) -> Option<&'a Value> {
    let (canonical, historical) = keys;
    map.get(canonical)
        .filter(|v| !v.is_null())
        .or_else(|| map.get(historical).filter(|v| !v.is_null()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn text(field: &'static str, value: Option<&Value>) -> Result<String, DecodeError> {
    match value {
        None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(DecodeError::UnexpectedType {
            field,
            found: json_type(other),
        }),
    }
}

// Optional integers default to zero only when absent or empty, never on a bad value.
fn integer(field: &'static str, value: Option<&Value>, required: bool) -> Result<i32, DecodeError> {
    match value {
        None if required => Err(DecodeError::MissingField(field)),
        None => Ok(0),
        Some(Value::String(s)) if s.is_empty() && !required => Ok(0),
        Some(Value::String(s)) => s.parse::<i32>().map_err(|_| DecodeError::InvalidInteger {
            field,
            value: s.clone(),
        }),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| DecodeError::InvalidInteger {
                field,
                value: n.to_string(),
            }),
        Some(other) => Err(DecodeError::UnexpectedType {
            field,
            found: json_type(other),
        }),
    }
}

fn float(field: &'static str, value: Option<&Value>, required: bool) -> Result<f64, DecodeError> {
    let parsed = match value {
        None if required => return Err(DecodeError::MissingField(field)),
        None => return Ok(0.0),
        Some(Value::String(s)) if s.is_empty() && !required => return Ok(0.0),
        Some(Value::String(s)) => s.parse::<f64>().ok().map(|f| (f, s.clone())),
        Some(Value::Number(n)) => n.as_f64().map(|f| (f, n.to_string())),
        Some(other) => {
            return Err(DecodeError::UnexpectedType {
                field,
                found: json_type(other),
            })
        }
    };

    // NaN and infinities can't be encoded as json numbers, so they would not survive a
    // round trip through the processed topic.
    match parsed {
        Some((f, _)) if f.is_finite() => Ok(f),
        Some((_, raw)) => Err(DecodeError::InvalidFloat { field, value: raw }),
        None => Err(DecodeError::InvalidFloat {
            field,
            value: match value {
                Some(Value::String(s)) => s.clone(),
                other => other.map(|v| v.to_string()).unwrap_or_default(),
            },
        }),
    }
}
