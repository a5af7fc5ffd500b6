//! Value negotiation between untyped backend values and host types.
//!
//! Each backend produces [`Wire`] values from its native row representation:
//! backend-specific wire shapes (bolt nodes and relationships, postgres
//! arrays and JSONB) are recognized by the backend's own conversion layer
//! first, and everything else delegates to the shared base table in this
//! module. Typed destinations pull values out through [`FromWire`], either
//! directly or through the first-match-wins candidate mapping used when the
//! concrete wire shape is not known ahead of decoding.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::error::{GraphError, Result};
use crate::types::{Id, Kind, Node, Path, Relationship, Value};

/// An untyped backend value awaiting negotiation into a typed destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Wire {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    List(Vec<Wire>),
    Map(HashMap<String, Wire>),
    Node(Node),
    Relationship(Relationship),
    Path(Path),
}

impl Wire {
    /// Observed type name used in `TypeMismatch` reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Wire::Null => "null",
            Wire::Bool(_) => "bool",
            Wire::Int(_) => "int",
            Wire::Float(_) => "float",
            Wire::String(_) => "string",
            Wire::Time(_) => "time",
            Wire::List(_) => "list",
            Wire::Map(_) => "map",
            Wire::Node(_) => "node",
            Wire::Relationship(_) => "relationship",
            Wire::Path(_) => "path",
        }
    }

    /// Shared base conversion from a JSON value; the relational backend
    /// delegates JSONB scalars here.
    pub fn from_json(value: &serde_json::Value) -> Wire {
        match value {
            serde_json::Value::Null => Wire::Null,
            serde_json::Value::Bool(b) => Wire::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Wire::Int(i)
                } else {
                    Wire::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Wire::String(s.clone()),
            serde_json::Value::Array(items) => {
                Wire::List(items.iter().map(Wire::from_json).collect())
            }
            serde_json::Value::Object(fields) => Wire::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Wire::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Negotiate into a property-bag value. Composites that cannot live in
    /// a property bag fail with `TypeMismatch`.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Wire::Null => Ok(Value::Null),
            Wire::Bool(b) => Ok(Value::Bool(b)),
            Wire::Int(i) => Ok(Value::Int(i)),
            Wire::Float(f) => Ok(Value::Float(f)),
            Wire::String(s) => Ok(Value::String(s)),
            Wire::Time(t) => Ok(Value::Time(t)),
            Wire::List(items) => {
                let mut strings = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Wire::String(s) => strings.push(s),
                        other => return Err(mismatch(&other, "property value")),
                    }
                }
                Ok(Value::StringList(strings))
            }
            other => Err(mismatch(&other, "property value")),
        }
    }
}

fn mismatch(wire: &Wire, requested: &'static str) -> GraphError {
    GraphError::TypeMismatch {
        observed: wire.type_name().to_string(),
        requested,
    }
}

/// Conversion from an untyped wire value into one typed destination.
///
/// Integer conversions are checked and loss-free; timestamps accept RFC3339
/// text, unix-epoch seconds, and backend-native temporal values.
pub trait FromWire: Sized {
    /// Destination name used in `TypeMismatch` reports.
    const REQUESTED: &'static str;

    fn from_wire(wire: Wire) -> Result<Self>;
}

macro_rules! int_from_wire {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromWire for $ty {
                const REQUESTED: &'static str = $name;

                fn from_wire(wire: Wire) -> Result<Self> {
                    match wire {
                        Wire::Int(value) => <$ty>::try_from(value)
                            .map_err(|_| GraphError::TypeMismatch {
                                observed: format!("int({value})"),
                                requested: $name,
                            }),
                        other => Err(mismatch(&other, $name)),
                    }
                }
            }
        )*
    };
}

int_from_wire! {
    i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64",
    u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64",
}

impl FromWire for f64 {
    const REQUESTED: &'static str = "f64";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::Float(value) => Ok(value),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for f32 {
    const REQUESTED: &'static str = "f32";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::Float(value) => Ok(value as f32),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for bool {
    const REQUESTED: &'static str = "bool";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::Bool(value) => Ok(value),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for String {
    const REQUESTED: &'static str = "string";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::String(value) => Ok(value),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for Kind {
    const REQUESTED: &'static str = "kind";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::String(value) => Ok(Kind::new(value)),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for Id {
    const REQUESTED: &'static str = "id";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::Int(value) => Ok(Id(value)),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for DateTime<Utc> {
    const REQUESTED: &'static str = "time";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::Time(value) => Ok(value),
            Wire::String(text) => DateTime::parse_from_rfc3339(&text)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|_| GraphError::TypeMismatch {
                    observed: format!("string({text})"),
                    requested: Self::REQUESTED,
                }),
            Wire::Int(seconds) => Utc
                .timestamp_opt(seconds, 0)
                .single()
                .ok_or(GraphError::TypeMismatch {
                    observed: format!("int({seconds})"),
                    requested: Self::REQUESTED,
                }),
            Wire::Float(seconds) => Utc
                .timestamp_opt(seconds as i64, 0)
                .single()
                .ok_or(GraphError::TypeMismatch {
                    observed: format!("float({seconds})"),
                    requested: Self::REQUESTED,
                }),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for Vec<String> {
    const REQUESTED: &'static str = "string list";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::List(items) => {
                let mut strings = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Wire::String(s) => strings.push(s),
                        other => return Err(mismatch(&other, Self::REQUESTED)),
                    }
                }
                Ok(strings)
            }
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for Vec<Kind> {
    const REQUESTED: &'static str = "kind list";

    fn from_wire(wire: Wire) -> Result<Self> {
        let strings = Vec::<String>::from_wire(wire)?;
        Ok(strings.into_iter().map(Kind::new).collect())
    }
}

impl FromWire for Node {
    const REQUESTED: &'static str = "node";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::Node(node) => Ok(node),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for Relationship {
    const REQUESTED: &'static str = "relationship";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::Relationship(relationship) => Ok(relationship),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

impl FromWire for Path {
    const REQUESTED: &'static str = "path";

    fn from_wire(wire: Wire) -> Result<Self> {
        match wire {
            Wire::Path(path) => Ok(path),
            other => Err(mismatch(&other, Self::REQUESTED)),
        }
    }
}

/// Candidate destination type for first-match-wins mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Bool,
    Int,
    Float,
    String,
    Time,
    Kind,
    KindList,
    StringList,
    Node,
    Relationship,
    Path,
}

/// A successfully negotiated value from [`RowReader::map_options`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    Kind(Kind),
    KindList(Vec<Kind>),
    StringList(Vec<String>),
    Node(Node),
    Relationship(Relationship),
    Path(Path),
}

fn try_hint(hint: TypeHint, wire: Wire) -> Result<Mapped> {
    match hint {
        TypeHint::Bool => bool::from_wire(wire).map(Mapped::Bool),
        TypeHint::Int => i64::from_wire(wire).map(Mapped::Int),
        TypeHint::Float => f64::from_wire(wire).map(Mapped::Float),
        TypeHint::String => String::from_wire(wire).map(Mapped::String),
        TypeHint::Time => DateTime::<Utc>::from_wire(wire).map(Mapped::Time),
        TypeHint::Kind => Kind::from_wire(wire).map(Mapped::Kind),
        TypeHint::KindList => Vec::<Kind>::from_wire(wire).map(Mapped::KindList),
        TypeHint::StringList => Vec::<String>::from_wire(wire).map(Mapped::StringList),
        TypeHint::Node => Node::from_wire(wire).map(Mapped::Node),
        TypeHint::Relationship => Relationship::from_wire(wire).map(Mapped::Relationship),
        TypeHint::Path => Path::from_wire(wire).map(Mapped::Path),
    }
}

/// Row-scoped positional reader over one backend row.
///
/// Every read advances the internal cursor; reading past the row's end
/// fails with `OutOfRange`.
pub struct RowReader {
    values: std::vec::IntoIter<Wire>,
    available: usize,
    consumed: usize,
}

impl RowReader {
    pub fn new(values: Vec<Wire>) -> Self {
        let available = values.len();
        RowReader {
            values: values.into_iter(),
            available,
            consumed: 0,
        }
    }

    /// Take the next raw wire value.
    pub fn next(&mut self) -> Result<Wire> {
        self.consumed += 1;
        self.values.next().ok_or(GraphError::OutOfRange {
            available: self.available,
            wanted: self.consumed,
        })
    }

    /// Negotiate the next value directly into one typed destination.
    pub fn map<T: FromWire>(&mut self) -> Result<T> {
        self.next().and_then(T::from_wire)
    }

    /// Negotiate the next value against an ordered list of candidate
    /// destinations; the first candidate that converts wins. Used when the
    /// concrete wire shape (node, relationship, path) is unknown before
    /// decoding.
    pub fn map_options(&mut self, options: &[TypeHint]) -> Result<Mapped> {
        let wire = self.next()?;
        for hint in options {
            if let Ok(mapped) = try_hint(*hint, wire.clone()) {
                return Ok(mapped);
            }
        }
        Err(mismatch(&wire, "any offered candidate type"))
    }

    pub fn remaining(&self) -> usize {
        self.available - self.consumed.min(self.available)
    }
}

struct WireVisitor;

impl<'de> Visitor<'de> for WireVisitor {
    type Value = Wire;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a graph wire value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Wire, E> {
        Ok(Wire::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Wire, E> {
        Ok(Wire::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Wire, E> {
        i64::try_from(value)
            .map(Wire::Int)
            .map_err(|_| E::custom(format!("integer {value} overflows the wire int range")))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Wire, E> {
        Ok(Wire::Float(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Wire, E> {
        Ok(Wire::String(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Wire, E> {
        Ok(Wire::String(value))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Wire, E> {
        Ok(Wire::Null)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Wire, E> {
        Ok(Wire::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Wire, D::Error> {
        d.deserialize_any(WireVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Wire, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Wire>()? {
            items.push(item);
        }
        Ok(Wire::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Wire, A::Error> {
        let mut fields = HashMap::new();
        while let Some((key, value)) = map.next_entry::<String, Wire>()? {
            fields.insert(key, value);
        }
        Ok(Wire::Map(fields))
    }
}

/// The shared base coercion table for self-describing backend values.
/// Backend negotiators try their own native wire shapes first and fall back
/// to this implementation.
impl<'de> Deserialize<'de> for Wire {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Wire, D::Error> {
        d.deserialize_any(WireVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Properties;

    fn reader(values: Vec<Wire>) -> RowReader {
        RowReader::new(values)
    }

    #[test]
    fn integer_negotiation_is_loss_free() {
        let mut r = reader(vec![Wire::Int(300), Wire::Int(300)]);
        assert!(matches!(
            r.map::<u8>(),
            Err(GraphError::TypeMismatch { .. })
        ));
        assert_eq!(r.map::<u16>().unwrap(), 300);
    }

    #[test]
    fn negative_values_will_not_negotiate_to_unsigned() {
        let mut r = reader(vec![Wire::Int(-1)]);
        assert!(matches!(
            r.map::<u64>(),
            Err(GraphError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn reading_past_the_row_end_is_out_of_range() {
        let mut r = reader(vec![Wire::Int(1)]);
        assert_eq!(r.map::<i64>().unwrap(), 1);
        match r.map::<i64>() {
            Err(GraphError::OutOfRange { available, wanted }) => {
                assert_eq!(available, 1);
                assert_eq!(wanted, 2);
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn time_negotiates_from_text_epoch_and_native() {
        let now = Utc::now();
        let mut r = reader(vec![
            Wire::String(now.to_rfc3339()),
            Wire::Int(1_700_000_000),
            Wire::Time(now),
        ]);

        assert_eq!(r.map::<DateTime<Utc>>().unwrap(), now);
        assert_eq!(
            r.map::<DateTime<Utc>>().unwrap(),
            Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
        );
        assert_eq!(r.map::<DateTime<Utc>>().unwrap(), now);
    }

    #[test]
    fn kind_list_negotiates_from_string_list() {
        let mut r = reader(vec![Wire::List(vec![
            Wire::String("User".into()),
            Wire::String("Group".into()),
        ])]);
        assert_eq!(
            r.map::<Vec<Kind>>().unwrap(),
            vec![Kind::new("User"), Kind::new("Group")]
        );
    }

    #[test]
    fn map_options_picks_first_matching_candidate() {
        let node = Node::new(Id(7), vec![Kind::new("User")], Properties::new());
        let mut r = reader(vec![Wire::Node(node.clone()), Wire::Int(5)]);

        match r
            .map_options(&[TypeHint::Node, TypeHint::Relationship, TypeHint::Int])
            .unwrap()
        {
            Mapped::Node(mapped) => assert_eq!(mapped, node),
            other => panic!("expected node, got {other:?}"),
        }

        match r
            .map_options(&[TypeHint::Node, TypeHint::Relationship, TypeHint::Int])
            .unwrap()
        {
            Mapped::Int(mapped) => assert_eq!(mapped, 5),
            other => panic!("expected int, got {other:?}"),
        }
    }

    #[test]
    fn map_options_reports_mismatch_when_nothing_matches() {
        let mut r = reader(vec![Wire::Bool(true)]);
        assert!(matches!(
            r.map_options(&[TypeHint::Node, TypeHint::Relationship]),
            Err(GraphError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn property_bag_round_trip_through_negotiation() {
        let now = Utc::now();
        let mut bag = Properties::new();
        bag.set("count", 42i64)
            .set("score", 2.5f64)
            .set("enabled", true)
            .set("name", "alice")
            .set("seen", now);

        // Write-side serialization, then read-side negotiation of each field.
        let decoded = Properties::from_json(&bag.to_json());

        let count_wire = Wire::from_json(&decoded.get("count").unwrap().to_json());
        assert_eq!(i64::from_wire(count_wire).unwrap(), 42);

        let score_wire = Wire::from_json(&decoded.get("score").unwrap().to_json());
        assert_eq!(f64::from_wire(score_wire).unwrap(), 2.5);

        let enabled_wire = Wire::from_json(&decoded.get("enabled").unwrap().to_json());
        assert!(bool::from_wire(enabled_wire).unwrap());

        let name_wire = Wire::from_json(&decoded.get("name").unwrap().to_json());
        assert_eq!(String::from_wire(name_wire).unwrap(), "alice");

        let seen_wire = Wire::from_json(&decoded.get("seen").unwrap().to_json());
        assert_eq!(DateTime::<Utc>::from_wire(seen_wire).unwrap(), now);
    }

    #[test]
    fn wire_deserializes_from_self_describing_values() {
        let wire: Wire = serde_json::from_str("[1, \"two\", true, null]").unwrap();
        assert_eq!(
            wire,
            Wire::List(vec![
                Wire::Int(1),
                Wire::String("two".into()),
                Wire::Bool(true),
                Wire::Null,
            ])
        );
    }
}
