//! Canonical Serializer Module
//!
//! Turns arbitrary `Serialize` arguments into a `serde_json::Value` that keeps
//! every distinction a cache key needs: `Option` layers are tagged and
//! non-finite floats are rejected instead of collapsing to `null`.

use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::error::{MemoError, Result};

/// Object tag for `None`
const NONE_TAG: &str = "$none";
/// Object tag wrapping the value of `Some`
const SOME_TAG: &str = "$some";

// == Canonical Value ==
/// Serializes `value` into its canonical JSON form.
pub fn to_canonical<T>(value: &T) -> Result<Value>
where
    T: Serialize + ?Sized,
{
    value
        .serialize(CanonicalSerializer)
        .map_err(|e| MemoError::KeyDerivation(e.0))
}

#[derive(Debug, Error)]
#[error("{0}")]
struct KeyError(String);

impl ser::Error for KeyError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        KeyError(msg.to_string())
    }
}

type KeyResult<T> = std::result::Result<T, KeyError>;

fn tagged(tag: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(tag.to_string(), value);
    Value::Object(map)
}

fn nested<T>(value: &T) -> KeyResult<Value>
where
    T: Serialize + ?Sized,
{
    value.serialize(CanonicalSerializer)
}

struct CanonicalSerializer;

impl ser::Serializer for CanonicalSerializer {
    type Ok = Value;
    type Error = KeyError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> KeyResult<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> KeyResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> KeyResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> KeyResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> KeyResult<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u8(self, v: u8) -> KeyResult<Value> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> KeyResult<Value> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> KeyResult<Value> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> KeyResult<Value> {
        Ok(Value::from(v))
    }

    fn serialize_f32(self, v: f32) -> KeyResult<Value> {
        self.serialize_f64(f64::from(v))
    }

    // NaN and the infinities have no JSON number form
    fn serialize_f64(self, v: f64) -> KeyResult<Value> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| KeyError(format!("non-finite float {} cannot be part of a key", v)))
    }

    fn serialize_char(self, v: char) -> KeyResult<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> KeyResult<Value> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> KeyResult<Value> {
        Ok(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn serialize_none(self) -> KeyResult<Value> {
        Ok(tagged(NONE_TAG, Value::Null))
    }

    fn serialize_some<T>(self, value: &T) -> KeyResult<Value>
    where
        T: Serialize + ?Sized,
    {
        Ok(tagged(SOME_TAG, nested(value)?))
    }

    fn serialize_unit(self) -> KeyResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> KeyResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> KeyResult<Value> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> KeyResult<Value>
    where
        T: Serialize + ?Sized,
    {
        nested(value)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> KeyResult<Value>
    where
        T: Serialize + ?Sized,
    {
        Ok(tagged(variant, nested(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> KeyResult<SeqBuilder> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> KeyResult<SeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> KeyResult<SeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> KeyResult<VariantSeqBuilder> {
        Ok(VariantSeqBuilder {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> KeyResult<MapBuilder> {
        Ok(MapBuilder {
            map: Map::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> KeyResult<MapBuilder> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> KeyResult<VariantMapBuilder> {
        Ok(VariantMapBuilder {
            variant,
            map: Map::new(),
        })
    }
}

// == Compound Builders ==
struct SeqBuilder {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = KeyError;

    fn serialize_element<T>(&mut self, value: &T) -> KeyResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(nested(value)?);
        Ok(())
    }

    fn end(self) -> KeyResult<Value> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = KeyError;

    fn serialize_element<T>(&mut self, value: &T) -> KeyResult<()>
    where
        T: Serialize + ?Sized,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> KeyResult<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = KeyError;

    fn serialize_field<T>(&mut self, value: &T) -> KeyResult<()>
    where
        T: Serialize + ?Sized,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> KeyResult<Value> {
        ser::SerializeSeq::end(self)
    }
}

struct VariantSeqBuilder {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = Value;
    type Error = KeyError;

    fn serialize_field<T>(&mut self, value: &T) -> KeyResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(nested(value)?);
        Ok(())
    }

    fn end(self) -> KeyResult<Value> {
        Ok(tagged(self.variant, Value::Array(self.items)))
    }
}

/// Map keys that are not strings are stored as their canonical JSON text.
struct MapBuilder {
    map: Map<String, Value>,
    next_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = KeyError;

    fn serialize_key<T>(&mut self, key: &T) -> KeyResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.next_key = Some(match nested(key)? {
            Value::String(text) => text,
            other => other.to_string(),
        });
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> KeyResult<()>
    where
        T: Serialize + ?Sized,
    {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| KeyError("map value serialized before its key".to_string()))?;
        self.map.insert(key, nested(value)?);
        Ok(())
    }

    fn end(self) -> KeyResult<Value> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = KeyError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> KeyResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.map.insert(key.to_owned(), nested(value)?);
        Ok(())
    }

    fn end(self) -> KeyResult<Value> {
        Ok(Value::Object(self.map))
    }
}

struct VariantMapBuilder {
    variant: &'static str,
    map: Map<String, Value>,
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = Value;
    type Error = KeyError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> KeyResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.map.insert(key.to_owned(), nested(value)?);
        Ok(())
    }

    fn end(self) -> KeyResult<Value> {
        Ok(tagged(self.variant, Value::Object(self.map)))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    enum Shape {
        Point,
        Circle(f64),
        Rect(u32, u32),
        Named { label: String },
    }

    #[test]
    fn test_scalars() {
        assert_eq!(to_canonical(&true).unwrap(), json!(true));
        assert_eq!(to_canonical(&-3i8).unwrap(), json!(-3));
        assert_eq!(to_canonical(&7u16).unwrap(), json!(7));
        assert_eq!(to_canonical(&1.5f32).unwrap(), json!(1.5));
        assert_eq!(to_canonical(&'x').unwrap(), json!("x"));
        assert_eq!(to_canonical(&()).unwrap(), Value::Null);
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        for v in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                to_canonical(&v),
                Err(MemoError::KeyDerivation(_))
            ));
        }
        assert!(to_canonical(&vec![1.0, f64::NAN]).is_err(), "Nested NaN is rejected too");
        assert!(to_canonical(&f32::INFINITY).is_err());
    }

    #[test]
    fn test_option_layers_are_tagged() {
        let none: Option<Option<u8>> = None;
        let some_none: Option<Option<u8>> = Some(None);
        let some_some: Option<Option<u8>> = Some(Some(0));

        assert_eq!(to_canonical(&none).unwrap(), json!({ "$none": null }));
        assert_eq!(
            to_canonical(&some_none).unwrap(),
            json!({ "$some": { "$none": null } })
        );
        assert_eq!(
            to_canonical(&some_some).unwrap(),
            json!({ "$some": { "$some": 0 } })
        );
        assert_ne!(to_canonical(&Some(())).unwrap(), to_canonical(&None::<()>).unwrap());
        assert_ne!(to_canonical(&Some(())).unwrap(), to_canonical(&()).unwrap());
    }

    #[test]
    fn test_enum_variants() {
        assert_eq!(to_canonical(&Shape::Point).unwrap(), json!("Point"));
        assert_eq!(to_canonical(&Shape::Circle(2.0)).unwrap(), json!({ "Circle": 2.0 }));
        assert_eq!(to_canonical(&Shape::Rect(1, 2)).unwrap(), json!({ "Rect": [1, 2] }));
        assert_eq!(
            to_canonical(&Shape::Named {
                label: "a".to_string()
            })
            .unwrap(),
            json!({ "Named": { "label": "a" } })
        );
    }

    #[test]
    fn test_non_string_map_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert((1, 2), "pair");

        assert_eq!(to_canonical(&map).unwrap(), json!({ "[1,2]": "pair" }));
    }
}
