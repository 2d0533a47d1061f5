//! Compact JSON payload serialization
//!
//! `serde_json` silently writes NaN and the infinities as `null`. An event
//! payload must never change meaning on the wire, so values are walked once
//! by [`FiniteCheck`] and rejected before any bytes are produced.

use std::fmt;

use serde::ser::{self, Serialize};

use crate::error::EncodingError;

/// Serialize `value` to compact JSON, rejecting non-finite floats
pub fn to_json<T>(value: &T) -> Result<Vec<u8>, EncodingError>
where
    T: ?Sized + Serialize,
{
    check_finite(value)?;
    Ok(serde_json::to_vec(value)?)
}

fn check_finite<T>(value: &T) -> Result<(), EncodingError>
where
    T: ?Sized + Serialize,
{
    match value.serialize(&mut FiniteCheck) {
        Ok(()) => Ok(()),
        Err(CheckError::NonFinite(v)) => Err(EncodingError::NonFiniteNumber(v)),
        Err(CheckError::Custom(msg)) => Err(EncodingError::Json(
            <serde_json::Error as ser::Error>::custom(msg),
        )),
    }
}

#[derive(Debug)]
enum CheckError {
    NonFinite(f64),
    Custom(String),
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckError::NonFinite(v) => write!(f, "non-finite number {}", v),
            CheckError::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for CheckError {}

impl ser::Error for CheckError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CheckError::Custom(msg.to_string())
    }
}

/// Serializer that produces nothing and fails on the first NaN or infinity
struct FiniteCheck;

fn finite(v: f64) -> Result<(), CheckError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(CheckError::NonFinite(v))
    }
}

impl<'a> ser::Serializer for &'a mut FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _v: bool) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), CheckError> {
        finite(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<(), CheckError> {
        finite(v)
    }

    fn serialize_char(self, _v: char) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_none(self) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, CheckError> {
        Ok(self)
    }
}

impl<'a> ser::SerializeSeq for &'a mut FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for &'a mut FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl<'a> ser::SerializeTupleStruct for &'a mut FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl<'a> ser::SerializeTupleVariant for &'a mut FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl<'a> ser::SerializeMap for &'a mut FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        key.serialize(&mut **self)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for &'a mut FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl<'a> ser::SerializeStructVariant for &'a mut FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<(), CheckError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}
