// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Payload Codecs
//!
//! A codec converts typed payloads to and from the opaque bytes carried by a
//! message. Publishers and subscribers are generic over the `Codec` trait, so
//! the same publish and consume paths serve every encoding.
//!
//! - `JsonCodec`: human-inspectable, interoperable with any JSON producer.
//! - `BincodeCodec`: compact binary, only guaranteed to round-trip between
//!   peers built with the same `bincode` version and payload definitions.

use crate::errors::AmqpError;
use serde::{
    de::DeserializeOwned,
    ser::{self, Serialize},
};
use std::fmt::Display;

/// Content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type for bincode messages
pub const BINCODE_CONTENT_TYPE: &str = "application/x-bincode";

/// Encodes and decodes payloads. Implementations are pure.
pub trait Codec: Send + Sync + 'static {
    /// Tag stamped on every message this codec produced.
    fn content_type(&self) -> &'static str;

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, AmqpError>;

    /// Decodes a whole payload. Malformed input is an error, never a partially
    /// populated value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, AmqpError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    /// Fails on NaN and infinite floats instead of writing them as `null`,
    /// which no subscriber could decode back.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, AmqpError> {
        value
            .serialize(FiniteFloats)
            .map_err(|err| AmqpError::EncodePayloadError(err.to_string()))?;

        serde_json::to_vec(value).map_err(|err| AmqpError::EncodePayloadError(err.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, AmqpError> {
        serde_json::from_slice(data).map_err(|err| AmqpError::DecodePayloadError(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn content_type(&self) -> &'static str {
        BINCODE_CONTENT_TYPE
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, AmqpError> {
        bincode::serialize(value).map_err(|err| AmqpError::EncodePayloadError(err.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, AmqpError> {
        bincode::deserialize(data).map_err(|err| AmqpError::DecodePayloadError(err.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct NonFiniteFloat(String);

impl ser::Error for NonFiniteFloat {
    fn custom<M: Display>(msg: M) -> Self {
        NonFiniteFloat(msg.to_string())
    }
}

/// Serializer that writes nothing and only checks that every float in the
/// value is finite.
#[derive(Clone, Copy)]
struct FiniteFloats;

impl FiniteFloats {
    fn check(value: f64) -> Result<(), NonFiniteFloat> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(NonFiniteFloat(format!("{value} has no JSON representation")))
        }
    }
}

impl ser::Serializer for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteFloat;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i8(self, _: i8) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i16(self, _: i16) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i32(self, _: i32) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i64(self, _: i64) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i128(self, _: i128) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u8(self, _: u8) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u16(self, _: u16) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u32(self, _: u32) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u64(self, _: u64) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u128(self, _: u128) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_f32(self, value: f32) -> Result<(), NonFiniteFloat> {
        Self::check(f64::from(value))
    }

    fn serialize_f64(self, value: f64) -> Result<(), NonFiniteFloat> {
        Self::check(value)
    }

    fn serialize_char(self, _: char) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_str(self, _: &str) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_none(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteFloat> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteFloat> {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, NonFiniteFloat> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self, NonFiniteFloat> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, NonFiniteFloat> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFiniteFloat> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self, NonFiniteFloat> {
        Ok(self)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, NonFiniteFloat> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFiniteFloat> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), NonFiniteFloat> {
        key.serialize(*self)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteFloat> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteFloat> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}
