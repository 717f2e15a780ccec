/*
 * Copyright 2021 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Extensions to `prost` and related crates.

use prost_types::value::Kind;
use serde_json::Value;

pub fn encode<M: prost::Message>(message: &M) -> Result<Vec<u8>, prost::EncodeError> {
    let mut buf = Vec::with_capacity(message.encoded_len());
    message.encode(&mut buf)?;
    Ok(buf)
}

/// Wraps `message` in a `google.protobuf.Any` tagged with `type_url`.
pub fn encode_any<M: prost::Message>(
    type_url: &str,
    message: &M,
) -> Result<prost_types::Any, prost::EncodeError> {
    Ok(prost_types::Any {
        type_url: type_url.into(),
        value: encode(message)?,
    })
}

/// Converts the `metadata` of an xDS node into a JSON object, dropping
/// fields without a value.
pub fn mapping_from_struct(value: prost_types::Struct) -> serde_json::Map<String, Value> {
    value
        .fields
        .into_iter()
        .filter_map(|(k, v)| v.kind.map(value_from_kind).map(|v| (k, v)))
        .collect()
}

pub fn value_from_kind(kind: Kind) -> Value {
    match kind {
        Kind::NullValue(_) => Value::Null,
        Kind::BoolValue(v) => Value::Bool(v),
        Kind::NumberValue(v) => number_from_f64(v),
        Kind::StringValue(v) => Value::String(v),
        Kind::ListValue(v) => Value::Array(
            v.values
                .into_iter()
                .filter_map(|v| v.kind)
                .map(value_from_kind)
                .collect(),
        ),
        Kind::StructValue(v) => Value::Object(mapping_from_struct(v)),
    }
}

/// Protobuf only has doubles, integral values are mapped back to JSON
/// integers so `"port": 8080` survives the trip unchanged.
fn number_from_f64(value: f64) -> Value {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Value::Number((value as i64).into())
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub fn struct_from_json(mapping: serde_json::Map<String, Value>) -> prost_types::Struct {
    prost_types::Struct {
        fields: mapping
            .into_iter()
            .map(|(key, value)| (key, from_json(value)))
            .collect(),
    }
}

pub fn from_json(value: Value) -> prost_types::Value {
    prost_types::Value {
        kind: Some(match value {
            Value::Null => Kind::NullValue(<_>::default()),
            Value::Bool(v) => Kind::BoolValue(v),
            Value::Number(v) => v
                .as_f64()
                .map(Kind::NumberValue)
                .unwrap_or(Kind::NullValue(<_>::default())),
            Value::String(v) => Kind::StringValue(v),
            Value::Array(v) => Kind::ListValue(prost_types::ListValue {
                values: v.into_iter().map(from_json).collect(),
            }),
            Value::Object(v) => Kind::StructValue(struct_from_json(v)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn struct_round_trip() {
        let json = serde_json::json!({
            "istio": "sidecar",
            "ports": [80, 8080],
            "weight": 0.5,
            "labels": { "app": "reviews", "canary": false },
            "unset": null,
        });

        let Value::Object(mapping) = json.clone() else {
            unreachable!()
        };

        let value = mapping_from_struct(struct_from_json(mapping));
        assert_eq!(Value::Object(value), json);
    }

    #[test]
    fn encode_any_carries_type_url() {
        let message = prost_types::Duration {
            seconds: 1,
            nanos: 5,
        };
        let any = encode_any("type.googleapis.com/google.protobuf.Duration", &message).unwrap();

        assert_eq!(any.type_url, "type.googleapis.com/google.protobuf.Duration");
        assert_eq!(any.value, encode(&message).unwrap());
    }
}
