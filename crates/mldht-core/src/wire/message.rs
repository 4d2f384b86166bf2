//! KRPC message envelope: the bencoded dictionary exchanged over UDP, per
//! BEP-5.
//!
//! Grounded in `other_examples/2604b3f4_5l1v3r1-dht-crawler`'s message
//! structs (flat envelope with optional `q`/`a`/`r`/`e` bodies keyed by
//! `y`, rather than a single tagged enum, since bencode dictionaries carry
//! no discriminant serde can hang a tag off of).

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use super::CodecError;

/// The `y` field: query, response, or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "q")]
    Query,
    #[serde(rename = "r")]
    Response,
    #[serde(rename = "e")]
    Error,
}

/// Arguments carried by `a` on queries. Field order matches bencode's
/// required lexicographic key ordering so a struct derive serializes
/// canonically without an explicit sort step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryArgs {
    pub id: ByteBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<ByteBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ByteBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<ByteBuf>,
}

/// Values carried by `r` on responses. Same ordering rationale as
/// `QueryArgs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseValues {
    pub id: ByteBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<ByteBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<ByteBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ByteBuf>>,
}

/// `e` is a bencoded list `[code, message]`, not a dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KrpcError(pub i64, pub String);

/// The full KRPC envelope. `q`/`a`/`r`/`e` are mutually exclusive in
/// practice (determined by `y`); all are optional here because bencode
/// gives us no tagged-union support and we decode the flat dict first,
/// then branch on `y` to build a typed `Message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub t: ByteBuf,
    pub y: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<ByteBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<QueryArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<ResponseValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<KrpcError>,
}

/// A decoded, validated KRPC message: the envelope narrowed to exactly
/// one of the three shapes `y` promised.
#[derive(Debug, Clone)]
pub struct Message {
    pub transaction_id: Vec<u8>,
    pub client_version: Option<Vec<u8>>,
    pub body: MessageBody,
}

#[derive(Debug, Clone)]
pub enum MessageBody {
    Query { method: String, args: QueryArgs },
    Response(ResponseValues),
    Error { code: i64, message: String },
}

impl Message {
    pub fn query(transaction_id: Vec<u8>, method: &str, args: QueryArgs) -> Self {
        Self {
            transaction_id,
            client_version: None,
            body: MessageBody::Query {
                method: method.to_string(),
                args,
            },
        }
    }

    pub fn response(transaction_id: Vec<u8>, values: ResponseValues) -> Self {
        Self {
            transaction_id,
            client_version: None,
            body: MessageBody::Response(values),
        }
    }

    pub fn error(transaction_id: Vec<u8>, code: i64, message: String) -> Self {
        Self {
            transaction_id,
            client_version: None,
            body: MessageBody::Error { code, message },
        }
    }

    fn into_envelope(self) -> Envelope {
        let t = ByteBuf::from(self.transaction_id);
        let v = self.client_version.map(ByteBuf::from);
        match self.body {
            MessageBody::Query { method, args } => Envelope {
                t,
                y: MessageKind::Query,
                v,
                q: Some(method),
                a: Some(args),
                r: None,
                e: None,
            },
            MessageBody::Response(values) => Envelope {
                t,
                y: MessageKind::Response,
                v,
                q: None,
                a: None,
                r: Some(values),
                e: None,
            },
            MessageBody::Error { code, message } => Envelope {
                t,
                y: MessageKind::Error,
                v,
                q: None,
                a: None,
                r: None,
                e: Some(KrpcError(code, message)),
            },
        }
    }

    fn from_envelope(env: Envelope) -> Result<Self, CodecError> {
        let transaction_id = env.t.into_vec();
        let client_version = env.v.map(|v| v.into_vec());
        let body = match env.y {
            MessageKind::Query => {
                let method = env.q.ok_or(CodecError::Malformed("query missing q"))?;
                let args = env.a.ok_or(CodecError::Malformed("query missing a"))?;
                MessageBody::Query { method, args }
            }
            MessageKind::Response => {
                let values = env.r.ok_or(CodecError::Malformed("response missing r"))?;
                MessageBody::Response(values)
            }
            MessageKind::Error => {
                let KrpcError(code, message) =
                    env.e.ok_or(CodecError::Malformed("error missing e"))?;
                MessageBody::Error { code, message }
            }
        };
        Ok(Self {
            transaction_id,
            client_version,
            body,
        })
    }

    pub fn encode(self) -> Result<Vec<u8>, CodecError> {
        let envelope = self.into_envelope();
        serde_bencode::to_bytes(&envelope).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let envelope: Envelope =
            serde_bencode::from_bytes(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        Self::from_envelope(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_round_trips_through_encode_decode() {
        let args = QueryArgs {
            id: ByteBuf::from(vec![1u8; 20]),
            target: Some(ByteBuf::from(vec![2u8; 20])),
            ..Default::default()
        };
        let msg = Message::query(vec![b'a', b'a'], "find_node", args);
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.transaction_id, vec![b'a', b'a']);
        match decoded.body {
            MessageBody::Query { method, args } => {
                assert_eq!(method, "find_node");
                assert_eq!(args.id.as_slice(), &[1u8; 20][..]);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn error_round_trips_as_list_not_dict() {
        let msg = Message::error(vec![b'b'], 201, "Generic Error".to_string());
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        match decoded.body {
            MessageBody::Error { code, message } => {
                assert_eq!(code, 201);
                assert_eq!(message, "Generic Error");
            }
            _ => panic!("expected error"),
        }
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let env = Envelope {
            t: ByteBuf::from(vec![b'a']),
            y: MessageKind::Query,
            v: None,
            q: None,
            a: None,
            r: None,
            e: None,
        };
        let bytes = serde_bencode::to_bytes(&env).unwrap();
        assert!(Message::decode(&bytes).is_err());
    }
}
