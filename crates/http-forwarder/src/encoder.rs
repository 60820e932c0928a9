// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::EncodeError;
use bytes::Bytes;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum ContentEncoding {
    #[display("identity")]
    Identity,
    #[display("deflate")]
    Deflate,
}

/// A request body ready to be sent, shared by every attempt of a delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPayload {
    pub body: Bytes,
    pub encoding: ContentEncoding,
}

/// Serializes protobuf messages, deflating them when compression is enabled.
///
/// Stateless and free of I/O; the same message always yields the same bytes.
#[derive(Clone, Copy, Debug)]
pub struct PayloadEncoder {
    compress: bool,
}

impl PayloadEncoder {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    pub fn encoding(&self) -> ContentEncoding {
        if self.compress {
            ContentEncoding::Deflate
        } else {
            ContentEncoding::Identity
        }
    }

    pub fn encode<M: prost::Message>(&self, message: &M) -> Result<EncodedPayload, EncodeError> {
        let raw = serialize(message)?;
        let body = match self.encoding() {
            ContentEncoding::Identity => raw,
            ContentEncoding::Deflate => deflate(&raw)?,
        };
        Ok(EncodedPayload {
            body: Bytes::from(body),
            encoding: self.encoding(),
        })
    }
}

fn serialize<M: prost::Message>(message: &M) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    message.encode(&mut buf)?;
    Ok(buf)
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::event::Event;
    use crate::proto::EventV2;
    use flate2::read::ZlibDecoder;
    use prost::bytes::{Buf, BufMut};
    use prost::encoding::{skip_field, DecodeContext, WireType};
    use prost::Message;
    use std::io::Read;

    /// Claims to need more space than any buffer can offer, so encoding always fails.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct Unencodable;

    impl Message for Unencodable {
        fn encode_raw(&self, _buf: &mut impl BufMut) {}

        fn merge_field(
            &mut self,
            tag: u32,
            wire_type: WireType,
            buf: &mut impl Buf,
            ctx: DecodeContext,
        ) -> Result<(), prost::DecodeError> {
            skip_field(wire_type, tag, buf, ctx)
        }

        fn encoded_len(&self) -> usize {
            usize::MAX
        }

        fn clear(&mut self) {}
    }

    fn event() -> EventV2 {
        EventV2::from(&Event::new("deploy", "api deployed to production"))
    }

    #[test]
    fn test_identity_is_raw_protobuf() {
        let payload = PayloadEncoder::new(false)
            .encode(&event())
            .expect("encode failed");
        assert_eq!(payload.encoding, ContentEncoding::Identity);
        assert_eq!(payload.body.as_ref(), event().encode_to_vec().as_slice());
    }

    #[test]
    fn test_deflate_inflates_to_raw_protobuf() {
        let payload = PayloadEncoder::new(true)
            .encode(&event())
            .expect("encode failed");
        assert_eq!(payload.encoding, ContentEncoding::Deflate);
        assert_eq!(payload.encoding.to_string(), "deflate");

        let mut inflated = Vec::new();
        ZlibDecoder::new(payload.body.as_ref())
            .read_to_end(&mut inflated)
            .expect("inflate failed");
        let decoded = EventV2::decode(inflated.as_slice()).expect("decode failed");
        assert_eq!(decoded, event());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = PayloadEncoder::new(true);
        let first = encoder.encode(&event()).expect("encode failed");
        let second = encoder.encode(&event()).expect("encode failed");
        assert_eq!(first, second);
    }

    #[test]
    fn test_serialization_failure_is_reported() {
        for compress in [false, true] {
            let result = PayloadEncoder::new(compress).encode(&Unencodable);
            assert!(matches!(result, Err(EncodeError::Serialize(_))));
        }
    }
}
