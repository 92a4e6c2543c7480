//! Wire representation of bundles and signing messages.
//!
//! Every opaque byte field travels as a hex string. Bundles are wrapped in an
//! [`Envelope`] tagged with their [`BundleKind`]:
//!
//! ```json
//! { "kind": "deal", "payload": { "dealerIndex": 0, "deals": [...], ... } }
//! ```

use serde::{Deserialize, Serialize};

use randnet_crypto::{decompress_g1, decompress_g2, scalar_from_bytes};
use randnet_types::{
    Deal, DealBundle, G2Point, Justification, JustificationBundle, PartialSignature,
    Response, ResponseBundle, Scalar, SigShare, SignRequest, Status,
};

use crate::bundle::{Bundle, BundleKind};
use crate::error::CodecError;

/// Tagged wire envelope carrying one bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: BundleKind,
    pub payload: serde_json::Value,
}

/// Deal bundle for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DealBundleWire {
    dealer_index: u32,
    deals: Vec<DealWire>,
    /// Hex-encoded G2 commitments (96 bytes each)
    public: Vec<String>,
    session_id: String,
    signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DealWire {
    share_index: u32,
    encrypted_share: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBundleWire {
    share_index: u32,
    responses: Vec<ResponseWire>,
    session_id: String,
    signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseWire {
    dealer_index: u32,
    /// true when approved, false for a complaint
    status: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JustificationBundleWire {
    dealer_index: u32,
    justifications: Vec<JustificationWire>,
    public: Vec<String>,
    session_id: String,
    signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JustificationWire {
    share_index: u32,
    /// Hex-encoded scalar (32 bytes)
    share: String,
}

/// Signing request for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequestWire {
    #[serde(rename = "requestID")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<u32>,
    /// Hex-encoded payload
    pub data: String,
}

/// Partial signature answer for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureWire {
    #[serde(rename = "requestID")]
    pub request_id: String,
    /// Hex of `index (u32 big-endian) || G1 point`
    pub signature: String,
}

/// Wrap a bundle into its wire envelope.
pub fn encode(bundle: &Bundle) -> Result<Envelope, CodecError> {
    let payload = match bundle {
        Bundle::Deal(bundle) => serde_json::to_value(deal_to_wire(bundle)),
        Bundle::Response(bundle) => serde_json::to_value(response_to_wire(bundle)),
        Bundle::Justification(bundle) => serde_json::to_value(justification_to_wire(bundle)),
    }
    .map_err(|e| CodecError::Serialization(e.to_string()))?;

    Ok(Envelope {
        kind: bundle.kind(),
        payload,
    })
}

/// Unwrap a wire envelope, validating every byte field.
pub fn decode(envelope: &Envelope) -> Result<Bundle, CodecError> {
    let payload = envelope.payload.clone();
    match envelope.kind {
        BundleKind::Deal => deal_from_wire(serde_json::from_value(payload)?).map(Bundle::Deal),
        BundleKind::Response => {
            response_from_wire(serde_json::from_value(payload)?).map(Bundle::Response)
        }
        BundleKind::Justification => {
            justification_from_wire(serde_json::from_value(payload)?).map(Bundle::Justification)
        }
    }
}

/// Serialize a bundle to bytes for a shared topic.
pub fn to_bytes(bundle: &Bundle) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(&encode(bundle)?).map_err(|e| CodecError::Serialization(e.to_string()))
}

pub fn from_bytes(bytes: &[u8]) -> Result<Bundle, CodecError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    decode(&envelope)
}

/// Serialize a sign request for a shared topic.
pub fn sign_request_to_bytes(request: &SignRequest) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(&sign_request_to_wire(request))
        .map_err(|e| CodecError::Serialization(e.to_string()))
}

pub fn sign_request_from_bytes(bytes: &[u8]) -> Result<SignRequest, CodecError> {
    let wire: SignRequestWire = serde_json::from_slice(bytes)?;
    sign_request_from_wire(&wire)
}

/// Serialize a partial signature answer for a shared topic.
pub fn signature_to_bytes(signature: &PartialSignature) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(&signature_to_wire(signature))
        .map_err(|e| CodecError::Serialization(e.to_string()))
}

pub fn signature_from_bytes(bytes: &[u8]) -> Result<PartialSignature, CodecError> {
    let wire: SignatureWire = serde_json::from_slice(bytes)?;
    signature_from_wire(&wire)
}

pub fn sign_request_to_wire(request: &SignRequest) -> SignRequestWire {
    SignRequestWire {
        request_id: request.request_id.clone(),
        sender: request.origin,
        data: hex::encode(&request.data),
    }
}

pub fn sign_request_from_wire(wire: &SignRequestWire) -> Result<SignRequest, CodecError> {
    Ok(SignRequest {
        request_id: wire.request_id.clone(),
        origin: wire.sender,
        data: decode_hex(&wire.data, "data")?,
    })
}

pub fn signature_to_wire(signature: &PartialSignature) -> SignatureWire {
    SignatureWire {
        request_id: signature.request_id.clone(),
        signature: hex::encode(signature.share.to_bytes()),
    }
}

pub fn signature_from_wire(wire: &SignatureWire) -> Result<PartialSignature, CodecError> {
    let bytes = decode_hex(&wire.signature, "signature")?;
    let share = SigShare::from_bytes(&bytes)
        .ok_or_else(|| CodecError::malformed("signature share has wrong length"))?;
    decompress_g1(&share.sig).map_err(|e| CodecError::malformed(e.to_string()))?;
    Ok(PartialSignature {
        request_id: wire.request_id.clone(),
        share,
    })
}

fn deal_to_wire(bundle: &DealBundle) -> DealBundleWire {
    DealBundleWire {
        dealer_index: bundle.dealer_index,
        deals: bundle
            .deals
            .iter()
            .map(|deal| DealWire {
                share_index: deal.share_index,
                encrypted_share: hex::encode(&deal.encrypted_share),
            })
            .collect(),
        public: bundle.public.iter().map(|point| hex::encode(point.0)).collect(),
        session_id: hex::encode(&bundle.session_id),
        signature: hex::encode(&bundle.signature),
    }
}

fn deal_from_wire(wire: DealBundleWire) -> Result<DealBundle, CodecError> {
    let deals = wire
        .deals
        .iter()
        .map(|deal| {
            Ok(Deal {
                share_index: deal.share_index,
                encrypted_share: decode_hex(&deal.encrypted_share, "encryptedShare")?,
            })
        })
        .collect::<Result<Vec<_>, CodecError>>()?;

    let public = wire
        .public
        .iter()
        .map(|point| decode_g2(point))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DealBundle {
        dealer_index: wire.dealer_index,
        deals,
        public,
        session_id: decode_hex(&wire.session_id, "sessionId")?,
        signature: decode_hex(&wire.signature, "signature")?,
    })
}

fn response_to_wire(bundle: &ResponseBundle) -> ResponseBundleWire {
    ResponseBundleWire {
        share_index: bundle.share_index,
        responses: bundle
            .responses
            .iter()
            .map(|response| ResponseWire {
                dealer_index: response.dealer_index,
                status: response.status == Status::Approved,
            })
            .collect(),
        session_id: hex::encode(&bundle.session_id),
        signature: hex::encode(&bundle.signature),
    }
}

fn response_from_wire(wire: ResponseBundleWire) -> Result<ResponseBundle, CodecError> {
    Ok(ResponseBundle {
        share_index: wire.share_index,
        responses: wire
            .responses
            .iter()
            .map(|response| Response {
                dealer_index: response.dealer_index,
                status: if response.status {
                    Status::Approved
                } else {
                    Status::Complaint
                },
            })
            .collect(),
        session_id: decode_hex(&wire.session_id, "sessionId")?,
        signature: decode_hex(&wire.signature, "signature")?,
    })
}

fn justification_to_wire(bundle: &JustificationBundle) -> JustificationBundleWire {
    JustificationBundleWire {
        dealer_index: bundle.dealer_index,
        justifications: bundle
            .justifications
            .iter()
            .map(|justification| JustificationWire {
                share_index: justification.share_index,
                share: hex::encode(justification.share.0),
            })
            .collect(),
        public: bundle.public.iter().map(|point| hex::encode(point.0)).collect(),
        session_id: hex::encode(&bundle.session_id),
        signature: hex::encode(&bundle.signature),
    }
}

fn justification_from_wire(
    wire: JustificationBundleWire,
) -> Result<JustificationBundle, CodecError> {
    let justifications = wire
        .justifications
        .iter()
        .map(|justification| {
            Ok(Justification {
                share_index: justification.share_index,
                share: decode_scalar(&justification.share)?,
            })
        })
        .collect::<Result<Vec<_>, CodecError>>()?;

    let public = wire
        .public
        .iter()
        .map(|point| decode_g2(point))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(JustificationBundle {
        dealer_index: wire.dealer_index,
        justifications,
        public,
        session_id: decode_hex(&wire.session_id, "sessionId")?,
        signature: decode_hex(&wire.signature, "signature")?,
    })
}

fn decode_hex(value: &str, field: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(value).map_err(|e| CodecError::malformed(format!("invalid {} hex: {}", field, e)))
}

fn decode_g2(value: &str) -> Result<G2Point, CodecError> {
    let bytes: [u8; 96] = decode_hex(value, "public")?
        .try_into()
        .map_err(|_| CodecError::malformed("commitment must be 96 bytes"))?;
    let point = G2Point(bytes);
    decompress_g2(&point).map_err(|e| CodecError::malformed(e.to_string()))?;
    Ok(point)
}

fn decode_scalar(value: &str) -> Result<Scalar, CodecError> {
    let bytes: [u8; 32] = decode_hex(value, "share")?
        .try_into()
        .map_err(|_| CodecError::malformed("share must be 32 bytes"))?;
    let scalar = Scalar(bytes);
    scalar_from_bytes(&scalar).map_err(|e| CodecError::malformed(e.to_string()))?;
    Ok(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use randnet_crypto::{compress_g1, compress_g2, hash_to_g1, scalar_to_bytes, Keypair};
    use rand::rngs::OsRng;

    fn sample_deal() -> DealBundle {
        let keypair = Keypair::generate(&mut OsRng);
        DealBundle {
            dealer_index: 2,
            deals: vec![
                Deal {
                    share_index: 0,
                    encrypted_share: vec![0xab; 160],
                },
                Deal {
                    share_index: 1,
                    encrypted_share: vec![0xcd; 160],
                },
            ],
            public: vec![*keypair.public(), compress_g2(&randnet_crypto::G2Affine::generator())],
            session_id: vec![7u8; 32],
            signature: vec![9u8; 128],
        }
    }

    #[test]
    fn test_deal_roundtrip() {
        let bundle = Bundle::Deal(sample_deal());
        let envelope = encode(&bundle).unwrap();
        assert_eq!(envelope.kind, BundleKind::Deal);
        assert_eq!(decode(&envelope).unwrap(), bundle);
    }

    #[test]
    fn test_deal_field_names() {
        let envelope = encode(&Bundle::Deal(sample_deal())).unwrap();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["kind"], "deal");
        assert_eq!(json["payload"]["dealerIndex"], 2);
        assert_eq!(json["payload"]["deals"][1]["shareIndex"], 1);
        assert_eq!(json["payload"]["sessionId"], hex::encode([7u8; 32]));
    }

    #[test]
    fn test_response_roundtrip() {
        let bundle = Bundle::Response(ResponseBundle {
            share_index: 1,
            responses: vec![
                Response {
                    dealer_index: 0,
                    status: Status::Approved,
                },
                Response {
                    dealer_index: 1,
                    status: Status::Complaint,
                },
            ],
            session_id: vec![1u8; 32],
            signature: vec![2u8; 128],
        });
        let bytes = to_bytes(&bundle).unwrap();
        assert_eq!(from_bytes(&bytes).unwrap(), bundle);
    }

    #[test]
    fn test_justification_roundtrip() {
        let share = randnet_crypto::random_scalar(&mut OsRng);
        let bundle = Bundle::Justification(JustificationBundle {
            dealer_index: 0,
            justifications: vec![Justification {
                share_index: 2,
                share: scalar_to_bytes(&share),
            }],
            public: vec![*Keypair::generate(&mut OsRng).public()],
            session_id: vec![3u8; 32],
            signature: vec![4u8; 128],
        });
        assert_eq!(decode(&encode(&bundle).unwrap()).unwrap(), bundle);
    }

    #[test]
    fn test_bad_hex_is_malformed() {
        let mut envelope = encode(&Bundle::Deal(sample_deal())).unwrap();
        envelope.payload["sessionId"] = serde_json::json!("zz");
        assert!(matches!(
            decode(&envelope),
            Err(CodecError::MalformedBundle(_))
        ));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut envelope = encode(&Bundle::Deal(sample_deal())).unwrap();
        envelope.payload.as_object_mut().unwrap().remove("signature");
        assert!(matches!(
            decode(&envelope),
            Err(CodecError::MalformedBundle(_))
        ));
    }

    #[test]
    fn test_bad_point_is_malformed() {
        let mut envelope = encode(&Bundle::Deal(sample_deal())).unwrap();
        envelope.payload["public"][0] = serde_json::json!(hex::encode([0xffu8; 96]));
        assert!(matches!(
            decode(&envelope),
            Err(CodecError::MalformedBundle(_))
        ));
    }

    #[test]
    fn test_kind_mismatch_is_malformed() {
        let mut envelope = encode(&Bundle::Deal(sample_deal())).unwrap();
        envelope.kind = BundleKind::Response;
        assert!(decode(&envelope).is_err());
    }

    #[test]
    fn test_sign_messages_roundtrip() {
        let request = SignRequest {
            request_id: "abcd".into(),
            origin: Some(0),
            data: vec![1, 2, 3],
        };
        let wire = sign_request_to_wire(&request);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["requestID"], "abcd");
        assert_eq!(json["data"], "010203");
        assert_eq!(sign_request_from_wire(&wire).unwrap(), request);

        let signature = PartialSignature {
            request_id: "abcd".into(),
            share: SigShare {
                index: 3,
                sig: compress_g1(&hash_to_g1(b"m")),
            },
        };
        let wire = signature_to_wire(&signature);
        assert_eq!(signature_from_wire(&wire).unwrap(), signature);

        let bad = SignatureWire {
            request_id: "abcd".into(),
            signature: hex::encode([0u8; 10]),
        };
        assert!(signature_from_wire(&bad).is_err());
    }

    #[test]
    fn test_sign_message_bytes() {
        let request = SignRequest {
            request_id: "abcd".into(),
            origin: None,
            data: vec![9],
        };
        let bytes = sign_request_to_bytes(&request).unwrap();
        assert_eq!(sign_request_from_bytes(&bytes).unwrap(), request);

        assert!(matches!(
            sign_request_from_bytes(b"{\"requestID\":1}"),
            Err(CodecError::MalformedBundle(_))
        ));
        assert!(matches!(
            signature_from_bytes(b"not json"),
            Err(CodecError::MalformedBundle(_))
        ));
    }
}
