//! JSON shapes exchanged with users and with other validators.
//!
//! Every reply travels with HTTP 200 inside an [`Envelope`]; callers branch
//! on `code`.

use axum::response::{IntoResponse, Response};
use axum::Json;
use linkid_crypto::{
    identifier_hash, submit_hash, tx_hash, verify_digest, verify_request, CryptoError,
    SigningIdentity,
};
use linkid_store::{ProcessStep, ValidationRecord, ValidationStatus};
use linkid_types::{Address, IdentifierHash, IdentifierKind, RequestId, Signature, Timestamp};
use serde::{Deserialize, Serialize};

/// Envelope result codes.
pub mod codes {
    pub const OK: u16 = 200;
    pub const INVALID_INPUT: u16 = 400;
    /// Bad user or relay signature; also a code mismatch on submit.
    pub const INVALID_SIGNATURE: u16 = 401;
    /// Identifier already linked on `/request`; unknown relayer on `/broadcast*`.
    pub const IDENTIFIER_TAKEN: u16 = 402;
    pub const NOT_VALIDATOR: u16 = 402;
    pub const ADDRESS_TAKEN: u16 = 403;
    /// The ledger already holds a different claim under the relayed id.
    pub const REQUEST_MISMATCH: u16 = 409;
    pub const UNKNOWN_REQUEST: u16 = 410;
    pub const CODE_NOT_SENT: u16 = 420;
    pub const ALREADY_CONFIRMED: u16 = 421;
    pub const CODE_EXPIRED: u16 = 422;
    pub const INTERNAL: u16 = 500;
    pub const BUSY: u16 = 503;
    pub const LEDGER_FAILURE: u16 = 800;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: Address,
    pub endpoint: String,
    pub version: String,
}

/// A user's signed claim, as relayed between validators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
    #[serde(alias = "email", alias = "phone")]
    pub identifier: String,
    pub address: Address,
    pub nonce: u64,
    pub signature: Signature,
}

impl LinkRequest {
    pub fn identifier_hash(&self, kind: IdentifierKind) -> IdentifierHash {
        identifier_hash(kind, &self.identifier)
    }

    /// Whether the address owner signed this claim at `nonce`.
    pub fn verify(&self, kind: IdentifierKind) -> bool {
        verify_request(
            &self.address,
            &self.identifier_hash(kind),
            self.nonce,
            &self.signature,
        )
    }
}

/// A registered request, signed by the validator that received it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub request: LinkRequest,
    pub request_id: RequestId,
    pub receiver: Address,
    pub signature: Signature,
}

impl Transaction {
    pub fn digest(&self, kind: IdentifierKind) -> [u8; 32] {
        tx_hash(
            &self.request.identifier_hash(kind),
            &self.request.address,
            self.request.nonce,
            &self.request_id,
            &self.receiver,
        )
    }

    pub fn sign(
        request: LinkRequest,
        request_id: RequestId,
        receiver: &SigningIdentity,
        kind: IdentifierKind,
    ) -> Result<Self, CryptoError> {
        let digest = tx_hash(
            &request.identifier_hash(kind),
            &request.address,
            request.nonce,
            &request_id,
            &receiver.address(),
        );
        Ok(Self {
            signature: receiver.sign(&digest)?,
            request,
            request_id,
            receiver: receiver.address(),
        })
    }

    /// Whether `receiver` signed the relay.
    pub fn verify_receiver(&self, kind: IdentifierKind) -> bool {
        verify_digest(&self.receiver, &self.digest(kind), &self.signature)
    }

    /// A fresh validation record at `step`.
    pub fn to_record(&self, kind: IdentifierKind, step: ProcessStep) -> ValidationRecord {
        ValidationRecord {
            request_id: self.request_id,
            identifier: kind.normalize(&self.request.identifier),
            identifier_hash: self.request.identifier_hash(kind),
            address: self.request.address,
            nonce: self.request.nonce,
            request_signature: self.request.signature,
            receiver: self.receiver,
            receiver_signature: self.signature,
            status: ValidationStatus::None,
            send_code: String::new(),
            receive_code: String::new(),
            expire: Timestamp::EPOCH,
            step,
            updated_at: Timestamp::EPOCH,
        }
    }

    pub fn from_record(record: &ValidationRecord) -> Self {
        Self {
            request: LinkRequest {
                identifier: record.identifier.clone(),
                address: record.address,
                nonce: record.nonce,
                signature: record.request_signature,
            },
            request_id: record.request_id,
            receiver: record.receiver,
            signature: record.receiver_signature,
        }
    }
}

/// A code submitted to one validator and relayed to the others.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRelay {
    pub request_id: RequestId,
    pub code: String,
    pub receiver: Address,
    pub signature: Signature,
}

impl SubmitRelay {
    pub fn sign(
        request_id: RequestId,
        code: String,
        receiver: &SigningIdentity,
    ) -> Result<Self, CryptoError> {
        let digest = submit_hash(&request_id, &code, &receiver.address());
        Ok(Self {
            signature: receiver.sign(&digest)?,
            request_id,
            code,
            receiver: receiver.address(),
        })
    }

    pub fn verify(&self) -> bool {
        verify_digest(
            &self.receiver,
            &submit_hash(&self.request_id, &self.code, &self.receiver),
            &self.signature,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub param: String,
    pub msg: String,
}

impl FieldError {
    pub fn new(param: &str, msg: &str) -> Self {
        Self {
            param: param.to_string(),
            msg: msg.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Vec<FieldError>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                code: codes::OK,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::error(codes::INTERNAL, e.to_string()),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            data: None,
            error: Some(ErrorBody {
                message: message.into(),
                validation: None,
            }),
        }
    }

    pub fn invalid(fields: Vec<FieldError>) -> Self {
        Self {
            code: codes::INVALID_INPUT,
            data: None,
            error: Some(ErrorBody {
                message: "Failed to check validation".to_string(),
                validation: Some(fields),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == codes::OK
    }

    pub fn message(&self) -> &str {
        self.error.as_ref().map(|e| e.message.as_str()).unwrap_or("")
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
