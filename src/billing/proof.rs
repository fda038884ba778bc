//! Proof-of-payment file storage.
//!
//! Manual bank transfers are verified by a human looking at an uploaded
//! receipt. The billing flow only keeps the stable reference returned by
//! the storage backend.

use crate::error::{BillingError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Content types accepted as proof of payment.
pub const ALLOWED_PROOF_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "application/pdf",
];

/// Stable reference (URL or path) to a stored proof file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofReference(String);

impl ProofReference {
    /// Wrap a reference string, rejecting blank values.
    pub fn new(reference: impl Into<String>) -> Result<Self> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(BillingError::validation("proof reference cannot be empty"));
        }
        Ok(Self(reference))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProofReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An uploaded proof file.
#[derive(Debug, Clone)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl ProofUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Check size and type limits before handing the file to storage.
    pub fn validate(&self, max_bytes: usize) -> Result<()> {
        if self.data.is_empty() {
            return Err(BillingError::validation("proof of payment file is empty"));
        }
        if self.data.len() > max_bytes {
            return Err(BillingError::validation(format!(
                "proof of payment exceeds maximum size of {} bytes",
                max_bytes
            )));
        }
        let content_type = self.content_type.to_ascii_lowercase();
        if !ALLOWED_PROOF_TYPES.contains(&content_type.as_str()) {
            return Err(BillingError::validation(format!(
                "unsupported proof of payment type '{}'",
                self.content_type
            )));
        }
        Ok(())
    }

    /// File name reduced to characters safe for a storage key.
    #[must_use]
    pub fn sanitized_name(&self) -> String {
        let name: String = self
            .file_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .take(128)
            .collect();
        if name.is_empty() {
            "proof".to_string()
        } else {
            name
        }
    }
}

/// Trait for proof-of-payment file storage.
#[async_trait]
pub trait ProofStorage: Send + Sync {
    /// Store a proof file for a tenant and return its stable reference.
    async fn store_proof(&self, tenant_id: &str, upload: ProofUpload) -> Result<ProofReference>;

    /// Check whether a reference points at a file stored for `tenant_id`.
    ///
    /// A file uploaded by another tenant counts as missing.
    async fn exists(&self, reference: &ProofReference, tenant_id: &str) -> Result<bool>;
}
