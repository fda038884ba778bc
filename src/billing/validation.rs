//! Input validation for billing operations.
//!
//! Identifiers arrive from HTTP paths and bodies, so they are checked before
//! they reach the store or the logs.

use crate::error::{BillingError, Result};

/// Maximum length for tenant IDs.
const MAX_TENANT_ID_LENGTH: usize = 256;

/// Maximum length for plan IDs.
const MAX_PLAN_ID_LENGTH: usize = 64;

/// Maximum length for plan name.
const MAX_PLAN_NAME_LENGTH: usize = 128;

/// Maximum length for a reviewer note.
const MAX_REVIEW_NOTE_LENGTH: usize = 1024;

/// Validate a tenant ID.
///
/// Tenant IDs must:
/// - Not be empty
/// - Not exceed 256 characters
/// - Contain only alphanumeric characters, underscores, and hyphens
///
/// # Example
///
/// ```rust
/// use tenantpay::billing::validation::validate_tenant_id;
///
/// assert!(validate_tenant_id("acme_store-1").is_ok());
/// assert!(validate_tenant_id("").is_err());
/// assert!(validate_tenant_id("acme<script>").is_err());
/// ```
pub fn validate_tenant_id(id: &str) -> Result<()> {
    validate_identifier("tenant_id", id, MAX_TENANT_ID_LENGTH)
}

/// Validate a plan ID.
///
/// Same character rules as tenant IDs, capped at 64 characters.
pub fn validate_plan_id(id: &str) -> Result<()> {
    validate_identifier("plan_id", id, MAX_PLAN_ID_LENGTH)
}

/// Validate a display name for a plan.
pub fn validate_plan_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(BillingError::validation("plan name cannot be empty"));
    }
    if name.len() > MAX_PLAN_NAME_LENGTH {
        return Err(BillingError::validation(format!(
            "plan name exceeds maximum length of {}",
            MAX_PLAN_NAME_LENGTH
        )));
    }
    Ok(())
}

/// Validate an optional reviewer note, returning it trimmed.
///
/// Blank notes collapse to `None`.
pub fn validate_review_note(note: Option<String>) -> Result<Option<String>> {
    let Some(note) = note else {
        return Ok(None);
    };
    let trimmed = note.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_REVIEW_NOTE_LENGTH {
        return Err(BillingError::validation(format!(
            "review note exceeds maximum length of {}",
            MAX_REVIEW_NOTE_LENGTH
        )));
    }
    Ok(Some(trimmed.to_string()))
}

fn validate_identifier(field: &str, id: &str, max_len: usize) -> Result<()> {
    if id.is_empty() {
        return Err(BillingError::validation(format!("{field} cannot be empty")));
    }

    if id.len() > max_len {
        return Err(BillingError::validation(format!(
            "{field} '{}' exceeds maximum length of {}",
            truncate_for_error(id),
            max_len
        )));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(BillingError::validation(format!(
            "{field} '{}' contains invalid characters (only alphanumeric, underscore, and hyphen allowed)",
            sanitize_for_error(id)
        )));
    }

    Ok(())
}

/// Truncate a string for error messages to prevent log flooding.
fn truncate_for_error(s: &str) -> String {
    if s.len() <= 50 {
        s.to_string()
    } else {
        // Identifiers that get here may still hold multi-byte chars.
        let cut: String = s.chars().take(47).collect();
        format!("{cut}...")
    }
}

/// Sanitize a string for error messages to prevent log injection.
fn sanitize_for_error(s: &str) -> String {
    let sanitized: String = s
        .chars()
        .take(50)
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '?' })
        .collect();

    if s.chars().count() > 50 {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
