use anyhow::{Result, bail};

pub const MAX_PROOF_REFERENCE_LEN: usize = 512;
pub const MAX_PAYMENT_REFERENCE_LEN: usize = 128;
pub const MAX_CANCELLATION_REASON_LEN: usize = 500;

/// Proof references point at files kept by the blob store; only the pointer
/// is stored here.
pub fn normalize_proof_reference(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Invalid proof reference: empty input");
    }
    if trimmed.len() > MAX_PROOF_REFERENCE_LEN {
        bail!("Invalid proof reference: too long");
    }
    if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
        bail!("Invalid proof reference: contains whitespace or control characters");
    }
    Ok(trimmed.to_string())
}

pub fn normalize_optional_proof_reference(raw: Option<&str>) -> Result<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => normalize_proof_reference(value).map(Some),
    }
}

pub fn normalize_payment_reference(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Invalid payment reference: empty input");
    }
    if trimmed.len() > MAX_PAYMENT_REFERENCE_LEN {
        bail!("Invalid payment reference: too long");
    }
    if trimmed.chars().any(|c| c.is_control()) {
        bail!("Invalid payment reference: contains control characters");
    }
    Ok(trimmed.to_string())
}

pub fn normalize_cancellation_reason(raw: Option<&str>) -> Result<Option<String>> {
    let Some(trimmed) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if trimmed.chars().count() > MAX_CANCELLATION_REASON_LEN {
        bail!("Invalid cancellation reason: longer than {MAX_CANCELLATION_REASON_LEN} characters");
    }
    if trimmed.chars().any(|c| c.is_control() && c != '\n') {
        bail!("Invalid cancellation reason: contains control characters");
    }
    Ok(Some(trimmed.to_string()))
}
