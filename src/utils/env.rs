/// Get environment variable with TENANTPAY_ prefix, falling back to unprefixed version
///
/// # Examples
///
/// ```rust
/// use tenantpay::utils::get_env_with_prefix;
///
/// // Checks TENANTPAY_LOG_LEVEL first, then LOG_LEVEL
/// let level = get_env_with_prefix("LOG_LEVEL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("TENANTPAY_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}
