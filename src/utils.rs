// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Small helpers shared across the crate.

/// Characters of a token that may appear in logs.
const TOKEN_VISIBLE_PREFIX: usize = 6;

/// Mask a session token for logging: keep a short prefix, hide the rest.
///
/// ```
/// use clinic_session::utils::mask_token;
///
/// assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.payload.sig"), "eyJhbG...");
/// ```
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= TOKEN_VISIBLE_PREFIX {
        return "...".to_string();
    }
    let prefix: String = token.chars().take(TOKEN_VISIBLE_PREFIX).collect();
    format!("{}...", prefix)
}

/// Shorten free text to `max` characters for table output.
pub fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
