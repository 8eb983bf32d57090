//! Inspect command implementation.

use pushreg_core::PersistedState;
use serde::Serialize;
use std::path::Path;

/// Client state inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// State directory.
    pub path: String,
    /// Device ID.
    pub device_id: String,
    /// Registration status.
    pub status: String,
    /// Hex-encoded push token.
    pub device_token: Option<String>,
    /// Registered user ID.
    pub user_id: Option<String>,
    /// Registered categories, sorted.
    pub categories: Vec<String>,
    /// Fingerprint of the current registration.
    pub fingerprint: String,
    /// Fingerprint last confirmed by the server.
    pub last_synced_hash: Option<String>,
    /// Whether the server holds the current registration.
    pub in_sync: bool,
    /// Error of the last failed attempt.
    pub last_error: Option<String>,
    /// Whether a device deletion is queued.
    pub pending_deregistration: bool,
    /// Number of declared preferences.
    pub preference_count: usize,
    /// Whether preferences changed since the last confirmed sync.
    pub preferences_dirty: bool,
}

/// Builds the inspection result for `state`.
pub fn inspect(path: &Path, state: &PersistedState) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let registration = &state.registration;
    let fingerprint = registration.fingerprint()?;
    let last_synced_hash = registration.last_synced_hash();

    Ok(InspectResult {
        path: path.display().to_string(),
        device_id: state.device_id.to_string(),
        status: registration.status().to_string(),
        device_token: registration.device_token().map(hex::encode),
        user_id: registration.user_id().map(String::from),
        categories: registration.categories().iter().cloned().collect(),
        fingerprint: fingerprint.to_hex(),
        last_synced_hash: last_synced_hash.map(|h| h.to_hex()),
        in_sync: last_synced_hash == Some(fingerprint) && !state.preferences.is_dirty(),
        last_error: registration.last_error().map(|e| e.to_string()),
        pending_deregistration: registration.has_pending_deregistration(),
        preference_count: state.preferences.len(),
        preferences_dirty: state.preferences.is_dirty(),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let state = super::load(path)?;
    let result = inspect(path, &state)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Client state at {}", result.path);
    println!();
    println!("Identity:");
    println!("  Device ID:      {}", result.device_id);
    println!(
        "  Push token:     {}",
        result.device_token.as_deref().unwrap_or("(none)")
    );
    println!();
    println!("Registration:");
    println!("  Status:         {}", result.status);
    println!(
        "  User ID:        {}",
        result.user_id.as_deref().unwrap_or("(none)")
    );
    if result.categories.is_empty() {
        println!("  Categories:     (none)");
    } else {
        println!("  Categories:     {}", result.categories.join(", "));
    }
    println!("  Fingerprint:    {}", result.fingerprint);
    println!(
        "  Last synced:    {}",
        result.last_synced_hash.as_deref().unwrap_or("(never)")
    );
    println!("  In sync:        {}", if result.in_sync { "yes" } else { "no" });
    if let Some(error) = &result.last_error {
        println!("  Last error:     {}", error);
    }
    if result.pending_deregistration {
        println!("  Device deletion queued");
    }
    println!();
    println!("Preferences:");
    println!("  Declared:       {}", result.preference_count);
    println!(
        "  Unsynced:       {}",
        if result.preferences_dirty { "yes" } else { "no" }
    );
}
