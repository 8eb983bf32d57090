//! Verify command implementation.

use pushreg_core::{validate_key, validate_label, PersistedState, SyncStatus};
use std::collections::BTreeSet;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of checks run.
    pub checks: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn check(&mut self, ok: bool, error: impl FnOnce() -> String) {
        self.checks += 1;
        if !ok {
            self.errors.push(error());
        }
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks a loaded state for consistency.
pub fn verify(state: &PersistedState) -> VerifyResult {
    let mut result = VerifyResult::default();
    let registration = &state.registration;

    match registration.fingerprint() {
        Ok(fingerprint) => {
            let synced = registration.status() == SyncStatus::Synced;
            result.check(
                !synced || registration.last_synced_hash() == Some(fingerprint),
                || "status is synced but the confirmed fingerprint differs".into(),
            );
        }
        Err(e) => result.check(false, || format!("fingerprint: {e}")),
    }

    result.check(
        !registration.has_pending_deregistration()
            || registration.status() != SyncStatus::Synced,
        || "device deletion still queued while synced".into(),
    );
    result.check(
        registration.categories().iter().all(|c| !c.trim().is_empty()),
        || "blank category".into(),
    );

    let prefs = &state.preferences;
    result.check(prefs.synced_revision() <= prefs.revision(), || {
        format!(
            "synced preference revision {} is ahead of revision {}",
            prefs.synced_revision(),
            prefs.revision()
        )
    });

    let mut keys = BTreeSet::new();
    for pref in prefs.all() {
        result.check(keys.insert(pref.key.as_str()), || {
            format!("duplicate preference key {:?}", pref.key)
        });
        result.check(validate_key(&pref.key).is_ok(), || {
            format!("invalid preference key {:?}", pref.key)
        });
        result.check(validate_label(&pref.label).is_ok(), || {
            format!("invalid label for {:?}", pref.key)
        });
        if let Some(value) = &pref.value {
            result.check(value.kind() == pref.kind, || {
                format!("{:?} holds a {} value", pref.key, value.kind())
            });
        }
    }

    result
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying client state at {:?}", path);
    println!();

    let state = match super::load(path) {
        Ok(state) => state,
        Err(e) => {
            println!("✗ State could not be read: {e}");
            return Err("Verification failed".into());
        }
    };
    let result = verify(&state);

    println!("  Checks run: {}", result.checks);
    if !result.errors.is_empty() {
        println!("  Errors:");
        for err in &result.errors {
            println!("    - {}", err);
        }
    }

    println!();
    if result.is_ok() {
        println!("✓ Client state verification passed");
        Ok(())
    } else {
        println!("✗ Client state verification failed");
        Err("Verification failed".into())
    }
}
