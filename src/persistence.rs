//! On-disk VAPID key storage.
//!
//! The file format follows the extension: `.pem` holds a SEC1
//! `EC PRIVATE KEY` block, anything else the JSON form
//! (`{ "publicKey", "privateKey", "subject" }`). Files are written with
//! mode 0600 on unix.
//!
//! A key file that exists but cannot be parsed is an error. Regenerating in
//! that case would silently orphan every browser subscription made against
//! the old public key.

// Rust guideline compliant 2026-02

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use zeroize::Zeroizing;

use crate::keys::{KeyPair, StoredKeyPair};

/// Whether `path` should hold PEM rather than JSON.
fn is_pem(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pem"))
}

/// Load a key pair, or `None` if the file does not exist.
///
/// A non-empty `subject` replaces whatever the file carries (PEM carries
/// none). JSON files holding a legacy DER private key are rewritten in the
/// raw-scalar form.
pub fn load(path: &Path, subject: &str) -> Result<Option<KeyPair>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = Zeroizing::new(
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read VAPID key file {}", path.display()))?,
    );

    let key_pair = if is_pem(path) {
        KeyPair::import_pem(&content, subject)
            .with_context(|| format!("Failed to parse VAPID PEM {}", path.display()))?
    } else {
        let stored: StoredKeyPair = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse VAPID key file {}", path.display()))?;
        let key_pair = KeyPair::from_stored(&stored)
            .with_context(|| format!("Invalid VAPID keys in {}", path.display()))?;

        // Re-save so legacy migration only happens once.
        if key_pair.private_key_base64url().as_str() != stored.private_key {
            save(path, &key_pair)?;
        }

        if subject.is_empty() {
            key_pair
        } else {
            key_pair.with_subject(subject)
        }
    };

    log::info!("[WebPush] Loaded VAPID keys from {}", path.display());
    Ok(Some(key_pair))
}

/// Write a key pair, creating parent directories as needed.
pub fn save(path: &Path, key_pair: &KeyPair) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create VAPID key directory")?;
    }

    let content = if is_pem(path) {
        key_pair.export_pem().context("Failed to encode VAPID PEM")?
    } else {
        key_pair.to_json().context("Failed to serialize VAPID keys")?
    };
    fs::write(path, content.as_bytes()).context("Failed to write VAPID key file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).context("Failed to set VAPID key file permissions")?;
    }

    log::debug!("[WebPush] Saved VAPID keys to {}", path.display());
    Ok(())
}

/// Load the key pair at `path`, generating and saving a new one if absent.
pub fn load_or_create(path: &Path, subject: &str) -> Result<KeyPair> {
    if let Some(key_pair) = load(path, subject)? {
        return Ok(key_pair);
    }

    let key_pair = KeyPair::generate(subject);
    save(path, &key_pair)?;
    log::info!("[WebPush] Created VAPID keys at {}", path.display());
    Ok(key_pair)
}
