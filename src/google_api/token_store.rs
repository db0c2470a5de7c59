//! OAuth token storage (token.json file backend).

use std::path::Path;

use super::{GoogleApiError, GoogleToken};

pub fn load_token_from(path: &Path) -> Result<GoogleToken, GoogleApiError> {
    if !path.exists() {
        return Err(GoogleApiError::TokenNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let token: GoogleToken = serde_json::from_str(&content)?;
    Ok(token)
}

/// Persist a token. The directory is created owner-only and the file is
/// written via temp-file + rename so a crash never leaves half a token.
pub fn save_token_to(path: &Path, token: &GoogleToken) -> Result<(), GoogleApiError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
            }
        }
    }

    let content = serde_json::to_string_pretty(token)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, path)?;
    log::info!("Saved Google token to {}", path.display());
    Ok(())
}

/// Remove the token file. Missing file is not an error.
pub fn delete_token_at(path: &Path) -> Result<(), GoogleApiError> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
