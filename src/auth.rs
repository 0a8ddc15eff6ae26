//! OAuth2 credential management for the Gmail API

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::{GmailError, Result};

/// Read-only scope; listing and header metadata need nothing more
pub const READONLY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.readonly"];

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Persisted OAuth token plus the client secret needed to refresh it
///
/// The token blob itself is opaque: yup-oauth2 writes it, refreshes it in
/// place when it expires and rewrites it after every change.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials_path: PathBuf,
    token_path: PathBuf,
    redirect_port: u16,
}

impl CredentialStore {
    pub fn new(
        credentials_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
        redirect_port: u16,
    ) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
            redirect_port,
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Read the persisted token blob, `None` if absent or unreadable
    pub async fn load(&self) -> Option<serde_json::Value> {
        let content = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                error!("Failed to read token cache {:?}: {}", self.token_path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(blob) => Some(blob),
            Err(e) => {
                error!("Token cache {:?} is not valid JSON: {}", self.token_path, e);
                None
            }
        }
    }

    /// Write the token blob, readable by the owner only
    pub async fn save(&self, blob: &serde_json::Value) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(blob)?;
        tokio::fs::write(&self.token_path, json).await?;
        secure_token_file(&self.token_path).await?;
        Ok(())
    }

    /// Make sure a usable token exists and return an authenticated hub
    ///
    /// An expired token with a refresh token is refreshed silently;
    /// otherwise the browser flow runs and this blocks until the user
    /// completes it on the local redirect port. Without a client secret
    /// file nothing can be refreshed or authorized, so that is fatal.
    pub async fn ensure_valid(&self) -> Result<GmailHub> {
        if !self.credentials_path.exists() {
            return Err(GmailError::AuthError(format!(
                "Client secret file {:?} not found. Download OAuth desktop credentials from the Google Cloud console.",
                self.credentials_path
            )));
        }

        let secret = yup_oauth2::read_application_secret(&self.credentials_path)
            .await
            .map_err(|e| GmailError::AuthError(format!("Failed to read credentials: {}", e)))?;

        if self.load().await.is_some() {
            info!("Using cached token from {:?}", self.token_path);
        } else {
            info!(
                "No cached token, starting browser authorization on port {}",
                self.redirect_port
            );
        }

        if let Some(parent) = self.token_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPPortRedirect(self.redirect_port),
        )
        .persist_tokens_to_disk(&self.token_path)
        .build()
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

        // Refreshes or authorizes now so later concurrent calls hit a warm cache
        let _token = auth
            .token(READONLY_SCOPES)
            .await
            .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;

        if let Some(blob) = self.load().await {
            self.save(&blob).await?;
        }

        // HTTP/1 works better with google-gmail1
        let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(
                hyper_rustls::HttpsConnectorBuilder::new()
                    .with_native_roots()
                    .map_err(|e| {
                        GmailError::AuthError(format!("Failed to load TLS roots: {}", e))
                    })?
                    .https_or_http()
                    .enable_http1()
                    .build(),
            );

        Ok(Gmail::new(client, auth))
    }
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs instead of Unix permissions
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
