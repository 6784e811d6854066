//! Signing in and out, and keeping the session across restarts.
//!
//! The session is saved next to the settings after every sign-in and again
//! on [`close`](Library::close), which picks up tokens refreshed in between.
//! [`open`](Library::open) hands the saved session back to the backend
//! without a network call; an expired access token is refreshed the first
//! time the backend rejects it.

use crate::error::{ErrorKind, Result};
use crate::{Library, blocking};
use sastra_remote::error::Error as RemoteError;
use sastra_remote::{AuthInfo, Session};
use tracing::instrument;

fn auth_error(err: RemoteError) -> crate::error::Error {
    let message = err.message();
    err.raise(ErrorKind::Auth(message))
}

impl Library {
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthInfo> {
        let info = self.remote.login(email, password).await.map_err(auth_error)?;
        self.keep_session().await;
        Ok(info)
    }

    /// Register an account. Signed out until the address is confirmed when
    /// the backend asks for confirmation.
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<AuthInfo> {
        let info = self.remote.signup(email, password, display_name).await.map_err(auth_error)?;
        self.keep_session().await;
        Ok(info)
    }

    /// Sign in with the tokens a provider redirect carried; see
    /// [`RemoteClient::login_with_provider`](sastra_remote::RemoteClient::login_with_provider).
    pub async fn complete_provider_login(&self, access_token: &str, refresh_token: Option<&str>) -> Result<AuthInfo> {
        let info = self.remote.complete_provider_login(access_token, refresh_token).await.map_err(auth_error)?;
        self.keep_session().await;
        Ok(info)
    }

    /// Sign out and forget the saved session, even when the backend refuses
    /// the sign-out.
    pub async fn sign_out(&self) -> Result<()> {
        let signed_out = self.remote.logout().await.map_err(auth_error);
        if let Some(file) = self.session_file.clone()
            && let Err(err) = blocking(move || file.clear()).await
        {
            tracing::warn!(error = ?err, "Failed to forget saved session");
        }
        signed_out
    }

    /// Write the current session to the session file, or remove the file
    /// when signed out.
    #[instrument(skip_all)]
    pub async fn save_session(&self) -> Result<()> {
        let Some(file) = self.session_file.clone() else {
            return Ok(());
        };
        match self.remote.current_session().await {
            Some(session) => blocking(move || file.save(&session)).await,
            None => blocking(move || file.clear()).await,
        }
    }

    /// Adopt the session saved by an earlier run. Returns whether one was
    /// restored; an unreadable file is logged and leaves the reader signed
    /// out.
    #[instrument(skip_all)]
    pub async fn restore_session(&self) -> bool {
        let Some(file) = self.session_file.clone() else {
            return false;
        };
        let session = match blocking(move || file.load::<Session>()).await {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(error = ?err, "Ignoring unreadable saved session");
                return false;
            },
        };
        match self.remote.restore_session(session).await {
            Ok(()) => {
                tracing::info!("Restored saved session");
                true
            },
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to restore saved session");
                false
            },
        }
    }

    async fn keep_session(&self) {
        if let Err(err) = self.save_session().await {
            tracing::warn!(error = ?err, "Failed to save session");
        }
    }
}
