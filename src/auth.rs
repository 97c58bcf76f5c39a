//! Authentication module: email/password accounts and the signed-in user.

use crate::db::{Database, Session, UserAccount, now_timestamp};
use crate::error::{AppError, Result};
use crate::library::User;
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a secure random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidFormat(
            "The email address is badly formatted".to_string(),
        ))
    }
}

/// The signed-in user, shared by every service of a process.
#[derive(Clone, Default)]
pub struct CurrentUser {
    inner: Arc<RwLock<Option<User>>>,
}

impl CurrentUser {
    /// Signed-in user, if any.
    pub fn get(&self) -> Option<User> {
        self.inner.read().clone()
    }

    /// ID of the signed-in user, or an error when signed out.
    pub fn require_id(&self) -> Result<String> {
        self.inner
            .read()
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or_else(|| AppError::Unauthorized("User is not signed in".to_string()))
    }

    pub(crate) fn set(&self, user: User) {
        *self.inner.write() = Some(user);
    }

    pub(crate) fn clear(&self) {
        *self.inner.write() = None;
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    session_duration_days: u32,
    session_file: Option<PathBuf>,
    current: CurrentUser,
    token: Arc<RwLock<Option<String>>>,
}

impl AuthService {
    /// Create a new auth service. When `session_file` is set the session
    /// token is persisted there and restored by [`AuthService::current_user`].
    pub fn new(db: Database, session_duration_days: u32, session_file: Option<PathBuf>) -> Self {
        Self {
            db,
            session_duration_days,
            session_file,
            current: CurrentUser::default(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Handle to the signed-in user.
    pub fn current(&self) -> CurrentUser {
        self.current.clone()
    }

    /// Create an account and sign in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let this = self.clone();
        let (name, email, password) = (name.to_string(), email.to_string(), password.to_string());
        tokio::task::spawn_blocking(move || this.register_blocking(&name, &email, &password))
            .await?
    }

    fn register_blocking(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        validate_email(&email)?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::InvalidFormat(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let account = UserAccount {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password_hash: hash_password(password)?,
            name: name.trim().to_string(),
            avatar_url: None,
            phone_number: None,
            created_at: now_timestamp(),
            last_login: None,
        };

        self.db.create_user(&account)?;
        tracing::info!(user_id = %account.id, "Registered user");

        self.open_session(account)
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let this = self.clone();
        let (email, password) = (email.to_string(), password.to_string());
        tokio::task::spawn_blocking(move || this.login_blocking(&email, &password)).await?
    }

    fn login_blocking(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        let account = self.db.get_user_by_email(&email)?.ok_or_else(invalid)?;
        if !verify_password(password, &account.password_hash)? {
            return Err(invalid());
        }

        self.db.update_user_last_login(&account.id)?;
        tracing::info!(user_id = %account.id, "User signed in");

        self.open_session(account)
    }

    fn open_session(&self, account: UserAccount) -> Result<User> {
        let expired = self.db.cleanup_expired_sessions()?;
        if expired > 0 {
            tracing::debug!(expired, "Removed expired sessions");
        }

        let token = generate_token();
        let expires_at = now_timestamp() + (self.session_duration_days as i64 * 24 * 60 * 60);

        self.db.create_session(&Session {
            token: token.clone(),
            user_id: account.id.clone(),
            expires_at,
        })?;

        if let Some(path) = &self.session_file {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &token)?;
        }

        let user = User::from(account);
        *self.token.write() = Some(token);
        self.current.set(user.clone());
        Ok(user)
    }

    /// Sign out and forget the persisted session.
    pub async fn logout(&self) -> Result<()> {
        let token = self.token.write().take().or_else(|| self.read_session_file());
        if let Some(token) = token {
            self.db.delete_session(&token)?;
        }

        if let Some(path) = &self.session_file {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(user) = self.current.get() {
            tracing::info!(user_id = %user.id, "User signed out");
        }
        self.current.clear();
        Ok(())
    }

    /// The signed-in user, restoring a persisted session when needed.
    pub async fn current_user(&self) -> Result<Option<User>> {
        if let Some(user) = self.current.get() {
            return Ok(Some(user));
        }

        let Some(token) = self.read_session_file() else {
            return Ok(None);
        };

        match self.validate_token(&token)? {
            Some(account) => {
                let user = User::from(account);
                *self.token.write() = Some(token);
                self.current.set(user.clone());
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Validate a session token and return the account.
    pub fn validate_token(&self, token: &str) -> Result<Option<UserAccount>> {
        let session = match self.db.get_session(token)? {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.expires_at < now_timestamp() {
            self.db.delete_session(token)?;
            return Ok(None);
        }

        self.db.get_user_by_id(&session.user_id)
    }

    /// Refresh the in-memory user after a profile change.
    pub(crate) fn refresh_current(&self, user: User) {
        if self.current.get().is_some_and(|u| u.id == user.id) {
            self.current.set(user);
        }
    }

    fn read_session_file(&self) -> Option<String> {
        let path = self.session_file.as_ref()?;
        let token = std::fs::read_to_string(path).ok()?;
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}
