use crate::library::User;
use crate::usecases::{GetCurrentUserUseCase, LoginUseCase, LogoutUseCase, RegisterUseCase};
use tokio::sync::watch;

/// Sign-in state.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Checking or signing in.
    Loading,
    /// Signed in.
    Authenticated(User),
    /// Signed out.
    Unauthenticated,
    /// Last attempt failed.
    Error(String),
}

/// Sign-in, registration and sign-out.
pub struct AuthViewModel {
    login: LoginUseCase,
    register: RegisterUseCase,
    logout: LogoutUseCase,
    get_current_user: GetCurrentUserUseCase,

    auth_state: watch::Sender<AuthState>,
    current_user: watch::Sender<Option<User>>,
    is_loading: watch::Sender<bool>,
}

impl AuthViewModel {
    /// Create the holder in the [`AuthState::Loading`] state. Call
    /// [`AuthViewModel::check_current_user`] to resolve it.
    pub fn new(
        login: LoginUseCase,
        register: RegisterUseCase,
        logout: LogoutUseCase,
        get_current_user: GetCurrentUserUseCase,
    ) -> Self {
        Self {
            login,
            register,
            logout,
            get_current_user,
            auth_state: watch::Sender::new(AuthState::Loading),
            current_user: watch::Sender::new(None),
            is_loading: watch::Sender::new(false),
        }
    }

    /// Sign-in state.
    pub fn auth_state(&self) -> watch::Receiver<AuthState> {
        self.auth_state.subscribe()
    }

    /// Signed-in user.
    pub fn current_user(&self) -> watch::Receiver<Option<User>> {
        self.current_user.subscribe()
    }

    /// Whether an operation is running.
    pub fn is_loading(&self) -> watch::Receiver<bool> {
        self.is_loading.subscribe()
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) {
        self.is_loading.send_replace(true);
        self.auth_state.send_replace(AuthState::Loading);

        let result = self.login.execute(email, password).await;
        self.apply_sign_in(result);

        self.is_loading.send_replace(false);
    }

    /// Create an account and sign in.
    pub async fn register(&self, name: &str, email: &str, password: &str) {
        self.is_loading.send_replace(true);
        self.auth_state.send_replace(AuthState::Loading);

        let result = self.register.execute(name, email, password).await;
        self.apply_sign_in(result);

        self.is_loading.send_replace(false);
    }

    fn apply_sign_in(&self, result: crate::Result<User>) {
        match result {
            Ok(user) => {
                self.current_user.send_replace(Some(user.clone()));
                self.auth_state.send_replace(AuthState::Authenticated(user));
            }
            Err(e) => {
                self.auth_state.send_replace(AuthState::Error(e.to_string()));
            }
        }
    }

    /// Sign out.
    pub async fn logout(&self) {
        match self.logout.execute().await {
            Ok(()) => {
                self.current_user.send_replace(None);
                self.auth_state.send_replace(AuthState::Unauthenticated);
            }
            Err(e) => {
                self.auth_state.send_replace(AuthState::Error(e.to_string()));
            }
        }
    }

    /// Resolve the state from the persisted session.
    pub async fn check_current_user(&self) {
        self.is_loading.send_replace(true);

        match self.get_current_user.execute().await {
            Ok(Some(user)) => {
                self.current_user.send_replace(Some(user.clone()));
                self.auth_state.send_replace(AuthState::Authenticated(user));
            }
            Ok(None) => {
                self.auth_state.send_replace(AuthState::Unauthenticated);
            }
            Err(e) => {
                self.auth_state.send_replace(AuthState::Error(e.to_string()));
            }
        }

        self.is_loading.send_replace(false);
    }

    /// Drop a failed attempt back to signed out.
    pub fn clear_error(&self) {
        self.auth_state.send_if_modified(|state| {
            if matches!(state, AuthState::Error(_)) {
                *state = AuthState::Unauthenticated;
                true
            } else {
                false
            }
        });
    }
}
