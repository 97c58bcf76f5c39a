use super::OperationResult;
use crate::library::User;
use crate::usecases::{GetUserUseCase, UpdateAvatarUseCase, UpdateUserUseCase};
use std::path::Path;
use tokio::sync::watch;

/// Profile display and editing.
pub struct ProfileViewModel {
    get_user: GetUserUseCase,
    update_user: UpdateUserUseCase,
    update_avatar: UpdateAvatarUseCase,

    user_state: watch::Sender<Option<OperationResult<User>>>,
    is_loading: watch::Sender<bool>,
    is_editing: watch::Sender<bool>,
}

impl ProfileViewModel {
    /// Create the holder. Call [`ProfileViewModel::load_user`] to populate it.
    pub fn new(
        get_user: GetUserUseCase,
        update_user: UpdateUserUseCase,
        update_avatar: UpdateAvatarUseCase,
    ) -> Self {
        Self {
            get_user,
            update_user,
            update_avatar,
            user_state: watch::Sender::new(None),
            is_loading: watch::Sender::new(false),
            is_editing: watch::Sender::new(false),
        }
    }

    /// Profile of the signed-in user.
    pub fn user_state(&self) -> watch::Receiver<Option<OperationResult<User>>> {
        self.user_state.subscribe()
    }

    /// Whether an operation is running.
    pub fn is_loading(&self) -> watch::Receiver<bool> {
        self.is_loading.subscribe()
    }

    /// Whether the profile is being edited.
    pub fn is_editing(&self) -> watch::Receiver<bool> {
        self.is_editing.subscribe()
    }

    /// Load the profile.
    pub async fn load_user(&self) {
        self.is_loading.send_replace(true);
        let result = self.get_user.execute().await;
        self.user_state.send_replace(Some(result.into()));
        self.is_loading.send_replace(false);
    }

    /// Save profile edits and leave edit mode.
    pub async fn update_user(&self, user: &User) {
        self.is_loading.send_replace(true);

        match self.update_user.execute(user).await {
            Ok(()) => {
                self.user_state
                    .send_replace(Some(OperationResult::Success(user.clone())));
                self.is_editing.send_replace(false);
            }
            Err(e) => {
                self.user_state
                    .send_replace(Some(OperationResult::Error(e.to_string())));
            }
        }

        self.is_loading.send_replace(false);
    }

    /// Upload a new avatar image, then reload the profile.
    pub async fn update_avatar(&self, image: &Path) {
        self.is_loading.send_replace(true);

        match self.update_avatar.execute(image).await {
            Ok(_) => self.load_user().await,
            Err(e) => {
                self.user_state
                    .send_replace(Some(OperationResult::Error(e.to_string())));
            }
        }

        self.is_loading.send_replace(false);
    }

    /// Enter or leave edit mode.
    pub fn set_editing(&self, editing: bool) {
        self.is_editing.send_replace(editing);
    }

    /// Forget the loaded profile.
    pub fn clear_state(&self) {
        self.user_state.send_replace(None);
    }
}
