//! Profile of the signed-in user.

use crate::auth::AuthService;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::library::User;
use crate::storage::{DocumentStore, TransferManager};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;

const USERS_COLLECTION: &str = "users";

/// Reads and edits the current user's profile.
#[derive(Clone)]
pub struct UserService {
    db: Database,
    auth: AuthService,
    documents: DocumentStore,
    transfers: Arc<TransferManager>,
}

impl UserService {
    /// Create the service.
    pub fn new(
        db: Database,
        auth: AuthService,
        documents: DocumentStore,
        transfers: Arc<TransferManager>,
    ) -> Self {
        Self {
            db,
            auth,
            documents,
            transfers,
        }
    }

    /// The signed-in user as stored in the account table.
    pub async fn get_user(&self) -> Result<User> {
        let not_found = || AppError::NotFound("User not found".to_string());

        let id = self.auth.current().require_id().map_err(|_| not_found())?;
        let account = self.db.get_user_by_id(&id)?.ok_or_else(not_found)?;
        Ok(User::from(account))
    }

    /// Save name, avatar and phone of `user`. Only the signed-in user can be edited.
    pub async fn update_user(&self, user: &User) -> Result<()> {
        let current_id = self.auth.current().require_id()?;
        if current_id != user.id {
            return Err(AppError::Unauthorized(
                "Cannot edit another user's profile".to_string(),
            ));
        }

        let updated = self.db.update_user_profile(
            &user.id,
            &user.name,
            user.avatar_image_url.as_deref(),
            user.phone_number.as_deref(),
        )?;
        if !updated {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let mut fields = Map::new();
        fields.insert("id".into(), json!(user.id));
        fields.insert("name".into(), json!(user.name));
        fields.insert("email".into(), json!(user.email));
        fields.insert("avatarImageUrl".into(), json!(user.avatar_image_url));
        fields.insert("phoneNumber".into(), json!(user.phone_number));
        self.documents.merge(USERS_COLLECTION, &user.id, fields).await?;

        self.auth.refresh_current(user.clone());
        tracing::info!(user_id = %user.id, "Updated profile");
        Ok(())
    }

    /// Upload a new avatar image and return its URL.
    pub async fn update_avatar_image(&self, image: &Path) -> Result<String> {
        let user_id = self.auth.current().require_id()?;

        if !image.is_file() {
            return Err(AppError::NotFound(format!(
                "Image not found: {}",
                image.display()
            )));
        }

        let key = format!("avatars/{}", user_id);
        self.transfers
            .upload(key.clone(), image.to_path_buf())
            .wait()
            .await?;

        let url = self.transfers.store().public_url(&key);
        if !self.db.update_user_avatar(&user_id, &url)? {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let mut fields = Map::new();
        fields.insert("avatarImageUrl".into(), Value::String(url.clone()));
        self.documents.merge(USERS_COLLECTION, &user_id, fields).await?;

        if let Some(account) = self.db.get_user_by_id(&user_id)? {
            self.auth.refresh_current(User::from(account));
        }

        tracing::info!(user_id = %user_id, %url, "Updated avatar");
        Ok(url)
    }
}
