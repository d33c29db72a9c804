//! Registration and login. Phone numbers are the account key.

use chrono::{SubsecRound, Utc};
use tracing::info;

use peerchat_shared::models::User;
use peerchat_shared::session::SessionContext;
use peerchat_shared::types::UserId;

use crate::error::{ClientError, Result};
use crate::state::{lock_db, AppState};

impl AppState {
    /// Create a local account. Does not log in.
    pub fn register(&mut self, phone: &str, username: &str, avatar: &str) -> Result<User> {
        let phone = UserId::new(phone.trim());
        if !phone.is_valid_phone() {
            return Err(ClientError::InvalidPhone(phone.0));
        }

        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::EmptyUsername);
        }

        let mut chars = avatar.trim().chars();
        let avatar = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphanumeric() => c.to_uppercase().to_string(),
            _ => return Err(ClientError::InvalidAvatar),
        };

        let db = lock_db(&self.db)?;
        if db.get_user(&phone)?.is_some() {
            return Err(ClientError::PhoneTaken);
        }
        if db.get_user_by_username(username)?.is_some() {
            return Err(ClientError::UsernameTaken);
        }

        let user = User {
            phone,
            username: username.to_string(),
            avatar,
            created_at: Utc::now().trunc_subsecs(3),
        };
        db.add_user(&user)?;

        info!(user = %user.phone.short(), username = %user.username, "User registered");
        Ok(user)
    }

    /// Log in as an existing local user and remember it across restarts.
    pub fn login(&mut self, phone: &str) -> Result<SessionContext> {
        let phone = UserId::new(phone.trim());
        let user = {
            let db = lock_db(&self.db)?;
            let user = db
                .get_user(&phone)?
                .ok_or_else(|| ClientError::UserNotFound(phone.0.clone()))?;
            db.set_current_user(&user.phone)?;
            user
        };

        info!(user = %user.phone.short(), "Logged in");
        let session = SessionContext::new(user);
        self.session = Some(session.clone());
        Ok(session)
    }

    pub fn logout(&mut self) -> Result<()> {
        lock_db(&self.db)?.clear_current_user()?;
        if let Some(session) = self.session.take() {
            info!(user = %session.user_id().short(), "Logged out");
        }
        Ok(())
    }

    /// Resume the login remembered by the store, if any.
    pub fn restore(&mut self) -> Result<Option<SessionContext>> {
        let user = {
            let db = lock_db(&self.db)?;
            match db.current_user()? {
                Some(phone) => {
                    let user = db.get_user(&phone)?;
                    if user.is_none() {
                        db.clear_current_user()?;
                    }
                    user
                }
                None => None,
            }
        };

        Ok(user.map(|user| {
            info!(user = %user.phone.short(), "Session restored");
            let session = SessionContext::new(user);
            self.session = Some(session.clone());
            session
        }))
    }
}
