use crate::domain::User;
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::traits::{SubscriptionRepository, UserRepository};

pub struct UserService<U: UserRepository, S: SubscriptionRepository> {
    users: U,
    subscriptions: S,
}

impl<U: UserRepository, S: SubscriptionRepository> UserService<U, S> {
    pub fn new(users: U, subscriptions: S) -> Self {
        Self {
            users,
            subscriptions,
        }
    }

    pub fn create(&self, username: &str, is_premium: bool) -> ShelfResult<User> {
        let user = self.users.create(username, is_premium)?;
        tracing::info!(user = %user, is_premium, "Created user");
        Ok(user)
    }

    /// Look up a user by name, failing when there is none.
    pub fn find(&self, username: &str) -> ShelfResult<User> {
        self.users
            .get_by_username(username.trim())?
            .ok_or_else(|| ShelfError::UserNotFound(username.to_string()))
    }

    /// Upgrade the account and switch on every one of its subscriptions.
    pub fn activate_premium(&self, user: &User) -> ShelfResult<User> {
        self.users.set_premium(user.id, true)?;
        let activated = self.subscriptions.activate_all_for_user(user.id)?;
        tracing::info!(user = %user, activated, "Activated premium account");

        Ok(User {
            is_premium: true,
            ..user.clone()
        })
    }
}
