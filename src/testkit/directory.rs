//! User-directory doubles for tests.

use std::collections::HashSet;

use crate::domain::UserId;
use crate::error::Result;
use crate::port::UserDirectory;

/// Directory that knows a fixed set of users.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: HashSet<UserId>,
}

impl StaticDirectory {
    /// Directory containing exactly the given users.
    pub fn with_users<I, U>(users: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl UserDirectory for StaticDirectory {
    async fn exists(&self, user: &UserId) -> Result<bool> {
        Ok(self.users.contains(user))
    }
}

/// Directory that accepts every user id.
#[derive(Debug, Default)]
pub struct AllowAllDirectory;

impl UserDirectory for AllowAllDirectory {
    async fn exists(&self, _user: &UserId) -> Result<bool> {
        Ok(true)
    }
}
