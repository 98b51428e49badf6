use std::sync::Arc;

use billboard_protocol::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest, Role,
};
use tracing::info;

use crate::crypto::{self, TokenKeys};
use crate::error::{AppError, Result};
use crate::models::{NewUser, User};
use crate::store::CredentialStore;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// A successful login: the signed bearer token and the user it was issued for.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone)]
pub enum AdminBootstrap {
    AlreadyPresent(User),
    Created(User),
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    tokens: TokenKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn CredentialStore>, tokens: TokenKeys) -> Self {
        Self { users, tokens }
    }

    pub fn tokens(&self) -> &TokenKeys {
        &self.tokens
    }

    /// Create an account. No token is issued; the client logs in afterwards.
    pub async fn register(&self, req: RegisterRequest) -> Result<User> {
        let (Some(username), Some(password)) = (present(req.username), present(req.password))
        else {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        };
        let role = match present(req.role) {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| AppError::Validation(e.to_string()))?,
            None => Role::default(),
        };

        // The unique index catches the race this check leaves open.
        if self.users.find_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let password_hash = crypto::hash_password(password).await?;
        let user = self
            .users
            .insert_user(NewUser {
                username,
                password_hash,
                role,
            })
            .await?;

        info!("User registered: {} ({})", user.username, user.role);
        Ok(user)
    }

    /// Missing user, missing fields and wrong password all fail the same way.
    pub async fn login(&self, req: LoginRequest) -> Result<Session> {
        let invalid = || AppError::InvalidCredentials(INVALID_CREDENTIALS.to_string());

        let (Some(username), Some(password)) = (present(req.username), present(req.password))
        else {
            return Err(invalid());
        };
        let user = self
            .users
            .find_by_username(&username)
            .await?
            .ok_or_else(invalid)?;

        if !crypto::verify_password(password, user.password_hash.clone()).await? {
            return Err(invalid());
        }

        let token = self.tokens.issue(&user)?;
        Ok(Session { token, user })
    }

    /// Reset to a random temporary password and hand it straight back.
    ///
    /// There is no out-of-band delivery: whoever knows the username gets a
    /// working password. Kept as-is until a mail channel exists.
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> Result<String> {
        let username = present(req.username)
            .ok_or_else(|| AppError::Validation("Username is required".to_string()))?;
        let user = self.existing_user(&username).await?;

        let temp_password = crypto::temporary_password();
        self.set_password(&user, temp_password.clone()).await?;

        info!("Password reset for user: {}", user.username);
        Ok(temp_password)
    }

    pub async fn change_password(&self, req: ChangePasswordRequest) -> Result<()> {
        let (Some(username), Some(current), Some(new_password)) = (
            present(req.username),
            present(req.current_password),
            present(req.new_password),
        ) else {
            return Err(AppError::Validation("All fields are required".to_string()));
        };
        let user = self.existing_user(&username).await?;

        if !crypto::verify_password(current, user.password_hash.clone()).await? {
            return Err(AppError::InvalidCredentials(
                "Current password is incorrect".to_string(),
            ));
        }

        self.set_password(&user, new_password).await?;
        info!("Password changed for user: {}", user.username);
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.users.list_users().await
    }

    /// Create the first admin account unless one already exists.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<AdminBootstrap> {
        let users = self.users.list_users().await?;
        if let Some(admin) = users.iter().find(|u| u.role == Role::Admin) {
            return Ok(AdminBootstrap::AlreadyPresent(admin.clone()));
        }

        for user in &users {
            info!("Existing user: {} ({})", user.username, user.role);
        }

        let created = self
            .register(RegisterRequest {
                username: Some(username.to_string()),
                password: Some(password.to_string()),
                role: Some(Role::Admin.as_str().to_string()),
            })
            .await?;
        Ok(AdminBootstrap::Created(created))
    }

    async fn existing_user(&self, username: &str) -> Result<User> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// The only path that writes a password: a new plaintext is always re-hashed.
    async fn set_password(&self, user: &User, plaintext: String) -> Result<()> {
        let hash = crypto::hash_password(plaintext).await?;
        if !self.users.update_password_hash(user.id, &hash).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}
