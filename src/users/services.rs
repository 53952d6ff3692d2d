use tracing::{info, warn};

use super::{
    dto::UpdateUserRequest,
    model::{NewUser, PublicUser},
    validate::{self, Credentials, Registration},
};
use crate::{
    auth::password::{hash_password_blocking, verify_password_blocking},
    error::AppError,
    state::AppState,
};

/// Creates a user. The email is checked before any hashing work is done.
pub async fn register(state: &AppState, reg: Registration) -> Result<PublicUser, AppError> {
    if state.users.find_by_email(&reg.email).await?.is_some() {
        warn!("registration with an email already in use");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password_blocking(reg.password).await?;
    let user = state
        .users
        .insert(NewUser {
            name: reg.name,
            email: reg.email,
            password_hash,
            date_of_birth: reg.date_of_birth,
            age: reg.age,
            gender: reg.gender,
        })
        .await?;

    info!(user_id = user.id, "user registered");
    Ok(user.into())
}

/// Returns a signed token. Unknown email and wrong password fail the same
/// way and cost the same hashing work.
pub async fn login(state: &AppState, creds: Credentials) -> Result<String, AppError> {
    let user = state.users.find_by_email(&creds.email).await?;
    let stored = user.as_ref().map(|u| u.password_hash.clone());

    let ok = verify_password_blocking(creds.password, stored).await;
    let user = match user {
        Some(u) if ok => u,
        _ => {
            warn!("login rejected");
            return Err(AppError::InvalidCredentials);
        }
    };

    let token = state.jwt.issue(user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(token)
}

pub async fn list(state: &AppState) -> Result<Vec<PublicUser>, AppError> {
    let users = state.users.list().await?;
    Ok(users.into_iter().map(PublicUser::from).collect())
}

pub async fn get(state: &AppState, id: i64) -> Result<PublicUser, AppError> {
    state
        .users
        .find_by_id(id)
        .await?
        .map(PublicUser::from)
        .ok_or(AppError::NotFound)
}

/// Changes name and email. An unknown id is reported before the body is
/// looked at; moving to an email owned by another user is a duplicate.
pub async fn update(
    state: &AppState,
    id: i64,
    req: UpdateUserRequest,
) -> Result<PublicUser, AppError> {
    if state.users.find_by_id(id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let upd = validate::profile_update(req)?;

    if let Some(owner) = state.users.find_by_email(&upd.email).await? {
        if owner.id != id {
            return Err(AppError::DuplicateEmail);
        }
    }

    let user = state
        .users
        .update(id, &upd.name, &upd.email)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(user_id = user.id, "user updated");
    Ok(user.into())
}

pub async fn delete(state: &AppState, id: i64) -> Result<(), AppError> {
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id = id, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;

    fn registration(email: &str) -> Registration {
        Registration {
            name: "Ada".into(),
            email: email.into(),
            password: "secret1".into(),
            date_of_birth: None,
            age: Some(33),
            gender: Some("f".into()),
        }
    }

    fn profile(name: &str, email: &str) -> UpdateUserRequest {
        UpdateUserRequest {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_stores_hash_not_plaintext() {
        let (state, _) = AppState::fake();
        let created = register(&state, registration("ada@x.com")).await.unwrap();
        let stored = state.users.find_by_id(created.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
        assert!(verify_password("secret1", &stored.password_hash));
    }

    #[tokio::test]
    async fn duplicate_email_keeps_one_record() {
        let (state, store) = AppState::fake();
        register(&state, registration("ada@x.com")).await.unwrap();
        let err = register(&state, registration("ada@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
        assert_eq!(store.count_by_email("ada@x.com"), 1);
    }

    #[tokio::test]
    async fn login_issues_token_for_the_user() {
        let (state, _) = AppState::fake();
        let created = register(&state, registration("ada@x.com")).await.unwrap();
        let token = login(&state, creds("ada@x.com", "secret1")).await.unwrap();
        assert_eq!(state.jwt.verify(&token).unwrap().sub, created.id);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_fail_alike() {
        let (state, _) = AppState::fake();
        register(&state, registration("ada@x.com")).await.unwrap();

        let unknown = login(&state, creds("bob@x.com", "secret1")).await.unwrap_err();
        let wrong = login(&state, creds("ada@x.com", "secret2")).await.unwrap_err();
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn update_missing_user_creates_nothing() {
        let (state, store) = AppState::fake();
        let upd = profile("Ghost", "ghost@x.com");
        assert!(matches!(update(&state, 42, upd).await, Err(AppError::NotFound)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found_before_body_checks() {
        let (state, _) = AppState::fake();
        register(&state, registration("ada@x.com")).await.unwrap();

        let taken = profile("Ghost", "ada@x.com");
        assert!(matches!(update(&state, 99, taken).await, Err(AppError::NotFound)));

        let empty = UpdateUserRequest::default();
        assert!(matches!(update(&state, 99, empty).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn update_existing_user_still_validates_body() {
        let (state, _) = AppState::fake();
        let ada = register(&state, registration("ada@x.com")).await.unwrap();
        let err = update(&state, ada.id, UpdateUserRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn update_rejects_email_of_another_user() {
        let (state, _) = AppState::fake();
        register(&state, registration("ada@x.com")).await.unwrap();
        let bob = register(&state, registration("bob@x.com")).await.unwrap();
        let upd = profile("Bob", "ada@x.com");
        assert!(matches!(update(&state, bob.id, upd).await, Err(AppError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn update_may_keep_own_email() {
        let (state, _) = AppState::fake();
        let ada = register(&state, registration("ada@x.com")).await.unwrap();
        let upd = profile("Ada Lovelace", "ada@x.com");
        let updated = update(&state, ada.id, upd).await.unwrap();
        assert_eq!(updated.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let (state, _) = AppState::fake();
        let ada = register(&state, registration("ada@x.com")).await.unwrap();
        delete(&state, ada.id).await.unwrap();
        assert!(matches!(delete(&state, ada.id).await, Err(AppError::NotFound)));
        assert!(matches!(get(&state, ada.id).await, Err(AppError::NotFound)));
    }
}
