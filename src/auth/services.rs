pub(crate) use crate::auth::dto::JwtKeys;
use crate::{
    analytics::scope::CourseScope,
    auth::{claims::Claims, dto::PublicUser, extractors::CurrentUser},
    config::JwtConfig,
    db::User,
    error::AppError,
    state::AppState,
    store::DiscussionStore,
};
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

/// Login id reserved for the administrative account.
pub const ADMIN_LOGIN_ID: &str = "admin";

pub const SESSION_COOKIE: &str = "access_token";

const MAX_LOGIN_ID_CHARS: usize = 255;

/// Shape check only; whether the id exists is up to the store lookup.
pub(crate) fn is_valid_login_id(login_id: &str) -> bool {
    !login_id.is_empty()
        && login_id.chars().count() <= MAX_LOGIN_ID_CHARS
        && !login_id.chars().any(char::is_control)
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: i64) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

/// Resolves a login id to a registered user.
pub async fn authenticate(store: &dyn DiscussionStore, login_id: &str) -> Result<User, AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(login) = store.find_login(login_id).await? else {
        warn!(login_id, "login unknown id");
        return Err(invalid());
    };
    let Some(user) = store.find_user(login.user_id).await? else {
        warn!(login_id, user_id = login.user_id, "login points at missing user");
        return Err(invalid());
    };
    if !user.is_registered() {
        warn!(login_id, user_id = user.user_id, state = %user.user_state, "login user not registered");
        return Err(invalid());
    }
    Ok(user)
}

/// Loads a user with the role flags the analytics layer needs.
pub async fn resolve_current_user(
    store: &dyn DiscussionStore,
    user_id: i64,
) -> Result<CurrentUser, AppError> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    let login_id = store
        .login_for_user(user.user_id)
        .await?
        .map(|l| l.user_login_id);
    let is_admin = login_id.as_deref() == Some(ADMIN_LOGIN_ID);
    let is_instructor = store.has_teacher_enrollment(user.user_id).await?;
    Ok(CurrentUser {
        user,
        login_id,
        is_admin,
        is_instructor,
    })
}

/// Admins see every course; everyone else sees their active enrollments.
pub async fn course_scope(
    store: &dyn DiscussionStore,
    current: &CurrentUser,
) -> Result<CourseScope, AppError> {
    if current.is_admin {
        return Ok(CourseScope::All);
    }
    let ids = store.active_course_ids(current.user.user_id).await?;
    Ok(CourseScope::Enrolled(ids.into_iter().collect()))
}

impl CurrentUser {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            user_id: self.user.user_id,
            user_name: self.user.user_name.clone(),
            login_id: self.login_id.clone(),
            is_admin: self.is_admin,
            is_instructor: self.is_instructor,
        }
    }
}

pub fn session_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod login_tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::default()
            .user(1, "Ada", "registered")
            .user(2, "Ben", "deleted")
            .user(3, "Root", "registered")
            .course(1, "Algebra")
            .course(2, "Biology")
            .enroll(1, 1, "student", "active")
            .enroll(1, 2, "student", "deleted")
            .enroll(3, 2, "teacher", "active")
            .login(1, "ada")
            .login(2, "ben")
            .login(3, ADMIN_LOGIN_ID)
    }

    #[test]
    fn login_id_validation() {
        assert!(is_valid_login_id("instructor1"));
        assert!(is_valid_login_id("a.b-c_d@x"));
        assert!(is_valid_login_id("josé.garcía"));
        assert!(is_valid_login_id("o'brien mary"));
        assert!(!is_valid_login_id(""));
        assert!(!is_valid_login_id("tab\there"));
        assert!(!is_valid_login_id(&"x".repeat(256)));
    }

    #[tokio::test]
    async fn authenticate_accepts_registered_users_only() {
        let store = store();
        let user = authenticate(&store, "ada").await.unwrap();
        assert_eq!(user.user_id, 1);

        assert!(matches!(
            authenticate(&store, "ben").await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
        assert!(matches!(
            authenticate(&store, "nobody").await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn roles_and_scope() {
        let store = store();
        let ada = resolve_current_user(&store, 1).await.unwrap();
        assert!(!ada.is_admin);
        assert!(!ada.is_instructor);
        assert_eq!(
            course_scope(&store, &ada).await.unwrap(),
            CourseScope::Enrolled([1].into_iter().collect())
        );

        let root = resolve_current_user(&store, 3).await.unwrap();
        assert!(root.is_admin);
        assert!(root.is_instructor);
        assert_eq!(course_scope(&store, &root).await.unwrap(), CourseScope::All);
        assert_eq!(root.public().login_id.as_deref(), Some("admin"));

        assert!(matches!(
            resolve_current_user(&store, 42).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc", Duration::from_secs(1800), true);
        assert!(cookie.starts_with("access_token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=1800"));
        assert!(cookie.ends_with("; Secure"));
        assert!(expired_session_cookie().contains("Max-Age=0"));
    }
}
