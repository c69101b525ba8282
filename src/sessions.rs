//! Session lifecycle: sign-in, sliding authentication and sign-out.

use crate::error::{AppError, DomainError};
use crate::models::{Module, Session, User};
use crate::query::Query;
use crate::record::Row;
use crate::schema::entities::{ROLE_MODULE, SESSION, USER};
use crate::schema::SchemaModel;
use crate::service::Repository;
use crate::store::Store;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct SignIn {
    pub token: String,
    pub session: i64,
    pub user: User,
    /// Role modules ordered by `sequence`.
    pub modules: Vec<Module>,
}

#[derive(Clone, Debug)]
pub struct Authenticated {
    pub session: Session,
    pub user: User,
}

#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn Store>,
    model: Arc<SchemaModel>,
    ttl: Duration,
}

impl Sessions {
    pub fn new(store: Arc<dyn Store>, model: Arc<SchemaModel>, ttl: Duration) -> Self {
        Sessions { store, model, ttl }
    }

    fn repo(&self, entity: &'static crate::schema::EntityDef) -> Repository<'_> {
        Repository::of(&self.model, entity)
    }

    pub async fn sign_in(&self, email: &str, google_id: &str) -> Result<SignIn, AppError> {
        let mut conn = self.store.acquire().await?;
        let query = Query::new().eq("email", email).eq("googleId", google_id).limit(1);
        let Some(row) = self.repo(&USER).find_one(conn.as_mut(), &query).await? else {
            tracing::warn!(email, "sign-in for unknown user");
            return Err(DomainError::UnknownUser.into());
        };
        let user: User = row.decode()?;
        if !user.active {
            tracing::warn!(user = user.id, "sign-in for inactive user");
            return Err(DomainError::InactiveUser.into());
        }

        let grants = self
            .repo(&ROLE_MODULE)
            .find_many(
                conn.as_mut(),
                &Query::new()
                    .eq("role", user.role)
                    .populate("module", Query::new().limit(1)),
            )
            .await?;
        let mut modules = grants
            .iter()
            .filter_map(|g| g.one("module"))
            .map(Row::decode::<Module>)
            .collect::<Result<Vec<_>, _>>()?;
        modules.sort_by_key(|m| (m.sequence, m.id));

        let token = Uuid::new_v4().simple().to_string();
        let session = self
            .repo(&SESSION)
            .create(conn.as_mut(), &json!({ "token": token, "user": user.id }))
            .await?;
        let session = session.id().unwrap_or_default();
        tracing::info!(user = user.id, session, "signed in");
        Ok(SignIn {
            token,
            session,
            user,
            modules,
        })
    }

    /// Resolve a token. Sessions idle for longer than the TTL are removed; live ones have
    /// their `updatedAt` moved to `now`.
    pub async fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<Authenticated, AppError> {
        let mut conn = self.store.acquire().await?;
        let query = Query::new()
            .eq("token", token)
            .limit(1)
            .populate("user", Query::new().limit(1));
        let row = self
            .repo(&SESSION)
            .find_one(conn.as_mut(), &query)
            .await?
            .ok_or(DomainError::SessionNotFound)?;
        let session: Session = row.decode()?;
        let user: User = row
            .one("user")
            .ok_or_else(|| AppError::NotFound(format!("user of session {}", session.id)))?
            .decode()?;

        if session.updated_at + self.ttl < now {
            self.repo(&SESSION).delete_one(conn.as_mut(), session.id).await?;
            tracing::info!(session = session.id, user = user.id, "session expired");
            return Err(DomainError::SessionExpired.into());
        }
        let refreshed = self
            .repo(&SESSION)
            .update(
                conn.as_mut(),
                session.id,
                &json!({ "updatedAt": now.to_rfc3339_opts(SecondsFormat::Micros, true) }),
            )
            .await?
            .ok_or(DomainError::SessionNotFound)?;
        Ok(Authenticated {
            session: refreshed.decode()?,
            user,
        })
    }

    /// Returns false when the session was already gone.
    pub async fn sign_out(&self, session: i64) -> Result<bool, AppError> {
        let mut conn = self.store.acquire().await?;
        let removed = self.repo(&SESSION).delete_one(conn.as_mut(), session).await?;
        if removed.is_some() {
            tracing::info!(session, "signed out");
        }
        Ok(removed.is_some())
    }
}
