use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::web::ApiError;

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct SubscriberRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberCreate {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub async fn create(pool: &PgPool, data: SubscriberCreate) -> Result<SubscriberRow, ApiError> {
    let email = data.email.trim().to_lowercase();
    validate_email(&email)?;
    let name = data.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("Name must not be empty"));
    }

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM subscribers WHERE email = $1")
            .bind(&email)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let row = sqlx::query_as::<_, SubscriberRow>(
        "INSERT INTO subscribers (name, email) VALUES ($1, $2)
         RETURNING id, name, email, created_at, updated_at",
    )
    .bind(&name)
    .bind(&email)
    .fetch_one(pool)
    .await
    .map_err(conflict_on_unique)?;

    Ok(row)
}

pub async fn list(
    pool: &PgPool,
    search: Option<&str>,
    skip: i64,
    limit: i64,
) -> sqlx::Result<Vec<SubscriberRow>> {
    sqlx::query_as::<_, SubscriberRow>(
        "SELECT id, name, email, created_at, updated_at FROM subscribers
         WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR email ILIKE '%' || $1 || '%')
         ORDER BY id
         OFFSET $2 LIMIT $3",
    )
    .bind(search)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i64) -> Result<SubscriberRow, ApiError> {
    sqlx::query_as::<_, SubscriberRow>(
        "SELECT id, name, email, created_at, updated_at FROM subscribers WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Subscriber not found"))
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    patch: SubscriberPatch,
) -> Result<SubscriberRow, ApiError> {
    let current = get(pool, id).await?;

    let name = match patch.name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::validation("Name must not be empty"));
            }
            name
        }
        None => current.name,
    };

    let email = match patch.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            validate_email(&email)?;
            if email != current.email {
                let taken: Option<i64> = sqlx::query_scalar(
                    "SELECT id FROM subscribers WHERE email = $1 AND id <> $2",
                )
                .bind(&email)
                .bind(id)
                .fetch_optional(pool)
                .await?;
                if taken.is_some() {
                    return Err(ApiError::conflict("Email already registered"));
                }
            }
            email
        }
        None => current.email,
    };

    let row = sqlx::query_as::<_, SubscriberRow>(
        "UPDATE subscribers SET name = $2, email = $3, updated_at = NOW()
         WHERE id = $1
         RETURNING id, name, email, created_at, updated_at",
    )
    .bind(id)
    .bind(&name)
    .bind(&email)
    .fetch_one(pool)
    .await
    .map_err(conflict_on_unique)?;

    Ok(row)
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<SubscriberRow, ApiError> {
    sqlx::query_as::<_, SubscriberRow>(
        "DELETE FROM subscribers WHERE id = $1
         RETURNING id, name, email, created_at, updated_at",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Subscriber not found"))
}

pub async fn count(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM subscribers")
        .fetch_one(pool)
        .await
}

/// Every subscriber, in signup order; the daily tick does no filtering.
pub async fn fetch_all(pool: &PgPool) -> sqlx::Result<Vec<SubscriberRow>> {
    sqlx::query_as::<_, SubscriberRow>(
        "SELECT id, name, email, created_at, updated_at FROM subscribers ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(ApiError::validation(format!(
            "Invalid email address: {email}"
        )));
    }
    Ok(())
}

fn conflict_on_unique(err: sqlx::Error) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::conflict("Email already registered")
        }
        _ => ApiError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_plain_addresses() {
        assert!(validate_email("learner@example.com").is_ok());
        assert!(validate_email("a.b+tag@sub.example.org").is_ok());
    }

    #[test]
    fn email_validation_rejects_malformed_addresses() {
        for bad in ["", "plain", "@example.com", "user@", "user@nodot"] {
            assert!(
                matches!(validate_email(bad), Err(ApiError::Validation(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }
}
