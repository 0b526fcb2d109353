use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, PgPool};

use crate::web::ApiError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct WordRow {
    pub id: i64,
    pub term: String,
    pub pronunciation: Option<String>,
    pub definition: String,
    pub example: Option<String>,
    pub category: Option<String>,
    pub difficulty: String,
    pub date_published: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct WordCreate {
    pub term: String,
    pub pronunciation: Option<String>,
    pub definition: String,
    pub example: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub date_published: Option<NaiveDate>,
}

/// Field-level patch: absent fields stay untouched, while nullable fields
/// distinguish "set to null" from "not provided".
#[derive(Debug, Default, Deserialize)]
pub struct WordPatch {
    pub term: Option<String>,
    pub definition: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[serde(default, deserialize_with = "double_option")]
    pub pronunciation: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub example: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub date_published: Option<Option<NaiveDate>>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default)]
pub struct WordFilter {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub published_on: Option<NaiveDate>,
    pub published_only: bool,
    pub unpublished_only: bool,
    pub skip: i64,
    pub limit: i64,
}

const WORD_COLUMNS: &str = "id, term, pronunciation, definition, example, category, difficulty, \
     date_published, created_at, updated_at";

pub async fn create(pool: &PgPool, data: WordCreate) -> Result<WordRow, ApiError> {
    let term = data.term.trim().to_lowercase();

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM words WHERE LOWER(term) = $1")
        .bind(&term)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(format!(
            "Term '{}' already exists",
            data.term.trim()
        )));
    }

    let row = sqlx::query_as::<_, WordRow>(&format!(
        "INSERT INTO words (term, pronunciation, definition, example, category, difficulty, date_published)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {WORD_COLUMNS}"
    ))
    .bind(&term)
    .bind(data.pronunciation.as_deref())
    .bind(&data.definition)
    .bind(data.example.as_deref())
    .bind(data.category.as_deref())
    .bind(data.difficulty.as_str())
    .bind(data.date_published)
    .fetch_one(pool)
    .await
    .map_err(|err| conflict_on_unique(err, format!("Term '{term}' already exists")))?;

    Ok(row)
}

pub async fn list(pool: &PgPool, filter: &WordFilter) -> sqlx::Result<Vec<WordRow>> {
    sqlx::query_as::<_, WordRow>(&format!(
        "SELECT {WORD_COLUMNS} FROM words
         WHERE ($1::text IS NULL OR category ILIKE '%' || $1 || '%')
           AND ($2::text IS NULL OR difficulty = $2)
           AND ($3::text IS NULL
                OR term ILIKE '%' || $3 || '%'
                OR definition ILIKE '%' || $3 || '%'
                OR example ILIKE '%' || $3 || '%')
           AND (NOT $4 OR date_published IS NOT NULL)
           AND (NOT $5 OR date_published IS NULL)
           AND ($6::date IS NULL OR date_published = $6)
           AND ($7::date IS NULL OR date_published >= $7)
           AND ($8::date IS NULL OR date_published <= $8)
         ORDER BY date_published DESC NULLS LAST, created_at DESC
         OFFSET $9 LIMIT $10"
    ))
    .bind(filter.category.as_deref())
    .bind(filter.difficulty.map(|d| d.as_str()))
    .bind(filter.search.as_deref())
    .bind(filter.published_only)
    .bind(filter.unpublished_only)
    .bind(filter.published_on)
    .bind(filter.date_from)
    .bind(filter.date_to)
    .bind(filter.skip)
    .bind(filter.limit)
    .fetch_all(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i64) -> Result<WordRow, ApiError> {
    sqlx::query_as::<_, WordRow>(&format!("SELECT {WORD_COLUMNS} FROM words WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Word not found"))
}

pub async fn find_by_term(pool: &PgPool, term: &str) -> Result<WordRow, ApiError> {
    let normalized = term.trim().to_lowercase();
    sqlx::query_as::<_, WordRow>(&format!(
        "SELECT {WORD_COLUMNS} FROM words WHERE LOWER(term) = $1"
    ))
    .bind(&normalized)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Word '{term}' not found")))
}

pub async fn for_date(pool: &PgPool, date: NaiveDate) -> sqlx::Result<Vec<WordRow>> {
    sqlx::query_as::<_, WordRow>(&format!(
        "SELECT {WORD_COLUMNS} FROM words WHERE date_published = $1 ORDER BY created_at"
    ))
    .bind(date)
    .fetch_all(pool)
    .await
}

pub async fn random_for_date(
    pool: &PgPool,
    date: NaiveDate,
    difficulty: Option<Difficulty>,
    category: Option<&str>,
) -> sqlx::Result<Option<WordRow>> {
    sqlx::query_as::<_, WordRow>(&format!(
        "SELECT {WORD_COLUMNS} FROM words
         WHERE date_published = $1
           AND ($2::text IS NULL OR difficulty = $2)
           AND ($3::text IS NULL OR category ILIKE '%' || $3 || '%')
         ORDER BY random()
         LIMIT 1"
    ))
    .bind(date)
    .bind(difficulty.map(|d| d.as_str()))
    .bind(category)
    .fetch_optional(pool)
    .await
}

pub async fn in_range(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
) -> sqlx::Result<Vec<WordRow>> {
    sqlx::query_as::<_, WordRow>(&format!(
        "SELECT {WORD_COLUMNS} FROM words
         WHERE date_published BETWEEN $1 AND $2
         ORDER BY date_published ASC"
    ))
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Word to announce on the given date: the word published that day, falling
/// back to the most recently published one.
pub async fn word_of_the_day(pool: &PgPool, date: NaiveDate) -> sqlx::Result<Option<WordRow>> {
    let todays = sqlx::query_as::<_, WordRow>(&format!(
        "SELECT {WORD_COLUMNS} FROM words WHERE date_published = $1 LIMIT 1"
    ))
    .bind(date)
    .fetch_optional(pool)
    .await?;

    if todays.is_some() {
        return Ok(todays);
    }

    sqlx::query_as::<_, WordRow>(&format!(
        "SELECT {WORD_COLUMNS} FROM words
         WHERE date_published IS NOT NULL
         ORDER BY date_published DESC
         LIMIT 1"
    ))
    .fetch_optional(pool)
    .await
}

pub async fn update(pool: &PgPool, id: i64, patch: WordPatch) -> Result<WordRow, ApiError> {
    let current = get(pool, id).await?;

    let term = match patch.term {
        Some(new_term) => {
            let normalized = new_term.trim().to_lowercase();
            let taken: Option<i64> =
                sqlx::query_scalar("SELECT id FROM words WHERE LOWER(term) = $1 AND id <> $2")
                    .bind(&normalized)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?;
            if taken.is_some() {
                return Err(ApiError::conflict(format!(
                    "Term '{}' already exists",
                    new_term.trim()
                )));
            }
            normalized
        }
        None => current.term,
    };

    let definition = patch.definition.unwrap_or(current.definition);
    let difficulty = patch
        .difficulty
        .map(|d| d.as_str().to_string())
        .unwrap_or(current.difficulty);
    let pronunciation = patch.pronunciation.unwrap_or(current.pronunciation);
    let example = patch.example.unwrap_or(current.example);
    let category = patch.category.unwrap_or(current.category);
    let date_published = patch.date_published.unwrap_or(current.date_published);

    let row = sqlx::query_as::<_, WordRow>(&format!(
        "UPDATE words
         SET term = $2, pronunciation = $3, definition = $4, example = $5,
             category = $6, difficulty = $7, date_published = $8, updated_at = NOW()
         WHERE id = $1
         RETURNING {WORD_COLUMNS}"
    ))
    .bind(id)
    .bind(&term)
    .bind(pronunciation.as_deref())
    .bind(&definition)
    .bind(example.as_deref())
    .bind(category.as_deref())
    .bind(&difficulty)
    .bind(date_published)
    .fetch_one(pool)
    .await
    .map_err(|err| conflict_on_unique(err, format!("Term '{term}' already exists")))?;

    Ok(row)
}

pub async fn set_publication_date(
    pool: &PgPool,
    id: i64,
    date: Option<NaiveDate>,
) -> Result<WordRow, ApiError> {
    sqlx::query_as::<_, WordRow>(&format!(
        "UPDATE words SET date_published = $2, updated_at = NOW()
         WHERE id = $1
         RETURNING {WORD_COLUMNS}"
    ))
    .bind(id)
    .bind(date)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Word not found"))
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<WordRow, ApiError> {
    sqlx::query_as::<_, WordRow>(&format!(
        "DELETE FROM words WHERE id = $1 RETURNING {WORD_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Word not found"))
}

#[derive(Debug, Serialize, FromRow)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

pub async fn category_counts(pool: &PgPool) -> sqlx::Result<Vec<CategoryCount>> {
    sqlx::query_as::<_, CategoryCount>(
        "SELECT category AS name, COUNT(*) AS count
         FROM words
         WHERE category IS NOT NULL
         GROUP BY category
         ORDER BY category",
    )
    .fetch_all(pool)
    .await
}

#[derive(Debug, Default, Serialize)]
pub struct DifficultyCounts {
    pub beginner: i64,
    pub intermediate: i64,
    pub advanced: i64,
    pub expert: i64,
}

#[derive(Debug, Serialize)]
pub struct WordStats {
    pub total_words: i64,
    pub published_words: i64,
    pub unpublished_words: i64,
    pub todays_words: i64,
    pub this_weeks_words: i64,
    pub this_months_words: i64,
    pub words_by_difficulty: DifficultyCounts,
    pub total_categories: i64,
}

pub async fn stats(pool: &PgPool, today: NaiveDate) -> sqlx::Result<WordStats> {
    let total_words: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM words")
        .fetch_one(pool)
        .await?;
    let published_words: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM words WHERE date_published IS NOT NULL")
            .fetch_one(pool)
            .await?;
    let todays_words: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM words WHERE date_published = $1")
            .bind(today)
            .fetch_one(pool)
            .await?;

    let (week_start, week_end) = week_bounds(today);
    let this_weeks_words: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM words WHERE date_published BETWEEN $1 AND $2",
    )
    .bind(week_start)
    .bind(week_end)
    .fetch_one(pool)
    .await?;

    let this_months_words: i64 = match month_bounds(today.year(), today.month()) {
        Some((month_start, month_end)) => sqlx::query_scalar(
            "SELECT COUNT(*) FROM words WHERE date_published BETWEEN $1 AND $2",
        )
        .bind(month_start)
        .bind(month_end)
        .fetch_one(pool)
        .await?,
        None => 0,
    };

    let difficulty_rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT difficulty, COUNT(*) FROM words GROUP BY difficulty")
            .fetch_all(pool)
            .await?;
    let mut words_by_difficulty = DifficultyCounts::default();
    for (difficulty, count) in difficulty_rows {
        match difficulty.as_str() {
            "beginner" => words_by_difficulty.beginner = count,
            "intermediate" => words_by_difficulty.intermediate = count,
            "advanced" => words_by_difficulty.advanced = count,
            "expert" => words_by_difficulty.expert = count,
            _ => {}
        }
    }

    let total_categories: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT category) FROM words WHERE category IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;

    Ok(WordStats {
        total_words,
        published_words,
        unpublished_words: total_words - published_words,
        todays_words,
        this_weeks_words,
        this_months_words,
        words_by_difficulty,
        total_categories,
    })
}

pub async fn daily_counts(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
) -> sqlx::Result<Vec<(NaiveDate, i64)>> {
    sqlx::query_as(
        "SELECT date_published, COUNT(*) FROM words
         WHERE date_published BETWEEN $1 AND $2
         GROUP BY date_published",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// First and last day of the given month, None for out-of-range input.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next_month.pred_opt()?))
}

/// Monday through Sunday of the week containing the given date.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let week = date.week(Weekday::Mon);
    (week.first_day(), week.last_day())
}

fn conflict_on_unique(err: sqlx::Error, message: String) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::conflict(message),
        _ => ApiError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_handles_lengths_and_leap_years() {
        assert_eq!(
            month_bounds(2025, 2),
            Some((
                NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
            ))
        );
        assert_eq!(
            month_bounds(2024, 2).unwrap().1,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            month_bounds(2025, 12),
            Some((
                NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
            ))
        );
        assert_eq!(month_bounds(2025, 13), None);
    }

    #[test]
    fn week_bounds_is_monday_through_sunday() {
        // 2025-08-30 is a Saturday.
        let date = NaiveDate::from_ymd_opt(2025, 8, 30).unwrap();
        let (start, end) = week_bounds(date);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 8, 25).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 8, 31).unwrap());
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Difficulty::Advanced).unwrap(),
            "\"advanced\""
        );
        let parsed: Difficulty = serde_json::from_str("\"expert\"").unwrap();
        assert_eq!(parsed, Difficulty::Expert);
        assert_eq!(Difficulty::default(), Difficulty::Beginner);
    }

    #[test]
    fn word_patch_distinguishes_null_from_absent() {
        let patch: WordPatch =
            serde_json::from_str(r#"{"definition": "new", "category": null}"#).unwrap();
        assert_eq!(patch.definition.as_deref(), Some("new"));
        assert_eq!(patch.category, Some(None));
        assert_eq!(patch.example, None);
        assert_eq!(patch.term, None);
    }
}
