use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::web::{ApiError, ApiMessage, AppState};

pub mod store;

pub use store::{Difficulty, WordRow};

use store::{WordCreate, WordFilter, WordPatch};

const MIN_YEAR: i32 = 2020;
const MAX_YEAR: i32 = 2030;
const MAX_PAGE_SIZE: i64 = 1000;
const DEFAULT_PAGE_SIZE: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/words", post(create_word).get(list_words))
        .route("/words/daily", get(daily_words))
        .route("/words/daily/random", get(random_daily_word))
        .route("/words/monthly/:year/:month", get(monthly_words))
        .route("/words/upcoming", get(upcoming_words))
        .route("/words/search/:term", get(search_word_by_term))
        .route("/words/stats/categories", get(category_stats))
        .route("/words/stats/summary", get(word_stats))
        .route("/words/stats/calendar/:year/:month", get(calendar_stats))
        .route(
            "/words/:id",
            get(get_word).put(update_word).delete(delete_word),
        )
        .route("/words/:id/publish", patch(publish_word))
        .route("/words/:id/unpublish", patch(unpublish_word))
}

async fn create_word(
    State(state): State<AppState>,
    Json(data): Json<WordCreate>,
) -> Result<Json<WordRow>, ApiError> {
    if data.term.trim().is_empty() {
        return Err(ApiError::validation("Term must not be empty"));
    }
    if data.definition.trim().is_empty() {
        return Err(ApiError::validation("Definition must not be empty"));
    }

    let word = store::create(state.pool_ref(), data).await?;
    Ok(Json(word))
}

#[derive(Debug, Deserialize)]
struct WordListQuery {
    category: Option<String>,
    difficulty: Option<Difficulty>,
    search: Option<String>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    #[serde(default)]
    published_today: bool,
    #[serde(default)]
    published_only: bool,
    #[serde(default)]
    unpublished_only: bool,
    #[serde(default)]
    skip: i64,
    limit: Option<i64>,
}

async fn list_words(
    State(state): State<AppState>,
    Query(query): Query<WordListQuery>,
) -> Result<Json<Vec<WordRow>>, ApiError> {
    let limit = validate_page(query.skip, query.limit)?;

    // `published_today` overrides the explicit date range, and the two
    // publication-status flags are mutually exclusive with published_only
    // taking precedence, matching the filter surface contract.
    let (date_from, date_to, published_on) = if query.published_today {
        (None, None, Some(state.today()))
    } else {
        (query.date_from, query.date_to, None)
    };

    let filter = WordFilter {
        category: query.category,
        difficulty: query.difficulty,
        search: query.search,
        date_from,
        date_to,
        published_on,
        published_only: query.published_only,
        unpublished_only: !query.published_only && query.unpublished_only,
        skip: query.skip,
        limit,
    };

    let words = store::list(state.pool_ref(), &filter).await?;
    Ok(Json(words))
}

#[derive(Debug, Deserialize)]
struct DailyQuery {
    target_date: Option<NaiveDate>,
}

async fn daily_words(
    State(state): State<AppState>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<Vec<WordRow>>, ApiError> {
    let date = query.target_date.unwrap_or_else(|| state.today());
    let words = store::for_date(state.pool_ref(), date).await?;
    Ok(Json(words))
}

#[derive(Debug, Deserialize)]
struct RandomDailyQuery {
    target_date: Option<NaiveDate>,
    difficulty: Option<Difficulty>,
    category: Option<String>,
}

async fn random_daily_word(
    State(state): State<AppState>,
    Query(query): Query<RandomDailyQuery>,
) -> Result<Json<WordRow>, ApiError> {
    let date = query.target_date.unwrap_or_else(|| state.today());
    let word = store::random_for_date(
        state.pool_ref(),
        date,
        query.difficulty,
        query.category.as_deref(),
    )
    .await?;

    word.map(Json).ok_or_else(|| {
        let mut detail = format!("No words found for date {date}");
        if let Some(difficulty) = query.difficulty {
            detail.push_str(&format!(" with difficulty {}", difficulty.as_str()));
        }
        if let Some(category) = &query.category {
            detail.push_str(&format!(" in category {category}"));
        }
        ApiError::not_found(detail)
    })
}

async fn monthly_words(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<Vec<WordRow>>, ApiError> {
    let (start, end) = validate_month(year, month)?;
    let words = store::in_range(state.pool_ref(), start, end).await?;
    Ok(Json(words))
}

#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    days: Option<i64>,
}

async fn upcoming_words(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Vec<WordRow>>, ApiError> {
    let days = query.days.unwrap_or(7);
    if !(1..=365).contains(&days) {
        return Err(ApiError::validation("Days must be between 1 and 365"));
    }

    let today = state.today();
    let end = today + chrono::Days::new(days as u64);
    let words = store::in_range(state.pool_ref(), today, end).await?;
    Ok(Json(words))
}

async fn search_word_by_term(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<WordRow>, ApiError> {
    let word = store::find_by_term(state.pool_ref(), &term).await?;
    Ok(Json(word))
}

async fn get_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WordRow>, ApiError> {
    let word = store::get(state.pool_ref(), id).await?;
    Ok(Json(word))
}

async fn update_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<WordPatch>,
) -> Result<Json<WordRow>, ApiError> {
    if let Some(term) = &patch.term {
        if term.trim().is_empty() {
            return Err(ApiError::validation("Term must not be empty"));
        }
    }
    if let Some(definition) = &patch.definition {
        if definition.trim().is_empty() {
            return Err(ApiError::validation("Definition must not be empty"));
        }
    }

    let word = store::update(state.pool_ref(), id, patch).await?;
    Ok(Json(word))
}

#[derive(Debug, Deserialize)]
struct PublishQuery {
    publish_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct PublishResponse {
    message: String,
    word_id: i64,
    publication_date: NaiveDate,
}

async fn publish_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PublishQuery>,
) -> Result<Json<PublishResponse>, ApiError> {
    let publish_date = query.publish_date.unwrap_or_else(|| state.today());
    let word = store::set_publication_date(state.pool_ref(), id, Some(publish_date)).await?;

    Ok(Json(PublishResponse {
        message: format!("Word '{}' published for {publish_date}", word.term),
        word_id: word.id,
        publication_date: publish_date,
    }))
}

#[derive(Debug, Serialize)]
struct UnpublishResponse {
    message: String,
    word_id: i64,
}

async fn unpublish_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UnpublishResponse>, ApiError> {
    let word = store::set_publication_date(state.pool_ref(), id, None).await?;

    Ok(Json(UnpublishResponse {
        message: format!("Word '{}' unpublished", word.term),
        word_id: word.id,
    }))
}

async fn delete_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiMessage>, ApiError> {
    let word = store::delete(state.pool_ref(), id).await?;
    Ok(Json(ApiMessage::new(format!(
        "Word '{}' deleted successfully",
        word.term
    ))))
}

#[derive(Debug, Serialize)]
struct CategoryStats {
    categories: Vec<store::CategoryCount>,
    total_categories: usize,
}

async fn category_stats(
    State(state): State<AppState>,
) -> Result<Json<CategoryStats>, ApiError> {
    let categories = store::category_counts(state.pool_ref()).await?;
    let total_categories = categories.len();
    Ok(Json(CategoryStats {
        categories,
        total_categories,
    }))
}

async fn word_stats(
    State(state): State<AppState>,
) -> Result<Json<store::WordStats>, ApiError> {
    let stats = store::stats(state.pool_ref(), state.today()).await?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
struct CalendarDay {
    date: NaiveDate,
    day: u32,
    word_count: i64,
    has_words: bool,
}

#[derive(Debug, Serialize)]
struct CalendarView {
    year: i32,
    month: u32,
    calendar: Vec<CalendarDay>,
    total_days: u32,
    days_with_words: usize,
}

async fn calendar_stats(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<CalendarView>, ApiError> {
    let (start, end) = validate_month(year, month)?;
    let counts = store::daily_counts(state.pool_ref(), start, end).await?;

    let view = build_calendar(year, month, start, end, &counts);
    Ok(Json(view))
}

fn build_calendar(
    year: i32,
    month: u32,
    start: NaiveDate,
    end: NaiveDate,
    counts: &[(NaiveDate, i64)],
) -> CalendarView {
    let mut calendar = Vec::with_capacity(end.day() as usize);
    let mut date = start;
    while date <= end {
        let word_count = counts
            .iter()
            .find(|(day, _)| *day == date)
            .map(|(_, count)| *count)
            .unwrap_or(0);
        calendar.push(CalendarDay {
            date,
            day: date.day(),
            word_count,
            has_words: word_count > 0,
        });
        date = date + chrono::Days::new(1);
    }

    let days_with_words = calendar.iter().filter(|day| day.has_words).count();
    CalendarView {
        year,
        month,
        calendar,
        total_days: end.day(),
        days_with_words,
    }
}

fn validate_month(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ApiError> {
    if !(1..=12).contains(&month) {
        return Err(ApiError::validation("Month must be between 1 and 12"));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ApiError::validation(format!(
            "Year must be between {MIN_YEAR} and {MAX_YEAR}"
        )));
    }
    store::month_bounds(year, month)
        .ok_or_else(|| ApiError::validation("Invalid year/month combination"))
}

fn validate_page(skip: i64, limit: Option<i64>) -> Result<i64, ApiError> {
    if skip < 0 {
        return Err(ApiError::validation("Skip must not be negative"));
    }
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_month_bounds_and_ranges() {
        let (start, end) = validate_month(2025, 6).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());

        assert!(matches!(
            validate_month(2025, 0),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_month(2025, 13),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_month(2019, 5),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn validate_page_caps_limit() {
        assert_eq!(validate_page(0, None).unwrap(), 100);
        assert_eq!(validate_page(10, Some(1000)).unwrap(), 1000);
        assert!(matches!(
            validate_page(0, Some(0)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_page(0, Some(1001)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_page(-1, None),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn calendar_covers_every_day_with_counts() {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        let counts = vec![
            (NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(), 2),
            (NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(), 1),
        ];

        let view = build_calendar(2025, 2, start, end, &counts);
        assert_eq!(view.calendar.len(), 28);
        assert_eq!(view.total_days, 28);
        assert_eq!(view.days_with_words, 2);
        assert_eq!(view.calendar[2].word_count, 2);
        assert!(view.calendar[2].has_words);
        assert_eq!(view.calendar[0].word_count, 0);
        assert!(!view.calendar[0].has_words);
        assert_eq!(view.calendar[27].day, 28);
    }
}
