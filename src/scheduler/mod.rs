use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{error, info, warn};

use crate::{
    email::{MailTransport, composer},
    subscribers::{self, SubscriberRow},
    web::AppState,
    words::{self, WordRow},
};

/// Daily notification scheduler: fires once per day at the configured
/// hour:minute in the configured timezone and emails the current word to
/// every subscriber. Occurrences missed while the process was down are
/// skipped, and the single task loop guarantees at most one tick at a time.
pub struct DailyScheduler {
    state: AppState,
    transport: Arc<dyn MailTransport>,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl DailyScheduler {
    pub fn new(state: AppState, transport: Arc<dyn MailTransport>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            state,
            transport,
            shutdown,
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let state = self.state.clone();
        let transport = Arc::clone(&self.transport);
        let mut shutdown = self.shutdown.subscribe();
        let schedule = state.schedule().clone();

        info!(
            hour = schedule.hour,
            minute = schedule.minute,
            timezone = %schedule.timezone,
            "email scheduler started"
        );

        self.handle = Some(tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let fire_at =
                    next_fire_time(now, schedule.hour, schedule.minute, schedule.timezone);
                let wait = (fire_at - now).to_std().unwrap_or_default();

                tokio::select! {
                    _ = sleep(wait) => {
                        if let Err(err) = run_tick(&state, transport.as_ref()).await {
                            error!(?err, "failed to send daily word emails");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    /// Cancels future ticks. An in-flight tick runs to completion.
    pub fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        self.handle.take();
        info!("email scheduler stopped");
    }
}

/// One execution of the daily job: select the word, batch the subscribers,
/// send, and report the aggregate. Errors bubble up to the loop where they
/// are logged and swallowed; the next tick proceeds normally.
async fn run_tick(state: &AppState, transport: &dyn MailTransport) -> Result<()> {
    let pool = state.pool_ref();
    let today = state.today();

    let Some(word) = words::store::word_of_the_day(pool, today).await? else {
        warn!("no words available to send");
        return Ok(());
    };

    let recipients = subscribers::store::fetch_all(pool).await?;
    if recipients.is_empty() {
        info!("no subscribers found to send emails to");
        return Ok(());
    }

    let batch_size = state.schedule().batch_size;
    let notified = deliver_word(transport, &word, &recipients, batch_size).await;

    info!(
        term = %word.term,
        notified,
        subscribers = recipients.len(),
        "daily word emails sent"
    );
    Ok(())
}

/// Partitions the subscribers into fixed-size batches and sends one message
/// per batch, personalized with the first subscriber's name. Returns the
/// total count across successful batches; a failed batch is logged and does
/// not abort the rest.
pub(crate) async fn deliver_word(
    transport: &dyn MailTransport,
    word: &WordRow,
    subscribers: &[SubscriberRow],
    batch_size: usize,
) -> usize {
    let subject = daily_subject(&word.term);
    let mut notified = 0;

    for batch in subscribers.chunks(batch_size.max(1)) {
        let (html, text) = composer::render_word_email(word, &batch[0].name);
        let recipients: Vec<String> = batch.iter().map(|s| s.email.clone()).collect();

        if transport.send(&recipients, &subject, &html, &text).await {
            notified += batch.len();
        } else {
            warn!(batch_size = batch.len(), "notification batch failed");
        }
    }

    notified
}

pub(crate) fn daily_subject(term: &str) -> String {
    format!("🤖 Your AI Word Daily: {}", composer::title_case(term))
}

/// Next wall-clock occurrence of hour:minute in the given timezone, strictly
/// after `now`. Local times skipped by a DST transition roll to the next day.
pub(crate) fn next_fire_time(now: DateTime<Utc>, hour: u32, minute: u32, tz: Tz) -> DateTime<Utc> {
    let mut date = now.with_timezone(&tz).date_naive();
    loop {
        if let Some(fire) = date
            .and_hms_opt(hour, minute, 0)
            .and_then(|local| tz.from_local_datetime(&local).earliest())
        {
            let fire_utc = fire.with_timezone(&Utc);
            if fire_utc > now {
                return fire_utc;
            }
        }
        date = date + chrono::Days::new(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct RecordingTransport {
        calls: Mutex<Vec<(Vec<String>, String, String)>>,
        fail_on: Option<usize>,
    }

    impl RecordingTransport {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(
            &self,
            recipients: &[String],
            subject: &str,
            html: &str,
            _text: &str,
        ) -> bool {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push((recipients.to_vec(), subject.to_string(), html.to_string()));
            self.fail_on != Some(index)
        }
    }

    fn sample_word() -> WordRow {
        WordRow {
            id: 1,
            term: "ephemeral".to_string(),
            pronunciation: None,
            definition: "lasting a very short time".to_string(),
            example: None,
            category: None,
            difficulty: "intermediate".to_string(),
            date_published: NaiveDate::from_ymd_opt(2025, 8, 30),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_subscribers(count: usize) -> Vec<SubscriberRow> {
        (0..count)
            .map(|i| SubscriberRow {
                id: i as i64 + 1,
                name: format!("Subscriber {i}"),
                email: format!("subscriber{i}@example.com"),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn partitions_subscribers_into_fixed_batches() {
        let transport = RecordingTransport::new(None);
        let notified = deliver_word(&transport, &sample_word(), &sample_subscribers(23), 10).await;

        let calls = transport.calls.lock().unwrap();
        let sizes: Vec<usize> = calls.iter().map(|(r, _, _)| r.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(notified, 23);
    }

    #[tokio::test]
    async fn renders_each_batch_with_first_subscriber_name() {
        let transport = RecordingTransport::new(None);
        deliver_word(&transport, &sample_word(), &sample_subscribers(23), 10).await;

        let calls = transport.calls.lock().unwrap();
        assert!(calls[0].2.contains("Hello Subscriber 0"));
        assert!(calls[1].2.contains("Hello Subscriber 10"));
        assert!(calls[2].2.contains("Hello Subscriber 20"));
    }

    #[tokio::test]
    async fn failed_batch_is_skipped_but_does_not_abort_the_rest() {
        let transport = RecordingTransport::new(Some(1));
        let notified = deliver_word(&transport, &sample_word(), &sample_subscribers(23), 10).await;

        assert_eq!(transport.calls.lock().unwrap().len(), 3);
        assert_eq!(notified, 13);
    }

    #[tokio::test]
    async fn empty_subscriber_list_sends_nothing() {
        let transport = RecordingTransport::new(None);
        let notified = deliver_word(&transport, &sample_word(), &[], 10).await;

        assert!(transport.calls.lock().unwrap().is_empty());
        assert_eq!(notified, 0);
    }

    #[test]
    fn subject_title_cases_the_term() {
        assert_eq!(
            daily_subject("machine learning"),
            "🤖 Your AI Word Daily: Machine Learning"
        );
    }

    #[test]
    fn next_fire_is_today_before_trigger_time() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 5, 0, 0).unwrap();
        let fire = next_fire_time(now, 6, 14, chrono_tz::UTC);
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 8, 30, 6, 14, 0).unwrap());
    }

    #[test]
    fn next_fire_rolls_to_tomorrow_after_trigger_time() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 6, 14, 0).unwrap();
        let fire = next_fire_time(now, 6, 14, chrono_tz::UTC);
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 8, 31, 6, 14, 0).unwrap());
    }

    #[test]
    fn next_fire_respects_the_configured_timezone() {
        // 00:00 UTC on Jan 15 is still Jan 14 evening in New York; the 06:14
        // Eastern trigger lands at 11:14 UTC the same day.
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let fire = next_fire_time(now, 6, 14, chrono_tz::America::New_York);
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 1, 15, 11, 14, 0).unwrap());
    }
}
