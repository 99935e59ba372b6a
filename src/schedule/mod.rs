//! Recurring execution of a fetch job.
//!
//! A [`RecurringTask`] holds the schedule, the next due time and the run
//! count. The [`Scheduler`] polls it and awaits the job when it is due, so
//! at most one invocation is ever in flight; there is no deadline and no
//! catch-up after an overrun. [`FixedLoop`] is the manual alternative:
//! run, sleep, repeat a fixed number of times.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("invalid duration `{0}` (expected e.g. 45s, 30m, 1h, 1d)")]
    InvalidDuration(String),
    #[error("invalid time of day `{0}` (expected HH:MM)")]
    InvalidTime(String),
    #[error("interval must be greater than zero")]
    ZeroInterval,
}

/// Longest accepted `Every` interval; keeps due-time arithmetic in range.
const MAX_INTERVAL_DAYS: i64 = 36_600;

/// When a recurring task fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// Every fixed interval, measured from the end of the previous run.
    Every(TimeDelta),
    /// Once a day at a local wall-clock time.
    DailyAt(NaiveTime),
}

impl Schedule {
    /// The first due time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Local>) -> DateTime<Local> {
        match self {
            Schedule::Every(interval) => now + *interval,
            Schedule::DailyAt(time) => {
                let today = now.date_naive().and_time(*time);
                let candidate = if today > now.naive_local() {
                    today
                } else {
                    today + TimeDelta::days(1)
                };
                Local
                    .from_local_datetime(&candidate)
                    .earliest()
                    // wall-clock time skipped by a DST change; run an hour later
                    .unwrap_or_else(|| now + TimeDelta::hours(1))
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    /// `30m`, `1h`, `45s`, `2d` or `daily@13:25`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(time) = s.strip_prefix("daily@") {
            let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .map_err(|_| ScheduleError::InvalidTime(time.to_string()))?;
            return Ok(Schedule::DailyAt(time));
        }

        let interval = parse_duration(s)?;
        if interval.is_zero() {
            return Err(ScheduleError::ZeroInterval);
        }
        match TimeDelta::from_std(interval) {
            Ok(delta) if delta <= TimeDelta::days(MAX_INTERVAL_DAYS) => {
                Ok(Schedule::Every(delta))
            }
            _ => Err(ScheduleError::InvalidDuration(s.to_string())),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Every(interval) if interval.num_seconds() == 0 => {
                write!(f, "every {}ms", interval.num_milliseconds())
            }
            Schedule::Every(interval) => write!(f, "every {}s", interval.num_seconds()),
            Schedule::DailyAt(time) => write!(f, "daily at {}", time.format("%H:%M")),
        }
    }
}

/// Parse a duration such as `45s`, `30m`, `1h`, `1d` or `250ms`.
pub fn parse_duration(s: &str) -> Result<Duration, ScheduleError> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| ScheduleError::InvalidDuration(s.to_string()))?;
    let (amount, unit) = s.split_at(split);
    let amount: u64 = amount
        .parse()
        .map_err(|_| ScheduleError::InvalidDuration(s.to_string()))?;

    let invalid = || ScheduleError::InvalidDuration(s.to_string());
    let secs_per_unit = match unit.trim() {
        "ms" => return Ok(Duration::from_millis(amount)),
        "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => 60,
        "h" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86_400,
        _ => return Err(invalid()),
    };
    amount
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// A schedule plus its next due time and run bookkeeping.
#[derive(Debug, Clone)]
pub struct RecurringTask {
    schedule: Schedule,
    next_due: DateTime<Local>,
    runs: u64,
    max_runs: Option<u64>,
}

impl RecurringTask {
    /// Register a task at `now`. The first run is one period away.
    pub fn new(schedule: Schedule, now: DateTime<Local>, max_runs: Option<u64>) -> Self {
        Self {
            schedule,
            next_due: schedule.next_after(now),
            runs: 0,
            max_runs,
        }
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn next_due(&self) -> DateTime<Local> {
        self.next_due
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        !self.is_exhausted() && now >= self.next_due
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_runs.is_some_and(|max| self.runs >= max)
    }

    /// Record a finished run. The next due time counts from `finished_at`.
    pub fn mark_ran(&mut self, finished_at: DateTime<Local>) {
        self.runs += 1;
        self.next_due = self.schedule.next_after(finished_at);
    }
}

/// Polls a [`RecurringTask`] and runs its job when due.
pub struct Scheduler {
    task: RecurringTask,
    poll: Duration,
}

impl Scheduler {
    pub fn new(task: RecurringTask, poll: Duration) -> Self {
        Self { task, poll }
    }

    pub fn task(&self) -> &RecurringTask {
        &self.task
    }

    /// Run until the task is exhausted. Returns the number of runs.
    ///
    /// The first job error stops the loop and is returned. Without a run cap
    /// this only returns on error.
    pub async fn run<F, Fut>(&mut self, mut job: F) -> Result<u64>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        info!(
            "Scheduled {}; first run at {}",
            self.task.schedule(),
            self.task.next_due().format("%Y-%m-%d %H:%M:%S")
        );

        while !self.task.is_exhausted() {
            if self.task.is_due(Local::now()) {
                debug!("Task due, starting run {}", self.task.runs() + 1);
                job().await?;
                self.task.mark_ran(Local::now());
                info!(
                    "Run {} complete; next at {}",
                    self.task.runs(),
                    self.task.next_due().format("%Y-%m-%d %H:%M:%S")
                );
            } else {
                tokio::time::sleep(self.poll).await;
            }
        }

        Ok(self.task.runs())
    }
}

/// Run a job a fixed number of times with a sleep after each run.
#[derive(Debug, Clone, Copy)]
pub struct FixedLoop {
    pub iterations: u64,
    pub sleep: Duration,
}

impl FixedLoop {
    /// Returns the number of completed runs; stops at the first error.
    pub async fn run<F, Fut>(&self, mut job: F) -> Result<u64>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut runs = 0;
        while runs < self.iterations {
            job().await?;
            runs += 1;
            debug!("Loop iteration {}/{} complete", runs, self.iterations);
            tokio::time::sleep(self.sleep).await;
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .earliest()
            .unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("30m"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("2d"), Ok(Duration::from_secs(172_800)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("5 weeks").is_err());
    }

    #[test]
    fn test_parse_duration_overflow_is_an_error() {
        assert_eq!(
            parse_duration("300000000000000d"),
            Err(ScheduleError::InvalidDuration("300000000000000d".into()))
        );
        assert!(parse_duration("18446744073709551615h").is_err());
        assert!(parse_duration("18446744073709551615ms").is_ok());
    }

    #[test]
    fn test_oversized_interval_is_rejected() {
        assert!("1000000000d".parse::<Schedule>().is_err());
        assert!("36600d".parse::<Schedule>().is_ok());
    }

    #[test]
    fn test_parse_schedule() {
        assert_eq!(
            "30m".parse::<Schedule>(),
            Ok(Schedule::Every(TimeDelta::minutes(30)))
        );
        assert_eq!(
            "daily@13:25".parse::<Schedule>(),
            Ok(Schedule::DailyAt(NaiveTime::from_hms_opt(13, 25, 0).unwrap()))
        );
        assert_eq!("0s".parse::<Schedule>(), Err(ScheduleError::ZeroInterval));
        assert!("daily@25:00".parse::<Schedule>().is_err());
    }

    #[test]
    fn test_first_run_is_one_period_away() {
        let now = local(2021, 1, 5, 10, 0);
        let task = RecurringTask::new(Schedule::Every(TimeDelta::minutes(30)), now, None);
        assert!(!task.is_due(now));
        assert!(!task.is_due(now + TimeDelta::minutes(29)));
        assert!(task.is_due(now + TimeDelta::minutes(30)));
    }

    #[test]
    fn test_next_due_counts_from_finish() {
        let now = local(2021, 1, 5, 10, 0);
        let mut task = RecurringTask::new(Schedule::Every(TimeDelta::minutes(30)), now, None);

        // a run that overran the interval does not queue a second run
        let finished = now + TimeDelta::minutes(75);
        task.mark_ran(finished);
        assert_eq!(task.runs(), 1);
        assert_eq!(task.next_due(), finished + TimeDelta::minutes(30));
        assert!(!task.is_due(finished));
    }

    #[test]
    fn test_daily_schedule() {
        let at = NaiveTime::from_hms_opt(13, 25, 0).unwrap();
        let schedule = Schedule::DailyAt(at);

        let morning = local(2021, 1, 5, 9, 0);
        assert_eq!(schedule.next_after(morning), local(2021, 1, 5, 13, 25));

        let evening = local(2021, 1, 5, 18, 0);
        assert_eq!(schedule.next_after(evening), local(2021, 1, 6, 13, 25));
    }

    #[test]
    fn test_max_runs_exhausts() {
        let now = local(2021, 1, 5, 10, 0);
        let mut task = RecurringTask::new(Schedule::Every(TimeDelta::seconds(1)), now, Some(2));
        task.mark_ran(now);
        assert!(!task.is_exhausted());
        task.mark_ran(now);
        assert!(task.is_exhausted());
        assert!(!task.is_due(now + TimeDelta::days(1)));
    }

    #[tokio::test]
    async fn test_scheduler_runs_single_flight() {
        let task = RecurringTask::new(
            Schedule::Every(TimeDelta::milliseconds(20)),
            Local::now(),
            Some(3),
        );
        let mut scheduler = Scheduler::new(task, Duration::from_millis(5));

        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let runs = assert_ok!(
            scheduler
                .run(|| {
                    let in_flight = in_flight.clone();
                    let max_seen = max_seen.clone();
                    let calls = calls.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        // longer than the interval
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        calls.fetch_add(1, Ordering::SeqCst);
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await
        );

        assert_eq!(runs, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_job_error() {
        let task = RecurringTask::new(
            Schedule::Every(TimeDelta::milliseconds(10)),
            Local::now(),
            Some(5),
        );
        let mut scheduler = Scheduler::new(task, Duration::from_millis(2));
        let calls = Arc::new(AtomicUsize::new(0));

        let result = scheduler
            .run(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                        anyhow::bail!("quota exceeded");
                    }
                    Ok(())
                }
            })
            .await;

        let err = assert_err!(result);
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.task().runs(), 1);
    }

    #[tokio::test]
    async fn test_fixed_loop_iteration_cap() {
        let fixed = FixedLoop {
            iterations: 4,
            sleep: Duration::from_millis(1),
        };
        let calls = Arc::new(AtomicUsize::new(0));

        let runs = assert_ok!(
            fixed
                .run(|| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await
        );

        assert_eq!(runs, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
