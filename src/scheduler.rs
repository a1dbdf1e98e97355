use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tracing::{error, info};

/// Twice-daily run times (hour, minute), local time
pub const RUN_TIMES: [(u32, u32); 2] = [(6, 0), (18, 0)];

/// Minute-granularity check against [`RUN_TIMES`].
pub fn is_run_minute(now: DateTime<Local>) -> bool {
    RUN_TIMES
        .iter()
        .any(|&(h, m)| now.hour() == h && now.minute() == m)
}

/// Run `cycle` at each scheduled time, forever. A failed cycle is logged and
/// the loop keeps going; the 60-second tick also guarantees one run per
/// scheduled minute.
pub async fn run_scheduled<F, Fut>(mut cycle: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let times: Vec<String> = RUN_TIMES
        .iter()
        .map(|(h, m)| format!("{:02}:{:02}", h, m))
        .collect();
    info!("Scheduled mode, running daily at {}", times.join(", "));

    loop {
        if is_run_minute(Local::now()) {
            info!("Starting scheduled cycle");
            match cycle().await {
                Ok(()) => info!("Scheduled cycle finished"),
                Err(e) => error!("Scheduled cycle failed: {:#}", e),
            }
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fires_only_on_scheduled_minutes() {
        let hit_am = Local.with_ymd_and_hms(2025, 3, 10, 6, 0, 30).unwrap();
        let hit_pm = Local.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap();
        let miss = Local.with_ymd_and_hms(2025, 3, 10, 6, 1, 0).unwrap();
        let miss_hour = Local.with_ymd_and_hms(2025, 3, 10, 7, 0, 0).unwrap();

        assert!(is_run_minute(hit_am));
        assert!(is_run_minute(hit_pm));
        assert!(!is_run_minute(miss));
        assert!(!is_run_minute(miss_hour));
    }
}
