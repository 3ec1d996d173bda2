//! 定时调度
//!
//! 两个触发器（定时备份、到期检查）各自运行在独立的 tokio 任务中，
//! 每次触发时再派生一个任务执行具体操作，触发器本身不会被操作阻塞。

use crate::{
    Result, VipError,
    config::AppConfig,
    constants::{self, timeout},
    notifier::Notification,
    tasks::{TaskKind, VipTasks},
};
use ::cron::Schedule;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 将标准5字段cron表达式转换为带秒字段的格式
///
/// 5字段表达式补充 `0` 秒，星期字段的数字（0-7，0和7都表示周日）转换为英文缩写，
/// 数字区间（如 `5-7`）展开为缩写列表；6/7字段和 `@daily` 之类的写法原样返回。
pub fn normalize_cron(expression: &str) -> Result<String> {
    let trimmed = expression.trim();
    if trimmed.starts_with('@') {
        return Ok(trimmed.to_string());
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    match fields.len() {
        constants::cron::CRON_FIELDS_COUNT => {
            let day_of_week = normalize_day_of_week(fields[4]);
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], day_of_week
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(VipError::invalid_schedule(
            expression,
            format!("需要5个字段（分 时 日 月 周），实际为 {n} 个"),
        )),
    }
}

fn normalize_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(normalize_day_item)
        .collect::<Vec<_>>()
        .join(",")
}

// 数字区间展开成名称列表，cron crate 不接受 FRI-SUN 这类跨周的名称区间
fn normalize_day_item(item: &str) -> String {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };

    if let Some((start, end)) = range.split_once('-') {
        if let Some(days) = expand_day_range(start, end, step) {
            return days;
        }
        return item.to_string();
    }

    let name = map_day(range);
    match step {
        Some(step) => format!("{}/{}", name, step),
        None => name,
    }
}

fn expand_day_range(start: &str, end: &str, step: Option<&str>) -> Option<String> {
    let start = start.parse::<u8>().ok().filter(|d| *d <= 7)?;
    let end = end.parse::<u8>().ok().filter(|d| *d <= 7 && *d >= start)?;
    let step = match step {
        Some(step) => step.parse::<usize>().ok().filter(|s| *s > 0)?,
        None => 1,
    };

    let names = (start..=end)
        .step_by(step)
        .filter_map(day_name)
        .collect::<Vec<_>>();
    Some(names.join(","))
}

fn map_day(part: &str) -> String {
    match part.parse::<u8>() {
        Ok(day) => day_name(day).unwrap_or(part).to_string(),
        Err(_) => part.to_string(),
    }
}

fn day_name(day: u8) -> Option<&'static str> {
    const NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
    NAMES.get(usize::from(day % 7)).copied().filter(|_| day <= 7)
}

/// 解析cron表达式
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let normalized = normalize_cron(expression)?;
    Schedule::from_str(&normalized)
        .map_err(|e| VipError::invalid_schedule(expression, e.to_string()))
}

/// 计算 `after` 之后（不含）的下一次触发时间
pub fn next_fire_time(schedule: &Schedule, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 调度器运行状态
#[derive(Debug, Default)]
struct ServiceState {
    running: bool,
    started_at: Option<DateTime<Utc>>,
    triggers: Vec<JoinHandle<()>>,
    warmup: Option<JoinHandle<()>>,
}

struct SchedulerInner {
    config: AppConfig,
    tasks: Arc<VipTasks>,
    state: Mutex<ServiceState>,
    warmup_delay: Duration,
}

/// 调度器状态快照
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: Option<i64>,
    pub backup_cron: String,
    pub alert_cron: String,
    pub timezone: String,
    pub retention_days: u32,
    pub next_backup: Option<DateTime<Utc>>,
    pub next_health_check: Option<DateTime<Utc>>,
}

/// VIP 备份调度器
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(config: AppConfig, tasks: Arc<VipTasks>) -> Self {
        Self::with_warmup(
            config,
            tasks,
            Duration::from_secs(timeout::INITIAL_HEALTH_CHECK_DELAY),
        )
    }

    /// 指定启动后首次健康检查的延迟
    pub fn with_warmup(config: AppConfig, tasks: Arc<VipTasks>, warmup_delay: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                tasks,
                state: Mutex::new(ServiceState::default()),
                warmup_delay,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn tasks(&self) -> &Arc<VipTasks> {
        &self.inner.tasks
    }

    /// 启动调度器
    ///
    /// 已经在运行时只记录警告。cron 表达式无效时返回错误，不会启动任何触发器。
    pub async fn start(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.running {
            warn!("调度器已在运行，忽略重复启动");
            return Ok(());
        }

        let config = &self.inner.config;
        let backup_schedule = parse_schedule(&config.backup_cron)?;
        let alert_schedule = parse_schedule(&config.alert_cron)?;
        let tz = config.timezone;

        state.triggers = vec![
            tokio::spawn(trigger_loop(
                self.inner.tasks.clone(),
                backup_schedule,
                tz,
                TaskKind::Backup,
            )),
            tokio::spawn(trigger_loop(
                self.inner.tasks.clone(),
                alert_schedule,
                tz,
                TaskKind::HealthCheck,
            )),
        ];
        state.running = true;
        state.started_at = Some(Utc::now());

        info!(
            backup_cron = %config.backup_cron,
            alert_cron = %config.alert_cron,
            timezone = %config.timezone_name(),
            "调度器已启动"
        );

        let startup = Notification::info(
            "🚀 VIP 备份服务已启动",
            format!(
                "📅 备份计划: {}\n🔔 到期检查: {}\n🌍 时区: {}\n🗑️ 保留天数: {}",
                config.backup_cron,
                config.alert_cron,
                config.timezone_name(),
                config.retention_days
            ),
        );

        let tasks = self.inner.tasks.clone();
        let delay = self.inner.warmup_delay;
        state.warmup = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("执行启动后的首次健康检查");
            tasks.dispatch(TaskKind::HealthCheck).await;
        }));

        // 发送通知前释放状态锁，webhook 变慢时 status() 不受影响
        drop(state);
        self.inner.tasks.notifier().notify(startup).await;

        Ok(())
    }

    /// 停止所有触发器，正在执行的操作不受影响
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.running {
            warn!("调度器未运行");
            return;
        }

        for handle in state.triggers.drain(..) {
            handle.abort();
        }
        if let Some(warmup) = state.warmup.take() {
            warmup.abort();
        }
        state.running = false;
        state.started_at = None;
        info!("调度器已停止");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    /// 当前活跃的触发器数量
    pub async fn active_triggers(&self) -> usize {
        self.inner
            .state
            .lock()
            .await
            .triggers
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.inner.state.lock().await;
        let config = &self.inner.config;
        let now = Utc::now();

        let next = |expression: &str| {
            parse_schedule(expression)
                .ok()
                .and_then(|s| next_fire_time(&s, config.timezone, now))
        };

        SchedulerStatus {
            running: state.running,
            started_at: state.started_at,
            uptime_secs: state.started_at.map(|t| (now - t).num_seconds()),
            backup_cron: config.backup_cron.clone(),
            alert_cron: config.alert_cron.clone(),
            timezone: config.timezone_name().to_string(),
            retention_days: config.retention_days,
            next_backup: next(&config.backup_cron),
            next_health_check: next(&config.alert_cron),
        }
    }
}

/// 等待下一次触发时间并派发操作，直到被取消
async fn trigger_loop(tasks: Arc<VipTasks>, schedule: Schedule, tz: Tz, kind: TaskKind) {
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        // 时钟精度不足时避免同一时刻触发两次
        let after = last_fire.map_or(now, |last| last.max(now));

        let Some(next) = next_fire_time(&schedule, tz, after) else {
            error!(task = %kind, "cron表达式没有后续触发时间，触发器退出");
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        debug!(task = %kind, next = %next, "等待下一次触发");
        tokio::time::sleep(wait).await;

        last_fire = Some(next);
        info!(task = %kind, "触发定时任务");
        tokio::spawn(tasks.clone().dispatch(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::test_support::{RecordingNotifier, SlowNotifier, tasks_for};
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(backup_cron: &str, alert_cron: &str, backup_dir: PathBuf) -> AppConfig {
        AppConfig {
            crcon_url: "http://127.0.0.1:9".to_string(),
            api_token: "token".to_string(),
            discord_webhook_url: None,
            backup_cron: backup_cron.to_string(),
            alert_cron: alert_cron.to_string(),
            retention_days: 30,
            timezone: chrono_tz::UTC,
            port: 0,
            backup_dir,
        }
    }

    #[test]
    fn test_normalize_cron() {
        assert_eq!(normalize_cron("0 2 * * *").unwrap(), "0 0 2 * * *");
        assert_eq!(normalize_cron("30 9 * * 1-5").unwrap(), "0 30 9 * * MON,TUE,WED,THU,FRI");
        assert_eq!(normalize_cron("0 9 * * 0,7").unwrap(), "0 0 9 * * SUN,SUN");
        assert_eq!(normalize_cron("0 9 * * */2").unwrap(), "0 0 9 * * */2");
        assert_eq!(normalize_cron("*/5 * * * * *").unwrap(), "*/5 * * * * *");
        assert_eq!(normalize_cron("@daily").unwrap(), "@daily");
        assert!(normalize_cron("* *").is_err());
    }

    #[test]
    fn test_invalid_expression_is_fatal() {
        let err = parse_schedule("61 * * * *").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            VipError::InvalidScheduleExpression { ref expression, .. } if expression == "61 * * * *"
        ));
        assert!(parse_schedule("not a cron").unwrap_err().is_fatal());
    }

    #[test]
    fn test_next_fire_time_respects_timezone() {
        let schedule = parse_schedule("0 2 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

        let utc_next = next_fire_time(&schedule, chrono_tz::UTC, after).unwrap();
        assert_eq!(utc_next, Utc.with_ymd_and_hms(2026, 10, 17, 2, 0, 0).unwrap());

        // 上海 02:00 = UTC 前一天 18:00
        let shanghai_next = next_fire_time(&schedule, chrono_tz::Asia::Shanghai, after).unwrap();
        assert_eq!(
            shanghai_next,
            Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_day_of_week_numbers_use_standard_meaning() {
        // 2026-10-16 是周五，"周一 09:00" 的下一次是 10-19
        let schedule = parse_schedule("0 9 * * 1").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let next = next_fire_time(&schedule, chrono_tz::UTC, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_day_ranges_ending_on_sunday() {
        assert_eq!(normalize_cron("0 9 * * 5-7").unwrap(), "0 0 9 * * FRI,SAT,SUN");
        assert_eq!(
            normalize_cron("0 9 * * 1-7").unwrap(),
            "0 0 9 * * MON,TUE,WED,THU,FRI,SAT,SUN"
        );
        assert_eq!(normalize_cron("0 9 * * 1-7/2").unwrap(), "0 0 9 * * MON,WED,FRI,SUN");
        assert_eq!(normalize_cron("0 9 * * MON-FRI").unwrap(), "0 0 9 * * MON-FRI");

        // 2026-10-16 周五 12:00 之后
        let after = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let weekend = parse_schedule("0 9 * * 5-7").unwrap();
        let mut upcoming = weekend.after(&after.with_timezone(&chrono_tz::UTC));
        let fires: Vec<_> = (0..3)
            .filter_map(|_| upcoming.next())
            .map(|dt| dt.with_timezone(&Utc))
            .collect();
        assert_eq!(
            fires,
            vec![
                Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 10, 23, 9, 0, 0).unwrap(),
            ]
        );

        let daily = parse_schedule("0 9 * * 1-7").unwrap();
        let next = next_fire_time(&daily, chrono_tz::UTC, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_resets() {
        let temp_dir = tempdir().unwrap();
        let notifier = std::sync::Arc::new(RecordingNotifier::default());
        let backup_dir = temp_dir.path().to_path_buf();
        let tasks = tasks_for("http://127.0.0.1:9", backup_dir.clone(), notifier.clone());
        let config = test_config("0 2 * * *", "0 9 * * *", backup_dir);
        let scheduler = Scheduler::with_warmup(config, tasks, Duration::from_secs(3600));

        scheduler.start().await.unwrap();
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running().await);
        assert_eq!(scheduler.active_triggers().await, 2);
        // 重复启动不会重复发送启动通知
        assert_eq!(notifier.titles().len(), 1);

        let status = scheduler.status().await;
        assert!(status.running);
        assert!(status.next_backup.is_some());
        assert!(status.next_health_check.is_some());

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
        assert_eq!(scheduler.active_triggers().await, 0);
        scheduler.stop().await;

        scheduler.start().await.unwrap();
        assert_eq!(scheduler.active_triggers().await, 2);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_status_available_while_startup_notification_pending() {
        let temp_dir = tempdir().unwrap();
        let notifier = std::sync::Arc::new(SlowNotifier::new(Duration::from_secs(60)));
        let backup_dir = temp_dir.path().to_path_buf();
        let tasks = tasks_for("http://127.0.0.1:9", backup_dir.clone(), notifier.clone());
        let config = test_config("0 2 * * *", "0 9 * * *", backup_dir);
        let scheduler = Scheduler::with_warmup(config, tasks, Duration::from_secs(3600));

        let starting = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.start().await }
        });
        tokio::time::timeout(Duration::from_secs(5), async {
            while notifier.inner.titles().is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        let status = tokio::time::timeout(Duration::from_secs(2), scheduler.status())
            .await
            .unwrap();
        assert!(status.running);

        starting.abort();
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_cron_prevents_start() {
        let temp_dir = tempdir().unwrap();
        let notifier = std::sync::Arc::new(RecordingNotifier::default());
        let backup_dir = temp_dir.path().to_path_buf();
        let tasks = tasks_for("http://127.0.0.1:9", backup_dir.clone(), notifier.clone());
        let config = test_config("0 2 * * *", "bad cron", backup_dir);
        let scheduler = Scheduler::new(config, tasks);

        let err = scheduler.start().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(!scheduler.is_running().await);
        assert_eq!(scheduler.active_triggers().await, 0);
        assert!(notifier.titles().is_empty());
    }

    #[tokio::test]
    async fn test_warmup_health_check_runs() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get_status"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let temp_dir = tempdir().unwrap();
        let notifier = std::sync::Arc::new(RecordingNotifier::default());
        let tasks = tasks_for(&mock_server.uri(), temp_dir.path().to_path_buf(), notifier.clone());
        let config = test_config("0 0 1 1 *", "0 0 1 1 *", temp_dir.path().to_path_buf());
        let scheduler = Scheduler::with_warmup(config, tasks, Duration::from_millis(50));

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        scheduler.stop().await;

        let titles = notifier.titles();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[1], "❌ 健康检查失败");
    }

    #[tokio::test]
    async fn test_trigger_fires_and_resumes_after_restart() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get_status"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let temp_dir = tempdir().unwrap();
        let notifier = std::sync::Arc::new(RecordingNotifier::default());
        let tasks = tasks_for(&mock_server.uri(), temp_dir.path().to_path_buf(), notifier.clone());
        let config = test_config("0 0 1 1 *", "* * * * * *", temp_dir.path().to_path_buf());
        let scheduler = Scheduler::with_warmup(config, tasks, Duration::from_secs(3600));

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.stop().await;

        // 启动通知 + 至少一次健康检查失败通知
        let fired = notifier.titles().len();
        assert!(fired >= 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let after_stop = notifier.titles().len();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(notifier.titles().len(), after_stop);

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.stop().await;
        assert!(notifier.titles().len() > after_stop + 1);
    }
}
