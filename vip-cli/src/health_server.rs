//! HTTP 健康检查服务
//!
//! `/health` 供容器编排探活使用，`/status` 返回更详细的 JSON，`/` 是给人看的页面。

use crate::project_info::{metadata, version_info};
use crate::utils::format_uptime;
use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use vip_core::{
    analyzer::{self, AnalysisResult},
    scheduler::{Scheduler, SchedulerStatus},
};

/// 路由共享状态
#[derive(Clone)]
pub struct HealthState {
    scheduler: Scheduler,
}

impl HealthState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

/// CRCON 连接探测结果
#[derive(Debug, Clone, Serialize)]
pub struct CrconCheck {
    pub connected: bool,
    pub server: Option<String>,
    pub players: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceInfo {
    running: bool,
    uptime: Option<i64>,
}

/// `/health` 响应
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    service: ServiceInfo,
    pub crcon: CrconCheck,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.service.running && self.crcon.connected
    }
}

pub fn router(state: HealthState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// 监听端口并处理请求，直到 `shutdown` 完成
pub async fn serve<F>(state: HealthState, bind: &str, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("无法监听地址 {bind}"))?;
    info!("🌐 健康检查服务已启动: http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("健康检查服务异常退出")?;

    info!("健康检查服务已关闭");
    Ok(())
}

async fn check_crcon(scheduler: &Scheduler) -> CrconCheck {
    match scheduler.tasks().api().get_status().await {
        Ok(status) => CrconCheck {
            connected: true,
            players: Some(status.players_display()),
            server: Some(status.name),
            error: None,
        },
        Err(e) => {
            debug!(error = %e, "健康检查: CRCON 不可用");
            CrconCheck {
                connected: false,
                server: None,
                players: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn build_health(scheduler: &Scheduler) -> (HealthReport, SchedulerStatus) {
    let status = scheduler.status().await;
    let crcon = check_crcon(scheduler).await;

    let mut report = HealthReport {
        status: "unhealthy",
        timestamp: Utc::now().to_rfc3339(),
        service: ServiceInfo {
            running: status.running,
            uptime: status.uptime_secs,
        },
        crcon,
    };
    if report.is_healthy() {
        report.status = "healthy";
    }
    (report, status)
}

fn status_code(report: &HealthReport) -> StatusCode {
    if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn health_handler(State(state): State<HealthState>) -> Response {
    let (report, _) = build_health(&state.scheduler).await;
    (status_code(&report), Json(report)).into_response()
}

/// VIP 统计，获取失败时返回错误信息
async fn vip_summary(scheduler: &Scheduler) -> std::result::Result<AnalysisResult, String> {
    scheduler
        .tasks()
        .api()
        .get_vip_ids()
        .await
        .map(|vips| analyzer::analyze(&vips, Utc::now()))
        .map_err(|e| e.to_string())
}

async fn backups_summary(scheduler: &Scheduler) -> Value {
    let manager = scheduler.tasks().backup_manager();
    match manager.list_backups().await {
        Ok(files) => json!({
            "directory": manager.backup_dir().display().to_string(),
            "count": files.len(),
            "latest": files.first(),
        }),
        Err(e) => json!({
            "directory": manager.backup_dir().display().to_string(),
            "error": e.to_string(),
        }),
    }
}

async fn build_status(scheduler: &Scheduler) -> (StatusCode, Value) {
    let (report, schedule) = build_health(scheduler).await;
    let code = status_code(&report);

    let vips = if report.crcon.connected {
        match vip_summary(scheduler).await {
            Ok(result) => json!({
                "total": result.total,
                "permanent": result.permanent,
                "temporary": result.temporary,
                "expired": result.expired,
                "expiring_today": result.expiring_today,
                "expiring_soon": result.expiring_soon,
                "platforms": result.platforms,
            }),
            Err(e) => json!({ "error": e }),
        }
    } else {
        Value::Null
    };

    let body = json!({
        "status": report.status,
        "timestamp": report.timestamp,
        "version": version_info::CLI_VERSION,
        "service": report.service,
        "crcon": report.crcon,
        "schedule": schedule,
        "vips": vips,
        "backups": backups_summary(scheduler).await,
    });
    (code, body)
}

async fn status_handler(State(state): State<HealthState>) -> Response {
    let (code, body) = build_status(&state.scheduler).await;
    (code, Json(body)).into_response()
}

async fn index_handler(State(state): State<HealthState>) -> Html<String> {
    let (report, schedule) = build_health(&state.scheduler).await;
    Html(render_index(&report, &schedule))
}

fn render_index(report: &HealthReport, schedule: &SchedulerStatus) -> String {
    let icon = if report.is_healthy() { "✅" } else { "❌" };
    let crcon_line = if report.crcon.connected {
        format!(
            "{} ({})",
            escape_html(report.crcon.server.as_deref().unwrap_or_default()),
            escape_html(report.crcon.players.as_deref().unwrap_or_default())
        )
    } else {
        format!(
            "未连接: {}",
            escape_html(report.crcon.error.as_deref().unwrap_or_default())
        )
    };
    let next = |t: Option<chrono::DateTime<Utc>>| {
        t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head><meta charset="utf-8"><title>{name}</title></head>
<body>
<h1>{icon} {name}</h1>
<p>版本: {version}</p>
<ul>
<li>状态: {status}</li>
<li>调度器: {running}</li>
<li>运行时间: {uptime}</li>
<li>CRCON: {crcon}</li>
<li>备份计划: <code>{backup_cron}</code> (下次: {next_backup})</li>
<li>到期检查: <code>{alert_cron}</code> (下次: {next_alert})</li>
<li>时区: {timezone}</li>
<li>保留天数: {retention}</li>
</ul>
<p><a href="/health">/health</a> · <a href="/status">/status</a></p>
</body>
</html>
"#,
        name = metadata::display::FRIENDLY_NAME,
        version = version_info::CLI_VERSION,
        status = report.status,
        running = if schedule.running { "运行中" } else { "已停止" },
        uptime = schedule
            .uptime_secs
            .map(format_uptime)
            .unwrap_or_else(|| "-".to_string()),
        crcon = crcon_line,
        backup_cron = escape_html(&schedule.backup_cron),
        next_backup = next(schedule.next_backup),
        alert_cron = escape_html(&schedule.alert_cron),
        next_alert = next(schedule.next_health_check),
        timezone = schedule.timezone,
        retention = schedule.retention_days,
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
