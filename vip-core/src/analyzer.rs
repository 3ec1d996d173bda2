//! VIP 到期分析
//!
//! 纯函数：输入 VIP 列表和当前时间，输出分类统计与告警列表，没有任何副作用。
//! 持久化和通知由调用方负责。

use crate::constants::{analysis, platform};
use crate::models::VipRecord;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// 玩家平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Pc,
    Console,
    Unknown,
}

impl Platform {
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Pc => "PC",
            Platform::Console => "主机",
            Platform::Unknown => "未知",
        }
    }
}

/// 根据玩家ID前缀识别平台
pub fn classify_platform(player_id: &str) -> Platform {
    if player_id.starts_with(platform::PC_PREFIX) {
        Platform::Pc
    } else if player_id.starts_with(platform::CONSOLE_PREFIX)
        || player_id.starts_with(platform::CONSOLE_ALT_PREFIX)
    {
        Platform::Console
    } else {
        Platform::Unknown
    }
}

/// 单条记录的到期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationStatus {
    Permanent,
    /// 已过期，`days_ago` 为过期的整天数
    Expired { days_ago: i64 },
    ExpiringToday,
    /// 1..=7 天内到期
    ExpiringSoon { days: i64 },
    /// 超过7天才到期
    Active { days: i64 },
}

impl ExpirationStatus {
    pub fn is_temporary(&self) -> bool {
        !matches!(self, ExpirationStatus::Permanent)
    }
}

/// 解析过期时间，返回 None 表示永久（空值或占位符）
///
/// 无法解析的时间同样返回 None，由调用方记录警告。
pub fn parse_expiration(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == analysis::PERMANENT_SENTINEL {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // 不带时区的时间按UTC处理
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// 根据过期时间与当前时间计算到期状态
pub fn classify_expiration(expiration: DateTime<Utc>, now: DateTime<Utc>) -> ExpirationStatus {
    let diff_ms = (expiration - now).num_milliseconds();

    if diff_ms < 0 {
        return ExpirationStatus::Expired {
            days_ago: (-diff_ms) / analysis::DAY_MILLIS,
        };
    }

    // 向上取整的剩余天数
    let days = (diff_ms + analysis::DAY_MILLIS - 1) / analysis::DAY_MILLIS;
    match days {
        0 => ExpirationStatus::ExpiringToday,
        d if d <= analysis::EXPIRING_SOON_DAYS => ExpirationStatus::ExpiringSoon { days: d },
        d => ExpirationStatus::Active { days: d },
    }
}

/// 告警类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Expired,
    ExpiringToday,
    ExpiringSoon,
}

/// 一条到期告警
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VipAlert {
    pub player_id: String,
    pub name: String,
    pub kind: AlertKind,
    /// 过期天数或剩余天数
    pub days: i64,
    pub expiration: DateTime<Utc>,
}

impl fmt::Display for VipAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.expiration.format("%Y-%m-%d %H:%M UTC");
        match self.kind {
            AlertKind::Expired if self.days == 0 => write!(
                f,
                "❌ {} ({}) 的VIP已过期不足 1 天 ({})",
                self.name, self.player_id, date
            ),
            AlertKind::Expired => write!(
                f,
                "❌ {} ({}) 的VIP已过期 {} 天 ({})",
                self.name, self.player_id, self.days, date
            ),
            AlertKind::ExpiringToday => write!(
                f,
                "⚠️ {} ({}) 的VIP今天到期 ({})",
                self.name, self.player_id, date
            ),
            AlertKind::ExpiringSoon => write!(
                f,
                "⏰ {} ({}) 的VIP将在 {} 天后到期 ({})",
                self.name, self.player_id, self.days, date
            ),
        }
    }
}

/// 平台统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlatformCounts {
    pub pc: usize,
    pub console: usize,
    pub unknown: usize,
}

/// 分析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub total: usize,
    pub permanent: usize,
    pub temporary: usize,
    pub expired: usize,
    pub expiring_today: usize,
    pub expiring_soon: usize,
    pub platforms: PlatformCounts,
    /// 按输入顺序排列
    pub alerts: Vec<VipAlert>,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// 是否存在需要通知的到期情况
    pub fn has_issues(&self) -> bool {
        self.expired > 0 || self.expiring_today > 0 || self.expiring_soon > 0
    }

    /// 所有告警的文本
    pub fn alert_lines(&self) -> Vec<String> {
        self.alerts.iter().map(ToString::to_string).collect()
    }

    /// 非零的告警分类，用于合并通知
    pub fn issue_summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.expired > 0 {
            lines.push(format!("❌ 已过期: {}", self.expired));
        }
        if self.expiring_today > 0 {
            lines.push(format!("⚠️ 今天到期: {}", self.expiring_today));
        }
        if self.expiring_soon > 0 {
            lines.push(format!("⏰ 7天内到期: {}", self.expiring_soon));
        }
        lines
    }

    /// 生成写入报告文件的文本
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("# CRCON VIP 分析报告\n");
        out.push_str(&format!("# 生成时间: {}\n\n", self.analyzed_at.to_rfc3339()));
        out.push_str(&format!("VIP 总数: {}\n", self.total));
        out.push_str(&format!("永久 VIP: {}\n", self.permanent));
        out.push_str(&format!("临时 VIP: {}\n", self.temporary));
        out.push_str(&format!("已过期: {}\n", self.expired));
        out.push_str(&format!("今天到期: {}\n", self.expiring_today));
        out.push_str(&format!("7天内到期: {}\n\n", self.expiring_soon));
        out.push_str("平台分布:\n");
        out.push_str(&format!("  PC: {}\n", self.platforms.pc));
        out.push_str(&format!("  主机: {}\n", self.platforms.console));
        out.push_str(&format!("  未知: {}\n", self.platforms.unknown));

        if !self.alerts.is_empty() {
            out.push_str("\n告警:\n");
            for line in self.alert_lines() {
                out.push_str(&format!("  {line}\n"));
            }
        }
        out
    }
}

/// 对 VIP 列表进行分类统计
pub fn analyze(vips: &[VipRecord], now: DateTime<Utc>) -> AnalysisResult {
    let mut result = AnalysisResult {
        total: vips.len(),
        permanent: 0,
        temporary: 0,
        expired: 0,
        expiring_today: 0,
        expiring_soon: 0,
        platforms: PlatformCounts::default(),
        alerts: Vec::new(),
        analyzed_at: now,
    };

    for vip in vips {
        match classify_platform(&vip.player_id) {
            Platform::Pc => result.platforms.pc += 1,
            Platform::Console => result.platforms.console += 1,
            Platform::Unknown => result.platforms.unknown += 1,
        }

        let Some(expiration) = parse_expiration(vip.expiration.as_deref()) else {
            if let Some(raw) = vip.expiration.as_deref() {
                let raw = raw.trim();
                if !raw.is_empty() && raw != analysis::PERMANENT_SENTINEL {
                    warn!(player_id = %vip.player_id, expiration = %raw, "无法解析的过期时间，按永久VIP处理");
                }
            }
            result.permanent += 1;
            continue;
        };

        result.temporary += 1;

        let (kind, days) = match classify_expiration(expiration, now) {
            ExpirationStatus::Expired { days_ago } => {
                result.expired += 1;
                (AlertKind::Expired, days_ago)
            }
            ExpirationStatus::ExpiringToday => {
                result.expiring_today += 1;
                (AlertKind::ExpiringToday, 0)
            }
            ExpirationStatus::ExpiringSoon { days } => {
                result.expiring_soon += 1;
                (AlertKind::ExpiringSoon, days)
            }
            ExpirationStatus::Active { .. } | ExpirationStatus::Permanent => continue,
        };

        result.alerts.push(VipAlert {
            player_id: vip.player_id.clone(),
            name: vip.name.clone(),
            kind,
            days,
            expiration,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn vip_expiring_at(id: &str, at: DateTime<Utc>) -> VipRecord {
        VipRecord::new(id, format!("player-{id}")).with_expiration(at.to_rfc3339())
    }

    #[test]
    fn test_platform_classification() {
        assert_eq!(classify_platform("76561198000000001"), Platform::Pc);
        assert_eq!(classify_platform("1100000100000001"), Platform::Console);
        assert_eq!(classify_platform("10000000abcdef"), Platform::Console);
        assert_eq!(classify_platform("990000000"), Platform::Unknown);
        assert_eq!(classify_platform(""), Platform::Unknown);
    }

    #[test]
    fn test_expiration_boundaries() {
        let now = now();
        assert_eq!(classify_expiration(now, now), ExpirationStatus::ExpiringToday);
        assert_eq!(
            classify_expiration(now - Duration::milliseconds(1), now),
            ExpirationStatus::Expired { days_ago: 0 }
        );
        assert_eq!(
            classify_expiration(now + Duration::days(7), now),
            ExpirationStatus::ExpiringSoon { days: 7 }
        );
        assert_eq!(
            classify_expiration(now + Duration::days(8), now),
            ExpirationStatus::Active { days: 8 }
        );
        assert_eq!(
            classify_expiration(now + Duration::hours(1), now),
            ExpirationStatus::ExpiringSoon { days: 1 }
        );
        assert_eq!(
            classify_expiration(now - Duration::days(3), now),
            ExpirationStatus::Expired { days_ago: 3 }
        );
    }

    #[test]
    fn test_alert_display_for_recent_expiry() {
        let expiration = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let mut alert = VipAlert {
            player_id: "76561198000000001".to_string(),
            name: "Alice".to_string(),
            kind: AlertKind::Expired,
            days: 0,
            expiration,
        };
        assert_eq!(
            alert.to_string(),
            "❌ Alice (76561198000000001) 的VIP已过期不足 1 天 (2026-10-16 08:00 UTC)"
        );

        alert.days = 3;
        assert!(alert.to_string().contains("已过期 3 天"));
    }

    #[test]
    fn test_parse_expiration_sentinels_and_formats() {
        assert_eq!(parse_expiration(None), None);
        assert_eq!(parse_expiration(Some("")), None);
        assert_eq!(parse_expiration(Some("None")), None);
        assert_eq!(parse_expiration(Some("not a date")), None);

        let expected = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_expiration(Some("2030-01-01T00:00:00+00:00")), Some(expected));
        assert_eq!(parse_expiration(Some("2030-01-01T00:00:00")), Some(expected));
        assert_eq!(parse_expiration(Some("2030-01-01 00:00:00")), Some(expected));
        assert_eq!(
            parse_expiration(Some("2030-01-01T02:00:00+02:00")),
            Some(expected)
        );
    }

    #[test]
    fn test_analyze_buckets_and_alert_order() {
        let now = now();
        let vips = vec![
            VipRecord::new("76561198000000001", "perm-null"),
            VipRecord::new("76561198000000002", "perm-sentinel").with_expiration("None"),
            vip_expiring_at("1100000100000001", now + Duration::days(30)),
            vip_expiring_at("76561198000000003", now + Duration::days(3)),
            vip_expiring_at("990000000", now - Duration::days(2)),
            vip_expiring_at("10000000123", now),
        ];

        let result = analyze(&vips, now);

        assert_eq!(result.total, 6);
        assert_eq!(result.permanent, 2);
        assert_eq!(result.temporary, 4);
        assert_eq!(result.expired, 1);
        assert_eq!(result.expiring_today, 1);
        assert_eq!(result.expiring_soon, 1);
        assert_eq!(
            result.platforms,
            PlatformCounts { pc: 3, console: 2, unknown: 1 }
        );
        assert!(result.has_issues());

        // 告警保持输入顺序
        let kinds: Vec<AlertKind> = result.alerts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![AlertKind::ExpiringSoon, AlertKind::Expired, AlertKind::ExpiringToday]
        );
        assert_eq!(result.issue_summary().len(), 3);
    }

    #[test]
    fn test_bucket_invariants_hold() {
        let now = now();
        let vips: Vec<VipRecord> = (-12i64..12)
            .map(|offset| {
                let id = format!("7656119800{offset:+}");
                vip_expiring_at(&id, now + Duration::hours(offset * 17))
            })
            .chain([
                VipRecord::new("x", "perm"),
                VipRecord::new("y", "bad").with_expiration("garbage"),
            ])
            .collect();

        let result = analyze(&vips, now);
        assert_eq!(result.permanent + result.temporary, result.total);
        assert!(result.expired + result.expiring_today + result.expiring_soon <= result.temporary);
        assert_eq!(
            result.platforms.pc + result.platforms.console + result.platforms.unknown,
            result.total
        );
        assert_eq!(
            result.alerts.len(),
            result.expired + result.expiring_today + result.expiring_soon
        );
    }

    #[test]
    fn test_no_issues_for_far_future() {
        let now = now();
        let vips = vec![
            vip_expiring_at("76561198000000001", now + Duration::days(8)),
            VipRecord::new("76561198000000002", "perm"),
        ];
        let result = analyze(&vips, now);
        assert!(!result.has_issues());
        assert!(result.alerts.is_empty());
        assert!(result.issue_summary().is_empty());
    }

    #[test]
    fn test_render_report_contains_counts_and_alerts() {
        let now = now();
        let vips = vec![vip_expiring_at("76561198000000001", now - Duration::days(1))];
        let report = analyze(&vips, now).render_report();
        assert!(report.contains("VIP 总数: 1"));
        assert!(report.contains("已过期: 1"));
        assert!(report.contains("76561198000000001"));
    }
}
