//! 日志初始化（tracing-subscriber）。
//!
//! 输出：
//! - 标准错误（便于 Intune 收集脚本输出时与 stdout 上的合规 JSON 分离）
//! - 追加写入 `%ProgramData%\BitLockerPin\Logs\<component>.log`（无 ANSI 颜色）
//!
//! 约定：
//! - 默认级别 `info`，可通过 `RUST_LOG` 调整
//! - 时间戳统一为 UTC RFC 3339
//! - 任何日志都不得包含 PIN 明文（见 [`crate::pin::PIN_MASK`]）
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::paths;

/// 初始化全局日志。
///
/// 参数：
/// - `component`：组件名（决定日志文件名，例如 `remediation` / `setup`）
///
/// 返回值：
/// - 日志文件路径；文件无法打开时返回 `None`（仅输出到标准错误）
///
/// 说明：
/// - 重复初始化不会 panic（后一次调用被忽略）
pub fn init(component: &str) -> Option<PathBuf> {
    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into());

    let (file_layer, log_path, open_error) = match open_log_file(component) {
        Ok((path, file)) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(Mutex::new(file)),
            ),
            Some(path),
            None,
        ),
        Err(e) => (None, None, Some(e)),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init();

    if let Some(e) = open_error {
        warn!("无法打开日志文件，仅输出到标准错误: {e:#}");
    }
    log_path
}

/// 打开（或创建）组件日志文件，以追加方式写入。
fn open_log_file(component: &str) -> Result<(PathBuf, File)> {
    let dir = paths::default_log_dir()?;
    paths::ensure_dir(&dir)?;
    let path = dir.join(format!("{component}.log"));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("打开日志文件失败: {}", path.display()))?;
    Ok((path, file))
}
