//! 统一路径与目录约定（主要面向 Windows ProgramData）。
//!
//! 目标：
//! - 将运行守卫、日志、修复包等落盘路径集中管理
//! - 所有路径均以 `ProgramData` 环境变量为根，便于测试时整体重定向
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// ProgramData 下的产品顶层目录名。
///
/// 示例（默认）：
/// - `%ProgramData%\BitLockerPin`
pub const VENDOR_DIR: &str = "BitLockerPin";

/// 获取本项目在 ProgramData 下的根目录。
///
/// 返回值：
/// - 成功：`%ProgramData%\BitLockerPin`
///
/// 异常处理：
/// - 当环境变量 `ProgramData` 不存在或不可读时，返回错误。
pub fn program_data_dir() -> Result<PathBuf> {
    let program_data = std::env::var("ProgramData").context("读取 ProgramData 环境变量失败")?;
    Ok(PathBuf::from(program_data).join(VENDOR_DIR))
}

/// 确保目录存在（不存在则递归创建）。
///
/// 异常处理：
/// - 目录创建失败（权限、路径非法等）会返回错误。
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("创建目录失败: {}", path.display()))?;
    Ok(())
}

/// 默认运行守卫标记文件。
///
/// 返回值：
/// - `%ProgramData%\BitLockerPin\setup.lock`
pub fn default_guard_file() -> Result<PathBuf> {
    Ok(program_data_dir()?.join("setup.lock"))
}

/// 默认日志目录。
///
/// 返回值：
/// - `%ProgramData%\BitLockerPin\Logs`
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(program_data_dir()?.join("Logs"))
}

/// 默认修复包工作目录（下载的 zip 与解压后的 payload 都放在这里）。
///
/// 返回值：
/// - `%ProgramData%\BitLockerPin\bundle`
pub fn default_bundle_dir() -> Result<PathBuf> {
    Ok(program_data_dir()?.join("bundle"))
}
