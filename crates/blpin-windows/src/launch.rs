//! 在交互用户会话中启动 PIN 设置工具。
//!
//! 背景：
//! - Intune 修复脚本以 SYSTEM 身份运行在 Session 0，直接启动的 GUI 对用户不可见
//! - 修复包中若携带 `ServiceUI.exe`，则通过它把设置工具投递到 `explorer.exe` 所在的用户会话
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use tracing::info;

/// 会话投递工具的文件名。
pub const SERVICE_UI_EXE: &str = "ServiceUI.exe";

/// 构造启动命令（不执行）。
///
/// 参数：
/// - `payload_dir`：修复包解压目录
/// - `setup_exe`：设置工具文件名（相对 `payload_dir`）
///
/// 异常处理：
/// - 设置工具不存在时返回错误
pub fn build_launch_command(payload_dir: &Path, setup_exe: &str) -> Result<Command> {
    let setup = payload_dir.join(setup_exe);
    if !setup.exists() {
        return Err(anyhow!("设置工具不存在: {}", setup.display()));
    }
    let service_ui = payload_dir.join(SERVICE_UI_EXE);
    let cmd = if service_ui.exists() {
        let mut c = Command::new(service_ui);
        c.arg("-process:explorer.exe").arg(&setup);
        c
    } else {
        Command::new(&setup)
    };
    Ok(cmd)
}

/// 启动设置工具（不等待其退出）。
///
/// 返回值：
/// - 子进程 PID
pub fn launch_setup(payload_dir: &Path, setup_exe: &str) -> Result<u32> {
    let mut cmd = build_launch_command(payload_dir, setup_exe)?;
    let program = PathBuf::from(cmd.get_program());
    let child = cmd
        .current_dir(payload_dir)
        .spawn()
        .with_context(|| format!("启动设置工具失败: {}", program.display()))?;
    info!("已启动设置工具: {} (pid {})", program.display(), child.id());
    Ok(child.id())
}
