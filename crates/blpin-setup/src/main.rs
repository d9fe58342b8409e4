#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

//! BitLocker 启动 PIN 设置工具（blpin-setup）。
//!
//! 职责：
//! - 由修复脚本在用户交互会话中启动，引导用户设置符合策略的 TPM+PIN
//! - 同一时间只允许一个设置流程（运行守卫），已有实例时静默退出
//! - 结果以对话框告知用户，并以退出码告知调用方（0 成功/无需处理，1 失败/取消）
//!
//! 权限要求：
//! - 安装保护器需要管理员权限
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

#[cfg(windows)]
mod prompt;

use std::process::ExitCode;

use blpin_core::logging;
use blpin_core::status::MountPoint;
use clap::Parser;
use tracing::info;

/// 窗口与对话框标题。
#[cfg(windows)]
pub(crate) const WINDOW_TITLE: &str = "BitLocker PIN 设置";

#[derive(Debug, Parser)]
#[command(name = "blpin-setup", version)]
struct Cli {
    /// 目标卷（默认系统盘）。
    #[arg(long, default_value = "C:")]
    mount_point: MountPoint,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(path) = logging::init("setup") {
        info!("日志文件: {}", path.display());
    }
    info!("PIN 设置工具启动，目标卷 {}", cli.mount_point);

    let code = run(&cli);
    ExitCode::from(code as u8)
}

/// 组装 Windows 协作者并执行设置流程。
///
/// 返回值：
/// - 进程退出码（见 [`SetupOutcome::exit_code`](blpin_core::setup::SetupOutcome::exit_code)）
#[cfg(windows)]
fn run(cli: &Cli) -> i32 {
    use blpin_core::guard::SingleInstanceGuard;
    use blpin_core::paths;
    use blpin_core::setup::{run_setup, SetupContext};
    use blpin_windows::bitlocker::{status_provider_from_env, PowerShellBitLocker};
    use blpin_windows::elevation;
    use blpin_windows::identity::EnvIdentity;
    use blpin_windows::notify::{self, Severity};
    use blpin_windows::registry::RegistryPolicyStore;
    use tracing::error;

    if !elevation::is_running_as_admin() {
        error!("需要管理员权限才能设置 BitLocker PIN");
        notify::show_message(
            WINDOW_TITLE,
            "需要管理员权限才能设置 BitLocker PIN，请联系 IT 支持。",
            Severity::Warning,
        );
        return 1;
    }

    let guard = match paths::default_guard_file() {
        Ok(path) => SingleInstanceGuard::new(path),
        Err(e) => {
            error!("无法定位运行标记文件: {e:#}");
            return 1;
        }
    };
    let status = status_provider_from_env();
    let policy = RegistryPolicyStore::default();
    let installer = PowerShellBitLocker::default();
    let ctx = SetupContext {
        guard: &guard,
        mount_point: cli.mount_point,
        status: status.as_ref(),
        policy: &policy,
        identity: &EnvIdentity,
        installer: &installer,
    };

    let outcome = run_setup(&ctx, &mut prompt::EguiPinPrompt);
    info!("设置流程结束: {outcome:?}");
    if let Some((text, severity)) = user_message(&outcome) {
        notify::show_message(WINDOW_TITLE, &text, severity);
    }
    outcome.exit_code()
}

/// 需要展示给用户的结果提示（已有实例运行、用户主动取消时不打扰用户）。
#[cfg(windows)]
fn user_message(
    outcome: &blpin_core::setup::SetupOutcome,
) -> Option<(String, blpin_windows::notify::Severity)> {
    use blpin_core::setup::SetupOutcome;
    use blpin_windows::notify::Severity;

    match outcome {
        SetupOutcome::Installed => Some((
            "BitLocker 启动 PIN 已设置，下次开机时请输入新 PIN。".to_string(),
            Severity::Info,
        )),
        SetupOutcome::AlreadyConfigured => Some((
            "此设备已设置 BitLocker 启动 PIN，无需再次设置。".to_string(),
            Severity::Info,
        )),
        SetupOutcome::InstallFailed(msg) | SetupOutcome::Failed(msg) => Some((
            format!("设置 BitLocker 启动 PIN 失败：\n{msg}"),
            Severity::Warning,
        )),
        SetupOutcome::AlreadyRunning | SetupOutcome::Cancelled => None,
    }
}

#[cfg(not(windows))]
fn run(_cli: &Cli) -> i32 {
    tracing::error!("PIN 设置工具只能在 Windows 上运行");
    1
}
