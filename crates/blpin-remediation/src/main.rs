//! Intune 合规检查 / 检测 / 修复入口（blpin-remediation）。
//!
//! 职责：
//! - `check`：输出单行合规 JSON（`{"CheckBitLockerPIN":"TpmPin"}` 或 `{"CheckBitLockerPIN":"NoPin"}`）
//! - `detect`：以退出码告诉 Intune 是否需要修复（0 无需处理，1 需要修复）
//! - `remediate`：获取修复包、校验、解压，并在交互会话中启动 PIN 设置工具
//!
//! 约定：
//! - stdout 只用于合规 JSON，日志写到 stderr 与 `%ProgramData%\BitLockerPin\Logs`
//! - 所有错误在入口处统一记录并转换为退出码，不以 panic 结束
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

mod bundle;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use blpin_core::guard::SingleInstanceGuard;
use blpin_core::status::{self, ComplianceReport, DetectionOutcome, MountPoint, QueryError, VolumeStatus};
use blpin_core::{logging, paths};
use blpin_windows::bitlocker::status_provider_from_env;
use blpin_windows::{launch, process};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use crate::bundle::BundleSource;

/// 命令行参数。
///
/// 说明：
/// - `mount_point` 为被检查的系统卷（默认 `C:`）
/// - `setup_exe` 为设置工具进程名，同时也是修复包内的可执行文件名
#[derive(Debug, Parser)]
#[command(name = "blpin-remediation", version)]
struct Cli {
    #[arg(long, default_value = "C:")]
    mount_point: MountPoint,

    #[arg(long, default_value = "blpin-setup.exe")]
    setup_exe: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 输出合规状态 JSON。
    Check,
    /// 检测是否需要修复（退出码）。
    Detect,
    /// 获取修复包并启动 PIN 设置工具。
    Remediate(RemediateArgs),
}

#[derive(Debug, Args)]
struct RemediateArgs {
    /// 修复包下载地址。
    #[arg(long, conflicts_with = "bundle_path", required_unless_present = "bundle_path")]
    bundle_url: Option<String>,

    /// 本地修复包（zip）。
    #[arg(long)]
    bundle_path: Option<PathBuf>,

    /// 修复包期望的 SHA-256（十六进制）。
    #[arg(long)]
    sha256: Option<String>,

    /// 下载超时（秒）。
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let component = match cli.command {
        Commands::Check => "compliance",
        Commands::Detect => "detection",
        Commands::Remediate(_) => "remediation",
    };
    logging::init(component);

    let code = match &cli.command {
        Commands::Check => check(&cli),
        Commands::Detect => detect(&cli),
        Commands::Remediate(args) => match remediate(&cli, args) {
            Ok(()) => 0,
            Err(e) => {
                error!("修复失败: {e:#}");
                1
            }
        },
    };
    ExitCode::from(code as u8)
}

/// 查询卷状态（失败只记录警告，由调用方按不合规处理）。
fn query_status(cli: &Cli) -> Result<VolumeStatus, QueryError> {
    let provider = status_provider_from_env();
    let result = provider.volume_status(cli.mount_point);
    if let Err(e) = &result {
        warn!("查询 {} 的 BitLocker 状态失败: {e}", cli.mount_point);
    }
    result
}

/// 是否已有设置流程在进行（运行标记未过期，或设置工具进程存在）。
fn setup_in_progress(cli: &Cli) -> bool {
    match paths::default_guard_file() {
        Ok(path) => {
            if SingleInstanceGuard::new(path.clone()).is_held() {
                info!("运行标记存在: {}", path.display());
                return true;
            }
        }
        Err(e) => warn!("无法定位运行标记文件: {e:#}"),
    }
    if process::is_process_running(&cli.setup_exe) {
        info!("设置工具进程正在运行: {}", cli.setup_exe);
        return true;
    }
    false
}

fn check(cli: &Cli) -> i32 {
    let compliance = status::evaluate(&query_status(cli));
    info!("{} 合规状态: {}", cli.mount_point, compliance.as_str());
    println!("{}", ComplianceReport { check: compliance }.to_line());
    0
}

fn detect(cli: &Cli) -> i32 {
    let outcome = status::detect(&query_status(cli), || setup_in_progress(cli));
    info!("检测结果: {outcome:?}");
    outcome.exit_code()
}

/// 执行修复。
///
/// 主要步骤：
/// 1) 卷上已有 TPM+PIN 保护器或已有设置流程在运行则跳过
/// 2) 下载或复制修复包到 `%ProgramData%\BitLockerPin\bundle\bundle.zip`
/// 3) 可选 SHA-256 校验
/// 4) 解压到 `bundle\payload` 并启动设置工具（不等待）
fn remediate(cli: &Cli, args: &RemediateArgs) -> Result<()> {
    match status::detect(&query_status(cli), || setup_in_progress(cli)) {
        DetectionOutcome::RemediationRequired => {}
        DetectionOutcome::AlreadyRunning => {
            info!("PIN 设置流程已在进行，跳过本次修复");
            return Ok(());
        }
        outcome => {
            info!("{} 已存在 TPM+PIN 保护器（{outcome:?}），无需启动设置工具", cli.mount_point);
            return Ok(());
        }
    }

    let source = match (&args.bundle_url, &args.bundle_path) {
        (Some(url), _) => BundleSource::Url(url.clone()),
        (None, Some(path)) => BundleSource::Path(path.clone()),
        (None, None) => anyhow::bail!("需要指定 --bundle-url 或 --bundle-path"),
    };

    let bundle_dir = paths::default_bundle_dir()?;
    paths::ensure_dir(&bundle_dir)?;
    let zip_path = bundle_dir.join("bundle.zip");
    bundle::fetch(&source, &zip_path, Duration::from_secs(args.timeout_secs))?;

    if let Some(expected) = &args.sha256 {
        bundle::verify_sha256(&zip_path, expected)?;
        info!("修复包 SHA-256 校验通过");
    }

    let payload = bundle_dir.join("payload");
    let files = bundle::extract(&zip_path, &payload).context("解压修复包失败")?;
    info!("修复包已解压（{files} 个文件）: {}", payload.display());

    launch::launch_setup(&payload, &cli.setup_exe)?;
    Ok(())
}
