//! PIN 设置流程编排与外部协作者接口。
//!
//! 流程：
//! 1) 获取单实例运行守卫（已有实例在运行则静默退出）
//! 2) 查询卷状态：已存在 TPM+PIN 保护器则无需再次设置
//! 3) 读取策略与当前账户，弹出交互输入（输入界面内部循环，直到通过校验或取消）
//! 4) 调用系统接口安装 TPM+PIN 保护器
//!
//! 约束：
//! - 运行守卫在任何退出路径上都会释放（由 [`RunGuard`](crate::guard::RunGuard) 的 Drop 保证）
//! - PIN 只在内存中以 `Zeroizing<String>` 持有，日志只输出掩码
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::sync::Arc;

use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::guard::{GuardError, SingleInstanceGuard};
use crate::pin::{self, PinRejection};
use crate::policy::Policy;
use crate::status::{MountPoint, QueryError, VolumeStatus};

/// 卷加密状态查询。
pub trait VolumeStatusProvider {
    fn volume_status(&self, mount_point: MountPoint) -> Result<VolumeStatus, QueryError>;
}

/// 策略读取（缺失时返回默认策略，不报错）。
pub trait PolicyStore {
    fn read_policy(&self) -> Policy;
}

/// 当前登录账户。
pub trait IdentityProvider {
    fn current_account_name(&self) -> String;
}

/// 交互输入界面使用的校验回调：`(pin, confirm)`。
///
/// 独立持有策略与账户名，可交给界面线程或 GUI 事件循环长期保存。
pub type PinValidator = Arc<dyn Fn(&str, &str) -> Result<(), PinRejection> + Send + Sync>;

/// 交互式 PIN 输入。
pub trait PinPrompt {
    /// 显示输入界面并阻塞直到得到结果。
    ///
    /// 返回值：
    /// - `Some(pin)`：用户提交且 `validate` 通过
    /// - `None`：用户取消或关闭界面
    fn prompt_for_pin(
        &mut self,
        policy: &Policy,
        validate: PinValidator,
    ) -> Option<Zeroizing<String>>;
}

/// TPM+PIN 保护器安装（不保证幂等，重复调用可能产生重复保护器）。
pub trait ProtectorInstaller {
    fn install_tpm_pin_protector(&self, mount_point: MountPoint, pin: &str) -> anyhow::Result<()>;
}

/// 一次设置流程所需的协作者。
pub struct SetupContext<'a> {
    pub guard: &'a SingleInstanceGuard,
    pub mount_point: MountPoint,
    pub status: &'a dyn VolumeStatusProvider,
    pub policy: &'a dyn PolicyStore,
    pub identity: &'a dyn IdentityProvider,
    pub installer: &'a dyn ProtectorInstaller,
}

/// 设置流程结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// 保护器已安装。
    Installed,
    /// 卷上已存在 TPM+PIN 保护器，无需设置。
    AlreadyConfigured,
    /// 其他实例正在运行。
    AlreadyRunning,
    /// 用户取消输入。
    Cancelled,
    /// 保护器安装失败（不自动重试）。
    InstallFailed(String),
    /// 运行守卫等本地资源异常。
    Failed(String),
}

impl SetupOutcome {
    /// 进程退出码。
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupOutcome::Installed | SetupOutcome::AlreadyConfigured | SetupOutcome::AlreadyRunning => 0,
            SetupOutcome::Cancelled | SetupOutcome::InstallFailed(_) | SetupOutcome::Failed(_) => 1,
        }
    }
}

/// 执行一次 PIN 设置流程。
///
/// 异常处理：
/// - 所有失败都转换为 [`SetupOutcome`]，不向上传播
/// - 状态查询失败只记录警告，继续进入输入流程
pub fn run_setup(ctx: &SetupContext<'_>, prompt: &mut dyn PinPrompt) -> SetupOutcome {
    let _guard = match ctx.guard.acquire() {
        Ok(g) => g,
        Err(GuardError::AlreadyRunning { path }) => {
            info!("已有 PIN 设置流程在运行，本次退出（{}）", path.display());
            return SetupOutcome::AlreadyRunning;
        }
        Err(e) => {
            error!("获取运行守卫失败: {e}");
            return SetupOutcome::Failed(e.to_string());
        }
    };

    match ctx.status.volume_status(ctx.mount_point) {
        Ok(status) if status.has_tpm_pin() => {
            info!("{} 已存在 TPM+PIN 保护器，无需设置", ctx.mount_point);
            return SetupOutcome::AlreadyConfigured;
        }
        Ok(status) => info!(
            "{} 当前状态: 保护={}, 完全加密={}, 保护器={:?}",
            ctx.mount_point, status.protection_on, status.fully_encrypted, status.protector_types
        ),
        Err(e) => warn!("查询 {} 状态失败，继续设置流程: {e}", ctx.mount_point),
    }

    let policy = ctx.policy.read_policy();
    let account = ctx.identity.current_account_name();
    info!("PIN 策略: {policy}");

    let validator_account = account.clone();
    let validate: PinValidator = Arc::new(move |pin: &str, confirm: &str| {
        pin::validate_entry(pin, confirm, &policy, &validator_account)
    });
    let Some(pin) = prompt.prompt_for_pin(&policy, validate) else {
        warn!("用户取消了 PIN 设置");
        return SetupOutcome::Cancelled;
    };

    // 输入界面理应只返回已通过校验的 PIN，这里再确认一次，避免实现偏差。
    if let Err(e) = pin::validate_entry(&pin, &pin, &policy, &account) {
        error!("输入界面返回了未通过校验的 PIN: {e}");
        return SetupOutcome::Failed(e.to_string());
    }

    info!(
        "开始为 {} 安装 TPM+PIN 保护器（PIN: {}）",
        ctx.mount_point,
        pin::mask_pin(&pin)
    );
    match ctx.installer.install_tpm_pin_protector(ctx.mount_point, &pin) {
        Ok(()) => {
            info!("TPM+PIN 保护器安装完成");
            SetupOutcome::Installed
        }
        Err(e) => {
            warn!("TPM+PIN 保护器安装失败: {e:#}");
            SetupOutcome::InstallFailed(format!("{e:#}"))
        }
    }
}
