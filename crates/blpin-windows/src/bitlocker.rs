//! BitLocker 卷状态查询与 TPM+PIN 保护器安装（基于 PowerShell BitLocker 模块）。
//!
//! 说明：
//! - 使用 `Get-BitLockerVolume` / `Add-BitLockerKeyProtector`，避免直接绑定 WMI/COM 接口
//! - 查询结果在脚本内转换为字符串并 `ConvertTo-Json -Compress`，由核心库解析
//! - 挂载点由 [`MountPoint`] 保证为盘符形式，可直接拼接到脚本中
//!
//! 安全注意：
//! - PIN 通过子进程标准输入传递，不出现在命令行参数中（命令行对其他进程可见）
//! - 安装脚本显式使用 UTF-8 读取标准输入，避免控制台代码页改变 PIN 内容
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use anyhow::{anyhow, Context, Result};
use blpin_core::setup::{ProtectorInstaller, VolumeStatusProvider};
use blpin_core::status::{MountPoint, QueryError, VolumeStatus};
use tracing::debug;
use zeroize::Zeroizing;

/// 测试钩子：设置后从该 JSON 文件读取卷状态，而不调用 PowerShell。
pub const STATUS_FILE_ENV: &str = "BLPIN_TEST_VOLUME_STATUS_FILE";

/// 通过 PowerShell 访问 BitLocker。
#[derive(Debug, Clone)]
pub struct PowerShellBitLocker {
    powershell: PathBuf,
}

impl Default for PowerShellBitLocker {
    fn default() -> Self {
        Self {
            powershell: PathBuf::from("powershell.exe"),
        }
    }
}

impl PowerShellBitLocker {
    /// 执行一段 PowerShell 脚本。
    ///
    /// 参数：
    /// - `script`：脚本文本（`-Command` 方式）
    /// - `stdin`：写入子进程标准输入的内容（可选）
    ///
    /// 异常处理：
    /// - 进程启动失败或写入标准输入失败返回错误；退出码由调用方判断
    fn run(&self, script: &str, stdin: Option<&str>) -> Result<Output> {
        let mut cmd = Command::new(&self.powershell);
        cmd.args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-Command", script])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });
        let mut child = cmd
            .spawn()
            .with_context(|| format!("启动 PowerShell 失败: {}", self.powershell.display()))?;
        if let Some(input) = stdin {
            let mut pipe = child.stdin.take().context("获取 PowerShell 标准输入失败")?;
            let line = Zeroizing::new(format!("{input}\n"));
            pipe.write_all(line.as_bytes())
                .context("写入 PowerShell 标准输入失败")?;
        }
        child.wait_with_output().context("等待 PowerShell 退出失败")
    }
}

fn status_script(mount_point: MountPoint) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'; \
         $v = Get-BitLockerVolume -MountPoint '{mount_point}'; \
         [pscustomobject]@{{ \
           ProtectionStatus = $v.ProtectionStatus.ToString(); \
           VolumeStatus = $v.VolumeStatus.ToString(); \
           KeyProtectorTypes = @($v.KeyProtector | ForEach-Object {{ $_.KeyProtectorType.ToString() }}) \
         }} | ConvertTo-Json -Compress"
    )
}

fn install_script(mount_point: MountPoint) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'; \
         [Console]::InputEncoding = [System.Text.Encoding]::UTF8; \
         $pin = ConvertTo-SecureString -String ([Console]::In.ReadLine()) -AsPlainText -Force; \
         Add-BitLockerKeyProtector -MountPoint '{mount_point}' -Pin $pin -TpmAndPinProtector | Out-Null"
    )
}

impl VolumeStatusProvider for PowerShellBitLocker {
    fn volume_status(&self, mount_point: MountPoint) -> Result<VolumeStatus, QueryError> {
        let out = self
            .run(&status_script(mount_point), None)
            .map_err(|e| QueryError::Failed(format!("{e:#}")))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(QueryError::Failed(format!("{}: {}", out.status, stderr.trim())));
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        debug!("Get-BitLockerVolume 输出: {}", stdout.trim());
        VolumeStatus::from_powershell_json(&stdout)
    }
}

impl ProtectorInstaller for PowerShellBitLocker {
    fn install_tpm_pin_protector(&self, mount_point: MountPoint, pin: &str) -> Result<()> {
        if !pin.chars().all(|c| c.is_ascii_graphic()) {
            return Err(anyhow!("PIN 含有启动时无法输入的字符，拒绝安装保护器"));
        }
        let out = self.run(&install_script(mount_point), Some(pin))?;
        if out.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        Err(anyhow!(
            "Add-BitLockerKeyProtector 执行失败: {}\n{}",
            out.status,
            stderr.trim()
        ))
    }
}

/// 从 JSON 文件读取卷状态（格式与状态查询脚本输出一致）。
#[derive(Debug, Clone)]
pub struct StatusFileProvider {
    path: PathBuf,
}

impl StatusFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl VolumeStatusProvider for StatusFileProvider {
    fn volume_status(&self, _mount_point: MountPoint) -> Result<VolumeStatus, QueryError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| QueryError::Failed(format!("读取状态文件失败: {}: {e}", self.path.display())))?;
        VolumeStatus::from_powershell_json(&raw)
    }
}

/// 选择卷状态查询实现：设置了测试钩子环境变量时读文件，否则调用 PowerShell。
pub fn status_provider_from_env() -> Box<dyn VolumeStatusProvider> {
    match std::env::var_os(STATUS_FILE_ENV) {
        Some(path) => Box::new(StatusFileProvider::new(path)),
        None => Box::new(PowerShellBitLocker::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_embed_normalized_mount_point() {
        let mp = MountPoint::parse("d:\\").unwrap();
        assert!(status_script(mp).contains("-MountPoint 'D:'"));
        let install = install_script(mp);
        assert!(install.contains("-MountPoint 'D:'"));
        assert!(install.contains("-TpmAndPinProtector"));
        assert!(install.contains("[Console]::In.ReadLine()"));
        let encoding = install.find("[Console]::InputEncoding = [System.Text.Encoding]::UTF8").unwrap();
        assert!(encoding < install.find("ReadLine").unwrap());
    }

    #[test]
    fn non_ascii_pin_is_refused_before_powershell_runs() {
        let provider = PowerShellBitLocker {
            powershell: PathBuf::from("blpin-no-such-powershell-binary"),
        };
        let err = provider
            .install_tpm_pin_protector(MountPoint::SYSTEM, "Ab3!中文xy")
            .unwrap_err();
        assert!(err.to_string().contains("无法输入的字符"));
        assert!(!err.to_string().contains("中文"));
    }

    #[test]
    fn missing_status_file_is_a_query_failure() {
        let provider = StatusFileProvider::new(std::env::temp_dir().join("blpin-no-such-status.json"));
        assert!(matches!(
            provider.volume_status(MountPoint::SYSTEM),
            Err(QueryError::Failed(_))
        ));
    }

    #[test]
    fn missing_powershell_is_a_query_failure() {
        let provider = PowerShellBitLocker {
            powershell: PathBuf::from("blpin-no-such-powershell-binary"),
        };
        assert!(matches!(
            provider.volume_status(MountPoint::SYSTEM),
            Err(QueryError::Failed(_))
        ));
        assert!(provider
            .install_tpm_pin_protector(MountPoint::SYSTEM, "13579246")
            .is_err());
    }
}
