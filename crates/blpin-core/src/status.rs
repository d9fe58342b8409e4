//! 卷加密状态、合规结果与检测退出码。
//!
//! 合规判定：
//! - 卷已完全加密，且密钥保护器中存在 `TpmPin`：合规（`TpmPin`）
//! - 其余情况（包括状态查询失败）：不合规（`NoPin`）
//!
//! 输出格式（供 Intune 自定义合规策略读取）：
//! - 单行 JSON：`{"CheckBitLockerPIN":"TpmPin"}` 或 `{"CheckBitLockerPIN":"NoPin"}`
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// TPM+PIN 保护器类型名（与 `Get-BitLockerVolume` 输出一致）。
pub const TPM_PIN_PROTECTOR: &str = "TpmPin";

/// 检测脚本退出码：合规/无需处理/已有实例在运行。
pub const EXIT_NO_ACTION: i32 = 0;

/// 检测脚本退出码：需要修复。
pub const EXIT_REMEDIATION_REQUIRED: i32 = 1;

/// 挂载点格式错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无效的挂载点: {0}（应为盘符形式，例如 C:）")]
pub struct MountPointError(String);

/// 卷挂载点（盘符，例如 `C:`）。
///
/// 只接受 `X:` / `X:\` 形式，保证可安全拼接到 PowerShell 命令中。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountPoint(char);

impl MountPoint {
    /// 系统盘 `C:`。
    pub const SYSTEM: MountPoint = MountPoint('C');

    /// 解析盘符（大小写不敏感，允许结尾反斜杠）。
    pub fn parse(raw: &str) -> Result<Self, MountPointError> {
        let trimmed = raw.trim();
        let body = trimmed.strip_suffix('\\').unwrap_or(trimmed);
        let mut chars = body.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(letter), Some(':'), None) if letter.is_ascii_alphabetic() => {
                Ok(Self(letter.to_ascii_uppercase()))
            }
            _ => Err(MountPointError(raw.to_string())),
        }
    }
}

impl Default for MountPoint {
    fn default() -> Self {
        Self::SYSTEM
    }
}

impl FromStr for MountPoint {
    type Err = MountPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.0)
    }
}

/// 卷状态查询失败。
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("查询卷加密状态失败: {0}")]
    Failed(String),
    #[error("目标卷不存在或未返回状态: {0}")]
    VolumeNotFound(String),
    #[error("解析卷状态失败: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 卷加密状态。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VolumeStatus {
    /// 保护是否开启（ProtectionStatus = On）。
    pub protection_on: bool,
    /// 是否完全加密（VolumeStatus = FullyEncrypted）。
    pub fully_encrypted: bool,
    /// 密钥保护器类型集合（例如 `Tpm`、`TpmPin`、`RecoveryPassword`）。
    pub protector_types: BTreeSet<String>,
}

/// `Get-BitLockerVolume` 经 `ConvertTo-Json` 后的原始结构。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawVolume {
    #[serde(default)]
    protection_status: Option<String>,
    #[serde(default)]
    volume_status: Option<String>,
    #[serde(default)]
    key_protector_types: Option<OneOrMany>,
}

/// PowerShell 对单元素数组可能输出为标量，两种形式都接受。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl VolumeStatus {
    /// 是否存在 TPM+PIN 保护器。
    pub fn has_tpm_pin(&self) -> bool {
        self.protector_types.contains(TPM_PIN_PROTECTOR)
    }

    /// 解析状态查询脚本输出的 JSON。
    ///
    /// 异常处理：
    /// - 输出为空或 `null`：`QueryError::VolumeNotFound`
    /// - JSON 结构不符：`QueryError::Parse`
    pub fn from_powershell_json(raw: &str) -> Result<Self, QueryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Err(QueryError::VolumeNotFound("状态查询无输出".to_string()));
        }
        let v: RawVolume = serde_json::from_str(trimmed)?;
        let protector_types = match v.key_protector_types {
            None => BTreeSet::new(),
            Some(OneOrMany::One(t)) => BTreeSet::from([t]),
            Some(OneOrMany::Many(ts)) => ts.into_iter().collect(),
        };
        Ok(Self {
            protection_on: v.protection_status.as_deref() == Some("On"),
            fully_encrypted: v.volume_status.as_deref() == Some("FullyEncrypted"),
            protector_types,
        })
    }
}

/// 合规结果（只有两个取值）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComplianceStatus {
    TpmPin,
    NoPin,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::TpmPin => "TpmPin",
            ComplianceStatus::NoPin => "NoPin",
        }
    }
}

/// 合规检查输出对象。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    #[serde(rename = "CheckBitLockerPIN")]
    pub check: ComplianceStatus,
}

impl ComplianceReport {
    /// 输出为单行 JSON。
    pub fn to_line(&self) -> String {
        format!("{{\"CheckBitLockerPIN\":\"{}\"}}", self.check.as_str())
    }
}

/// 根据状态查询结果计算合规结果；查询失败视为不合规。
pub fn evaluate(status: &Result<VolumeStatus, QueryError>) -> ComplianceStatus {
    match status {
        Ok(s) if s.fully_encrypted && s.has_tpm_pin() => ComplianceStatus::TpmPin,
        _ => ComplianceStatus::NoPin,
    }
}

/// 检测结论。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// 已合规。
    Compliant,
    /// 已存在 TPM+PIN 保护器，卷仍在加密中；重新运行设置工具无济于事。
    EncryptionPending,
    /// 不合规，但已有设置流程在运行，由它处理。
    AlreadyRunning,
    /// 需要修复。
    RemediationRequired,
}

impl DetectionOutcome {
    /// 转换为 Intune 检测脚本退出码。
    pub fn exit_code(&self) -> i32 {
        match self {
            DetectionOutcome::Compliant
            | DetectionOutcome::EncryptionPending
            | DetectionOutcome::AlreadyRunning => EXIT_NO_ACTION,
            DetectionOutcome::RemediationRequired => EXIT_REMEDIATION_REQUIRED,
        }
    }
}

/// 由卷状态与“设置流程是否在运行”得出检测结论。
///
/// 参数：
/// - `setup_running`：仅在需要时调用（卷上已有 TPM+PIN 保护器时不检查）
pub fn detect(
    status: &Result<VolumeStatus, QueryError>,
    setup_running: impl FnOnce() -> bool,
) -> DetectionOutcome {
    match status {
        Ok(s) if s.has_tpm_pin() && s.fully_encrypted => DetectionOutcome::Compliant,
        Ok(s) if s.has_tpm_pin() => DetectionOutcome::EncryptionPending,
        _ if setup_running() => DetectionOutcome::AlreadyRunning,
        _ => DetectionOutcome::RemediationRequired,
    }
}
