//! 从注册表读取 PIN 策略。
//!
//! 主要用途：
//! - 读取 `HKLM\SOFTWARE\Policies\Microsoft\FVE` 下的 `MinimumPIN` 与 `UseEnhancedPin`
//!
//! 权限要求：
//! - 读取策略键通常不需要管理员
//!
//! 异常处理：
//! - 键或值不存在、类型不匹配、权限不足：均视为“未配置”，回退到默认值
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use blpin_core::policy::{Policy, ENHANCED_PIN_VALUE, MIN_LENGTH_VALUE, POLICY_KEY};
use blpin_core::setup::PolicyStore;
use tracing::debug;
use winreg::enums::HKEY_LOCAL_MACHINE;
use winreg::RegKey;

/// 基于注册表的策略读取。
#[derive(Debug)]
pub struct RegistryPolicyStore {
    root: RegKey,
    subkey: String,
}

impl Default for RegistryPolicyStore {
    fn default() -> Self {
        Self::new(RegKey::predef(HKEY_LOCAL_MACHINE), POLICY_KEY)
    }
}

impl RegistryPolicyStore {
    /// 指定根键与子键路径（测试时可指向 HKCU 下的临时键）。
    pub fn new(root: RegKey, subkey: &str) -> Self {
        Self {
            root,
            subkey: subkey.to_string(),
        }
    }
}

impl PolicyStore for RegistryPolicyStore {
    fn read_policy(&self) -> Policy {
        let key = match self.root.open_subkey(&self.subkey) {
            Ok(k) => k,
            Err(e) => {
                debug!("策略键不存在或不可读，使用默认策略: {}: {e}", self.subkey);
                return Policy::default();
            }
        };
        let minimum_pin: Option<u32> = key.get_value(MIN_LENGTH_VALUE).ok();
        let use_enhanced_pin: Option<u32> = key.get_value(ENHANCED_PIN_VALUE).ok();
        debug!("策略原始值: MinimumPIN={minimum_pin:?}, UseEnhancedPin={use_enhanced_pin:?}");
        Policy::from_raw_values(minimum_pin, use_enhanced_pin)
    }
}
