//! PIN 复杂度策略模型。
//!
//! 策略来源：
//! - 组策略/Intune 写入的 `HKLM\SOFTWARE\Policies\Microsoft\FVE`
//! - `MinimumPIN`（DWORD）决定最小长度，`UseEnhancedPin`（DWORD）决定是否启用增强 PIN
//!
//! 约定：
//! - 本模块只做“原始值 → 策略”的映射，不读注册表（读取由 `blpin-windows` 负责）
//! - 缺失的键/值一律回退到默认值 `{ min_length: 8, complexity: Basic }`
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fmt;

use serde::{Deserialize, Serialize};

/// 默认最小 PIN 长度。
pub const DEFAULT_MIN_LENGTH: u32 = 8;

/// BitLocker 允许的最大 PIN 长度（系统限制）。
pub const MAX_PIN_LENGTH: u32 = 20;

/// 策略所在注册表子键（HKLM 下）。
pub const POLICY_KEY: &str = "SOFTWARE\\Policies\\Microsoft\\FVE";

/// 最小 PIN 长度的值名。
pub const MIN_LENGTH_VALUE: &str = "MinimumPIN";

/// 增强 PIN 开关的值名。
pub const ENHANCED_PIN_VALUE: &str = "UseEnhancedPin";

/// PIN 复杂度级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    #[default]
    /// 纯数字 PIN：禁止连续升/降序数字串。
    Basic,
    /// 增强 PIN：允许字母与符号，要求字符种类覆盖。
    Enhanced,
}

/// 单次运行内不可变的 PIN 策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// 最小长度（≥ 1）。
    pub min_length: u32,
    /// 复杂度级别。
    pub complexity: ComplexityLevel,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            complexity: ComplexityLevel::Basic,
        }
    }
}

impl Policy {
    /// 由注册表原始值构造策略。
    ///
    /// 参数：
    /// - `minimum_pin`：`MinimumPIN` 的值（`None` 表示键或值不存在）
    /// - `use_enhanced_pin`：`UseEnhancedPin` 的值（`None` 表示不存在）
    ///
    /// 规则：
    /// - `MinimumPIN` 缺失或为 0：使用默认最小长度
    /// - `MinimumPIN` 超过系统上限：截断到 [`MAX_PIN_LENGTH`]
    /// - `UseEnhancedPin == 1`：增强级别，其余情况为基础级别
    pub fn from_raw_values(minimum_pin: Option<u32>, use_enhanced_pin: Option<u32>) -> Self {
        let min_length = match minimum_pin {
            None | Some(0) => DEFAULT_MIN_LENGTH,
            Some(v) => v.min(MAX_PIN_LENGTH),
        };
        let complexity = if use_enhanced_pin == Some(1) {
            ComplexityLevel::Enhanced
        } else {
            ComplexityLevel::Basic
        };
        Self { min_length, complexity }
    }

    /// 是否要求 PIN 仅由数字组成（基础级别）。
    pub fn digits_only(&self) -> bool {
        self.complexity == ComplexityLevel::Basic
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.complexity {
            ComplexityLevel::Basic => "基础",
            ComplexityLevel::Enhanced => "增强",
        };
        write!(f, "最小长度 {}，复杂度 {}", self.min_length, level)
    }
}
