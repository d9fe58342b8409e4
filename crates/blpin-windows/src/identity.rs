//! 当前登录账户识别。
//!
//! 说明：
//! - 设置工具运行在用户交互会话中，`USERNAME` 即登录名；非 Windows 环境回退到 `USER`
//! - 只用于 PIN 的“用户名片段”规则，读取失败时返回空字符串（该规则随之跳过）
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use blpin_core::setup::IdentityProvider;

/// 基于环境变量的账户识别。
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvIdentity;

impl IdentityProvider for EnvIdentity {
    fn current_account_name(&self) -> String {
        std::env::var("USERNAME")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_default()
    }
}
