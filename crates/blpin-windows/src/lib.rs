//! Windows 平台协作者实现（注册表策略、BitLocker 状态与保护器、提权检测、进程检测、会话内启动等）。
//!
//! 目标：
//! - 将 Windows 专有 API 与系统命令集中封装，核心库只依赖 `blpin_core::setup` 中的接口
//! - 统一错误处理风格（以 `anyhow::Result` 或核心库定义的错误类型向上返回）
//!
//! 权限要求：
//! - 查询/安装 BitLocker 保护器需要管理员权限
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod bitlocker;
#[cfg(windows)]
pub mod elevation;
pub mod identity;
pub mod launch;
#[cfg(windows)]
pub mod notify;
pub mod process;
#[cfg(windows)]
pub mod registry;
