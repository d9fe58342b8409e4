//! BitLocker 启动 PIN 工具核心库（跨平台/不直接调用系统 API）。
//!
//! 功能：
//! - 定义 PIN 复杂度策略模型与 PIN 可接受性校验
//! - 提供单实例运行守卫（基于标记文件 + 过期自愈）
//! - 定义合规结果、卷加密状态模型与检测退出码
//! - 定义 PIN 设置流程及其外部协作者接口（状态查询、策略读取、交互输入、保护器安装）
//! - 提供统一路径约定与日志初始化
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod guard;
pub mod logging;
pub mod paths;
pub mod pin;
pub mod policy;
pub mod setup;
pub mod status;
