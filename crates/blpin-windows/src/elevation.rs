//! 提权/权限相关检测。
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use windows::Win32::UI::Shell::IsUserAnAdmin;

/// 判断当前进程是否以管理员权限运行。
///
/// 说明：
/// - 安装 TPM+PIN 保护器需要管理员权限；非管理员时上层应提示用户并退出
/// - 该检查不能作为完整的安全边界
pub fn is_running_as_admin() -> bool {
    unsafe { IsUserAnAdmin().as_bool() }
}
