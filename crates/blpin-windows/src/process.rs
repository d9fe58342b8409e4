//! 进程状态检测（用于判断 PIN 设置工具是否已在运行）。
//!
//! 实现策略：
//! - 按可执行文件名匹配（忽略路径与大小写）
//! - 设置工具文件名在本产品中唯一，同名进程即视为设置流程进行中
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use sysinfo::{ProcessRefreshKind, RefreshKind, System};

/// 是否存在指定文件名的进程（例如 `blpin-setup.exe`）。
pub fn is_process_running(exe_name: &str) -> bool {
    let needle = exe_name.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return false;
    }
    let mut system = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new()),
    );
    system.refresh_processes();
    system
        .processes()
        .values()
        .any(|p| p.name().to_ascii_lowercase() == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_never_matches() {
        assert!(!is_process_running(""));
        assert!(!is_process_running("   "));
    }

    #[test]
    fn unlikely_name_is_not_running() {
        assert!(!is_process_running("blpin-definitely-not-running-7f3a.exe"));
    }
}
