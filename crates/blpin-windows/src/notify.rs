//! 结果提示对话框（MessageBoxW）。
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use windows::core::HSTRING;
use windows::Win32::UI::WindowsAndMessaging::{
    MessageBoxW, MB_ICONINFORMATION, MB_ICONWARNING, MB_OK, MB_TOPMOST,
};

/// 提示级别。
#[derive(Debug, Clone, Copy)]
pub enum Severity {
    Info,
    Warning,
}

/// 弹出置顶的模态提示框（阻塞到用户点击确定）。
///
/// 注意：
/// - `text` 不得包含 PIN
pub fn show_message(title: &str, text: &str, severity: Severity) {
    let icon = match severity {
        Severity::Info => MB_ICONINFORMATION,
        Severity::Warning => MB_ICONWARNING,
    };
    unsafe {
        MessageBoxW(None, &HSTRING::from(text), &HSTRING::from(title), icon | MB_OK | MB_TOPMOST);
    }
}
