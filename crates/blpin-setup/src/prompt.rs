//! PIN 输入窗口（eframe）。
//!
//! 交互：
//! - 两个掩码输入框（PIN / 确认 PIN），Enter 或“确定”提交
//! - 提交时调用校验回调；未通过则在窗口内显示原因并清空输入，用户可直接重试
//! - “取消”或关闭窗口视为放弃
//!
//! 结果通过 mpsc 通道交回调用方，`run_native` 返回后读取。
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::sync::mpsc::{self, Sender};

use blpin_core::policy::Policy;
use blpin_core::setup::{PinPrompt, PinValidator};
use eframe::egui;
use tracing::{error, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::WINDOW_TITLE;

/// 中文界面字体（系统自带的微软雅黑）。
const CJK_FONT_PATH: &str = r"C:\Windows\Fonts\msyh.ttc";

/// 基于 eframe 的 PIN 输入界面。
#[derive(Debug, Default)]
pub struct EguiPinPrompt;

impl PinPrompt for EguiPinPrompt {
    fn prompt_for_pin(
        &mut self,
        policy: &Policy,
        validate: PinValidator,
    ) -> Option<Zeroizing<String>> {
        let (tx, rx) = mpsc::channel();
        let app = PinPromptApp::new(*policy, validate, tx);
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([440.0, 280.0])
                .with_resizable(false)
                .with_always_on_top(),
            centered: true,
            ..Default::default()
        };

        let run = eframe::run_native(
            WINDOW_TITLE,
            options,
            Box::new(move |cc| {
                install_cjk_font(&cc.egui_ctx);
                Box::new(app)
            }),
        );
        if let Err(e) = run {
            error!("启动 PIN 输入窗口失败: {e}");
            return None;
        }
        rx.try_recv().ok().flatten()
    }
}

fn install_cjk_font(ctx: &egui::Context) {
    let bytes = match std::fs::read(CJK_FONT_PATH) {
        Ok(b) => b,
        Err(e) => {
            warn!("加载中文字体失败，界面文字可能无法显示: {CJK_FONT_PATH}: {e}");
            return;
        }
    };
    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts.families.entry(family).or_default().insert(0, "cjk".to_owned());
    }
    ctx.set_fonts(fonts);
}

/// 输入窗口状态。
///
/// 说明：
/// - `pin` / `confirm` 以 `Zeroizing<String>` 持有，清空和窗口销毁时都会抹除内存
/// - `done` 保证结果只发送一次（主动关闭后还会收到一次 close_requested）
struct PinPromptApp {
    policy: Policy,
    validate: PinValidator,
    pin: Zeroizing<String>,
    confirm: Zeroizing<String>,
    error: Option<String>,
    result: Sender<Option<Zeroizing<String>>>,
    done: bool,
}

impl PinPromptApp {
    fn new(policy: Policy, validate: PinValidator, result: Sender<Option<Zeroizing<String>>>) -> Self {
        Self {
            policy,
            validate,
            pin: Zeroizing::new(String::new()),
            confirm: Zeroizing::new(String::new()),
            error: None,
            result,
            done: false,
        }
    }

    fn hint(&self) -> String {
        if self.policy.digits_only() {
            format!(
                "请输入 {}-{} 位数字 PIN。不能使用连续、重复或全部相同的数字。",
                self.policy.min_length,
                blpin_core::policy::MAX_PIN_LENGTH
            )
        } else {
            format!(
                "请输入 {}-{} 位增强型 PIN，只能使用英文字母、数字和英文符号，需四类齐全，且不能包含用户名。",
                self.policy.min_length,
                blpin_core::policy::MAX_PIN_LENGTH
            )
        }
    }

    fn submit(&mut self, ctx: &egui::Context) {
        match (self.validate)(&self.pin, &self.confirm) {
            Ok(()) => {
                let pin = Zeroizing::new(std::mem::take(&mut *self.pin));
                self.confirm.zeroize();
                self.finish(ctx, Some(pin));
            }
            Err(e) => {
                info!("PIN 未通过校验: {e}");
                self.error = Some(e.to_string());
                self.pin.zeroize();
                self.confirm.zeroize();
            }
        }
    }

    fn finish(&mut self, ctx: &egui::Context, result: Option<Zeroizing<String>>) {
        if self.done {
            return;
        }
        self.done = true;
        let _ = self.result.send(result);
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

impl eframe::App for PinPromptApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.finish(ctx, None);
            return;
        }

        let mut submit = false;
        let mut cancel = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("设置 BitLocker 启动 PIN");
            ui.label(self.hint());
            ui.add_space(8.0);

            egui::Grid::new("pin-fields").num_columns(2).show(ui, |ui| {
                ui.label("PIN");
                ui.add(egui::TextEdit::singleline(&mut *self.pin).password(true));
                ui.end_row();
                ui.label("确认 PIN");
                let confirm = ui.add(egui::TextEdit::singleline(&mut *self.confirm).password(true));
                if confirm.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }
                ui.end_row();
            });

            if let Some(err) = &self.error {
                ui.add_space(4.0);
                ui.colored_label(egui::Color32::RED, err);
            }

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui.button("确定").clicked() {
                    submit = true;
                }
                if ui.button("取消").clicked() {
                    cancel = true;
                }
            });
        });

        if cancel {
            self.pin.zeroize();
            self.confirm.zeroize();
            self.finish(ctx, None);
        } else if submit {
            self.submit(ctx);
        }
    }
}
