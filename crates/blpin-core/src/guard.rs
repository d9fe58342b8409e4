//! 单实例运行守卫（防止两个 PIN 设置流程同时运行）。
//!
//! 机制：
//! - 在固定位置创建标记文件（JSON：持有者 ID、进程 ID、创建时间）表示“设置流程进行中”
//! - 标记文件使用独占创建（`create_new`）落盘，两个进程同时创建时只有一个会成功
//! - 标记存在超过 24 小时视为过期（上次运行崩溃遗留），新的获取会先删除再创建
//! - 创建时间晚于当前时间的标记（时钟回拨）同样视为过期
//! - [`RunGuard`] 在释放或 Drop 时删除标记；只删除自己创建的标记，不会误删接管者的标记
//!
//! 限制：
//! - 这是“建议性”互斥：不阻塞、不排队，冲突方直接得到 [`GuardError::AlreadyRunning`]
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

/// 标记文件过期阈值。
pub const STALE_AFTER: Duration = Duration::hours(24);

/// 标记文件内容。
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarkerBody {
    owner_id: Uuid,
    pid: u32,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

/// 运行守卫错误。
#[derive(Debug, Error)]
pub enum GuardError {
    /// 已有未过期的标记：其他实例正在运行。
    #[error("已有 PIN 设置流程正在运行（标记文件: {}）", path.display())]
    AlreadyRunning { path: PathBuf },
    /// 标记文件读写失败。
    #[error("运行守卫标记文件读写失败: {0}")]
    Io(#[from] io::Error),
}

/// 单实例守卫（描述标记文件位置与过期策略）。
#[derive(Debug, Clone)]
pub struct SingleInstanceGuard {
    path: PathBuf,
    stale_after: Duration,
}

impl SingleInstanceGuard {
    /// 使用默认过期阈值（24 小时）创建守卫。
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_after: STALE_AFTER,
        }
    }

    /// 标记文件路径。
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 获取运行权。
    ///
    /// 返回值：
    /// - `Ok(RunGuard)`：已创建标记，持有期间其他实例获取会失败
    /// - `Err(AlreadyRunning)`：存在未过期标记
    ///
    /// 异常处理：
    /// - 目录创建/标记读写失败返回 `GuardError::Io`
    pub fn acquire(&self) -> Result<RunGuard, GuardError> {
        self.acquire_at(OffsetDateTime::now_utc())
    }

    /// 以指定“当前时间”获取运行权（过期判断基于该时间）。
    pub fn acquire_at(&self, now: OffsetDateTime) -> Result<RunGuard, GuardError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        match self.marker_age(now)? {
            Some(age) if self.is_fresh(age) => {
                return Err(GuardError::AlreadyRunning {
                    path: self.path.clone(),
                });
            }
            Some(age) if age.is_negative() => {
                warn!(
                    "运行标记的创建时间晚于当前时间（系统时钟可能被调整过），视为过期并删除: {}",
                    self.path.display()
                );
                remove_if_exists(&self.path)?;
            }
            Some(age) => {
                warn!(
                    "发现过期的运行标记（已存在 {} 小时），删除后继续: {}",
                    age.whole_hours(),
                    self.path.display()
                );
                remove_if_exists(&self.path)?;
            }
            None => {}
        }

        let body = MarkerBody {
            owner_id: Uuid::new_v4(),
            pid: std::process::id(),
            created_at: now,
        };
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(GuardError::AlreadyRunning {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let bytes = serde_json::to_vec(&body).map_err(io::Error::other)?;
        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&self.path);
            return Err(e.into());
        }
        debug!("已获取运行守卫: {}", self.path.display());

        Ok(RunGuard {
            path: self.path.clone(),
            owner_id: body.owner_id,
            released: false,
        })
    }

    /// 当前是否存在未过期的标记（不获取运行权）。
    ///
    /// 读取失败时返回 `false`。
    pub fn is_held(&self) -> bool {
        matches!(
            self.marker_age(OffsetDateTime::now_utc()),
            Ok(Some(age)) if self.is_fresh(age)
        )
    }

    /// 标记是否仍有效：创建时间不晚于当前时间，且未超过过期阈值。
    fn is_fresh(&self, age: Duration) -> bool {
        !age.is_negative() && age < self.stale_after
    }

    /// 计算标记文件的年龄；标记不存在时返回 `None`。
    ///
    /// 标记内容无法解析时（例如另一进程正在写入），以文件修改时间作为创建时间。
    fn marker_age(&self, now: OffsetDateTime) -> io::Result<Option<Duration>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let created_at = match serde_json::from_slice::<MarkerBody>(&raw) {
            Ok(body) => body.created_at,
            Err(_) => match fs::metadata(&self.path).and_then(|m| m.modified()) {
                Ok(modified) => OffsetDateTime::from(modified),
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            },
        };
        Ok(Some(now - created_at))
    }
}

/// 已获取的运行权；释放或 Drop 时删除标记文件。
#[derive(Debug)]
pub struct RunGuard {
    path: PathBuf,
    owner_id: Uuid,
    released: bool,
}

impl RunGuard {
    /// 释放运行权（幂等）。
    ///
    /// 说明：
    /// - 仅当标记仍属于本守卫时才删除；标记已被接管或已不存在时什么也不做
    /// - 删除失败只记录日志，不返回错误（释放发生在各种退出路径上）
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let owned = fs::read(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_slice::<MarkerBody>(&raw).ok())
            .is_some_and(|body| body.owner_id == self.owner_id);
        if !owned {
            debug!("运行标记已不属于本实例，跳过删除: {}", self.path.display());
            return;
        }
        match remove_if_exists(&self.path) {
            Ok(()) => debug!("已释放运行守卫: {}", self.path.display()),
            Err(e) => warn!("删除运行标记失败: {}: {e}", self.path.display()),
        }
    }

    /// 是否已释放。
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.release();
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
