//! 修复包获取、校验与解压。
//!
//! 步骤：
//! - 下载（reqwest）或复制本地 zip 到工作目录
//! - 可选的 SHA-256 校验（防止投递过程中被替换或截断）
//! - 解压到全新的 payload 目录；任何试图逃逸目标目录的条目都会导致失败
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use sha2::{Digest, Sha256};
use tracing::info;

/// 修复包来源。
#[derive(Debug, Clone)]
pub enum BundleSource {
    /// 远程地址（HTTP/HTTPS）。
    Url(String),
    /// 本地 zip 文件。
    Path(PathBuf),
}

/// 将修复包放到 `dest`（zip 文件路径）。
///
/// 异常处理：
/// - 下载失败（网络、HTTP 状态码非 2xx、超时）或文件复制失败返回错误
pub fn fetch(source: &BundleSource, dest: &Path, timeout: Duration) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建目录失败: {}", parent.display()))?;
    }
    match source {
        BundleSource::Url(url) => {
            info!("下载修复包: {url}");
            let rt = tokio::runtime::Runtime::new().context("创建 Tokio Runtime 失败")?;
            let bytes = rt.block_on(download(url, timeout))?;
            std::fs::write(dest, &bytes)
                .with_context(|| format!("写入修复包失败: {}", dest.display()))?;
            info!("修复包下载完成（{} 字节）", bytes.len());
        }
        BundleSource::Path(src) => {
            info!("使用本地修复包: {}", src.display());
            std::fs::copy(src, dest)
                .with_context(|| format!("复制修复包失败: {} -> {}", src.display(), dest.display()))?;
        }
    }
    Ok(())
}

async fn download(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("创建 HTTP 客户端失败")?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("请求修复包失败: {url}"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("下载修复包失败: HTTP {status}");
    }
    let bytes = response.bytes().await.context("读取修复包内容失败")?;
    Ok(bytes.to_vec())
}

/// 计算文件的 SHA-256（小写十六进制）。
pub fn sha256_hex(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("打开文件失败: {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// 校验文件 SHA-256 是否与期望值一致（忽略大小写与首尾空白）。
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_hex(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        return Ok(());
    }
    Err(anyhow!(
        "修复包 SHA-256 校验失败: 期望 {}，实际 {actual}",
        expected.trim()
    ))
}

/// 将 zip 解压到 `dest_dir`（先清空）。
///
/// 返回值：
/// - 解压出的文件数量
///
/// 异常处理：
/// - zip 损坏、条目路径逃逸目标目录、写文件失败都会返回错误
pub fn extract(zip_path: &Path, dest_dir: &Path) -> Result<usize> {
    if dest_dir.exists() {
        std::fs::remove_dir_all(dest_dir)
            .with_context(|| format!("清理旧 payload 目录失败: {}", dest_dir.display()))?;
    }
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("创建目录失败: {}", dest_dir.display()))?;

    let file = File::open(zip_path).with_context(|| format!("打开修复包失败: {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("解析修复包 zip 失败")?;
    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("读取 zip 条目失败")?;
        let rel: PathBuf = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => bail!("修复包包含非法路径条目: {}", entry.name()),
        };
        let target = dest_dir.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("创建目录失败: {}", target.display()))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)
            .with_context(|| format!("创建文件失败: {}", target.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("解压文件失败: {}", target.display()))?;
        files += 1;
    }
    Ok(files)
}
