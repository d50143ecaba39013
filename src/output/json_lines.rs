// 该文件是 Idscan （识卡） 项目的一部分。
// src/output/json_lines.rs - JSON Lines 检测结果输出
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
  },
};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Detection},
  output::Render,
  tensor::OutputTensor,
};

#[derive(Error, Debug)]
pub enum JsonLinesOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("输出已被锁毒化")]
  Poisoned,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  timestamp: String,
  frame: u64,
  shape: &'a [usize],
  detections: &'a [Detection],
}

/// 每帧一行 JSON
///
/// `jsonl:///path/to/detections.jsonl`，`jsonl:-` 写到标准输出
pub struct JsonLinesOutput {
  writer: Mutex<Box<dyn Write + Send>>,
  frame_counter: AtomicU64,
}

impl FromUrlWithScheme for JsonLinesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonLinesOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    match uri.path() {
      "" | "-" => Ok(Self::new(Box::new(std::io::stdout()))),
      path => Self::create(path),
    }
  }
}

impl JsonLinesOutput {
  pub fn new(writer: Box<dyn Write + Send>) -> Self {
    Self {
      writer: Mutex::new(writer),
      frame_counter: AtomicU64::new(0),
    }
  }

  pub fn create(path: impl AsRef<Path>) -> Result<Self, JsonLinesOutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    info!("写入检测结果到文件: {}", path.display());
    let file = File::create(path)?;
    Ok(Self::new(Box::new(BufWriter::new(file))))
  }

  pub fn frames_written(&self) -> u64 {
    self.frame_counter.load(Ordering::Relaxed)
  }
}

impl Render<OutputTensor, DetectResult> for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn render_result(&self, frame: &OutputTensor, result: &DetectResult) -> Result<(), Self::Error> {
    let index = self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1;
    let record = FrameRecord {
      timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      frame: index,
      shape: frame.shape(),
      detections: &result.items,
    };

    let mut writer = self
      .writer
      .lock()
      .map_err(|_| JsonLinesOutputError::Poisoned)?;
    serde_json::to_writer(&mut *writer, &record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!("第 {} 帧写入 {} 个检测结果", index, result.len());
    Ok(())
  }
}
