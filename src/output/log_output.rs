// 该文件是 Idscan （识卡） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, model::DetectResult, output::Render, tensor::OutputTensor,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 通过 tracing 打印检测结果，`log:?clamp` 时先裁剪到图像范围
#[derive(Debug, Default)]
pub struct LogOutput {
  clamp: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch(uri.scheme().to_string()));
    }
    let clamp = uri.query_pairs().any(|(k, _)| k == "clamp");
    Ok(LogOutput { clamp })
  }
}

impl Render<OutputTensor, DetectResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, _frame: &OutputTensor, result: &DetectResult) -> Result<(), Self::Error> {
    if result.is_empty() {
      info!("未检测到物体");
      return Ok(());
    }

    info!("检测到 {} 个物体", result.len());
    for det in result.iter() {
      let bbox = if self.clamp {
        det.bbox.clamped()
      } else {
        det.bbox
      };
      info!(
        "  - {}: {:.2}% at ({:.3}, {:.3}, {:.3}x{:.3})",
        det.label,
        det.score * 100.0,
        bbox.left,
        bbox.top,
        bbox.width,
        bbox.height
      );
    }
    Ok(())
  }
}
