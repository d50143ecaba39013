// 该文件是 Idscan （识卡） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, model::DetectResult, tensor::OutputTensor};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

mod json_lines;
pub use self::json_lines::{JsonLinesOutput, JsonLinesOutputError};

mod log_output;
pub use self::log_output::{LogOutput, LogOutputError};

mod trigger;
pub use self::trigger::{TriggerOutput, TriggerOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("JSON Lines 输出错误: {0}")]
  JsonLinesOutputError(#[from] JsonLinesOutputError),
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[error("触发器输出错误: {0}")]
  TriggerOutputError(#[from] TriggerOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  JsonLines(JsonLinesOutput),
  Log(LogOutput),
  Trigger(TriggerOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      JsonLinesOutput::SCHEME => Ok(OutputWrapper::JsonLines(JsonLinesOutput::from_url(url)?)),
      LogOutput::SCHEME => Ok(OutputWrapper::Log(LogOutput::from_url(url)?)),
      TriggerOutput::SCHEME => Ok(OutputWrapper::Trigger(TriggerOutput::from_url(url)?)),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<OutputTensor, DetectResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &OutputTensor, result: &DetectResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::JsonLines(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::Log(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::Trigger(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dispatch_by_scheme() {
    let output = OutputWrapper::from_url(&Url::parse("log:").unwrap()).unwrap();
    assert!(matches!(output, OutputWrapper::Log(_)));

    let output = OutputWrapper::from_url(&Url::parse("trigger:?label=IdCard").unwrap()).unwrap();
    assert!(matches!(output, OutputWrapper::Trigger(_)));

    let output = OutputWrapper::from_url(&Url::parse("jsonl:-").unwrap()).unwrap();
    assert!(matches!(output, OutputWrapper::JsonLines(_)));
  }

  #[test]
  fn test_unknown_scheme() {
    assert!(matches!(
      OutputWrapper::from_url(&Url::parse("rtsp://localhost:8554/live").unwrap()),
      Err(OutputError::SchemeMismatch(s)) if s == "rtsp"
    ));
  }

  #[test]
  fn test_render_through_wrapper() {
    let output = OutputWrapper::from_url(&Url::parse("log:").unwrap()).unwrap();
    let frame = OutputTensor::zeros(7, 1, 1);
    assert!(output.render_result(&frame, &DetectResult::default()).is_ok());
  }
}
