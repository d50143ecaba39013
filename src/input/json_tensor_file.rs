// 该文件是 Idscan （识卡） 项目的一部分。
// src/input/json_tensor_file.rs - JSON 张量文件输入
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  tensor::{OutputTensor, TensorError},
};

#[derive(Error, Debug)]
pub enum JsonTensorFileError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("第 {index} 帧张量错误: {source}")]
  TensorError { index: usize, source: TensorError },
}

#[derive(Debug, Deserialize)]
struct TensorRecord {
  shape: Vec<usize>,
  data: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TensorDocument {
  Single(TensorRecord),
  Many(Vec<TensorRecord>),
}

/// `{"shape": [1, C, H, W], "data": [...]}`，或由其组成的数组
///
/// `json:///path/to/outputs.json`
#[derive(Debug)]
pub struct JsonTensorFileInput {
  tensors: Vec<OutputTensor>,
}

impl FromUrlWithScheme for JsonTensorFileInput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonTensorFileInput {
  type Error = JsonTensorFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonTensorFileError::SchemeMismatch(url.scheme().to_string()));
    }

    info!("读取 JSON 张量文件: {}", url.path());
    let text = std::fs::read_to_string(url.path())?;
    Self::from_json_str(&text)
  }
}

impl JsonTensorFileInput {
  pub fn from_json_str(text: &str) -> Result<Self, JsonTensorFileError> {
    let records = match serde_json::from_str::<TensorDocument>(text)? {
      TensorDocument::Single(record) => vec![record],
      TensorDocument::Many(records) => records,
    };

    let tensors = records
      .into_iter()
      .enumerate()
      .map(|(index, record)| {
        OutputTensor::new(&record.shape, record.data)
          .map_err(|source| JsonTensorFileError::TensorError { index, source })
      })
      .collect::<Result<Vec<_>, _>>()?;
    debug!("JSON 张量文件包含 {} 帧", tensors.len());

    Ok(Self { tensors })
  }

  pub fn frame_count(&self) -> usize {
    self.tensors.len()
  }

  pub fn into_tensors(self) -> std::vec::IntoIter<OutputTensor> {
    self.tensors.into_iter()
  }
}
