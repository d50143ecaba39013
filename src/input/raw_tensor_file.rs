// 该文件是 Idscan （识卡） 项目的一部分。
// src/input/raw_tensor_file.rs - 原始 f32 张量文件输入
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
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  tensor::{OutputTensor, TENSOR_RANK, TensorError, element_count},
};

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug)]
pub enum RawTensorFileError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("缺少 shape 参数")]
  MissingShape,
  #[error("shape 参数无效: {0}")]
  InvalidShape(String),
  #[error("文件大小 {size} 字节不是单帧大小 {frame} 字节的整数倍")]
  SizeMismatch { size: usize, frame: usize },
  #[error("张量错误: {0}")]
  TensorError(#[from] TensorError),
}

/// 小端 f32 张量文件，可连续存放多帧
///
/// `raw:///path/to/output.bin?shape=1,35,13,13`
#[derive(Debug)]
pub struct RawTensorFileInput {
  shape: Vec<usize>,
  frame_len: usize,
  data: Vec<f32>,
}

impl FromUrlWithScheme for RawTensorFileInput {
  const SCHEME: &'static str = "raw";
}

fn parse_shape(value: &str) -> Result<Vec<usize>, RawTensorFileError> {
  let shape = value
    .split(',')
    .map(|s| {
      s.trim()
        .parse::<usize>()
        .map_err(|_| RawTensorFileError::InvalidShape(value.to_string()))
    })
    .collect::<Result<Vec<_>, _>>()?;
  if shape.is_empty() || shape.contains(&0) {
    return Err(RawTensorFileError::InvalidShape(value.to_string()));
  }
  Ok(shape)
}

impl FromUrl for RawTensorFileInput {
  type Error = RawTensorFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RawTensorFileError::SchemeMismatch(url.scheme().to_string()));
    }

    let shape = url
      .query_pairs()
      .find(|(k, _)| *k == "shape")
      .map(|(_, v)| parse_shape(&v))
      .ok_or(RawTensorFileError::MissingShape)??;

    info!("读取张量文件: {}", url.path());
    let bytes = std::fs::read(url.path())?;
    Self::from_bytes(shape, &bytes)
  }
}

impl RawTensorFileInput {
  pub fn from_bytes(shape: Vec<usize>, bytes: &[u8]) -> Result<Self, RawTensorFileError> {
    // 提前检查维度，避免迭代时才出错
    if shape.len() != TENSOR_RANK {
      return Err(TensorError::RankMismatch(shape.len()).into());
    }
    let frame_len = element_count(&shape)?;
    let frame = frame_len
      .checked_mul(F32_BYTES)
      .ok_or_else(|| TensorError::ShapeOverflow(shape.clone()))?;
    if frame == 0 {
      return Err(RawTensorFileError::InvalidShape(format!("{:?}", shape)));
    }
    if bytes.is_empty() || bytes.len() % frame != 0 {
      return Err(RawTensorFileError::SizeMismatch {
        size: bytes.len(),
        frame,
      });
    }

    let data = bytes
      .chunks_exact(F32_BYTES)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect::<Vec<_>>();
    debug!("张量文件包含 {} 帧, 形状 {:?}", bytes.len() / frame, shape);

    Ok(Self {
      shape,
      frame_len,
      data,
    })
  }

  pub fn frame_count(&self) -> usize {
    self.data.len() / self.frame_len
  }

  pub fn into_tensors(self) -> RawTensorFileFrames {
    RawTensorFileFrames {
      inner: self,
      index: 0,
    }
  }
}

pub struct RawTensorFileFrames {
  inner: RawTensorFileInput,
  index: usize,
}

impl Iterator for RawTensorFileFrames {
  type Item = OutputTensor;

  fn next(&mut self) -> Option<Self::Item> {
    let len = self.inner.frame_len;
    let start = self.index.checked_mul(len)?;
    let chunk = self.inner.data.get(start..start.checked_add(len)?)?;
    self.index += 1;
    match OutputTensor::new(&self.inner.shape, chunk.to_vec()) {
      Ok(tensor) => Some(tensor),
      Err(e) => {
        error!("构造张量失败: {}", e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
  }

  #[test]
  fn test_from_bytes_multiple_frames() {
    let values = (0..16).map(|v| v as f32).collect::<Vec<_>>();
    let input = RawTensorFileInput::from_bytes(vec![1, 2, 2, 2], &to_bytes(&values)).unwrap();
    assert_eq!(input.frame_count(), 2);

    let frames = input.into_tensors().collect::<Vec<_>>();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].value(1, 1, 1), 7.0);
    assert_eq!(frames[1].value(0, 0, 0), 8.0);
  }

  #[test]
  fn test_size_mismatch() {
    let err = RawTensorFileInput::from_bytes(vec![1, 2, 2, 2], &to_bytes(&[0.0; 9])).unwrap_err();
    assert!(matches!(
      err,
      RawTensorFileError::SizeMismatch {
        size: 36,
        frame: 32
      }
    ));
  }

  #[test]
  fn test_wrong_rank() {
    let err = RawTensorFileInput::from_bytes(vec![2, 2], &to_bytes(&[0.0; 4])).unwrap_err();
    assert!(matches!(
      err,
      RawTensorFileError::TensorError(TensorError::RankMismatch(2))
    ));
  }

  #[test]
  fn test_overflowing_shape_is_rejected() {
    let shape = vec![1, 7, 1 << (usize::BITS - 2), 4];
    let err = RawTensorFileInput::from_bytes(shape, &to_bytes(&[0.0; 4])).unwrap_err();
    assert!(matches!(
      err,
      RawTensorFileError::TensorError(TensorError::ShapeOverflow(_))
    ));

    // 元素个数不溢出, 字节数溢出
    let shape = vec![1, 1, 1 << (usize::BITS - 2), 2];
    let err = RawTensorFileInput::from_bytes(shape, &to_bytes(&[0.0; 4])).unwrap_err();
    assert!(matches!(
      err,
      RawTensorFileError::TensorError(TensorError::ShapeOverflow(_))
    ));
  }

  #[test]
  fn test_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&to_bytes(&[1.0, 2.0, 3.0, 4.0])).unwrap();

    let mut url = Url::parse("raw:///").unwrap();
    url.set_path(file.path().to_str().unwrap());
    url.set_query(Some("shape=1,1,2,2"));

    let frames = RawTensorFileInput::from_url(&url)
      .unwrap()
      .into_tensors()
      .collect::<Vec<_>>();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].value(0, 1, 0), 3.0);
  }

  #[test]
  fn test_from_url_requires_shape() {
    let url = Url::parse("raw:///tmp/missing.bin").unwrap();
    assert!(matches!(
      RawTensorFileInput::from_url(&url),
      Err(RawTensorFileError::MissingShape)
    ));

    let url = Url::parse("raw:///tmp/missing.bin?shape=1,x,2,2").unwrap();
    assert!(matches!(
      RawTensorFileInput::from_url(&url),
      Err(RawTensorFileError::InvalidShape(_))
    ));
  }
}
