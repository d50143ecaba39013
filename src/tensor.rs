// 该文件是 Idscan （识卡） 项目的一部分。
// src/tensor.rs - 模型输出张量定义
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

/// 输出张量的维度数，固定为 NCHW
pub const TENSOR_RANK: usize = 4;

#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
  #[error("张量维度不匹配: 期望 4 维, 实际 {0} 维")]
  RankMismatch(usize),
  #[error("数据长度不匹配: 形状 {shape:?} 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
  #[error("张量形状 {0:?} 的元素个数溢出")]
  ShapeOverflow(Vec<usize>),
}

/// 形状对应的元素个数，乘积溢出时报错
pub fn element_count(shape: &[usize]) -> Result<usize, TensorError> {
  shape
    .iter()
    .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    .ok_or_else(|| TensorError::ShapeOverflow(shape.to_vec()))
}

/// 推理引擎输出的 `[N, C, H, W]` 浮点张量
///
/// 数据按通道优先排列，同一通道的 `H * W` 个值连续存放。
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  shape: [usize; TENSOR_RANK],
  data: Box<[f32]>,
}

impl OutputTensor {
  pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
    let shape: [usize; TENSOR_RANK] = shape
      .try_into()
      .map_err(|_| TensorError::RankMismatch(shape.len()))?;

    let expected = element_count(&shape)?;
    if data.len() != expected {
      return Err(TensorError::LengthMismatch {
        shape: shape.to_vec(),
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      shape,
      data: data.into_boxed_slice(),
    })
  }

  /// 全零张量，主要用于测试与基准
  pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
    Self {
      shape: [1, channels, height, width],
      data: vec![0.0; channels * height * width].into_boxed_slice(),
    }
  }

  pub fn shape(&self) -> &[usize; TENSOR_RANK] {
    &self.shape
  }

  pub fn batch(&self) -> usize {
    self.shape[0]
  }

  pub fn channels(&self) -> usize {
    self.shape[1]
  }

  pub fn height(&self) -> usize {
    self.shape[2]
  }

  pub fn width(&self) -> usize {
    self.shape[3]
  }

  /// 第一个批次中 `(channel, y, x)` 处的值
  #[inline]
  pub fn value(&self, channel: usize, y: usize, x: usize) -> f32 {
    let plane = self.height() * self.width();
    self.data[channel * plane + y * self.width() + x]
  }

  pub fn set(&mut self, channel: usize, y: usize, x: usize, value: f32) {
    let plane = self.height() * self.width();
    let width = self.width();
    self.data[channel * plane + y * width + x] = value;
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl AsRef<[f32]> for OutputTensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

impl AsMut<[f32]> for OutputTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_value_is_channel_major() {
    // 2 个通道, 2x3 网格
    let data = (0..12).map(|v| v as f32).collect::<Vec<_>>();
    let tensor = OutputTensor::new(&[1, 2, 2, 3], data).unwrap();

    assert_eq!(tensor.channels(), 2);
    assert_eq!(tensor.height(), 2);
    assert_eq!(tensor.width(), 3);
    assert_eq!(tensor.value(0, 0, 0), 0.0);
    assert_eq!(tensor.value(0, 1, 2), 5.0);
    assert_eq!(tensor.value(1, 0, 0), 6.0);
    assert_eq!(tensor.value(1, 1, 1), 10.0);
  }

  #[test]
  fn test_rank_mismatch() {
    let err = OutputTensor::new(&[2, 3, 4], vec![0.0; 24]).unwrap_err();
    assert_eq!(err, TensorError::RankMismatch(3));
  }

  #[test]
  fn test_length_mismatch() {
    let err = OutputTensor::new(&[1, 2, 2, 2], vec![0.0; 7]).unwrap_err();
    assert!(matches!(
      err,
      TensorError::LengthMismatch {
        expected: 8,
        actual: 7,
        ..
      }
    ));
  }

  #[test]
  fn test_shape_overflow() {
    let shape = [1, 7, 1 << (usize::BITS - 2), 4];
    let err = OutputTensor::new(&shape, vec![]).unwrap_err();
    assert_eq!(err, TensorError::ShapeOverflow(shape.to_vec()));
    assert_eq!(element_count(&[1, 35, 13, 13]), Ok(5915));
  }

  #[test]
  fn test_set_then_value() {
    let mut tensor = OutputTensor::zeros(3, 4, 5);
    tensor.set(2, 3, 4, 1.5);
    assert_eq!(tensor.value(2, 3, 4), 1.5);
    assert_eq!(tensor.as_slice().iter().filter(|v| **v != 0.0).count(), 1);
  }
}
