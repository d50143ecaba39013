// 该文件是 Idscan （识卡） 项目的一部分。
// src/model/decoder.rs - 网格锚框解码
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
use tracing::{debug, error};

use crate::{
  model::{
    Anchor, BoundingBox, Candidates,
    math::{max_value, sigmoid, softmax_scaled},
  },
  tensor::OutputTensor,
};

/// x, y, w, h, objectness
const BOX_CHANNELS: usize = 5;

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
  #[error("模型配置无效: 批次大小必须为 1, 实际为 {0}")]
  BatchMismatch(usize),
  #[error("模型配置无效: 通道数 {channels} 不能被锚框数 {anchors} 整除")]
  ChannelAnchorMismatch { channels: usize, anchors: usize },
  #[error("模型配置无效: 通道数 {channels} / 锚框数 {anchors} 对应 {actual} 个类别, 标签数为 {expected}")]
  ClassCountMismatch {
    channels: usize,
    anchors: usize,
    expected: usize,
    actual: isize,
  },
  #[error("锚框配置无效: {0}")]
  InvalidAnchors(String),
  #[error("标签表为空")]
  NoLabels,
}

/// 固定顺序的锚框表
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorTable {
  anchors: Box<[Anchor]>,
}

impl AnchorTable {
  pub fn new(anchors: Vec<Anchor>) -> Result<Self, DecodeError> {
    if anchors.is_empty() {
      return Err(DecodeError::InvalidAnchors("锚框表为空".to_string()));
    }
    Ok(Self {
      anchors: anchors.into_boxed_slice(),
    })
  }

  /// 由 `[w0, h0, w1, h1, ...]` 形式的扁平数组构造
  pub fn from_flat(values: &[f32]) -> Result<Self, DecodeError> {
    if values.len() % 2 != 0 {
      return Err(DecodeError::InvalidAnchors(format!(
        "锚框数值个数必须为偶数, 实际为 {}",
        values.len()
      )));
    }
    let anchors = values
      .chunks_exact(2)
      .map(|pair| Anchor {
        width: pair[0],
        height: pair[1],
      })
      .collect();
    Self::new(anchors)
  }

  pub fn len(&self) -> usize {
    self.anchors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.anchors.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Anchor> {
    self.anchors.iter()
  }

  pub fn as_slice(&self) -> &[Anchor] {
    &self.anchors
  }
}

/// 将 `[1, C, H, W]` 输出张量解码为候选框
#[derive(Debug, Clone)]
pub struct BoxDecoder {
  anchors: AnchorTable,
  label_count: usize,
  probability_threshold: f32,
}

impl BoxDecoder {
  pub fn new(
    anchors: AnchorTable,
    label_count: usize,
    probability_threshold: f32,
  ) -> Result<Self, DecodeError> {
    if label_count == 0 {
      return Err(DecodeError::NoLabels);
    }
    Ok(Self {
      anchors,
      label_count,
      probability_threshold,
    })
  }

  pub fn anchors(&self) -> &AnchorTable {
    &self.anchors
  }

  pub fn label_count(&self) -> usize {
    self.label_count
  }

  pub fn probability_threshold(&self) -> f32 {
    self.probability_threshold
  }

  /// 检查张量形状与锚框、标签数是否一致
  pub fn check_shape(&self, tensor: &OutputTensor) -> Result<(), DecodeError> {
    let channels = tensor.channels();
    let anchors = self.anchors.len();

    if tensor.batch() != 1 {
      error!("批次大小必须为 1, 实际为 {}", tensor.batch());
      return Err(DecodeError::BatchMismatch(tensor.batch()));
    }

    if channels % anchors != 0 {
      error!("通道数 {} 不能被锚框数 {} 整除", channels, anchors);
      return Err(DecodeError::ChannelAnchorMismatch { channels, anchors });
    }

    let actual = (channels / anchors) as isize - BOX_CHANNELS as isize;
    if actual != self.label_count as isize {
      error!(
        "类别数不匹配: 张量对应 {} 个类别, 标签数为 {}",
        actual, self.label_count
      );
      return Err(DecodeError::ClassCountMismatch {
        channels,
        anchors,
        expected: self.label_count,
        actual,
      });
    }

    Ok(())
  }

  pub fn decode(&self, tensor: &OutputTensor) -> Result<Candidates, DecodeError> {
    self.check_shape(tensor)?;

    let height = tensor.height();
    let width = tensor.width();
    let per_anchor = BOX_CHANNELS + self.label_count;
    debug!(
      "解码张量: 形状 {:?}, 锚框数 {}, 类别数 {}",
      tensor.shape(),
      self.anchors.len(),
      self.label_count
    );

    let mut candidates = Candidates::default();
    let mut logits = vec![0.0f32; self.label_count];

    for grid_y in 0..height {
      for grid_x in 0..width {
        for (a, anchor) in self.anchors.iter().enumerate() {
          let base = a * per_anchor;
          let raw = |offset: usize| tensor.value(base + offset, grid_y, grid_x);

          let cx = (sigmoid(raw(0)) + grid_x as f32) / width as f32;
          let cy = (sigmoid(raw(1)) + grid_y as f32) / height as f32;
          let w = raw(2).exp() * anchor.width / width as f32;
          let h = raw(3).exp() * anchor.height / height as f32;
          let objectness = sigmoid(raw(4));

          for (c, logit) in logits.iter_mut().enumerate() {
            *logit = raw(BOX_CHANNELS + c);
          }
          let probabilities = softmax_scaled(&logits, objectness);

          if max_value(&probabilities) > self.probability_threshold {
            candidates.push(
              BoundingBox::new(cx - w / 2.0, cy - h / 2.0, w, h),
              probabilities,
            );
          }
        }
      }
    }

    debug!(
      "解码完成: {} 个网格单元, {} 个候选框",
      height * width * self.anchors.len(),
      candidates.len()
    );
    Ok(candidates)
  }
}
