// 该文件是 Idscan （识卡） 项目的一部分。
// src/model.rs - 模型与检测结果
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

use serde::{Deserialize, Serialize};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 归一化图像坐标下的边界框，左上角 + 宽高
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
  pub left: f32,
  pub top: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBox {
  pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
    Self {
      left,
      top,
      width,
      height,
    }
  }

  pub fn right(&self) -> f32 {
    self.left + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.top + self.height
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  /// 计算两个边界框的 IoU，并集为 0 时返回 0
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let x1 = self.left.max(other.left);
    let y1 = self.top.max(other.top);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }

  /// 裁剪到 `[0, 1]` 图像范围内
  pub fn clamped(&self) -> BoundingBox {
    let left = self.left.clamp(0.0, 1.0);
    let top = self.top.clamp(0.0, 1.0);
    let right = self.right().clamp(0.0, 1.0);
    let bottom = self.bottom().clamp(0.0, 1.0);
    BoundingBox::new(left, top, right - left, bottom - top)
  }
}

/// 锚框，单位为网格
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
  pub width: f32,
  pub height: f32,
}

/// 最终检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub score: f32,
  pub label: String,
  pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// 得分最高的检测结果
  pub fn top(&self) -> Option<&Detection> {
    self.items.first()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }
}

/// 解码后的候选框，`boxes[i]` 与 `probabilities[i]` 一一对应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
  pub boxes: Vec<BoundingBox>,
  pub probabilities: Vec<Vec<f32>>,
}

impl Candidates {
  pub fn push(&mut self, bbox: BoundingBox, probabilities: Vec<f32>) {
    self.boxes.push(bbox);
    self.probabilities.push(probabilities);
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }
}

pub mod math;

mod decoder;
pub use self::decoder::{AnchorTable, BoxDecoder, DecodeError};

mod suppressor;
pub use self::suppressor::{DetectionSuppressor, SuppressError};

mod detector;
pub use self::detector::{AnchorDetector, AnchorDetectorBuilder, DetectorError};
