// 该文件是 Idscan （识卡） 项目的一部分。
// src/model/suppressor.rs - 非极大值抑制
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

use crate::model::{Candidates, Detection, math::argmax};

#[derive(Error, Debug, PartialEq)]
pub enum SuppressError {
  #[error("候选框数量 {boxes} 与概率向量数量 {probabilities} 不一致")]
  LengthMismatch { boxes: usize, probabilities: usize },
  #[error("第 {index} 个概率向量长度为 {actual}, 标签数为 {expected}")]
  ClassCountMismatch {
    index: usize,
    expected: usize,
    actual: usize,
  },
}

/// 贪心非极大值抑制
///
/// 每轮选出全局得分最高的候选框及其类别，输出后将与之重叠
/// （IoU 超过阈值）的候选框在该类别上的概率清零。其他类别不受影响，
/// 因此同一区域仍可能以另一类别再次被选中。
#[derive(Debug, Clone)]
pub struct DetectionSuppressor {
  labels: Box<[String]>,
  max_detections: usize,
  probability_threshold: f32,
  iou_threshold: f32,
}

impl DetectionSuppressor {
  pub fn new(
    labels: Vec<String>,
    max_detections: usize,
    probability_threshold: f32,
    iou_threshold: f32,
  ) -> Self {
    Self {
      labels: labels.into_boxed_slice(),
      max_detections,
      probability_threshold,
      iou_threshold,
    }
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn max_detections(&self) -> usize {
    self.max_detections
  }

  pub fn probability_threshold(&self) -> f32 {
    self.probability_threshold
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  fn check(&self, candidates: &Candidates) -> Result<(), SuppressError> {
    if candidates.boxes.len() != candidates.probabilities.len() {
      error!(
        "候选框数量 {} 与概率向量数量 {} 不一致",
        candidates.boxes.len(),
        candidates.probabilities.len()
      );
      return Err(SuppressError::LengthMismatch {
        boxes: candidates.boxes.len(),
        probabilities: candidates.probabilities.len(),
      });
    }

    if let Some((index, probs)) = candidates
      .probabilities
      .iter()
      .enumerate()
      .find(|(_, probs)| probs.len() != self.labels.len())
    {
      error!(
        "第 {} 个概率向量长度为 {}, 标签数为 {}",
        index,
        probs.len(),
        self.labels.len()
      );
      return Err(SuppressError::ClassCountMismatch {
        index,
        expected: self.labels.len(),
        actual: probs.len(),
      });
    }

    Ok(())
  }

  /// 候选集合按值传入，抑制过程中的修改只作用于本次调用
  pub fn suppress(&self, candidates: Candidates) -> Result<Vec<Detection>, SuppressError> {
    self.check(&candidates)?;

    let Candidates {
      boxes,
      mut probabilities,
    } = candidates;

    let mut detections = Vec::new();
    if boxes.is_empty() {
      return Ok(detections);
    }

    let mut best = probabilities
      .iter()
      .map(|probs| argmax(probs).map_or(0.0, |(_, score)| score))
      .collect::<Vec<_>>();

    while detections.len() < self.max_detections {
      let Some((index, score)) = argmax(&best) else {
        break;
      };
      // NaN 同样在此终止
      if !(score > self.probability_threshold) {
        break;
      }

      let class = argmax(&probabilities[index]).map_or(0, |(class, _)| class);
      let winner = boxes[index];

      detections.push(Detection {
        score,
        label: self.labels[class].clone(),
        bbox: winner,
      });

      for (j, bbox) in boxes.iter().enumerate() {
        if j == index || winner.iou(bbox) > self.iou_threshold {
          probabilities[j][class] = 0.0;
          best[j] = argmax(&probabilities[j]).map_or(0.0, |(_, score)| score);
        }
      }
    }

    debug!(
      "非极大值抑制: {} 个候选框, 输出 {} 个检测结果",
      boxes.len(),
      detections.len()
    );
    Ok(detections)
  }
}
