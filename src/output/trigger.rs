// 该文件是 Idscan （识卡） 项目的一部分。
// src/output/trigger.rs - 按标签与得分触发动作
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

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, model::DetectResult, output::Render, tensor::OutputTensor,
};

const DEFAULT_TRIGGER_LABEL: &str = "IdCard";
const DEFAULT_TRIGGER_SCORE: f32 = 0.4;

#[derive(Error, Debug)]
pub enum TriggerOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("score 参数无效: {0}")]
  InvalidScore(String),
}

/// 得分最高的检测结果为指定标签且得分超过阈值时触发
///
/// `trigger:?label=IdCard&score=0.4`
#[derive(Debug)]
pub struct TriggerOutput {
  label: String,
  score: f32,
  triggered: AtomicUsize,
}

impl Default for TriggerOutput {
  fn default() -> Self {
    Self::new(DEFAULT_TRIGGER_LABEL, DEFAULT_TRIGGER_SCORE)
  }
}

impl FromUrlWithScheme for TriggerOutput {
  const SCHEME: &'static str = "trigger";
}

impl FromUrl for TriggerOutput {
  type Error = TriggerOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(TriggerOutputError::SchemeMismatch(uri.scheme().to_string()));
    }

    let mut output = TriggerOutput::default();
    for (k, v) in uri.query_pairs() {
      match &*k {
        "label" => output.label = v.into_owned(),
        "score" => {
          output.score = v
            .parse()
            .map_err(|_| TriggerOutputError::InvalidScore(v.to_string()))?
        }
        _ => {}
      }
    }
    Ok(output)
  }
}

impl TriggerOutput {
  pub fn new(label: &str, score: f32) -> Self {
    Self {
      label: label.to_string(),
      score,
      triggered: AtomicUsize::new(0),
    }
  }

  /// 仅看得分最高的一个结果
  pub fn should_trigger(&self, result: &DetectResult) -> bool {
    result
      .top()
      .is_some_and(|top| top.label == self.label && top.score > self.score)
  }

  pub fn triggered(&self) -> usize {
    self.triggered.load(Ordering::Relaxed)
  }
}

impl Render<OutputTensor, DetectResult> for TriggerOutput {
  type Error = TriggerOutputError;

  fn render_result(&self, _frame: &OutputTensor, result: &DetectResult) -> Result<(), Self::Error> {
    if let Some(top) = result.top() {
      debug!("最高得分: {} {:.2}", top.label, top.score);
    }

    if self.should_trigger(result) {
      let count = self.triggered.fetch_add(1, Ordering::Relaxed) + 1;
      if let Some(top) = result.top() {
        warn!(
          "触发 {}: 得分 {:.2} 超过 {:.2} (第 {} 次)",
          top.label, top.score, self.score, count
        );
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BoundingBox, Detection};

  fn result(items: &[(&str, f32)]) -> DetectResult {
    DetectResult::from(
      items
        .iter()
        .map(|(label, score)| Detection {
          score: *score,
          label: label.to_string(),
          bbox: BoundingBox::default(),
        })
        .collect::<Vec<_>>(),
    )
  }

  #[test]
  fn test_only_top_detection_counts() {
    let trigger = TriggerOutput::default();
    assert!(trigger.should_trigger(&result(&[("IdCard", 0.8)])));
    assert!(!trigger.should_trigger(&result(&[("NotIdCard", 0.9), ("IdCard", 0.8)])));
    assert!(!trigger.should_trigger(&result(&[("IdCard", 0.4)])));
    assert!(!trigger.should_trigger(&DetectResult::default()));
  }

  #[test]
  fn test_from_url_and_count() {
    let url = Url::parse("trigger:?label=cat&score=0.5").unwrap();
    let trigger = TriggerOutput::from_url(&url).unwrap();
    let frame = OutputTensor::zeros(7, 1, 1);

    trigger.render_result(&frame, &result(&[("cat", 0.6)])).unwrap();
    trigger.render_result(&frame, &result(&[("cat", 0.3)])).unwrap();
    trigger.render_result(&frame, &result(&[("dog", 0.9)])).unwrap();
    assert_eq!(trigger.triggered(), 1);
  }

  #[test]
  fn test_invalid_score() {
    let url = Url::parse("trigger:?score=high").unwrap();
    assert!(matches!(
      TriggerOutput::from_url(&url),
      Err(TriggerOutputError::InvalidScore(_))
    ));
  }
}
