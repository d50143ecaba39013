// 该文件是 Idscan （识卡） 项目的一部分。
// src/config.rs - 检测器配置
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::Anchor;

pub const DEFAULT_ANCHORS: [f32; 10] = [0.573, 0.677, 1.87, 2.06, 3.34, 5.47, 7.88, 3.53, 9.77, 9.17];
pub const DEFAULT_LABELS: [&str; 2] = ["IdCard", "NotIdCard"];
pub const DEFAULT_PROBABILITY_THRESHOLD: f32 = 0.1;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MAX_DETECTIONS: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("读取配置文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("解析配置文件失败: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("配置项 {key} 无效: {reason}")]
  InvalidValue { key: &'static str, reason: String },
}

impl ConfigError {
  pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
    ConfigError::InvalidValue {
      key,
      reason: reason.into(),
    }
  }
}

/// 检测器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
  /// 锚框表，单位为网格
  pub anchors: Vec<Anchor>,
  /// 标签表，顺序与模型类别输出一致
  pub labels: Vec<String>,
  pub probability_threshold: f32,
  pub iou_threshold: f32,
  pub max_detections: usize,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      anchors: DEFAULT_ANCHORS
        .chunks_exact(2)
        .map(|pair| Anchor {
          width: pair[0],
          height: pair[1],
        })
        .collect(),
      labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
      probability_threshold: DEFAULT_PROBABILITY_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_detections: DEFAULT_MAX_DETECTIONS,
    }
  }
}

impl DetectorConfig {
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载检测器配置: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let config: DetectorConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.anchors.is_empty() {
      return Err(ConfigError::invalid("anchors", "锚框表为空"));
    }
    if self.labels.is_empty() {
      return Err(ConfigError::invalid("labels", "标签表为空"));
    }
    if !(0.0..=1.0).contains(&self.probability_threshold) {
      return Err(ConfigError::invalid(
        "probability_threshold",
        format!("{} 不在 [0, 1] 范围内", self.probability_threshold),
      ));
    }
    if !(0.0..=1.0).contains(&self.iou_threshold) {
      return Err(ConfigError::invalid(
        "iou_threshold",
        format!("{} 不在 [0, 1] 范围内", self.iou_threshold),
      ));
    }
    if self.max_detections == 0 {
      return Err(ConfigError::invalid("max_detections", "必须为正整数"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_default_is_reference_configuration() {
    let config = DetectorConfig::default();
    assert_eq!(config.anchors.len(), 5);
    assert_eq!(config.anchors[3].width, 7.88);
    assert_eq!(config.anchors[3].height, 3.53);
    assert_eq!(config.labels, vec!["IdCard", "NotIdCard"]);
    assert_eq!(config.max_detections, 20);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_json_uses_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
      file,
      r#"{{"labels": ["cat", "dog", "bird"], "iou_threshold": 0.5}}"#
    )
    .unwrap();

    let config = DetectorConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.labels.len(), 3);
    assert_eq!(config.iou_threshold, 0.5);
    assert_eq!(config.probability_threshold, DEFAULT_PROBABILITY_THRESHOLD);
    assert_eq!(config.anchors.len(), 5);
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let config = DetectorConfig {
      iou_threshold: 1.5,
      ..Default::default()
    };
    assert!(matches!(
      config.validate(),
      Err(ConfigError::InvalidValue {
        key: "iou_threshold",
        ..
      })
    ));

    let config = DetectorConfig {
      max_detections: 0,
      ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = DetectorConfig {
      labels: vec![],
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_missing_file() {
    assert!(matches!(
      DetectorConfig::from_json_file("/nonexistent/idscan.json"),
      Err(ConfigError::IoError(_))
    ));
  }
}
