// 该文件是 Idscan （识卡） 项目的一部分。
// src/model/detector.rs - 锚框检测器
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

use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::{ConfigError, DetectorConfig},
  model::{
    AnchorTable, BoxDecoder, DecodeError, DetectResult, DetectionSuppressor, Model,
    SuppressError,
  },
  tensor::OutputTensor,
};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("{0}")]
  DecodeError(#[from] DecodeError),
  #[error("非极大值抑制错误: {0}")]
  SuppressError(#[from] SuppressError),
  #[error("配置错误: {0}")]
  ConfigError(#[from] ConfigError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 解码 + 非极大值抑制
#[derive(Debug, Clone)]
pub struct AnchorDetector {
  decoder: BoxDecoder,
  suppressor: DetectionSuppressor,
}

impl AnchorDetector {
  pub fn decoder(&self) -> &BoxDecoder {
    &self.decoder
  }

  pub fn suppressor(&self) -> &DetectionSuppressor {
    &self.suppressor
  }
}

impl Model for AnchorDetector {
  type Input = OutputTensor;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let candidates = self.decoder.decode(input)?;
    debug!("候选框数量: {}", candidates.len());
    let detections = self.suppressor.suppress(candidates)?;
    debug!("检测结果: {:?}", detections);
    Ok(DetectResult::from(detections))
  }
}

#[derive(Debug, Clone, Default)]
pub struct AnchorDetectorBuilder {
  config: DetectorConfig,
}

impl FromUrlWithScheme for AnchorDetectorBuilder {
  const SCHEME: &'static str = "anchor";
}

fn parse_list<T: FromStr>(key: &'static str, value: &str) -> Result<Vec<T>, ConfigError> {
  value
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      s.parse::<T>()
        .map_err(|_| ConfigError::invalid(key, format!("无法解析 '{}'", s)))
    })
    .collect()
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
  value
    .trim()
    .parse::<T>()
    .map_err(|_| ConfigError::invalid(key, format!("无法解析 '{}'", value)))
}

impl FromUrl for AnchorDetectorBuilder {
  type Error = DetectorError;

  /// `anchor:///path/config.json?labels=IdCard,NotIdCard&anchors=..&probability=0.1&iou=0.45&max=20`
  ///
  /// 路径为空时使用默认配置，查询参数覆盖文件中的同名配置。
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::SchemeMismatch(format!(
        "检测器必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut config = match url.path() {
      "" | "/" => DetectorConfig::default(),
      path => DetectorConfig::from_json_file(path)?,
    };

    for (key, value) in url.query_pairs() {
      match &*key {
        "labels" => config.labels = parse_list::<String>("labels", &value)?,
        "anchors" => {
          let flat = parse_list::<f32>("anchors", &value)?;
          config.anchors = AnchorTable::from_flat(&flat)?.as_slice().to_vec();
        }
        "probability" => config.probability_threshold = parse_value("probability", &value)?,
        "iou" => config.iou_threshold = parse_value("iou", &value)?,
        "max" => config.max_detections = parse_value("max", &value)?,
        other => debug!("忽略未知参数: {}", other),
      }
    }

    Ok(AnchorDetectorBuilder { config })
  }
}

impl AnchorDetectorBuilder {
  pub fn with_config(config: DetectorConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn labels(mut self, labels: Vec<String>) -> Self {
    self.config.labels = labels;
    self
  }

  pub fn probability_threshold(mut self, threshold: f32) -> Self {
    self.config.probability_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.config.iou_threshold = threshold;
    self
  }

  pub fn max_detections(mut self, max_detections: usize) -> Self {
    self.config.max_detections = max_detections;
    self
  }

  pub fn build(self) -> Result<AnchorDetector, DetectorError> {
    let config = self.config;
    config.validate()?;

    let anchors = AnchorTable::new(config.anchors)?;
    info!(
      "创建检测器: {} 个锚框, 标签 {:?}, 概率阈值 {}, IoU 阈值 {}, 最多 {} 个结果",
      anchors.len(),
      config.labels,
      config.probability_threshold,
      config.iou_threshold,
      config.max_detections
    );

    let decoder = BoxDecoder::new(anchors, config.labels.len(), config.probability_threshold)?;
    let suppressor = DetectionSuppressor::new(
      config.labels,
      config.max_detections,
      config.probability_threshold,
      config.iou_threshold,
    );

    Ok(AnchorDetector {
      decoder,
      suppressor,
    })
  }
}
