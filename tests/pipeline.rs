// 该文件是 Idscan （识卡） 项目的一部分。
// tests/pipeline.rs - 解码与抑制流程测试
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

use std::io::Write;

use idscan::{
  FromUrl,
  config::DetectorConfig,
  input::InputWrapper,
  model::{AnchorDetectorBuilder, AnchorTable, BoxDecoder, DetectionSuppressor, Model},
  output::{JsonLinesOutput, Render},
  task::{ContinuousTask, Task},
  tensor::OutputTensor,
};
use url::Url;

const CHANNELS_PER_ANCHOR: usize = 7;

/// 默认 5 锚框、2 类的 13x13 输出，全部 objectness 为强负值
fn quiet_tensor() -> OutputTensor {
  let mut tensor = OutputTensor::zeros(5 * CHANNELS_PER_ANCHOR, 13, 13);
  for a in 0..5 {
    for y in 0..13 {
      for x in 0..13 {
        tensor.set(a * CHANNELS_PER_ANCHOR + 4, y, x, -20.0);
      }
    }
  }
  tensor
}

fn light(tensor: &mut OutputTensor, anchor: usize, y: usize, x: usize, class_logits: [f32; 2]) {
  let base = anchor * CHANNELS_PER_ANCHOR;
  tensor.set(base + 4, y, x, 10.0);
  tensor.set(base + 5, y, x, class_logits[0]);
  tensor.set(base + 6, y, x, class_logits[1]);
}

#[test]
fn quiet_tensor_yields_nothing() {
  let detector = AnchorDetectorBuilder::default().build().unwrap();
  let result = detector.infer(&quiet_tensor()).unwrap();
  assert!(result.is_empty());
}

#[test]
fn neighbouring_anchors_collapse_into_one_detection() {
  let detector = AnchorDetectorBuilder::default().build().unwrap();
  let mut tensor = quiet_tensor();

  // 最大的锚框 (9.77x9.17) 在相邻单元上 IoU 约 0.81
  light(&mut tensor, 4, 6, 6, [6.0, -6.0]);
  light(&mut tensor, 4, 6, 7, [5.0, -6.0]);
  // 角落里的另一张卡片
  light(&mut tensor, 1, 0, 0, [4.0, -6.0]);

  let result = detector.infer(&tensor).unwrap();
  let labels = result.iter().map(|d| d.label.as_str()).collect::<Vec<_>>();
  assert_eq!(labels, vec!["IdCard", "IdCard"]);
  assert!(result.items[0].score > result.items[1].score);

  // 第二个结果来自 (0, 0)
  let second = result.items[1].bbox;
  assert!(second.left + second.width / 2.0 < 0.1);
}

#[test]
fn output_is_bounded_and_sorted() {
  let detector = AnchorDetectorBuilder::default()
    .max_detections(4)
    .build()
    .unwrap();
  let mut tensor = quiet_tensor();
  for i in 0..6 {
    light(&mut tensor, 0, i * 2, i * 2, [1.0 + i as f32, 0.0]);
  }

  let result = detector.infer(&tensor).unwrap();
  assert_eq!(result.len(), 4);
  assert!(
    result
      .items
      .windows(2)
      .all(|w| w[0].score >= w[1].score)
  );
}

#[test]
fn decoder_and_suppressor_compose_by_hand() {
  let anchors = AnchorTable::from_flat(&[1.0, 1.0]).unwrap();
  let decoder = BoxDecoder::new(anchors, 2, 0.1).unwrap();
  let suppressor = DetectionSuppressor::new(vec!["A".into(), "B".into()], 20, 0.1, 0.45);

  let tensor =
    OutputTensor::new(&[1, 7, 1, 1], vec![0.0, 0.0, 0.0, 0.0, 10.0, 10.0, -10.0]).unwrap();
  let candidates = decoder.decode(&tensor).unwrap();
  let detections = suppressor.suppress(candidates).unwrap();

  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].label, "A");
  assert!((detections[0].score - 1.0).abs() < 1e-3);
}

#[test]
fn mismatched_model_is_a_configuration_error() {
  let config = DetectorConfig {
    labels: vec!["IdCard".into(), "NotIdCard".into(), "Passport".into()],
    ..Default::default()
  };
  let detector = AnchorDetectorBuilder::with_config(config).build().unwrap();
  let err = detector.infer(&quiet_tensor()).unwrap_err();
  assert!(err.to_string().contains("模型配置无效"));
}

#[test]
fn concurrent_calls_do_not_interfere() {
  let detector = std::sync::Arc::new(AnchorDetectorBuilder::default().build().unwrap());
  let mut tensor = quiet_tensor();
  light(&mut tensor, 2, 3, 3, [3.0, 0.0]);
  let expected = detector.infer(&tensor).unwrap();

  let handles = (0..4)
    .map(|_| {
      let detector = detector.clone();
      let tensor = tensor.clone();
      std::thread::spawn(move || detector.infer(&tensor).unwrap())
    })
    .collect::<Vec<_>>();
  for handle in handles {
    assert_eq!(handle.join().unwrap(), expected);
  }
}

#[test]
fn raw_file_to_json_lines() {
  let dir = tempfile::tempdir().unwrap();
  let input_path = dir.path().join("frames.bin");
  let output_path = dir.path().join("out.jsonl");

  let mut busy = quiet_tensor();
  light(&mut busy, 0, 4, 4, [8.0, 0.0]);
  let mut file = std::fs::File::create(&input_path).unwrap();
  for tensor in [&quiet_tensor(), &busy] {
    for v in tensor.as_slice() {
      file.write_all(&v.to_le_bytes()).unwrap();
    }
  }
  drop(file);

  let mut url = Url::parse("raw:///").unwrap();
  url.set_path(input_path.to_str().unwrap());
  url.set_query(Some("shape=1,35,13,13"));

  let input = InputWrapper::from_url(&url).unwrap();
  let model = AnchorDetectorBuilder::default().build().unwrap();
  let output = JsonLinesOutput::create(&output_path).unwrap();

  let summary = ContinuousTask::default()
    .run_task(input.into_tensors(), model, output)
    .unwrap();
  assert_eq!(summary.frames, 2);

  let text = std::fs::read_to_string(&output_path).unwrap();
  let records = text
    .lines()
    .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
    .collect::<Vec<_>>();
  assert_eq!(records.len(), 2);
  assert!(records[0]["detections"].as_array().unwrap().is_empty());
  assert_eq!(records[1]["detections"][0]["label"], "IdCard");
}

#[test]
fn json_lines_output_renders_detections() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("single.jsonl");
  let output = JsonLinesOutput::create(&path).unwrap();
  let detector = AnchorDetectorBuilder::default().build().unwrap();

  let mut tensor = quiet_tensor();
  light(&mut tensor, 4, 12, 12, [-3.0, 3.0]);
  let result = detector.infer(&tensor).unwrap();
  output.render_result(&tensor, &result).unwrap();
  drop(output);

  let text = std::fs::read_to_string(&path).unwrap();
  assert!(text.contains("NotIdCard"));
}
