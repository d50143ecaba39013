// 该文件是 Idscan （识卡） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

/// Idscan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测器配置
  /// 例如: anchor:?labels=IdCard,NotIdCard 或 anchor:///etc/idscan.json
  #[arg(long, value_name = "MODEL", default_value = "anchor:")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 原始张量: raw:///path/output.bin?shape=1,35,13,13
  /// - JSON 张量: json:///path/outputs.json
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 日志: log: 或 log:?clamp
  /// - JSON Lines: jsonl:///path/out.jsonl 或 jsonl:-
  /// - 触发器: trigger:?label=IdCard&score=0.4
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,

  /// 概率阈值 (0.0 - 1.0)，覆盖检测器配置
  #[arg(long, value_name = "THRESHOLD")]
  pub probability: Option<f32>,

  /// NMS IoU 阈值 (0.0 - 1.0)，覆盖检测器配置
  #[arg(long, value_name = "THRESHOLD")]
  pub iou: Option<f32>,

  /// 最大检测结果数，覆盖检测器配置
  #[arg(long, value_name = "COUNT")]
  pub max_detections: Option<usize>,

  /// 最大处理帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 上一帧仍在处理时丢弃新到达的帧
  #[arg(long)]
  pub drop_when_busy: bool,
}
