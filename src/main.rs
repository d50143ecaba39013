// 该文件是 Idscan （识卡） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use idscan::{
  FromUrl,
  input::InputWrapper,
  model::AnchorDetectorBuilder,
  output::OutputWrapper,
  task::{ContinuousTask, LatestFrameTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("检测器配置: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut builder = AnchorDetectorBuilder::from_url(&args.model)?;
  if let Some(threshold) = args.probability {
    builder = builder.probability_threshold(threshold);
  }
  if let Some(threshold) = args.iou {
    builder = builder.iou_threshold(threshold);
  }
  if let Some(max_detections) = args.max_detections {
    builder = builder.max_detections(max_detections);
  }
  let model = builder.build()?;

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let summary = if args.drop_when_busy {
    let frames = input
      .into_tensors()
      .take(args.frame_number.unwrap_or(usize::MAX));
    LatestFrameTask.run_task(frames, model, output)?
  } else {
    ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .run_task(input.into_tensors(), model, output)?
  };

  info!("处理完成: {} 帧, 丢弃 {} 帧", summary.frames, summary.dropped);
  Ok(())
}
