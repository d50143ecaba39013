// 该文件是 Idscan （识卡） 项目的一部分。
// src/task.rs - 推理任务
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

use std::{
  sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc,
  },
  thread,
  time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::{model::Model, output::Render};

/// 任务结束后的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
  /// 完成推理的帧数
  pub frames: usize,
  /// 因上一帧仍在处理而丢弃的帧数
  pub dropped: usize,
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(TaskSummary {
      frames: 1,
      dropped: 0,
    })
  }
}

/// 对同一帧重复推理，统计平均耗时
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      debug!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    // 跳过前两次预热
    let warmup = if times.len() > 2 { 2 } else { 0 };
    let measured = &times[warmup..];
    warn!(
      "平均推理时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    Ok(TaskSummary {
      frames: times.len(),
      dropped: 0,
    })
  }
}

/// 进程内收到的 Ctrl-C 次数
static INTERRUPTS: AtomicUsize = AtomicUsize::new(0);
/// `ctrlc` 每个进程只能设置一次处理函数
static INTERRUPT_HANDLER: OnceLock<bool> = OnceLock::new();

fn on_interrupt() {
  info!("收到中断信号，准备退出...");
  INTERRUPTS.fetch_add(1, Ordering::SeqCst);
  thread::spawn(|| {
    thread::sleep(Duration::from_secs(30));
    warn!("强制退出程序");
    std::process::exit(1);
  });
}

/// 只对创建之后到达的中断信号生效
struct InterruptWatch {
  counter: &'static AtomicUsize,
  seen: usize,
}

impl InterruptWatch {
  fn install() -> Self {
    INTERRUPT_HANDLER.get_or_init(|| match ctrlc::set_handler(on_interrupt) {
      Ok(()) => true,
      Err(e) => {
        warn!("无法设置 Ctrl-C 处理函数: {}", e);
        false
      }
    });
    Self::with_counter(&INTERRUPTS)
  }

  fn with_counter(counter: &'static AtomicUsize) -> Self {
    Self {
      counter,
      seen: counter.load(Ordering::SeqCst),
    }
  }

  fn interrupted(&self) -> bool {
    self.counter.load(Ordering::SeqCst) != self.seen
  }
}

/// 依次处理所有输入帧
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let interrupt = InterruptWatch::install();

    let mut frame_index = 0;
    let mut now = Instant::now();
    for frame in input {
      frame_index += 1;
      debug!("处理第 {} 帧", frame_index);
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.interrupted() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(TaskSummary {
      frames: frame_index,
      dropped: 0,
    })
  }
}

/// 推理在工作线程中进行，上一帧仍在处理时到达的帧直接丢弃
#[derive(Default, Debug)]
pub struct LatestFrameTask;

impl<
  F: Send + 'static,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME> + Send + 'static,
  O: Render<F, D, Error = RE> + Send + 'static,
> Task<I, M, O> for LatestFrameTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let busy = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<F>();

    let worker_busy = busy.clone();
    let worker = thread::spawn(move || -> anyhow::Result<usize> {
      let mut frames = 0;
      for frame in rx {
        let now = Instant::now();
        let processed = model
          .infer(&frame)
          .map_err(anyhow::Error::from)
          .and_then(|result| output.render_result(&frame, &result).map_err(anyhow::Error::from));
        worker_busy.store(false, Ordering::Release);
        processed?;
        frames += 1;
        debug!("第 {} 帧处理完成，耗时: {:.2?}", frames, now.elapsed());
      }
      Ok(frames)
    });

    let mut dropped = 0;
    for frame in input {
      if busy
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
      {
        dropped += 1;
        continue;
      }
      if tx.send(frame).is_err() {
        warn!("工作线程已退出，停止读取输入");
        break;
      }
    }
    drop(tx);

    let frames = worker
      .join()
      .map_err(|_| anyhow::anyhow!("工作线程异常退出"))??;
    info!("任务完成，处理 {} 帧, 丢弃 {} 帧", frames, dropped);

    Ok(TaskSummary { frames, dropped })
  }
}
