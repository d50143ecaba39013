// 该文件是 Idscan （识卡） 项目的一部分。
// src/model/math.rs - 数值函数
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

/// 按符号分支的 logistic 函数，避免大幅值输入时溢出
pub fn sigmoid(x: f32) -> f32 {
  if x >= 0.0 {
    1.0 / (1.0 + (-x).exp())
  } else {
    let e = x.exp();
    e / (1.0 + e)
  }
}

/// 先减去最大值再做 softmax，结果整体乘以 `scale`
pub fn softmax_scaled(logits: &[f32], scale: f32) -> Vec<f32> {
  let max = max_value(logits);
  let mut out = logits.iter().map(|&v| (v - max).exp()).collect::<Vec<_>>();
  let sum = out.iter().sum::<f32>();
  for v in out.iter_mut() {
    *v *= scale / sum;
  }
  out
}

/// 最大值，空切片返回负无穷
pub fn max_value(values: &[f32]) -> f32 {
  values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// 最大值及其首次出现的位置
///
/// 与 [`max_value`] 一致跳过 NaN；全部为 NaN 时返回 `(0, NaN)`。
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
  let (first, _) = values.split_first()?;
  let mut best = (0, *first);
  for (i, &v) in values.iter().enumerate().skip(1) {
    if v > best.1 || (best.1.is_nan() && !v.is_nan()) {
      best = (i, v);
    }
  }
  Some(best)
}
