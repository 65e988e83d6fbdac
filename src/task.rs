// 该文件是 Haiyan （海眼） 项目的一部分。
// src/task.rs - 检测任务
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

use tracing::{info, warn};

use crate::{
  frame::RgbFrame,
  model::Detector,
  output::Render,
  tiled::{FailurePolicy, TiledDetections, TiledDetector},
  tiling::TileConfig,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 对输入的每一幅影像做滑动窗口检测、全局 NMS，并写入输出
#[derive(Debug, Clone, Default)]
pub struct TiledTask {
  config: TileConfig,
  failure_policy: FailurePolicy,
  parallel: bool,
}

impl TiledTask {
  pub fn new(config: TileConfig) -> Self {
    Self {
      config,
      ..Self::default()
    }
  }

  pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
    self.failure_policy = policy;
    self
  }

  pub fn with_parallel(mut self, parallel: bool) -> Self {
    self.parallel = parallel;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbFrame>,
  M: Detector<Error = ME> + Sync,
  O: Render<RgbFrame, TiledDetections, Error = RE>,
> Task<I, M, O> for TiledTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let tiled = TiledDetector::new(model, self.config)?.with_failure_policy(self.failure_policy);

    let mut frames = 0usize;
    for frame in input {
      frames += 1;
      info!("处理第 {} 幅影像 ({}x{})", frames, frame.width(), frame.height());
      let result = if self.parallel {
        tiled.detect_parallel(&frame)?
      } else {
        tiled.detect(&frame)?
      };
      if !result.skipped_tiles.is_empty() {
        warn!(
          "第 {} 幅影像有 {} 个瓦片被跳过",
          frames,
          result.skipped_tiles.len()
        );
      }
      if result.is_empty() {
        info!("第 {} 幅影像未检测到目标", frames);
      }
      info!(
        "检测完成: NMS 前 {} 个, NMS 后 {} 个, 耗时: {:.2?}",
        result.raw.len(),
        result.detections.len(),
        result.elapsed
      );
      output.render_result(&frame, &result)?;
    }

    if frames == 0 {
      return Err(anyhow::anyhow!("没有输入帧"));
    }
    info!("任务完成，共处理 {} 幅影像", frames);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{DetectItem, DetectResult};
  use std::cell::RefCell;
  use std::convert::Infallible;

  struct CornerDetector;

  impl Detector for CornerDetector {
    type Error = std::io::Error;

    fn detect(&self, _: &RgbFrame, _: f32) -> Result<DetectResult, Self::Error> {
      Ok(DetectResult::from(vec![DetectItem::new(
        "vessel",
        0.6,
        [0.0, 0.0, 4.0, 4.0],
      )]))
    }
  }

  #[derive(Default)]
  struct Capture {
    counts: RefCell<Vec<(usize, usize)>>,
  }

  #[derive(Debug, thiserror::Error)]
  #[error("never")]
  struct Never(Infallible);

  impl Render<RgbFrame, TiledDetections> for &Capture {
    type Error = Never;

    fn render_result(&self, _: &RgbFrame, result: &TiledDetections) -> Result<(), Self::Error> {
      self
        .counts
        .borrow_mut()
        .push((result.raw.len(), result.detections.len()));
      Ok(())
    }
  }

  fn config() -> TileConfig {
    TileConfig::builder()
      .tile_size(8)
      .stride(8)
      .overlap_threshold(0.1)
      .build()
      .unwrap()
  }

  #[test]
  fn renders_each_frame() {
    let capture = Capture::default();
    let frames = vec![RgbFrame::with_shape(16, 16), RgbFrame::with_shape(8, 24)];
    TiledTask::new(config())
      .run_task(frames.into_iter(), CornerDetector, &capture)
      .unwrap();
    // 步长等于瓦片尺寸时瓦片互不重叠，检测框也互不重叠
    assert_eq!(*capture.counts.borrow(), vec![(4, 4), (3, 3)]);
  }

  #[test]
  fn empty_input_is_an_error() {
    let capture = Capture::default();
    let result = TiledTask::new(config())
      .with_parallel(true)
      .run_task(std::iter::empty(), CornerDetector, &capture);
    assert!(result.is_err());
  }
}
