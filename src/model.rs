// 该文件是 Haiyan （海眼） 项目的一部分。
// src/model.rs - 检测模型
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

use serde::{Deserialize, Serialize};

use crate::frame::RgbFrame;

/// 目标检测器
///
/// 输入一块瓦片与置信度阈值，返回瓦片局部坐标下的检测框。
/// 实现方应保证每次调用互不影响，模型权重在构造时一次性加载。
pub trait Detector {
  type Error;

  fn detect(&self, tile: &RgbFrame, confidence_threshold: f32) -> Result<DetectResult, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for &D {
  type Error = D::Error;

  fn detect(&self, tile: &RgbFrame, confidence_threshold: f32) -> Result<DetectResult, Self::Error> {
    (**self).detect(tile, confidence_threshold)
  }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
  type Error = D::Error;

  fn detect(&self, tile: &RgbFrame, confidence_threshold: f32) -> Result<DetectResult, Self::Error> {
    (**self).detect(tile, confidence_threshold)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectItem {
  pub kind: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

impl DetectItem {
  pub fn new(kind: impl Into<String>, score: f32, bbox: [f32; 4]) -> Self {
    Self {
      kind: kind.into(),
      score,
      bbox,
    }
  }

  /// 平移检测框，用于把瓦片局部坐标提升到全局坐标
  pub fn translated(&self, dx: f32, dy: f32) -> Self {
    let [x_min, y_min, x_max, y_max] = self.bbox;
    Self {
      kind: self.kind.clone(),
      score: self.score,
      bbox: [x_min + dx, y_min + dy, x_max + dx, y_max + dy],
    }
  }

  pub fn width(&self) -> f32 {
    self.bbox[2] - self.bbox[0]
  }

  pub fn height(&self) -> f32 {
    self.bbox[3] - self.bbox[1]
  }

  pub fn center(&self) -> (f32, f32) {
    (
      (self.bbox[0] + self.bbox[2]) / 2.0,
      (self.bbox[1] + self.bbox[3]) / 2.0,
    )
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

#[cfg(feature = "model_bright_spot")]
mod bright_spot;
#[cfg(feature = "model_bright_spot")]
pub use self::bright_spot::{BrightSpotBuilder, BrightSpotDetector, BrightSpotError};
