// 该文件是 Haiyan （海眼） 项目的一部分。
// src/model/bright_spot.rs - 亮斑检测器
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

//! 无需推理框架的基线检测器：船只在真彩色影像中通常是深色海面上的亮斑。
//! 亮度阈值分割后做 8 连通域标记，每个足够大的连通域输出一个检测框。

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{DetectItem, DetectResult, Detector},
  url_query,
};

const BRIGHT_SPOT_DEFAULT_THRESHOLD: u8 = 200;
const BRIGHT_SPOT_DEFAULT_MIN_AREA: usize = 4;
const BRIGHT_SPOT_DEFAULT_LABEL: &str = "vessel";

#[derive(Error, Debug)]
pub enum BrightSpotError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: &'static str, actual: String },
  #[error("参数 {name} 无效: {value}")]
  InvalidParameter { name: &'static str, value: String },
  #[error("瓦片为空")]
  EmptyTile,
}

#[derive(Debug, Clone)]
pub struct BrightSpotDetector {
  threshold: u8,
  min_area: usize,
  label: String,
}

impl Default for BrightSpotDetector {
  fn default() -> Self {
    BrightSpotBuilder::default().build()
  }
}

#[derive(Debug, Clone)]
pub struct BrightSpotBuilder {
  threshold: u8,
  min_area: usize,
  label: String,
}

impl Default for BrightSpotBuilder {
  fn default() -> Self {
    Self {
      threshold: BRIGHT_SPOT_DEFAULT_THRESHOLD,
      min_area: BRIGHT_SPOT_DEFAULT_MIN_AREA,
      label: BRIGHT_SPOT_DEFAULT_LABEL.to_string(),
    }
  }
}

impl FromUrlWithScheme for BrightSpotBuilder {
  const SCHEME: &'static str = "bright";
}

fn parse_param<T: std::str::FromStr>(url: &Url, name: &'static str) -> Result<Option<T>, BrightSpotError> {
  match url_query(url, name) {
    Some(value) => value
      .parse()
      .map(Some)
      .map_err(|_| BrightSpotError::InvalidParameter { name, value }),
    None => Ok(None),
  }
}

impl FromUrl for BrightSpotBuilder {
  type Error = BrightSpotError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(BrightSpotError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let mut builder = BrightSpotBuilder::default();
    if let Some(threshold) = parse_param(url, "threshold")? {
      builder = builder.threshold(threshold);
    }
    if let Some(min_area) = parse_param::<usize>(url, "min_area")? {
      if min_area == 0 {
        return Err(BrightSpotError::InvalidParameter {
          name: "min_area",
          value: min_area.to_string(),
        });
      }
      builder = builder.min_area(min_area);
    }
    if let Some(label) = url_query(url, "label") {
      builder = builder.label(label);
    }
    Ok(builder)
  }
}

impl BrightSpotBuilder {
  pub fn threshold(mut self, threshold: u8) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn min_area(mut self, min_area: usize) -> Self {
    self.min_area = min_area.max(1);
    self
  }

  pub fn label(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }

  pub fn build(self) -> BrightSpotDetector {
    info!(
      "亮斑检测器: 亮度阈值 {}, 最小面积 {}, 类别 {}",
      self.threshold, self.min_area, self.label
    );
    BrightSpotDetector {
      threshold: self.threshold,
      min_area: self.min_area,
      label: self.label,
    }
  }
}

// ITU-R BT.601 亮度
fn luminance(pixel: [u8; 3]) -> u8 {
  let [r, g, b] = pixel.map(u32::from);
  ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
}

#[derive(Debug, Clone, Copy)]
struct Component {
  x_min: u32,
  y_min: u32,
  x_max: u32,
  y_max: u32,
  area: usize,
  luminance_sum: u64,
}

impl Component {
  fn new(x: u32, y: u32) -> Self {
    Self {
      x_min: x,
      y_min: y,
      x_max: x,
      y_max: y,
      area: 0,
      luminance_sum: 0,
    }
  }

  fn add(&mut self, x: u32, y: u32, luma: u8) {
    self.x_min = self.x_min.min(x);
    self.y_min = self.y_min.min(y);
    self.x_max = self.x_max.max(x);
    self.y_max = self.y_max.max(y);
    self.area += 1;
    self.luminance_sum += u64::from(luma);
  }

  fn score(&self) -> f32 {
    (self.luminance_sum as f64 / self.area as f64 / 255.0) as f32
  }
}

impl Detector for BrightSpotDetector {
  type Error = BrightSpotError;

  fn detect(&self, tile: &RgbFrame, confidence_threshold: f32) -> Result<DetectResult, Self::Error> {
    if tile.is_empty() {
      return Err(BrightSpotError::EmptyTile);
    }

    let (width, height) = (tile.width() as u32, tile.height() as u32);
    let gray = GrayImage::from_fn(width, height, |x, y| {
      Luma([tile
        .pixel(x as usize, y as usize)
        .map(luminance)
        .unwrap_or(0)])
    });
    let mask = GrayImage::from_fn(width, height, |x, y| {
      if gray.get_pixel(x, y)[0] >= self.threshold {
        Luma([255u8])
      } else {
        Luma([0u8])
      }
    });

    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    // 标签从 1 开始连续编号，0 为背景
    let mut components: Vec<Option<Component>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
      let label = label[0] as usize;
      if label == 0 {
        continue;
      }
      if components.len() < label {
        components.resize(label, None);
      }
      components[label - 1]
        .get_or_insert_with(|| Component::new(x, y))
        .add(x, y, gray.get_pixel(x, y)[0]);
    }

    let items: Vec<DetectItem> = components
      .into_iter()
      .flatten()
      .filter(|c| c.area >= self.min_area)
      .filter(|c| c.score() >= confidence_threshold)
      .map(|c| {
        DetectItem::new(
          self.label.clone(),
          c.score(),
          [
            c.x_min as f32,
            c.y_min as f32,
            (c.x_max + 1) as f32,
            (c.y_max + 1) as f32,
          ],
        )
      })
      .collect();

    debug!("亮斑检测: {} 个目标", items.len());
    Ok(DetectResult::from(items))
  }
}
