// 该文件是 Haiyan （海眼） 项目的一部分。
// src/tiling.rs - 滑动窗口瓦片网格
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

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TILE_SIZE: usize = 640;
pub const DEFAULT_STRIDE: usize = 128;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.000_000_5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("瓦片尺寸必须为正数")]
  ZeroTileSize,
  #[error("步长必须为正数")]
  ZeroStride,
  #[error("步长 {stride} 大于瓦片尺寸 {tile_size}，瓦片之间会出现空隙")]
  StrideExceedsTile { stride: usize, tile_size: usize },
  #[error("{name} 必须位于 [0, 1] 区间内，实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("图像尺寸为空: {width}x{height}")]
  EmptyImage { width: usize, height: usize },
  #[error("未知的边缘策略: {0}")]
  UnknownEdgePolicy(String),
}

/// 图像右侧/下侧边缘的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgePolicy {
  /// 补零，使步长整数倍地覆盖图像，最后一块贴齐补零后的边缘
  #[default]
  Pad,
  /// 不补零，额外追加一块贴齐原图边缘的瓦片
  Flush,
}

impl EdgePolicy {
  pub fn as_str(&self) -> &'static str {
    match self {
      EdgePolicy::Pad => "pad",
      EdgePolicy::Flush => "flush",
    }
  }
}

impl fmt::Display for EdgePolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EdgePolicy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "pad" => Ok(EdgePolicy::Pad),
      "flush" => Ok(EdgePolicy::Flush),
      _ => Err(ConfigError::UnknownEdgePolicy(s.to_string())),
    }
  }
}

/// 滑动窗口检测参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileConfig {
  pub tile_size: usize,
  pub stride: usize,
  /// 传给检测器的置信度阈值
  pub confidence_threshold: f32,
  /// 全局 NMS 的 IoU 阈值，超过即视为重复
  pub overlap_threshold: f32,
  pub edge_policy: EdgePolicy,
}

impl Default for TileConfig {
  fn default() -> Self {
    Self {
      tile_size: DEFAULT_TILE_SIZE,
      stride: DEFAULT_STRIDE,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
      edge_policy: EdgePolicy::default(),
    }
  }
}

fn check_unit_interval(name: &'static str, value: f32) -> Result<(), ConfigError> {
  if value.is_finite() && (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::ThresholdOutOfRange { name, value })
  }
}

impl TileConfig {
  pub fn builder() -> TileConfigBuilder {
    TileConfigBuilder::default()
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.tile_size == 0 {
      return Err(ConfigError::ZeroTileSize);
    }
    if self.stride == 0 {
      return Err(ConfigError::ZeroStride);
    }
    if self.stride > self.tile_size {
      return Err(ConfigError::StrideExceedsTile {
        stride: self.stride,
        tile_size: self.tile_size,
      });
    }
    check_unit_interval("confidence_threshold", self.confidence_threshold)?;
    check_unit_interval("overlap_threshold", self.overlap_threshold)?;
    Ok(())
  }

  /// 相邻瓦片的重叠像素数
  pub fn overlap(&self) -> usize {
    self.tile_size.saturating_sub(self.stride)
  }
}

#[derive(Debug, Default)]
pub struct TileConfigBuilder {
  config: TileConfig,
}

impl TileConfigBuilder {
  pub fn tile_size(mut self, tile_size: usize) -> Self {
    self.config.tile_size = tile_size;
    self
  }

  pub fn stride(mut self, stride: usize) -> Self {
    self.config.stride = stride;
    self
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.config.confidence_threshold = threshold;
    self
  }

  pub fn overlap_threshold(mut self, threshold: f32) -> Self {
    self.config.overlap_threshold = threshold;
    self
  }

  pub fn edge_policy(mut self, policy: EdgePolicy) -> Self {
    self.config.edge_policy = policy;
    self
  }

  pub fn build(self) -> Result<TileConfig, ConfigError> {
    self.config.validate()?;
    Ok(self.config)
  }
}

/// 使 `(dim + pad - tile_size)` 能被 `stride` 整除的最小非负补零量
///
/// 当 `dim < tile_size` 时补到恰好一块瓦片。
pub fn pad_amount(dim: usize, tile_size: usize, stride: usize) -> usize {
  if dim <= tile_size {
    return tile_size - dim;
  }
  (dim - tile_size).div_ceil(stride) * stride + tile_size - dim
}

/// 单个轴上的瓦片起点及补零后的长度
fn axis_offsets(dim: usize, tile_size: usize, stride: usize, policy: EdgePolicy) -> (usize, Vec<usize>) {
  if dim <= tile_size {
    return (tile_size, vec![0]);
  }

  match policy {
    EdgePolicy::Pad => {
      let padded = dim + pad_amount(dim, tile_size, stride);
      let offsets = (0..=padded - tile_size).step_by(stride).collect();
      (padded, offsets)
    }
    EdgePolicy::Flush => {
      let last = dim - tile_size;
      let mut offsets: Vec<usize> = (0..=last).step_by(stride).collect();
      if offsets.last() != Some(&last) {
        offsets.push(last);
      }
      (dim, offsets)
    }
  }
}

/// 瓦片左上角在补零图像中的坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tile {
  pub x: usize,
  pub y: usize,
}

/// 覆盖整幅图像的规则瓦片网格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
  tile_size: usize,
  image_width: usize,
  image_height: usize,
  padded_width: usize,
  padded_height: usize,
  x_offsets: Vec<usize>,
  y_offsets: Vec<usize>,
}

impl TileGrid {
  pub fn new(height: usize, width: usize, config: &TileConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    if height == 0 || width == 0 {
      return Err(ConfigError::EmptyImage { width, height });
    }

    let (padded_height, y_offsets) =
      axis_offsets(height, config.tile_size, config.stride, config.edge_policy);
    let (padded_width, x_offsets) =
      axis_offsets(width, config.tile_size, config.stride, config.edge_policy);

    debug!(
      "瓦片网格: 原图 {}x{}, 补零后 {}x{}, {} 行 x {} 列",
      width,
      height,
      padded_width,
      padded_height,
      y_offsets.len(),
      x_offsets.len()
    );

    Ok(Self {
      tile_size: config.tile_size,
      image_width: width,
      image_height: height,
      padded_width,
      padded_height,
      x_offsets,
      y_offsets,
    })
  }

  pub fn tile_size(&self) -> usize {
    self.tile_size
  }

  pub fn image_width(&self) -> usize {
    self.image_width
  }

  pub fn image_height(&self) -> usize {
    self.image_height
  }

  pub fn padded_width(&self) -> usize {
    self.padded_width
  }

  pub fn padded_height(&self) -> usize {
    self.padded_height
  }

  pub fn pad_right(&self) -> usize {
    self.padded_width - self.image_width
  }

  pub fn pad_bottom(&self) -> usize {
    self.padded_height - self.image_height
  }

  pub fn x_offsets(&self) -> &[usize] {
    &self.x_offsets
  }

  pub fn y_offsets(&self) -> &[usize] {
    &self.y_offsets
  }

  pub fn rows(&self) -> usize {
    self.y_offsets.len()
  }

  pub fn cols(&self) -> usize {
    self.x_offsets.len()
  }

  pub fn len(&self) -> usize {
    self.rows() * self.cols()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 按行优先顺序遍历瓦片（外层 y，内层 x）
  pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
    self
      .y_offsets
      .iter()
      .flat_map(move |&y| self.x_offsets.iter().map(move |&x| Tile { x, y }))
  }

  /// 原图像素 (x, y) 是否被至少一块瓦片覆盖
  pub fn covers(&self, x: usize, y: usize) -> bool {
    let within = |offsets: &[usize], p: usize| {
      offsets
        .iter()
        .any(|&start| start <= p && p < start + self.tile_size)
    };
    within(&self.x_offsets, x) && within(&self.y_offsets, y)
  }
}
