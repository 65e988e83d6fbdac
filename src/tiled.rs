// 该文件是 Haiyan （海眼） 项目的一部分。
// src/tiled.rs - 滑动窗口检测与跨瓦片合并
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

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  frame::{FrameError, RgbFrame},
  model::{DetectItem, Detector},
  nms,
  tiling::{ConfigError, Tile, TileConfig, TileGrid},
};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum TiledError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
  #[error("瓦片 ({x}, {y}) 检测失败: {source}")]
  TileFailed {
    x: usize,
    y: usize,
    #[source]
    source: BoxedError,
  },
  #[error("全部 {0} 个瓦片检测失败")]
  AllTilesFailed(usize),
}

/// 单个瓦片检测失败时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
  /// 记录并跳过该瓦片，继续处理其余瓦片
  #[default]
  Skip,
  /// 第一次失败即终止整个任务
  Abort,
}

/// 所有瓦片检测完成后、NMS 之前的结果
#[derive(Debug, Clone)]
pub struct TileCollection {
  pub grid: TileGrid,
  /// 全局坐标下的原始检测，按瓦片遍历顺序排列
  pub raw: Vec<DetectItem>,
  pub skipped_tiles: Vec<Tile>,
}

/// 滑动窗口检测的最终结果，同时保留 NMS 前后两份检测用于审计
#[derive(Debug, Clone)]
pub struct TiledDetections {
  pub config: TileConfig,
  pub grid: TileGrid,
  pub raw: Vec<DetectItem>,
  pub detections: Vec<DetectItem>,
  pub skipped_tiles: Vec<Tile>,
  pub elapsed: Duration,
}

impl TiledDetections {
  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }
}

/// 校验检测器输出：置信度须为 [0, 1] 内的有限值，坐标须为有限值，
/// 检测框裁剪到 `[0, limit]`，保证平移后仍落在补零图像内
fn sanitize(item: &DetectItem, limit: f32, tile: Tile) -> Option<DetectItem> {
  if !(item.score.is_finite() && (0.0..=1.0).contains(&item.score)) {
    warn!(
      "瓦片 ({}, {}): 丢弃置信度无效的检测 {:?} (置信度 {})",
      tile.x, tile.y, item.bbox, item.score
    );
    return None;
  }
  if !item.bbox.iter().all(|v| v.is_finite()) {
    warn!(
      "瓦片 ({}, {}): 丢弃坐标无效的检测 {:?}",
      tile.x, tile.y, item.bbox
    );
    return None;
  }

  let bbox = item.bbox.map(|v| v.clamp(0.0, limit));
  if bbox != item.bbox {
    warn!(
      "瓦片 ({}, {}): 检测框 {:?} 超出瓦片，裁剪为 {:?}",
      tile.x, tile.y, item.bbox, bbox
    );
  }
  Some(DetectItem::new(item.kind.clone(), item.score, bbox))
}

pub struct TiledDetector<D> {
  detector: D,
  config: TileConfig,
  failure_policy: FailurePolicy,
}

impl<D> TiledDetector<D>
where
  D: Detector,
  D::Error: std::error::Error + Send + Sync + 'static,
{
  /// 配置在此处校验，非法配置不会进入检测阶段
  pub fn new(detector: D, config: TileConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    info!(
      "滑动窗口参数: 瓦片 {}, 步长 {}, 重叠 {}, 置信度阈值 {}, IoU 阈值 {}, 边缘策略 {}",
      config.tile_size,
      config.stride,
      config.overlap(),
      config.confidence_threshold,
      config.overlap_threshold,
      config.edge_policy
    );
    Ok(Self {
      detector,
      config,
      failure_policy: FailurePolicy::default(),
    })
  }

  pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
    self.failure_policy = policy;
    self
  }

  pub fn config(&self) -> &TileConfig {
    &self.config
  }

  pub fn failure_policy(&self) -> FailurePolicy {
    self.failure_policy
  }

  fn prepare(&self, frame: &RgbFrame) -> Result<(TileGrid, RgbFrame), TiledError> {
    let grid = TileGrid::new(frame.height(), frame.width(), &self.config)?;
    let padded = frame.padded(grid.pad_bottom(), grid.pad_right());
    info!(
      "原图 {}x{}, 补零后 {}x{}, 共 {} 个滑动窗口 ({} 行 x {} 列)",
      frame.width(),
      frame.height(),
      padded.width(),
      padded.height(),
      grid.len(),
      grid.rows(),
      grid.cols()
    );
    Ok((grid, padded))
  }

  /// 在单个瓦片上运行检测器，并把检测框平移到全局坐标
  fn detect_tile(&self, padded: &RgbFrame, tile: Tile) -> Result<Vec<DetectItem>, TiledError> {
    let window = padded.window(tile.x, tile.y, self.config.tile_size)?;
    let result = self
      .detector
      .detect(&window, self.config.confidence_threshold)
      .map_err(|e| TiledError::TileFailed {
        x: tile.x,
        y: tile.y,
        source: Box::new(e),
      })?;

    debug!("瓦片 ({}, {}): {} 个检测", tile.x, tile.y, result.len());
    let (dx, dy) = (tile.x as f32, tile.y as f32);
    let limit = self.config.tile_size as f32;
    Ok(
      result
        .iter()
        .filter_map(|item| sanitize(item, limit, tile))
        .map(|item| item.translated(dx, dy))
        .collect(),
    )
  }

  fn gather<I>(&self, grid: TileGrid, outcomes: I) -> Result<TileCollection, TiledError>
  where
    I: IntoIterator<Item = (Tile, Result<Vec<DetectItem>, TiledError>)>,
  {
    let mut raw = Vec::new();
    let mut skipped_tiles = Vec::new();

    for (tile, outcome) in outcomes {
      match outcome {
        Ok(items) => raw.extend(items),
        Err(err @ TiledError::TileFailed { .. }) => match self.failure_policy {
          FailurePolicy::Abort => return Err(err),
          FailurePolicy::Skip => {
            warn!("跳过瓦片 ({}, {}): {}", tile.x, tile.y, err);
            skipped_tiles.push(tile);
          }
        },
        Err(err) => return Err(err),
      }
    }

    if !skipped_tiles.is_empty() {
      warn!("共跳过 {} / {} 个瓦片", skipped_tiles.len(), grid.len());
      if skipped_tiles.len() == grid.len() {
        return Err(TiledError::AllTilesFailed(grid.len()));
      }
    }

    info!("NMS 前检测总数: {}", raw.len());
    Ok(TileCollection {
      grid,
      raw,
      skipped_tiles,
    })
  }

  /// 顺序处理全部瓦片，返回 NMS 前的检测集合
  pub fn collect(&self, frame: &RgbFrame) -> Result<TileCollection, TiledError> {
    let (grid, padded) = self.prepare(frame)?;
    let tiles: Vec<Tile> = grid.tiles().collect();
    let outcomes = tiles
      .into_iter()
      .map(|tile| (tile, self.detect_tile(&padded, tile)));
    self.gather(grid, outcomes)
  }

  /// 对 NMS 前的集合做全局抑制
  pub fn merge(&self, collection: TileCollection, started: Instant) -> TiledDetections {
    let TileCollection {
      grid,
      raw,
      skipped_tiles,
    } = collection;
    let detections = nms::suppress(raw.clone(), self.config.overlap_threshold);
    let elapsed = started.elapsed();
    info!(
      "NMS 后检测总数: {}，耗时: {:.2?}",
      detections.len(),
      elapsed
    );

    TiledDetections {
      config: self.config,
      grid,
      raw,
      detections,
      skipped_tiles,
      elapsed,
    }
  }

  pub fn detect(&self, frame: &RgbFrame) -> Result<TiledDetections, TiledError> {
    let started = Instant::now();
    let collection = self.collect(frame)?;
    Ok(self.merge(collection, started))
  }
}

impl<D> TiledDetector<D>
where
  D: Detector + Sync,
  D::Error: std::error::Error + Send + Sync + 'static,
{
  /// 并行处理全部瓦片
  ///
  /// 结果按瓦片遍历顺序重新组装，与顺序执行得到的原始检测序列一致。
  #[cfg(feature = "parallel")]
  pub fn collect_parallel(&self, frame: &RgbFrame) -> Result<TileCollection, TiledError> {
    use rayon::prelude::*;

    let (grid, padded) = self.prepare(frame)?;
    let tiles: Vec<Tile> = grid.tiles().collect();
    let outcomes: Vec<_> = tiles
      .par_iter()
      .map(|&tile| (tile, self.detect_tile(&padded, tile)))
      .collect();
    self.gather(grid, outcomes)
  }

  #[cfg(not(feature = "parallel"))]
  pub fn collect_parallel(&self, frame: &RgbFrame) -> Result<TileCollection, TiledError> {
    warn!("未启用 parallel 特性，回退到顺序执行");
    self.collect(frame)
  }

  pub fn detect_parallel(&self, frame: &RgbFrame) -> Result<TiledDetections, TiledError> {
    let started = Instant::now();
    let collection = self.collect_parallel(frame)?;
    Ok(self.merge(collection, started))
  }
}
