// 该文件是 Haiyan （海眼） 项目的一部分。
// tests/pipeline.rs - 滑动窗口检测流程测试
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

use image::{Rgb, RgbImage};
use thiserror::Error;

use haiyan::{
  frame::RgbFrame,
  model::{DetectItem, DetectResult, Detector},
  nms,
  tiled::{TiledDetector, TiledError},
  tiling::{ConfigError, EdgePolicy, TileConfig, TileGrid},
};

#[derive(Debug, Error)]
#[error("瓦片推理失败")]
struct ScriptedFailure;

/// 在白色像素块上报告一个覆盖整块的目标，左上角为红色的瓦片视为推理失败
struct ScriptedDetector;

impl Detector for ScriptedDetector {
  type Error = ScriptedFailure;

  fn detect(&self, tile: &RgbFrame, _: f32) -> Result<DetectResult, Self::Error> {
    if tile.pixel(0, 0) == Some([255, 0, 0]) {
      return Err(ScriptedFailure);
    }

    let mut bbox: Option<[f32; 4]> = None;
    for y in 0..tile.height() {
      for x in 0..tile.width() {
        if tile.pixel(x, y) != Some([255, 255, 255]) {
          continue;
        }
        let (x, y) = (x as f32, y as f32);
        let b = bbox.get_or_insert([x, y, x + 1.0, y + 1.0]);
        b[0] = b[0].min(x);
        b[1] = b[1].min(y);
        b[2] = b[2].max(x + 1.0);
        b[3] = b[3].max(y + 1.0);
      }
    }

    Ok(DetectResult::from(
      bbox
        .map(|b| vec![DetectItem::new("vessel", 0.9, b)])
        .unwrap_or_default(),
    ))
  }
}

/// 100x100 黑色场景，(50, 50) 处有一个 6x6 的白色目标
fn scene() -> RgbFrame {
  RgbFrame::from(RgbImage::from_fn(100, 100, |x, y| {
    if (50..56).contains(&x) && (50..56).contains(&y) {
      Rgb([255, 255, 255])
    } else {
      Rgb([0, 0, 0])
    }
  }))
}

fn small_config() -> TileConfig {
  TileConfig::builder()
    .tile_size(64)
    .stride(16)
    .build()
    .unwrap()
}

#[test]
fn flush_grid_ends_at_image_edge() {
  let config = TileConfig::builder()
    .tile_size(640)
    .stride(128)
    .edge_policy(EdgePolicy::Flush)
    .build()
    .unwrap();
  let grid = TileGrid::new(800, 800, &config).unwrap();

  assert_eq!(grid.x_offsets(), &[0, 128, 160]);
  assert_eq!(grid.y_offsets(), &[0, 128, 160]);
  assert_eq!((grid.pad_right(), grid.pad_bottom()), (0, 0));
  assert!(grid.tiles().all(|t| t.x + 640 <= 800 && t.y + 640 <= 800));
  assert_eq!(grid.tiles().last().map(|t| (t.x, t.y)), Some((160, 160)));
}

#[test]
fn padded_grid_covers_every_pixel() {
  let grid = TileGrid::new(800, 800, &TileConfig::default()).unwrap();
  assert_eq!(grid.padded_width(), 896);
  assert_eq!(grid.x_offsets(), &[0, 128, 256]);
  assert!(grid.covers(799, 799));
}

#[test]
fn duplicate_detections_from_overlapping_tiles_collapse() {
  let tiled = TiledDetector::new(ScriptedDetector, small_config()).unwrap();
  let result = tiled.detect(&scene()).unwrap();

  // 补零后 112x112，每个方向 4 个起点，目标落在全部 16 个瓦片内
  assert_eq!(result.grid.len(), 16);
  assert_eq!(result.raw.len(), 16);
  assert!(
    result
      .raw
      .iter()
      .all(|item| item.bbox == [50.0, 50.0, 56.0, 56.0])
  );
  assert_eq!(result.detections.len(), 1);
  assert_eq!(result.detections[0].bbox, [50.0, 50.0, 56.0, 56.0]);
}

#[test]
fn detector_can_be_swapped_behind_a_box() {
  let boxed: Box<dyn Detector<Error = ScriptedFailure> + Sync> = Box::new(ScriptedDetector);
  let tiled = TiledDetector::new(boxed, small_config()).unwrap();
  assert_eq!(tiled.detect(&scene()).unwrap().detections.len(), 1);
}

#[test]
fn failed_tile_is_skipped_and_others_still_contribute() {
  let mut frame = scene();
  // 仅 (16, 16) 起点的瓦片左上角为红色
  let width = frame.width();
  let idx = (16 * width + 16) * 3;
  frame.as_mut()[idx..idx + 3].copy_from_slice(&[255, 0, 0]);

  let tiled = TiledDetector::new(ScriptedDetector, small_config()).unwrap();
  let result = tiled.detect(&frame).unwrap();
  assert_eq!(result.skipped_tiles.len(), 1);
  assert_eq!((result.skipped_tiles[0].x, result.skipped_tiles[0].y), (16, 16));
  assert_eq!(result.raw.len(), 15);
  assert_eq!(result.detections.len(), 1);
}

#[test]
fn parallel_run_matches_sequential_run() {
  let tiled = TiledDetector::new(ScriptedDetector, small_config()).unwrap();
  let frame = scene();
  let sequential = tiled.detect(&frame).unwrap();
  let parallel = tiled.detect_parallel(&frame).unwrap();
  assert_eq!(sequential.raw, parallel.raw);
  assert_eq!(sequential.detections, parallel.detections);
}

#[test]
fn empty_image_is_rejected() {
  let tiled = TiledDetector::new(ScriptedDetector, small_config()).unwrap();
  assert!(matches!(
    tiled.detect(&RgbFrame::with_shape(0, 0)),
    Err(TiledError::Config(ConfigError::EmptyImage { .. }))
  ));
}

#[test]
fn suppression_scenarios() {
  let overlapping = vec![
    DetectItem::new("vessel", 0.9, [10.0, 10.0, 50.0, 50.0]),
    DetectItem::new("vessel", 0.8, [12.0, 12.0, 52.0, 52.0]),
  ];
  let kept = nms::suppress(overlapping, 0.000_000_5);
  assert_eq!(kept.len(), 1);
  assert_eq!(kept[0].score, 0.9);

  let disjoint = vec![
    DetectItem::new("vessel", 0.7, [0.0, 0.0, 10.0, 10.0]),
    DetectItem::new("vessel", 0.6, [100.0, 100.0, 110.0, 110.0]),
  ];
  assert_eq!(nms::suppress(disjoint, 0.99).len(), 2);

  assert!(nms::suppress(Vec::new(), 0.5).is_empty());
}

#[cfg(feature = "model_bright_spot")]
#[test]
fn bright_spot_detector_end_to_end() {
  use haiyan::model::BrightSpotBuilder;

  let detector = BrightSpotBuilder::default().build();
  let tiled = TiledDetector::new(detector, small_config()).unwrap();
  let result = tiled.detect(&scene()).unwrap();
  assert_eq!(result.raw.len(), 16);
  assert_eq!(result.detections.len(), 1);
  assert_eq!(result.detections[0].bbox, [50.0, 50.0, 56.0, 56.0]);
  assert_eq!(result.detections[0].kind, "vessel");
}

#[cfg(feature = "json_record")]
#[test]
fn json_records_follow_the_run() {
  use haiyan::output::{JsonRecordOutput, Render, RunSummary};

  let dir = tempfile::tempdir().unwrap();
  let tiled = TiledDetector::new(ScriptedDetector, small_config()).unwrap();
  let frame = scene();
  let result = tiled.detect(&frame).unwrap();

  let output = JsonRecordOutput::new(dir.path(), "T17RPH");
  output.render_result(&frame, &result).unwrap();

  let summary: RunSummary =
    serde_json::from_reader(std::fs::File::open(output.summary_path()).unwrap()).unwrap();
  assert_eq!(summary.tiles, 16);
  assert_eq!(summary.raw_detections, 16);
  assert_eq!(summary.final_detections, 1);
  assert_eq!((summary.padded_width, summary.padded_height), (112, 112));
  assert!(output.pre_nms_path().exists());
  assert!(output.post_nms_path().exists());
}
