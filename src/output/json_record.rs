// 该文件是 Haiyan （海眼） 项目的一部分。
// src/output/json_record.rs - JSON 检测记录
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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  geo::{GeoCorners, GeoReference},
  model::DetectItem,
  output::Render,
  tiled::TiledDetections,
  url_file_path, url_query,
};

const DEFAULT_STEM: &str = "scene";

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// NMS 前的原始检测（全局坐标）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreNmsRecord {
  pub global_bbox: [f32; 4],
  pub confidence: f32,
  pub class: String,
}

/// NMS 后的检测，可附带地理坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostNmsRecord {
  pub class: String,
  pub confidence: f32,
  pub bbox: [f32; 4],
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub geo_centroid_wgs84: Option<[f64; 2]>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub geo_corners_wgs84: Option<GeoCorners>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
  pub generated_at: String,
  pub image_width: usize,
  pub image_height: usize,
  pub padded_width: usize,
  pub padded_height: usize,
  pub tile_size: usize,
  pub stride: usize,
  pub confidence_threshold: f32,
  pub overlap_threshold: f32,
  pub edge_policy: String,
  pub tiles: usize,
  pub skipped_tiles: Vec<[usize; 2]>,
  pub raw_detections: usize,
  pub final_detections: usize,
  pub elapsed_ms: u64,
}

impl From<&DetectItem> for PreNmsRecord {
  fn from(item: &DetectItem) -> Self {
    Self {
      global_bbox: item.bbox,
      confidence: item.score,
      class: item.kind.clone(),
    }
  }
}

impl PostNmsRecord {
  pub fn new(item: &DetectItem, georeference: Option<&GeoReference>) -> Self {
    Self {
      class: item.kind.clone(),
      confidence: item.score,
      bbox: item.bbox,
      geo_centroid_wgs84: georeference.map(|g| g.centroid(&item.bbox)),
      geo_corners_wgs84: georeference.map(|g| g.corners(&item.bbox)),
    }
  }
}

impl From<&TiledDetections> for RunSummary {
  fn from(result: &TiledDetections) -> Self {
    let grid = &result.grid;
    Self {
      generated_at: Utc::now().to_rfc3339(),
      image_width: grid.image_width(),
      image_height: grid.image_height(),
      padded_width: grid.padded_width(),
      padded_height: grid.padded_height(),
      tile_size: result.config.tile_size,
      stride: result.config.stride,
      confidence_threshold: result.config.confidence_threshold,
      overlap_threshold: result.config.overlap_threshold,
      edge_policy: result.config.edge_policy.to_string(),
      tiles: grid.len(),
      skipped_tiles: result.skipped_tiles.iter().map(|t| [t.x, t.y]).collect(),
      raw_detections: result.raw.len(),
      final_detections: result.detections.len(),
      elapsed_ms: result.elapsed.as_millis() as u64,
    }
  }
}

/// 把 NMS 前后两份检测及运行摘要写入目录，供审计与下游关联使用
pub struct JsonRecordOutput {
  directory: PathBuf,
  stem: String,
  georeference: Option<GeoReference>,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordError::SchemeMismatch);
    }

    let stem = url_query(uri, "stem").unwrap_or_else(|| DEFAULT_STEM.to_string());
    Ok(JsonRecordOutput::new(url_file_path(uri), stem))
  }
}

impl JsonRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
    Self {
      directory: directory.into(),
      stem: stem.into(),
      georeference: None,
    }
  }

  pub fn with_georeference(mut self, georeference: GeoReference) -> Self {
    self.georeference = Some(georeference);
    self
  }

  pub fn pre_nms_path(&self) -> PathBuf {
    self
      .directory
      .join(format!("detections_pre_nms_{}.json", self.stem))
  }

  pub fn post_nms_path(&self) -> PathBuf {
    self
      .directory
      .join(format!("detections_post_nms_{}.json", self.stem))
  }

  pub fn summary_path(&self) -> PathBuf {
    self.directory.join(format!("run_summary_{}.json", self.stem))
  }

  fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), JsonRecordError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    info!("写入 JSON 记录: {}", path.display());
    Ok(())
  }
}

impl Render<RgbFrame, TiledDetections> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, _frame: &RgbFrame, result: &TiledDetections) -> Result<(), Self::Error> {
    std::fs::create_dir_all(&self.directory)?;

    let pre: Vec<PreNmsRecord> = result.raw.iter().map(PreNmsRecord::from).collect();
    Self::write_json(&self.pre_nms_path(), &pre)?;

    let post: Vec<PostNmsRecord> = result
      .detections
      .iter()
      .map(|item| PostNmsRecord::new(item, self.georeference.as_ref()))
      .collect();
    Self::write_json(&self.post_nms_path(), &post)?;

    Self::write_json(&self.summary_path(), &RunSummary::from(result))
  }
}
