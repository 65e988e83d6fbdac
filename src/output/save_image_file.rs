// 该文件是 Haiyan （海眼） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  output::{
    Render,
    draw::{Draw, load_font},
  },
  tiled::TiledDetections,
  url_file_path, url_query,
};

pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("字体加载错误: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
  #[error("参数 {name} 无效: {value}")]
  InvalidParameter { name: &'static str, value: String },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut draw = Draw::default();
    if let Some(value) = url_query(uri, "thickness") {
      let thickness = value
        .parse()
        .map_err(|_| SaveImageFileError::InvalidParameter {
          name: "thickness",
          value: value.clone(),
        })?;
      draw = draw.with_thickness(thickness);
    }
    if let Some(font) = url_query(uri, "font") {
      info!("加载标注字体: {}", font);
      draw = draw.with_font(load_font(std::fs::read(&font)?)?);
    }

    Ok(SaveImageFileOutput::new(url_file_path(uri)).with_draw(draw))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      draw: Draw::default(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存标注图像到文件: {}", self.path.display());
    Ok(())
  }
}

impl Render<RgbFrame, TiledDetections> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  /// 在未补零的原图上绘制 NMS 后的检测框
  fn render_result(&self, frame: &RgbFrame, result: &TiledDetections) -> Result<(), Self::Error> {
    let mut image = frame.to_rgb_image();
    self.draw.draw_detections(&mut image, &result.detections);
    self.save_image(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;
  use crate::tiling::{TileConfig, TileGrid};
  use std::time::Duration;

  fn result(frame: &RgbFrame) -> TiledDetections {
    let config = TileConfig::default();
    let detections = vec![DetectItem::new("vessel", 0.9, [4.0, 4.0, 12.0, 12.0])];
    TiledDetections {
      config,
      grid: TileGrid::new(frame.height(), frame.width(), &config).unwrap(),
      raw: detections.clone(),
      detections,
      skipped_tiles: Vec::new(),
      elapsed: Duration::ZERO,
    }
  }

  #[test]
  fn parses_query_parameters() {
    let url = Url::parse("image:///tmp/out/annotated.png?thickness=3").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), Path::new("/tmp/out/annotated.png"));
    assert_eq!(output.draw.thickness(), 3);
    assert!(!output.draw.has_font());

    let bad = Url::parse("image:///tmp/a.png?thickness=wide").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&bad),
      Err(SaveImageFileError::InvalidParameter { name: "thickness", .. })
    ));
  }

  #[test]
  fn rejects_unreadable_or_invalid_font() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.ttf");
    let url = Url::parse(&format!("image:///tmp/a.png?font={}", missing.display())).unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::IoError(_))
    ));

    let garbage = dir.path().join("garbage.ttf");
    std::fs::write(&garbage, b"not a font").unwrap();
    let url = Url::parse(&format!("image:///tmp/a.png?font={}", garbage.display())).unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::FontError(_))
    ));
  }

  #[test]
  fn saves_annotated_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("annotated.png");
    let output = SaveImageFileOutput::new(&path);
    let frame = RgbFrame::with_shape(16, 16);
    output.render_result(&frame, &result(&frame)).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (16, 16));
    assert_ne!(*saved.get_pixel(4, 4), image::Rgb([0, 0, 0]));
    assert_eq!(*saved.get_pixel(8, 8), image::Rgb([0, 0, 0]));
  }
}
