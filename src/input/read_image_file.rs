// 该文件是 Haiyan （海眼） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, url_file_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单幅影像文件，作为只产出一帧的迭代器
pub struct ImageFileInput {
  stem: String,
  dimensions: (usize, usize),
  image: Option<RgbFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(url_file_path(url))
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    info!("读取影像文件: {}", path.display());
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8();
    info!("影像尺寸: {}x{}", image.width(), image.height());

    let stem = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "scene".to_string());

    Ok(ImageFileInput {
      stem,
      dimensions: (image.width() as usize, image.height() as usize),
      image: Some(RgbFrame::from(image)),
    })
  }

  pub fn stem(&self) -> &str {
    &self.stem
  }

  /// 影像的 (宽, 高)，读出帧之后仍然可用
  pub fn dimensions(&self) -> (usize, usize) {
    self.dimensions
  }
}

impl Iterator for ImageFileInput {
  type Item = RgbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}
