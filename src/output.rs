// 该文件是 Haiyan （海眼） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

#[cfg(any(feature = "save_image_file", feature = "json_record"))]
use crate::FromUrlWithScheme;
use crate::{FromUrl, frame::RgbFrame, tiled::TiledDetections};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "json_record")]
mod json_record;
#[cfg(feature = "json_record")]
pub use self::json_record::{
  JsonRecordError, JsonRecordOutput, PostNmsRecord, PreNmsRecord, RunSummary,
};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "json_record")]
  #[error("JSON 记录输出错误: {0}")]
  JsonRecordError(#[from] JsonRecordError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "json_record")]
  JsonRecordOutput(JsonRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "json_record")]
      JsonRecordOutput::SCHEME => {
        let output = JsonRecordOutput::from_url(url)?;
        Ok(OutputWrapper::JsonRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<RgbFrame, TiledDetections> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbFrame, result: &TiledDetections) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "json_record")]
      OutputWrapper::JsonRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

/// 依次写入多个输出，任一失败即返回
impl<R> Render<RgbFrame, TiledDetections> for Vec<R>
where
  R: Render<RgbFrame, TiledDetections>,
{
  type Error = R::Error;

  fn render_result(&self, frame: &RgbFrame, result: &TiledDetections) -> Result<(), Self::Error> {
    for output in self {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}
