// 该文件是 Haiyan （海眼） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

use crate::input::AsNhwcFrame;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("窗口 ({x}, {y}) 尺寸 {size} 超出帧范围 {width}x{height}")]
  WindowOutOfBounds {
    x: usize,
    y: usize,
    size: usize,
    width: usize,
    height: usize,
  },
}

/// 任意尺寸的 RGB 帧，像素按 NHWC（行优先、通道交错）排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbFrame {
  /// 创建全零帧
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0u8; RGB_CHANNELS * width * height].into_boxed_slice();
    Self {
      width,
      height,
      data,
    }
  }

  pub fn from_raw(height: usize, width: usize, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width * height;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  fn row_stride(&self) -> usize {
    self.width * RGB_CHANNELS
  }

  /// 读取 (x, y) 处像素，越界返回 None
  pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let idx = y * self.row_stride() + x * RGB_CHANNELS;
    Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
  }

  /// 在下方和右侧补零，原图位于左上角
  pub fn padded(&self, bottom: usize, right: usize) -> RgbFrame {
    if bottom == 0 && right == 0 {
      return self.clone();
    }

    let mut padded = RgbFrame::with_shape(self.height + bottom, self.width + right);
    let src_stride = self.row_stride();
    let dst_stride = padded.row_stride();
    for row in 0..self.height {
      let src = &self.data[row * src_stride..(row + 1) * src_stride];
      padded.data[row * dst_stride..row * dst_stride + src_stride].copy_from_slice(src);
    }
    padded
  }

  /// 复制以 (x, y) 为左上角、边长为 size 的正方形窗口
  ///
  /// 窗口必须完全落在帧内，不做任何裁剪。
  pub fn window(&self, x: usize, y: usize, size: usize) -> Result<RgbFrame, FrameError> {
    if x + size > self.width || y + size > self.height {
      return Err(FrameError::WindowOutOfBounds {
        x,
        y,
        size,
        width: self.width,
        height: self.height,
      });
    }

    let mut tile = RgbFrame::with_shape(size, size);
    let src_stride = self.row_stride();
    let dst_stride = tile.row_stride();
    for row in 0..size {
      let start = (y + row) * src_stride + x * RGB_CHANNELS;
      tile.data[row * dst_stride..(row + 1) * dst_stride]
        .copy_from_slice(&self.data[start..start + dst_stride]);
    }
    Ok(tile)
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    let width = self.width as u32;
    let height = self.height as u32;
    let data = self.as_nhwc();

    ImageBuffer::from_fn(width, height, |x, y| {
      let idx = (y as usize * self.width + x as usize) * RGB_CHANNELS;
      Rgb([data[idx], data[idx + 1], data[idx + 2]])
    })
  }
}

impl AsMut<[u8]> for RgbFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsNhwcFrame for RgbFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    // RgbImage 的内存布局本身就是 NHWC
    Self {
      width: width as usize,
      height: height as usize,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}
