// 该文件是 Haiyan （海眼） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontArc, FontVec, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::model::DetectItem;

const PALETTE_SIZE: usize = 16;
const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 14.0;
// 标签基线与检测框上沿的间距
const LABEL_GAP: i32 = 5;

pub struct Draw {
  colors: Vec<Rgb<u8>>,
  thickness: u32,
  /// 未加载字体时只绘制检测框
  font: Option<FontArc>,
  font_scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb(i as f32 / PALETTE_SIZE as f32 * 360.0, 0.8, 0.9))
      .collect();
    Self {
      colors,
      thickness: BOX_THICKNESS,
      font: None,
      font_scale: PxScale::from(LABEL_SCALE),
    }
  }
}

/// 从字体文件内容（TTF/OTF）加载字体
pub fn load_font(data: Vec<u8>) -> Result<FontArc, InvalidFont> {
  Ok(FontArc::new(FontVec::try_from_vec(data)?))
}

/// 标签文本，形如 `vessel:0.87`
pub fn label_of(item: &DetectItem) -> String {
  format!("{}:{:.2}", item.kind, item.score)
}

/// 标签左上角坐标：基线位于框上沿上方 5 像素，超出图像顶部时贴齐顶部
pub fn label_origin(rect: &Rect, scale: f32) -> (i32, i32) {
  let top = rect.top() - LABEL_GAP - scale.ceil() as i32;
  (rect.left(), top.max(0))
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

/// 把检测框裁剪到图像范围内，完全落在图像外（例如补零区域）时返回 None
pub fn clip_to_image(bbox: &[f32; 4], width: u32, height: u32) -> Option<Rect> {
  let x_min = bbox[0].floor().max(0.0);
  let y_min = bbox[1].floor().max(0.0);
  let x_max = bbox[2].ceil().min(width as f32);
  let y_max = bbox[3].ceil().min(height as f32);

  if x_min >= x_max || y_min >= y_max {
    return None;
  }

  Some(Rect::at(x_min as i32, y_min as i32).of_size((x_max - x_min) as u32, (y_max - y_min) as u32))
}

impl Draw {
  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn thickness(&self) -> u32 {
    self.thickness
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 同一类别始终使用同一颜色
  pub fn color_of(&self, kind: &str) -> Rgb<u8> {
    let hash = kind
      .bytes()
      .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    self.colors[hash % self.colors.len()]
  }

  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[DetectItem]) {
    let (width, height) = image.dimensions();
    for item in detections {
      let Some(rect) = clip_to_image(&item.bbox, width, height) else {
        continue;
      };
      let color = self.color_of(&item.kind);

      // 由外向内逐层绘制，加粗边框
      for t in 0..self.thickness {
        let w = rect.width().saturating_sub(2 * t);
        let h = rect.height().saturating_sub(2 * t);
        if w == 0 || h == 0 {
          break;
        }
        let inner = Rect::at(rect.left() + t as i32, rect.top() + t as i32).of_size(w, h);
        draw_hollow_rect_mut(image, inner, color);
      }

      if let Some(font) = &self.font {
        let (x, y) = label_origin(&rect, self.font_scale.y);
        draw_text_mut(image, color, x, y, self.font_scale, font, &label_of(item));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clips_boxes_to_image() {
    let rect = clip_to_image(&[-5.0, 2.5, 30.0, 8.0], 20, 10).unwrap();
    assert_eq!((rect.left(), rect.top()), (0, 2));
    assert_eq!((rect.width(), rect.height()), (20, 6));
    assert!(clip_to_image(&[25.0, 0.0, 40.0, 5.0], 20, 10).is_none());
    assert!(clip_to_image(&[3.0, 3.0, 3.0, 9.0], 20, 10).is_none());
  }

  #[test]
  fn draws_box_outline_only() {
    let mut image = RgbImage::new(20, 20);
    let draw = Draw::default();
    draw.draw_detections(&mut image, &[DetectItem::new("vessel", 0.9, [4.0, 4.0, 14.0, 14.0])]);

    let color = draw.color_of("vessel");
    assert_eq!(*image.get_pixel(4, 4), color);
    assert_eq!(*image.get_pixel(5, 9), color);
    assert_eq!(*image.get_pixel(13, 13), color);
    assert_eq!(*image.get_pixel(9, 9), Rgb([0, 0, 0]));
    assert_eq!(*image.get_pixel(3, 3), Rgb([0, 0, 0]));
  }

  const SYSTEM_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

  fn has_ink(image: &RgbImage, rows: std::ops::Range<u32>) -> bool {
    rows.flat_map(|y| (0..image.width()).map(move |x| (x, y)))
      .any(|(x, y)| *image.get_pixel(x, y) != Rgb([0, 0, 0]))
  }

  #[test]
  fn label_text_and_position() {
    let item = DetectItem::new("vessel", 0.876, [10.0, 40.0, 30.0, 60.0]);
    assert_eq!(label_of(&item), "vessel:0.88");

    let rect = clip_to_image(&item.bbox, 100, 100).unwrap();
    assert_eq!(label_origin(&rect, 14.0), (10, 21));

    let near_top = clip_to_image(&[10.0, 3.0, 30.0, 20.0], 100, 100).unwrap();
    assert_eq!(label_origin(&near_top, 14.0), (10, 0));
  }

  #[test]
  fn no_label_without_font() {
    let mut image = RgbImage::new(80, 80);
    let draw = Draw::default();
    assert!(!draw.has_font());
    draw.draw_detections(&mut image, &[DetectItem::new("vessel", 0.9, [10.0, 40.0, 60.0, 70.0])]);
    assert!(!has_ink(&image, 0..40));
  }

  #[test]
  fn draws_label_row_above_box() {
    // 系统中没有该字体时跳过
    let Ok(data) = std::fs::read(SYSTEM_FONT) else {
      return;
    };
    let draw = Draw::default().with_font(load_font(data).unwrap());
    let mut image = RgbImage::new(120, 80);
    draw.draw_detections(&mut image, &[DetectItem::new("vessel", 0.9, [10.0, 40.0, 60.0, 70.0])]);

    // 标签位于 y = 21 起的一行，框上沿为 y = 40
    assert!(has_ink(&image, 21..35));
    assert!(!has_ink(&image, 0..15));
  }

  #[test]
  fn rejects_invalid_font_data() {
    assert!(load_font(b"not a font".to_vec()).is_err());
  }

  #[test]
  fn thickness_is_at_least_one() {
    assert_eq!(Draw::default().with_thickness(0).thickness(), 1);
    assert_eq!(Draw::default().with_thickness(4).thickness(), 4);
  }

  #[test]
  fn colors_are_stable_per_class() {
    let draw = Draw::default();
    assert_eq!(draw.color_of("vessel"), draw.color_of("vessel"));
  }
}
