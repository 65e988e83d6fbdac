// 该文件是 Haiyan （海眼） 项目的一部分。
// src/geo.rs - 像素坐标到 WGS84 经纬度
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel-2 L1C 标准瓦片的地面覆盖范围（米）
pub const SENTINEL2_TILE_FOOTPRINT_M: f64 = 109_800.0;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
  #[error("纬度 {0} 超出 (-90, 90)")]
  LatitudeOutOfRange(f64),
  #[error("经度 {0} 超出 [-180, 180]")]
  LongitudeOutOfRange(f64),
  #[error("图像尺寸必须为正数: {width}x{height}")]
  EmptyImage { width: usize, height: usize },
  #[error("覆盖范围必须为正数: {width_m} x {height_m} 米")]
  InvalidFootprint { width_m: f64, height_m: f64 },
}

/// 检测框四角的 [纬度, 经度]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCorners {
  pub top_left: [f64; 2],
  pub top_right: [f64; 2],
  pub bottom_left: [f64; 2],
  pub bottom_right: [f64; 2],
}

/// 以影像中心为锚点的简单地理参考
///
/// 每个像素对应固定的地面距离。像素相对中心的偏移先沿方位角 90° 走东向距离，
/// 再从到达点沿方位角 0° 走北向距离，两段均在 WGS84 椭球上求解大地主题正算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
  center_lat: f64,
  center_lon: f64,
  image_width: usize,
  image_height: usize,
  meters_per_pixel_x: f64,
  meters_per_pixel_y: f64,
}

impl GeoReference {
  /// 使用 Sentinel-2 标准覆盖范围
  pub fn new(
    center_lat: f64,
    center_lon: f64,
    image_width: usize,
    image_height: usize,
  ) -> Result<Self, GeoError> {
    Self::with_footprint(
      center_lat,
      center_lon,
      image_width,
      image_height,
      SENTINEL2_TILE_FOOTPRINT_M,
      SENTINEL2_TILE_FOOTPRINT_M,
    )
  }

  pub fn with_footprint(
    center_lat: f64,
    center_lon: f64,
    image_width: usize,
    image_height: usize,
    footprint_width_m: f64,
    footprint_height_m: f64,
  ) -> Result<Self, GeoError> {
    if !(center_lat.is_finite() && center_lat.abs() < 90.0) {
      return Err(GeoError::LatitudeOutOfRange(center_lat));
    }
    if !(center_lon.is_finite() && center_lon.abs() <= 180.0) {
      return Err(GeoError::LongitudeOutOfRange(center_lon));
    }
    if image_width == 0 || image_height == 0 {
      return Err(GeoError::EmptyImage {
        width: image_width,
        height: image_height,
      });
    }
    let valid = |m: f64| m.is_finite() && m > 0.0;
    if !(valid(footprint_width_m) && valid(footprint_height_m)) {
      return Err(GeoError::InvalidFootprint {
        width_m: footprint_width_m,
        height_m: footprint_height_m,
      });
    }

    Ok(Self {
      center_lat,
      center_lon,
      image_width,
      image_height,
      meters_per_pixel_x: footprint_width_m / image_width as f64,
      meters_per_pixel_y: footprint_height_m / image_height as f64,
    })
  }

  pub fn meters_per_pixel(&self) -> (f64, f64) {
    (self.meters_per_pixel_x, self.meters_per_pixel_y)
  }

  /// 像素坐标 (px, py) 转 [纬度, 经度]
  pub fn pixel_to_wgs84(&self, px: f64, py: f64) -> [f64; 2] {
    let east_m = (px - self.image_width as f64 / 2.0) * self.meters_per_pixel_x;
    // 像素 y 向下增长，北向为正
    let north_m = -(py - self.image_height as f64 / 2.0) * self.meters_per_pixel_y;

    let (lat, lon) = geodesic_forward(self.center_lat, self.center_lon, 90.0, east_m);
    let (lat, lon) = geodesic_forward(lat, lon, 0.0, north_m);
    [lat, normalize_lon(lon)]
  }

  pub fn centroid(&self, bbox: &[f32; 4]) -> [f64; 2] {
    let cx = (f64::from(bbox[0]) + f64::from(bbox[2])) / 2.0;
    let cy = (f64::from(bbox[1]) + f64::from(bbox[3])) / 2.0;
    self.pixel_to_wgs84(cx, cy)
  }

  pub fn corners(&self, bbox: &[f32; 4]) -> GeoCorners {
    let [x_min, y_min, x_max, y_max] = bbox.map(f64::from);
    GeoCorners {
      top_left: self.pixel_to_wgs84(x_min, y_min),
      top_right: self.pixel_to_wgs84(x_max, y_min),
      bottom_left: self.pixel_to_wgs84(x_min, y_max),
      bottom_right: self.pixel_to_wgs84(x_max, y_max),
    }
  }
}

const VINCENTY_TOLERANCE: f64 = 1e-12;
const VINCENTY_MAX_ITERATIONS: usize = 200;

/// WGS84 椭球上的大地主题正算（Vincenty 公式）
///
/// 从 (lat, lon) 沿方位角 `azimuth_deg`（自北顺时针）走 `distance_m` 米，
/// 返回到达点的 (纬度, 经度)。距离为负时反向行走。
pub fn geodesic_forward(lat: f64, lon: f64, azimuth_deg: f64, distance_m: f64) -> (f64, f64) {
  let (azimuth_deg, s) = if distance_m < 0.0 {
    (azimuth_deg + 180.0, -distance_m)
  } else {
    (azimuth_deg, distance_m)
  };

  let a = WGS84_A;
  let f = WGS84_F;
  let b = a * (1.0 - f);

  let alpha1 = azimuth_deg.to_radians();
  let (sin_alpha1, cos_alpha1) = alpha1.sin_cos();

  let tan_u1 = (1.0 - f) * lat.to_radians().tan();
  let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
  let sin_u1 = tan_u1 * cos_u1;

  let sigma1 = tan_u1.atan2(cos_alpha1);
  let sin_alpha = cos_u1 * sin_alpha1;
  let cos2_alpha = 1.0 - sin_alpha * sin_alpha;
  let u2 = cos2_alpha * (a * a - b * b) / (b * b);
  let big_a = 1.0 + u2 / 16384.0 * (4096.0 + u2 * (-768.0 + u2 * (320.0 - 175.0 * u2)));
  let big_b = u2 / 1024.0 * (256.0 + u2 * (-128.0 + u2 * (74.0 - 47.0 * u2)));

  let sigma0 = s / (b * big_a);
  let mut sigma = sigma0;
  let mut cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
  for _ in 0..VINCENTY_MAX_ITERATIONS {
    cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
    let (sin_sigma, cos_sigma) = sigma.sin_cos();
    let delta_sigma = big_b
      * sin_sigma
      * (cos_2sigma_m
        + big_b / 4.0
          * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
            - big_b / 6.0
              * cos_2sigma_m
              * (-3.0 + 4.0 * sin_sigma * sin_sigma)
              * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
    let next = sigma0 + delta_sigma;
    let converged = (next - sigma).abs() < VINCENTY_TOLERANCE;
    sigma = next;
    if converged {
      cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
      break;
    }
  }

  let (sin_sigma, cos_sigma) = sigma.sin_cos();
  let x = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
  let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
    .atan2((1.0 - f) * (sin_alpha * sin_alpha + x * x).sqrt());
  let lambda = (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
  let c = f / 16.0 * cos2_alpha * (4.0 + f * (4.0 - 3.0 * cos2_alpha));
  let big_l = lambda
    - (1.0 - c)
      * f
      * sin_alpha
      * (sigma
        + c * sin_sigma * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

  (lat2.to_degrees(), lon + big_l.to_degrees())
}

fn normalize_lon(lon: f64) -> f64 {
  if lon > 180.0 {
    lon - 360.0
  } else if lon < -180.0 {
    lon + 360.0
  } else {
    lon
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::{assert_abs_diff_eq, assert_relative_eq};

  fn scene() -> GeoReference {
    GeoReference::new(27.5, -80.2, 10980, 10980).unwrap()
  }

  #[test]
  fn center_pixel_maps_to_center() {
    let [lat, lon] = scene().pixel_to_wgs84(5490.0, 5490.0);
    assert_abs_diff_eq!(lat, 27.5, epsilon = 1e-12);
    assert_abs_diff_eq!(lon, -80.2, epsilon = 1e-12);
  }

  #[test]
  fn sentinel2_scale_is_ten_meters() {
    let (x, y) = scene().meters_per_pixel();
    assert_relative_eq!(x, 10.0);
    assert_relative_eq!(y, 10.0);
  }

  #[test]
  fn directions_follow_image_axes() {
    let geo = scene();
    let [north_lat, north_lon] = geo.pixel_to_wgs84(5490.0, 0.0);
    let [east_lat, east_lon] = geo.pixel_to_wgs84(10980.0, 5490.0);
    assert!(north_lat > 27.5);
    assert_abs_diff_eq!(north_lon, -80.2, epsilon = 1e-12);
    assert!(east_lon > -80.2);
    // 方位角 90° 的测地线向赤道一侧偏移，54.9 km 处约 120 米
    assert!(east_lat < 27.5);
    assert_abs_diff_eq!(east_lat, 27.5, epsilon = 2e-3);
    // 54.9 km 向北约为 0.495 度
    assert_abs_diff_eq!(north_lat - 27.5, 0.4954, epsilon = 1e-3);
  }

  #[test]
  fn corners_surround_centroid() {
    let geo = scene();
    let bbox = [100.0, 200.0, 140.0, 260.0];
    let [lat, lon] = geo.centroid(&bbox);
    let corners = geo.corners(&bbox);
    assert!(corners.top_left[0] > lat && corners.bottom_left[0] < lat);
    assert!(corners.top_left[1] < lon && corners.top_right[1] > lon);
    assert_abs_diff_eq!(corners.top_left[0], corners.top_right[0], epsilon = 1e-4);
    assert_abs_diff_eq!(corners.bottom_left[1], corners.top_left[1], epsilon = 1e-12);
  }

  #[test]
  fn forward_along_equator_and_meridian() {
    // 赤道周长 / 360
    let (lat, lon) = geodesic_forward(0.0, 0.0, 90.0, 111_319.490_793_273_57);
    assert_abs_diff_eq!(lat, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(lon, 1.0, epsilon = 1e-9);

    // 赤道到北纬 1° 的子午线弧长
    let (lat, lon) = geodesic_forward(0.0, 0.0, 0.0, 110_574.388_557_798_78);
    assert_abs_diff_eq!(lat, 1.0, epsilon = 1e-8);
    assert_abs_diff_eq!(lon, 0.0, epsilon = 1e-12);
  }

  #[test]
  fn negative_distance_walks_backwards() {
    let (lat, lon) = geodesic_forward(27.5, -80.2, 0.0, -1000.0);
    let (back_lat, back_lon) = geodesic_forward(27.5, -80.2, 180.0, 1000.0);
    assert_abs_diff_eq!(lat, back_lat, epsilon = 1e-12);
    assert_abs_diff_eq!(lon, back_lon, epsilon = 1e-12);
    assert!(lat < 27.5);
  }

  #[test]
  fn zero_distance_stays_put() {
    let (lat, lon) = geodesic_forward(-33.9, 151.2, 37.0, 0.0);
    assert_abs_diff_eq!(lat, -33.9, epsilon = 1e-12);
    assert_abs_diff_eq!(lon, 151.2, epsilon = 1e-12);
  }

  #[test]
  fn validates_inputs() {
    assert!(matches!(
      GeoReference::new(90.0, 0.0, 10, 10),
      Err(GeoError::LatitudeOutOfRange(_))
    ));
    assert!(matches!(
      GeoReference::new(0.0, 200.0, 10, 10),
      Err(GeoError::LongitudeOutOfRange(_))
    ));
    assert!(matches!(
      GeoReference::new(0.0, 0.0, 0, 10),
      Err(GeoError::EmptyImage { .. })
    ));
    assert!(matches!(
      GeoReference::with_footprint(0.0, 0.0, 10, 10, -1.0, 5.0),
      Err(GeoError::InvalidFootprint { .. })
    ));
  }
}
