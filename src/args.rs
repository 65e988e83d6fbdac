// 该文件是 Haiyan （海眼） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use haiyan::geo::SENTINEL2_TILE_FOOTPRINT_M;
use haiyan::tiling::{
  DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_OVERLAP_THRESHOLD, DEFAULT_STRIDE, DEFAULT_TILE_SIZE,
  EdgePolicy,
};

/// Haiyan 滑动窗口船只检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入影像，例如 image:///data/S2C_T17RPH_RGB.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 检测器，例如 bright:///?threshold=200&min_area=4&label=vessel
  #[arg(long, value_name = "MODEL", default_value = "bright:///")]
  pub detector: Url,

  /// JSON 检测记录输出目录
  #[arg(long, value_name = "DIR")]
  pub output_dir: PathBuf,

  /// 标注图像输出，例如 image:///data/annotated.png?font=/usr/share/fonts/DejaVuSans.ttf&thickness=2
  #[arg(long, value_name = "OUTPUT")]
  pub annotate: Option<Url>,

  /// 瓦片边长（像素）
  #[arg(long, default_value_t = DEFAULT_TILE_SIZE, value_name = "PIXELS")]
  pub tile_size: usize,

  /// 相邻瓦片起点间距（像素），不得大于瓦片边长
  #[arg(long, default_value_t = DEFAULT_STRIDE, value_name = "PIXELS")]
  pub stride: usize,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 全局 NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_OVERLAP_THRESHOLD, value_name = "THRESHOLD")]
  pub overlap: f32,

  /// 边缘策略: pad（补零）或 flush（最后一块贴齐原图边缘）
  #[arg(long, default_value_t = EdgePolicy::Pad, value_name = "POLICY")]
  pub edge_policy: EdgePolicy,

  /// 并行处理瓦片
  #[arg(long)]
  pub parallel: bool,

  /// 任一瓦片检测失败即终止
  #[arg(long)]
  pub abort_on_tile_error: bool,

  /// 影像中心纬度，与 --center-lon 一同给出时输出 WGS84 坐标
  #[arg(long, requires = "center_lon", allow_negative_numbers = true)]
  pub center_lat: Option<f64>,

  /// 影像中心经度
  #[arg(long, requires = "center_lat", allow_negative_numbers = true)]
  pub center_lon: Option<f64>,

  /// 影像覆盖的地面宽度/高度（米）
  #[arg(long, default_value_t = SENTINEL2_TILE_FOOTPRINT_M, value_name = "METERS")]
  pub footprint_m: f64,
}
