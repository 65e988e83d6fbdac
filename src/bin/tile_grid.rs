// 该文件是 Haiyan （海眼） 项目的一部分。
// src/bin/tile_grid.rs - 打印滑动窗口划分
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use haiyan::tiling::{DEFAULT_STRIDE, DEFAULT_TILE_SIZE, EdgePolicy, TileConfig, TileGrid};

/// 在不读取影像的情况下查看给定尺寸的瓦片划分
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 影像高度（像素）
  #[arg(long)]
  pub height: usize,
  /// 影像宽度（像素）
  #[arg(long)]
  pub width: usize,
  /// 瓦片边长（像素）
  #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
  pub tile_size: usize,
  /// 相邻瓦片起点间距（像素）
  #[arg(long, default_value_t = DEFAULT_STRIDE)]
  pub stride: usize,
  /// 边缘策略: pad 或 flush
  #[arg(long, default_value_t = EdgePolicy::Pad)]
  pub edge_policy: EdgePolicy,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let config = TileConfig::builder()
    .tile_size(args.tile_size)
    .stride(args.stride)
    .edge_policy(args.edge_policy)
    .build()?;
  let grid = TileGrid::new(args.height, args.width, &config)?;

  info!(
    "影像 {}x{}, 瓦片 {}, 步长 {}, 重叠 {}, 策略 {}",
    grid.image_width(),
    grid.image_height(),
    config.tile_size,
    config.stride,
    config.overlap(),
    config.edge_policy
  );
  info!(
    "补零: 右 {}, 下 {}; 补零后尺寸 {}x{}",
    grid.pad_right(),
    grid.pad_bottom(),
    grid.padded_width(),
    grid.padded_height()
  );
  info!("列起点: {:?}", grid.x_offsets());
  info!("行起点: {:?}", grid.y_offsets());
  info!("共 {} 行 x {} 列 = {} 个瓦片", grid.rows(), grid.cols(), grid.len());

  Ok(())
}
