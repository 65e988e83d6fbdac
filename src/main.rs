// 该文件是 Haiyan （海眼） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use haiyan::{
  FromUrl,
  geo::GeoReference,
  input::InputWrapper,
  model::BrightSpotBuilder,
  output::{JsonRecordOutput, OutputWrapper},
  task::{Task, TiledTask},
  tiled::FailurePolicy,
  tiling::TileConfig,
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("Haiyan 滑动窗口船只检测");
  info!("输入来源: {}", args.input);
  info!("检测器: {}", args.detector);
  info!("输出目录: {}", args.output_dir.display());

  let config = TileConfig::builder()
    .tile_size(args.tile_size)
    .stride(args.stride)
    .confidence_threshold(args.confidence)
    .overlap_threshold(args.overlap)
    .edge_policy(args.edge_policy)
    .build()
    .context("滑动窗口参数无效")?;

  let input = InputWrapper::from_url(&args.input)
    .with_context(|| format!("无法打开输入: {}", args.input))?;
  let model = BrightSpotBuilder::from_url(&args.detector)
    .with_context(|| format!("无法创建检测器: {}", args.detector))?
    .build();

  let mut records = JsonRecordOutput::new(&args.output_dir, input.stem());
  if let (Some(lat), Some(lon)) = (args.center_lat, args.center_lon) {
    let (width, height) = input.dimensions();
    let geo =
      GeoReference::with_footprint(lat, lon, width, height, args.footprint_m, args.footprint_m)
        .context("地理参考参数无效")?;
    info!("影像中心: 纬度 {}, 经度 {}", lat, lon);
    records = records.with_georeference(geo);
  }

  let mut outputs = vec![OutputWrapper::JsonRecordOutput(records)];
  if let Some(annotate) = &args.annotate {
    outputs.push(
      OutputWrapper::from_url(annotate)
        .with_context(|| format!("无法创建标注输出: {}", annotate))?,
    );
  }

  let policy = if args.abort_on_tile_error {
    FailurePolicy::Abort
  } else {
    FailurePolicy::Skip
  };

  TiledTask::new(config)
    .with_failure_policy(policy)
    .with_parallel(args.parallel)
    .run_task(input, model, outputs)?;

  info!("处理完成!");
  Ok(())
}
