// 该文件是 Wangge （网格） 项目的一部分。
// src/main.rs - 训练目标构建主程序
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use wangge::dataset::{build_targets, read_dataset, targets_to_json};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("数据集目录: {}", args.dataset.display());
  info!("输出路径: {}", args.output.display());
  info!("网格划分数: {}", args.grid_size);
  info!("输入边长: {}", args.input_size);
  info!("评分阈值: {}", args.threshold);

  let samples = read_dataset(&args.dataset, args.class_id)?;
  let targets = build_targets(&samples, args.input_size, args.grid_size, args.threshold)?;

  let object_cells: usize = targets
    .iter()
    .map(|target| target.labels.object_count())
    .sum();
  let total_cells = targets.len() * args.grid_size * args.grid_size;
  info!(
    "构建完成: {} 个样本, 目标单元 {} / {}",
    targets.len(),
    object_cells,
    total_cells
  );

  let value = targets_to_json(&targets, args.input_size, args.grid_size);
  std::fs::write(&args.output, serde_json::to_string_pretty(&value)?)?;
  info!("训练目标已写入: {}", args.output.display());

  Ok(())
}
