// 该文件是 Wangge （网格） 项目的一部分。
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

/// Wangge 训练目标构建参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 数据集目录，内含 images/ 与 labels/ 子目录
  #[arg(long, value_name = "DIR")]
  pub dataset: PathBuf,

  /// 训练目标 JSON 输出路径
  #[arg(long, value_name = "FILE")]
  pub output: PathBuf,

  /// 目标类别编号，其他类别的标签跳过
  #[arg(long, default_value = "0", value_name = "CLASS")]
  pub class_id: u32,

  /// 网格划分数 S，对应 S x S 空间特征图
  #[arg(long, default_value = "7", value_name = "SIZE")]
  pub grid_size: usize,

  /// 模型输入边长（像素）
  #[arg(long, default_value = "224", value_name = "PIXELS")]
  pub input_size: f32,

  /// 网格评分阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.333333333", value_name = "THRESHOLD")]
  pub threshold: f32,
}
