// 该文件是 Wangge （网格） 项目的一部分。
// src/bin/decode_oneshot.rs - 单阶段解码
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use wangge::{
  FromUrl,
  dataset::parse_label_line,
  grid::GridScores,
  output::{OutputWrapper, Render},
  task::{OneStageDecode, evaluate},
};

/// 单阶段解码参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 得分网格 JSON 文件，S 行 S 列
  #[arg(long, value_name = "FILE")]
  pub scores: PathBuf,

  /// 底图文件路径
  #[arg(long, value_name = "IMAGE")]
  pub image: PathBuf,

  /// 真值标签文件（YOLO 格式），仅用于评估与绘制
  #[arg(long, value_name = "LABEL")]
  pub label: Option<PathBuf>,

  /// 输出路径，支持 image:// 与 folder:// 方案
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 模型输入边长（像素）
  #[arg(long, default_value = "224", value_name = "PIXELS")]
  pub input_size: f32,

  /// 激活阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.3", value_name = "THRESHOLD")]
  pub activation_threshold: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("得分网格: {}", args.scores.display());
  info!("底图: {}", args.image.display());
  info!("输出路径: {}", args.output);

  let scores = GridScores::from_json_file(&args.scores)?;
  let task = OneStageDecode {
    input_size: args.input_size,
    activation_threshold: args.activation_threshold,
  };
  let mut prediction = task.run(scores)?;

  if let Some(label_path) = &args.label {
    let content = std::fs::read_to_string(label_path)?;
    let (_, expected) = parse_label_line(content.trim())?;
    let expected_pixel = expected.to_pixel(args.input_size, args.input_size)?;
    evaluate(&prediction.coarse, &expected_pixel);
    prediction = prediction.with_expected(expected);
  }

  let final_box = prediction.final_box()?;
  info!(
    "预测框: 中心 ({:.3}, {:.3}), 宽高 ({:.3}, {:.3})",
    final_box.x, final_box.y, final_box.width, final_box.height
  );

  let frame = image::ImageReader::open(&args.image)?.decode()?.into_rgb8();
  let output = OutputWrapper::from_url(&args.output)?;
  output.render_result(&frame, &prediction)?;

  Ok(())
}
