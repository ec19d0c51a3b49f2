// 该文件是 Wangge （网格） 项目的一部分。
// src/dataset.rs - 数据集标签读取与训练目标构建
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

use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::boxes::{BoxError, NormalizedBox};
use crate::grid::{Grid, GridError, GridLabels};

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签行字段不足: {0}")]
  MissingFields(String),
  #[error("标签字段无法解析: {0}")]
  InvalidNumber(String),
  #[error("目标框退化: 宽 {0}, 高 {1}")]
  DegenerateBox(f32, f32),
  #[error("边界框错误: {0}")]
  BoxError(#[from] BoxError),
  #[error("网格错误: {0}")]
  GridError(#[from] GridError),
}

/// 一张训练图片与它的归一化目标框
#[derive(Debug, Clone)]
pub struct Sample {
  pub image_path: PathBuf,
  pub expected: NormalizedBox,
}

/// 一张训练图片对应的网格标签
#[derive(Debug, Clone)]
pub struct Target {
  pub image_path: PathBuf,
  pub expected: NormalizedBox,
  pub labels: GridLabels,
}

/// 解析一行 YOLO 风格标签: `class_id x y width height`，空白分隔。
///
/// 零或负面积的目标框视为退化，拒绝解析。
pub fn parse_label_line(line: &str) -> Result<(u32, NormalizedBox), DatasetError> {
  let mut fields = line.split_whitespace();

  let class_id = fields
    .next()
    .ok_or_else(|| DatasetError::MissingFields(line.to_string()))?
    .parse::<u32>()
    .map_err(|_| DatasetError::InvalidNumber(line.to_string()))?;

  let mut numbers = [0.0f32; 4];
  for number in numbers.iter_mut() {
    let field = fields
      .next()
      .ok_or_else(|| DatasetError::MissingFields(line.to_string()))?;
    *number = field
      .parse::<f32>()
      .map_err(|_| DatasetError::InvalidNumber(line.to_string()))?;
    if !number.is_finite() {
      return Err(DatasetError::InvalidNumber(line.to_string()));
    }
  }

  let [x, y, width, height] = numbers;
  if width <= 0.0 || height <= 0.0 {
    return Err(DatasetError::DegenerateBox(width, height));
  }

  Ok((
    class_id,
    NormalizedBox {
      x,
      y,
      width,
      height,
    },
  ))
}

/// 扫描数据集目录，`<dir>/images/*.jpg` 配对 `<dir>/labels/<名>.txt`。
///
/// 缺少标签文件、类别不匹配、标签损坏的图片跳过并记录日志，
/// 单个坏样本不中断整个扫描。
pub fn read_dataset(dir: &Path, class_id: u32) -> Result<Vec<Sample>, DatasetError> {
  let images_dir = dir.join("images");
  let labels_dir = dir.join("labels");

  let mut samples = Vec::new();
  let mut entries: Vec<_> = std::fs::read_dir(&images_dir)?
    .collect::<Result<Vec<_>, _>>()?
    .into_iter()
    .map(|entry| entry.path())
    .collect();
  entries.sort();

  for image_path in entries {
    let is_jpg = image_path
      .extension()
      .map(|ext| ext.eq_ignore_ascii_case("jpg"))
      .unwrap_or(false);
    if !is_jpg {
      continue;
    }

    let Some(stem) = image_path.file_stem() else {
      continue;
    };
    let label_path = labels_dir.join(stem).with_extension("txt");
    if !label_path.exists() {
      debug!("没有标签文件，跳过: {}", image_path.display());
      continue;
    }

    let content = std::fs::read_to_string(&label_path)?;
    let (label_class, expected) = match parse_label_line(content.trim()) {
      Ok(parsed) => parsed,
      Err(e) => {
        warn!("标签损坏，跳过 {}: {}", label_path.display(), e);
        continue;
      }
    };

    if label_class != class_id {
      debug!(
        "类别不匹配，跳过 {}: 期望 {}, 实际 {}",
        label_path.display(),
        class_id,
        label_class
      );
      continue;
    }

    samples.push(Sample {
      image_path,
      expected,
    });
  }

  info!("数据集 {} 读取完成: {} 个样本", dir.display(), samples.len());
  Ok(samples)
}

/// 为每个样本构建 S x S 网格标签，作为外部分类头的训练目标
pub fn build_targets(
  samples: &[Sample],
  input_size: f32,
  grid_size: usize,
  threshold: f32,
) -> Result<Vec<Target>, DatasetError> {
  let grid = Grid::square(input_size, grid_size)?;

  let mut targets = Vec::with_capacity(samples.len());
  for sample in samples {
    let expected_pixel = sample.expected.to_pixel(input_size, input_size)?;
    let labels = grid.score_against(&expected_pixel, threshold);

    debug!(
      "{}: 目标单元 {}, 背景单元 {}",
      sample.image_path.display(),
      labels.object_count(),
      labels.background_count()
    );

    targets.push(Target {
      image_path: sample.image_path.clone(),
      expected: sample.expected,
      labels,
    });
  }

  Ok(targets)
}

/// 序列化训练目标，供外部训练器消费
pub fn targets_to_json(targets: &[Target], input_size: f32, grid_size: usize) -> serde_json::Value {
  let samples: Vec<serde_json::Value> = targets
    .iter()
    .map(|target| {
      let size = target.labels.size();
      let rows: Vec<Vec<u8>> = (0..size)
        .map(|y| (0..size).map(|x| target.labels.get(x, y)).collect())
        .collect();

      json!({
        "image": target.image_path.to_string_lossy(),
        "box": {
          "x": target.expected.x,
          "y": target.expected.y,
          "width": target.expected.width,
          "height": target.expected.height,
        },
        "labels": rows,
      })
    })
    .collect();

  json!({
    "input_size": input_size,
    "grid_size": grid_size,
    "samples": samples,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grid::GRID_SCORE_THRESHOLD;

  #[test]
  fn test_parse_label_line() {
    let (class_id, parsed) = parse_label_line("0 0.5 0.4 0.2 0.3").unwrap();
    assert_eq!(class_id, 0);
    assert!((parsed.x - 0.5).abs() < 1e-6);
    assert!((parsed.y - 0.4).abs() < 1e-6);
    assert!((parsed.width - 0.2).abs() < 1e-6);
    assert!((parsed.height - 0.3).abs() < 1e-6);
  }

  #[test]
  fn test_parse_label_line_extra_whitespace() {
    let (class_id, parsed) = parse_label_line("  3   0.5\t0.5  0.1 0.1 ").unwrap();
    assert_eq!(class_id, 3);
    assert!((parsed.width - 0.1).abs() < 1e-6);
  }

  #[test]
  fn test_parse_label_line_rejects_malformed() {
    assert!(parse_label_line("").is_err());
    assert!(parse_label_line("0 0.5 0.5").is_err());
    assert!(parse_label_line("0 0.5 abc 0.2 0.2").is_err());
    assert!(parse_label_line("x 0.5 0.5 0.2 0.2").is_err());
    assert!(parse_label_line("0 0.5 0.5 NaN 0.2").is_err());
  }

  #[test]
  fn test_parse_label_line_rejects_degenerate_box() {
    assert!(parse_label_line("0 0.5 0.5 0.0 0.2").is_err());
    assert!(parse_label_line("0 0.5 0.5 0.2 -0.1").is_err());
  }

  #[test]
  fn test_build_targets_center_object() {
    let samples = [Sample {
      image_path: PathBuf::from("images/sample.jpg"),
      expected: NormalizedBox {
        x: 0.5,
        y: 0.5,
        width: 0.25,
        height: 0.25,
      },
    }];

    let targets = build_targets(&samples, 224.0, 7, GRID_SCORE_THRESHOLD).unwrap();
    assert_eq!(targets.len(), 1);

    let labels = &targets[0].labels;
    // 目标框 84..140，中心单元 (3,3) = 96..128 在框内
    assert_eq!(labels.get(3, 3), 1);
    assert_eq!(labels.get(0, 0), 0);
    assert!(labels.object_count() >= 1);
    assert!(labels.background_count() > labels.object_count());
  }

  #[test]
  fn test_targets_json_shape() {
    let samples = [Sample {
      image_path: PathBuf::from("images/sample.jpg"),
      expected: NormalizedBox {
        x: 0.5,
        y: 0.5,
        width: 0.5,
        height: 0.5,
      },
    }];
    let targets = build_targets(&samples, 224.0, 7, GRID_SCORE_THRESHOLD).unwrap();
    let value = targets_to_json(&targets, 224.0, 7);

    assert_eq!(value["grid_size"], 7);
    let rows = value["samples"][0]["labels"].as_array().unwrap();
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0].as_array().unwrap().len(), 7);
  }
}
