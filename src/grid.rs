// 该文件是 Wangge （网格） 项目的一部分。
// src/grid.rs - 空间网格划分、评分与解码
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

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::boxes::{PixelBox, iou};

/// 默认网格划分数，对应 7x7 空间特征图
pub const DEFAULT_GRID_SIZE: usize = 7;
/// 默认网格评分阈值，覆盖率达到该值的单元标记为目标
pub const GRID_SCORE_THRESHOLD: f32 = 1.0 / 3.0;
/// 默认激活阈值，预测得分达到该值的单元参与框解码
pub const ACTIVATION_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug)]
pub enum GridError {
  #[error("参考矩形无效: {0} x {1}")]
  InvalidReference(f32, f32),
  #[error("网格划分数无效: {0}")]
  InvalidSize(usize),
  #[error("数值数量不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum ScoresError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("得分网格形状无效: {0}")]
  InvalidShape(String),
  #[error("网格错误: {0}")]
  GridError(#[from] GridError),
}

/// 对单个网格单元评分，输出 0 或 1。
///
/// 目标框完全落入单元内、或单元完全落入目标框内，直接得 1；
/// 否则按覆盖率度量与阈值比较，达到阈值（含相等）得 1。
pub fn grid_score(cell: &PixelBox, expected: &PixelBox, threshold: f32) -> u8 {
  if expected.is_inside(cell) || cell.is_inside(expected) {
    return 1;
  }

  if iou(cell, expected) >= threshold { 1 } else { 0 }
}

/// 参考矩形上的 S x S 等分网格。
///
/// 网格本身不持有数据，单元按需由参考矩形与划分数推出。
#[derive(Debug, Clone)]
pub struct Grid {
  reference: PixelBox,
  size: usize,
}

impl Grid {
  pub fn new(reference: PixelBox, size: usize) -> Result<Self, GridError> {
    if reference.width() <= 0.0 || reference.height() <= 0.0 {
      return Err(GridError::InvalidReference(
        reference.width(),
        reference.height(),
      ));
    }
    if size == 0 {
      return Err(GridError::InvalidSize(size));
    }
    Ok(Grid { reference, size })
  }

  /// 以 (0,0) 为原点的正方形参考矩形，边长 input_size
  pub fn square(input_size: f32, size: usize) -> Result<Self, GridError> {
    Grid::new(
      PixelBox {
        left: 0.0,
        top: 0.0,
        right: input_size,
        bottom: input_size,
      },
      size,
    )
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn cell_width(&self) -> f32 {
    self.reference.width() / self.size as f32
  }

  pub fn cell_height(&self) -> f32 {
    self.reference.height() / self.size as f32
  }

  /// 第 (x, y) 个单元对应的像素框，0 <= x, y < size
  pub fn cell(&self, x: usize, y: usize) -> PixelBox {
    let cell_width = self.cell_width();
    let cell_height = self.cell_height();
    let left = self.reference.left + x as f32 * cell_width;
    let top = self.reference.top + y as f32 * cell_height;

    PixelBox {
      left,
      top,
      right: left + cell_width,
      bottom: top + cell_height,
    }
  }

  /// 对整个网格按目标框评分，得到行优先的 0/1 标签矩阵
  pub fn score_against(&self, expected: &PixelBox, threshold: f32) -> GridLabels {
    let mut values = Vec::with_capacity(self.size * self.size);
    for y in 0..self.size {
      for x in 0..self.size {
        let cell = self.cell(x, y);
        values.push(grid_score(&cell, expected, threshold));
      }
    }

    GridLabels {
      size: self.size,
      values: values.into_boxed_slice(),
    }
  }
}

/// S x S 的二值标签矩阵，行优先，训练目标
#[derive(Debug, Clone)]
pub struct GridLabels {
  size: usize,
  values: Box<[u8]>,
}

impl GridLabels {
  pub fn size(&self) -> usize {
    self.size
  }

  pub fn get(&self, x: usize, y: usize) -> u8 {
    self.values[y * self.size + x]
  }

  pub fn values(&self) -> &[u8] {
    &self.values
  }

  /// 标记为目标的单元数
  pub fn object_count(&self) -> usize {
    self.values.iter().filter(|&&v| v == 1).count()
  }

  /// 标记为背景的单元数
  pub fn background_count(&self) -> usize {
    self.size * self.size - self.object_count()
  }
}

/// S x S 的连续激活矩阵，行优先，分类头的输出侧
#[derive(Debug, Clone)]
pub struct GridScores {
  size: usize,
  values: Box<[f32]>,
}

impl GridScores {
  pub fn new(size: usize, values: Vec<f32>) -> Result<Self, GridError> {
    if size == 0 {
      return Err(GridError::InvalidSize(size));
    }
    if values.len() != size * size {
      return Err(GridError::LengthMismatch {
        expected: size * size,
        actual: values.len(),
      });
    }
    Ok(GridScores {
      size,
      values: values.into_boxed_slice(),
    })
  }

  /// 从 JSON 文件读取得分网格，格式为 S 行 S 列的数值数组
  pub fn from_json_file(path: &Path) -> Result<Self, ScoresError> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    let rows = value
      .as_array()
      .ok_or_else(|| ScoresError::InvalidShape("顶层必须是数组".to_string()))?;
    let size = rows.len();

    let mut values = Vec::with_capacity(size * size);
    for row in rows {
      let columns = row
        .as_array()
        .ok_or_else(|| ScoresError::InvalidShape("每行必须是数组".to_string()))?;
      if columns.len() != size {
        return Err(ScoresError::InvalidShape(format!(
          "期望 {} 列, 实际 {} 列",
          size,
          columns.len()
        )));
      }
      for column in columns {
        let number = column
          .as_f64()
          .ok_or_else(|| ScoresError::InvalidShape("单元必须是数值".to_string()))?;
        values.push(number as f32);
      }
    }

    debug!("读取得分网格: {} ({}x{})", path.display(), size, size);
    Ok(GridScores::new(size, values)?)
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn get(&self, x: usize, y: usize) -> f32 {
    self.values[y * self.size + x]
  }

  /// 激活单元坐标列表，得分达到阈值（含相等）的 (x, y)
  pub fn activated(&self, threshold: f32) -> Vec<(usize, usize)> {
    let mut targets = Vec::new();
    for y in 0..self.size {
      for x in 0..self.size {
        if self.get(x, y) >= threshold {
          targets.push((x, y));
        }
      }
    }
    targets
  }
}

/// 把激活单元解码为像素框。
///
/// 取激活单元下标的最小/最大包络，右、下边界取到下一个单元的起点。
/// 没有任何单元被激活时回退到整个网格范围，宁可给出全图框也不给空框，
/// 否则弱目标会让下游推理流程中断。
pub fn decode_box(
  scores: &GridScores,
  threshold: f32,
  cell_width: f32,
  cell_height: f32,
) -> PixelBox {
  let size = scores.size();
  let mut targets = scores.activated(threshold);
  if targets.is_empty() {
    debug!("没有激活单元，回退到整个网格范围");
    targets.push((0, 0));
    targets.push((size - 1, size - 1));
  }

  let min_x = targets.iter().map(|t| t.0).min().unwrap_or(0);
  let max_x = targets.iter().map(|t| t.0).max().unwrap_or(size - 1);
  let min_y = targets.iter().map(|t| t.1).min().unwrap_or(0);
  let max_y = targets.iter().map(|t| t.1).max().unwrap_or(size - 1);

  PixelBox {
    left: min_x as f32 * cell_width,
    top: min_y as f32 * cell_height,
    right: (max_x + 1) as f32 * cell_width,
    bottom: (max_y + 1) as f32 * cell_height,
  }
}
