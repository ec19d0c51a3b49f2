// 该文件是 Wangge （网格） 项目的一部分。
// src/task.rs - 解码任务与两阶段细化
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

use thiserror::Error;
use tracing::{debug, info};

use crate::boxes::{BoxError, NormalizedBox, PixelBox, classic_iou, iou};
use crate::grid::{GridError, GridScores, decode_box};

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("边界框错误: {0}")]
  BoxError(#[from] BoxError),
  #[error("网格错误: {0}")]
  GridError(#[from] GridError),
}

/// 一次解码的产物：粗框、细化框（如有）与末阶段得分网格
#[derive(Debug, Clone)]
pub struct Prediction {
  /// 解码时的参考边长，坐标换算都以它为基准
  pub input_size: f32,
  /// 第一阶段解码出的像素框，参考整幅输入
  pub coarse: PixelBox,
  /// 两阶段组合后的归一化框，单阶段解码时为 None
  pub refined: Option<NormalizedBox>,
  /// 末阶段的得分网格，供热力图渲染
  pub scores: GridScores,
  /// 真值框，仅评估时存在
  pub expected: Option<NormalizedBox>,
}

impl Prediction {
  pub fn with_expected(mut self, expected: NormalizedBox) -> Self {
    self.expected = Some(expected);
    self
  }

  /// 最终框的归一化表示：有细化框用细化框，否则用粗框换算
  pub fn final_box(&self) -> Result<NormalizedBox, BoxError> {
    match self.refined {
      Some(refined) => Ok(refined),
      None => self.coarse.to_normalized(self.input_size, self.input_size),
    }
  }
}

/// 把裁剪内的归一化框映射回整幅输入的归一化坐标。
///
/// 仿射组合: `x = (crop.left + box.x * crop_w) / ref_w`，宽高同理按比例缩放。
pub fn compose_refined(
  crop: &PixelBox,
  refined_in_crop: &NormalizedBox,
  ref_width: f32,
  ref_height: f32,
) -> Result<NormalizedBox, BoxError> {
  if ref_width <= 0.0 || ref_height <= 0.0 {
    return Err(BoxError::InvalidReference(ref_width, ref_height));
  }

  let crop_width = crop.width();
  let crop_height = crop.height();

  Ok(NormalizedBox {
    x: (crop.left + refined_in_crop.x * crop_width) / ref_width,
    y: (crop.top + refined_in_crop.y * crop_height) / ref_height,
    width: refined_in_crop.width * crop_width / ref_width,
    height: refined_in_crop.height * crop_height / ref_height,
  })
}

/// 单阶段解码：一张得分网格直接给出整幅输入上的粗框
#[derive(Debug, Clone)]
pub struct OneStageDecode {
  pub input_size: f32,
  pub activation_threshold: f32,
}

impl OneStageDecode {
  pub fn run(&self, scores: GridScores) -> Result<Prediction, TaskError> {
    if self.input_size <= 0.0 {
      return Err(BoxError::InvalidReference(self.input_size, self.input_size).into());
    }

    let size = scores.size() as f32;
    let cell = self.input_size / size;
    let coarse = decode_box(&scores, self.activation_threshold, cell, cell);
    debug!(
      "单阶段解码: ({:.1}, {:.1}) - ({:.1}, {:.1})",
      coarse.left, coarse.top, coarse.right, coarse.bottom
    );

    Ok(Prediction {
      input_size: self.input_size,
      coarse,
      refined: None,
      scores,
      expected: None,
    })
  }
}

/// 两阶段解码：第一阶段给粗框，第二阶段在裁剪内细化，再组合回整幅输入。
///
/// 第二阶段的网格以粗框为参考矩形，单元尺寸随裁剪缩小。
#[derive(Debug, Clone)]
pub struct TwoStageDecode {
  pub input_size: f32,
  pub activation_threshold: f32,
}

impl TwoStageDecode {
  pub fn run(&self, stage1: GridScores, stage2: GridScores) -> Result<Prediction, TaskError> {
    let one_stage = OneStageDecode {
      input_size: self.input_size,
      activation_threshold: self.activation_threshold,
    };
    let coarse = one_stage.run(stage1)?.coarse;

    // 裁剪内的单元尺寸
    let size = stage2.size() as f32;
    let cell_width = coarse.width() / size;
    let cell_height = coarse.height() / size;

    let refined_in_crop_pixel =
      decode_box(&stage2, self.activation_threshold, cell_width, cell_height);
    let refined_in_crop = refined_in_crop_pixel.to_normalized(coarse.width(), coarse.height())?;
    let refined = compose_refined(&coarse, &refined_in_crop, self.input_size, self.input_size)?;

    debug!(
      "两阶段解码: 粗框 ({:.1}, {:.1}) - ({:.1}, {:.1}), 细化框中心 ({:.3}, {:.3})",
      coarse.left, coarse.top, coarse.right, coarse.bottom, refined.x, refined.y
    );

    Ok(Prediction {
      input_size: self.input_size,
      coarse,
      refined: Some(refined),
      scores: stage2,
      expected: None,
    })
  }
}

/// 预测框与真值框的评估结果
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
  /// 最佳覆盖率度量，与标签生成同一规则
  pub coverage: f32,
  /// 教科书式 IoU，便于与其他工具对比
  pub classic: f32,
}

/// 对照真值评估预测框，两种度量都报告
pub fn evaluate(predicted: &PixelBox, expected: &PixelBox) -> Evaluation {
  let result = Evaluation {
    coverage: iou(predicted, expected),
    classic: classic_iou(predicted, expected),
  };
  info!(
    "评估: 覆盖率 {:.4}, IoU {:.4}",
    result.coverage, result.classic
  );
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grid::ACTIVATION_THRESHOLD;

  const EPSILON: f32 = 1e-5;

  fn scores_with_activated(size: usize, cells: &[(usize, usize)]) -> GridScores {
    let mut values = vec![0.0f32; size * size];
    for &(x, y) in cells {
      values[y * size + x] = 0.9;
    }
    GridScores::new(size, values).unwrap()
  }

  #[test]
  fn test_one_stage_decode() {
    let scores = scores_with_activated(7, &[(2, 2), (4, 4)]);
    let task = OneStageDecode {
      input_size: 224.0,
      activation_threshold: ACTIVATION_THRESHOLD,
    };
    let prediction = task.run(scores).unwrap();

    assert!((prediction.coarse.left - 64.0).abs() < EPSILON);
    assert!((prediction.coarse.top - 64.0).abs() < EPSILON);
    assert!((prediction.coarse.right - 160.0).abs() < EPSILON);
    assert!((prediction.coarse.bottom - 160.0).abs() < EPSILON);
    assert!(prediction.refined.is_none());
  }

  #[test]
  fn test_two_stage_decode_composes_into_frame() {
    // 粗框 64..160（裁剪 96x96），第二阶段只激活中心单元 (3,3)
    let stage1 = scores_with_activated(7, &[(2, 2), (4, 4)]);
    let stage2 = scores_with_activated(7, &[(3, 3)]);
    let task = TwoStageDecode {
      input_size: 224.0,
      activation_threshold: ACTIVATION_THRESHOLD,
    };
    let prediction = task.run(stage1, stage2).unwrap();

    let refined = prediction.refined.unwrap();
    // 裁剪内中心单元的中心即裁剪中心，映射回整幅输入仍是中心
    assert!((refined.x - 0.5).abs() < EPSILON);
    assert!((refined.y - 0.5).abs() < EPSILON);
    // 宽度 = (1/7) * 96 / 224
    assert!((refined.width - 96.0 / 7.0 / 224.0).abs() < EPSILON);
    assert!((refined.height - 96.0 / 7.0 / 224.0).abs() < EPSILON);
  }

  #[test]
  fn test_two_stage_fallback_keeps_coarse_box() {
    // 第二阶段没有激活单元，细化框回退为整个裁剪，应与粗框一致
    let stage1 = scores_with_activated(7, &[(1, 1), (5, 5)]);
    let stage2 = GridScores::new(7, vec![0.0f32; 49]).unwrap();
    let task = TwoStageDecode {
      input_size: 224.0,
      activation_threshold: ACTIVATION_THRESHOLD,
    };
    let prediction = task.run(stage1, stage2).unwrap();

    let refined = prediction.refined.unwrap();
    let coarse = prediction.coarse.to_normalized(224.0, 224.0).unwrap();
    assert!((refined.x - coarse.x).abs() < EPSILON);
    assert!((refined.y - coarse.y).abs() < EPSILON);
    assert!((refined.width - coarse.width).abs() < EPSILON);
    assert!((refined.height - coarse.height).abs() < EPSILON);
  }

  #[test]
  fn test_compose_refined_rejects_invalid_reference() {
    let crop = PixelBox {
      left: 0.0,
      top: 0.0,
      right: 96.0,
      bottom: 96.0,
    };
    let refined = NormalizedBox {
      x: 0.5,
      y: 0.5,
      width: 0.5,
      height: 0.5,
    };
    assert!(compose_refined(&crop, &refined, 0.0, 224.0).is_err());
  }

  #[test]
  fn test_evaluate_identical_boxes() {
    let a = PixelBox {
      left: 10.0,
      top: 10.0,
      right: 50.0,
      bottom: 50.0,
    };
    let result = evaluate(&a, &a);
    assert!((result.coverage - 1.0).abs() < EPSILON);
    assert!((result.classic - 1.0).abs() < EPSILON);
  }
}
