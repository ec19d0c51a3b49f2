// 该文件是 Wangge （网格） 项目的一部分。
// src/boxes.rs - 边界框表示与重叠几何
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

#[derive(Error, Debug)]
pub enum BoxError {
  #[error("参考尺寸无效: {0} x {1}")]
  InvalidReference(f32, f32),
}

/// 归一化边界框，中心点 + 宽高，均为相对参考矩形的 [0,1] 比例
#[derive(Debug, Clone, Copy)]
pub struct NormalizedBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

/// 像素边界框，left/top/right/bottom，绝对像素坐标
#[derive(Debug, Clone, Copy)]
pub struct PixelBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

fn check_reference(ref_width: f32, ref_height: f32) -> Result<(), BoxError> {
  if ref_width <= 0.0 || ref_height <= 0.0 {
    return Err(BoxError::InvalidReference(ref_width, ref_height));
  }
  Ok(())
}

impl NormalizedBox {
  /// 转换为像素坐标，参考尺寸必须为正
  pub fn to_pixel(&self, ref_width: f32, ref_height: f32) -> Result<PixelBox, BoxError> {
    check_reference(ref_width, ref_height)?;

    let width = self.width * ref_width;
    let height = self.height * ref_height;
    let left = self.x * ref_width - width / 2.0;
    let top = self.y * ref_height - height / 2.0;

    Ok(PixelBox {
      left,
      top,
      right: left + width,
      bottom: top + height,
    })
  }
}

impl PixelBox {
  /// 转换为归一化坐标，参考尺寸必须为正
  pub fn to_normalized(&self, ref_width: f32, ref_height: f32) -> Result<NormalizedBox, BoxError> {
    check_reference(ref_width, ref_height)?;

    let left = self.left / ref_width;
    let right = self.right / ref_width;
    let top = self.top / ref_height;
    let bottom = self.bottom / ref_height;

    Ok(NormalizedBox {
      x: (left + right) / 2.0,
      y: (top + bottom) / 2.0,
      width: right - left,
      height: bottom - top,
    })
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  /// 面积，right <= left 或 bottom <= top 视为零面积
  pub fn area(&self) -> f32 {
    if self.right <= self.left || self.bottom <= self.top {
      return 0.0;
    }
    self.width() * self.height()
  }

  /// 判断 self 是否完全位于 outer 内部（边界重合也算内部）
  pub fn is_inside(&self, outer: &PixelBox) -> bool {
    self.left >= outer.left
      && self.right <= outer.right
      && self.top >= outer.top
      && self.bottom <= outer.bottom
  }
}

/// 最佳覆盖率重叠度量。
///
/// 注意: 与教科书的 IoU（交集/并集）不同，这里取
/// `max(overlap/area_a, overlap/area_b)`，即任一方被覆盖的最大比例。
/// 网格单元远小于目标框时依然应当得分，训练与推理两侧的标签语义
/// 都依赖该度量，不可改为对称 IoU。
pub fn iou(a: &PixelBox, b: &PixelBox) -> f32 {
  // 重叠区域
  let left = a.left.max(b.left);
  let right = a.right.min(b.right);
  let top = a.top.max(b.top);
  let bottom = a.bottom.min(b.bottom);

  let width = right - left;
  let height = bottom - top;
  if width <= 0.0 || height <= 0.0 {
    return 0.0;
  }
  let area_overlap = width * height;

  let area_a = (a.right - a.left) * (a.bottom - a.top);
  let area_b = (b.right - b.left) * (b.bottom - b.top);

  (area_overlap / area_a).max(area_overlap / area_b)
}

/// 教科书式 IoU（交集/并集），仅用于评估报告，不参与标签生成
pub fn classic_iou(a: &PixelBox, b: &PixelBox) -> f32 {
  let left = a.left.max(b.left);
  let right = a.right.min(b.right);
  let top = a.top.max(b.top);
  let bottom = a.bottom.min(b.bottom);

  let width = right - left;
  let height = bottom - top;
  if width <= 0.0 || height <= 0.0 {
    return 0.0;
  }
  let area_overlap = width * height;

  let union = a.area() + b.area() - area_overlap;
  if union <= 0.0 {
    return 0.0;
  }
  area_overlap / union
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPSILON: f32 = 1e-6;

  #[test]
  fn test_round_trip() {
    // 归一化 -> 像素 -> 归一化，每个字段误差在容差内
    let cases = [
      (0.5, 0.5, 0.2, 0.3, 224.0, 224.0),
      (0.1, 0.9, 0.05, 0.1, 640.0, 480.0),
      (0.73, 0.21, 1.0, 0.42, 100.0, 300.0),
    ];

    for (x, y, width, height, ref_w, ref_h) in cases {
      let original = NormalizedBox {
        x,
        y,
        width,
        height,
      };
      let pixel = original.to_pixel(ref_w, ref_h).unwrap();
      let restored = pixel.to_normalized(ref_w, ref_h).unwrap();

      assert!((restored.x - original.x).abs() < EPSILON);
      assert!((restored.y - original.y).abs() < EPSILON);
      assert!((restored.width - original.width).abs() < EPSILON);
      assert!((restored.height - original.height).abs() < EPSILON);
    }
  }

  #[test]
  fn test_invalid_reference_fails_fast() {
    let normalized = NormalizedBox {
      x: 0.5,
      y: 0.5,
      width: 0.2,
      height: 0.2,
    };
    assert!(normalized.to_pixel(0.0, 224.0).is_err());
    assert!(normalized.to_pixel(224.0, -1.0).is_err());

    let pixel = PixelBox {
      left: 0.0,
      top: 0.0,
      right: 10.0,
      bottom: 10.0,
    };
    assert!(pixel.to_normalized(-224.0, 224.0).is_err());
    assert!(pixel.to_normalized(224.0, 0.0).is_err());
  }

  #[test]
  fn test_identical_boxes() {
    let a = PixelBox {
      left: 0.0,
      top: 0.0,
      right: 10.0,
      bottom: 10.0,
    };
    assert!((iou(&a, &a) - 1.0).abs() < EPSILON);
  }

  #[test]
  fn test_disjoint_boxes() {
    let a = PixelBox {
      left: 0.0,
      top: 0.0,
      right: 10.0,
      bottom: 10.0,
    };
    let b = PixelBox {
      left: 20.0,
      top: 20.0,
      right: 30.0,
      bottom: 30.0,
    };
    assert_eq!(iou(&a, &b), 0.0);
    assert_eq!(classic_iou(&a, &b), 0.0);
  }

  #[test]
  fn test_iou_symmetry() {
    let a = PixelBox {
      left: 0.0,
      top: 0.0,
      right: 32.0,
      bottom: 32.0,
    };
    let b = PixelBox {
      left: 16.0,
      top: 8.0,
      right: 64.0,
      bottom: 48.0,
    };
    assert_eq!(iou(&a, &b), iou(&b, &a));
  }

  #[test]
  fn test_iou_bounds() {
    let pairs = [
      ((0.0, 0.0, 10.0, 10.0), (5.0, 5.0, 15.0, 15.0)),
      ((0.0, 0.0, 100.0, 100.0), (45.0, 45.0, 55.0, 55.0)),
      ((0.0, 0.0, 32.0, 32.0), (0.0, 0.0, 32.0, 32.0)),
      ((3.0, 4.0, 5.0, 6.0), (100.0, 100.0, 101.0, 101.0)),
    ];

    for ((al, at, ar, ab), (bl, bt, br, bb)) in pairs {
      let a = PixelBox {
        left: al,
        top: at,
        right: ar,
        bottom: ab,
      };
      let b = PixelBox {
        left: bl,
        top: bt,
        right: br,
        bottom: bb,
      };
      let value = iou(&a, &b);
      assert!((0.0..=1.0).contains(&value));
    }
  }

  #[test]
  fn test_coverage_favors_contained_box() {
    // 小框完全位于大框内，对称 IoU 只有 0.01，覆盖率度量应为 1
    let outer = PixelBox {
      left: 0.0,
      top: 0.0,
      right: 100.0,
      bottom: 100.0,
    };
    let tiny = PixelBox {
      left: 45.0,
      top: 45.0,
      right: 55.0,
      bottom: 55.0,
    };
    assert!(tiny.is_inside(&outer));
    assert!((iou(&outer, &tiny) - 1.0).abs() < EPSILON);
    assert!((classic_iou(&outer, &tiny) - 0.01).abs() < EPSILON);
  }

  #[test]
  fn test_is_inside_inclusive() {
    let outer = PixelBox {
      left: 0.0,
      top: 0.0,
      right: 32.0,
      bottom: 32.0,
    };
    // 边界重合
    assert!(outer.is_inside(&outer));

    let degenerate = PixelBox {
      left: 16.0,
      top: 16.0,
      right: 16.0,
      bottom: 16.0,
    };
    // 零面积框按单点处理
    assert!(degenerate.is_inside(&outer));
    assert_eq!(degenerate.area(), 0.0);
  }

  #[test]
  fn test_degenerate_box_zero_area() {
    let inverted = PixelBox {
      left: 10.0,
      top: 10.0,
      right: 5.0,
      bottom: 20.0,
    };
    assert_eq!(inverted.area(), 0.0);

    let normal = PixelBox {
      left: 0.0,
      top: 0.0,
      right: 20.0,
      bottom: 20.0,
    };
    assert_eq!(iou(&inverted, &normal), 0.0);
  }
}
