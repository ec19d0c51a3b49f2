// 该文件是 Wangge （网格） 项目的一部分。
// src/output/draw.rs - 预测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::boxes::{BoxError, NormalizedBox, PixelBox};
use crate::grid::GridScores;
use crate::task::Prediction;

// 颜色约定: 真值绿色，粗框红色，细化框蓝色
const EXPECTED_COLOR: [u8; 3] = [0x00, 0xff, 0x00];
const COARSE_COLOR: [u8; 3] = [0xff, 0x00, 0x00];
const REFINED_COLOR: [u8; 3] = [0x00, 0x77, 0xff];
const HEATMAP_COLOR: [u8; 3] = [0xff, 0x00, 0x00];
const HEATMAP_MAX_OPACITY: f32 = 0.5;
const BORDER_THICKNESS: i32 = 2;

/// 把预测画到图像上：激活热力图 + 各边界框
pub struct Draw {
  /// 是否叠加末阶段得分热力图
  pub heatmap: bool,
}

impl Default for Draw {
  fn default() -> Self {
    Draw { heatmap: true }
  }
}

impl Draw {
  /// 在图像上画一个归一化框的空心边框，加粗为 2 像素
  fn draw_normalized_box(&self, image: &mut RgbImage, bbox: &NormalizedBox, color: [u8; 3]) {
    let (image_width, image_height) = (image.width() as f32, image.height() as f32);

    let width = bbox.width * image_width;
    let height = bbox.height * image_height;
    let left = bbox.x * image_width - width / 2.0;
    let top = bbox.y * image_height - height / 2.0;

    let x_min = (left.floor() as i32).clamp(0, image_width as i32 - 1);
    let y_min = (top.floor() as i32).clamp(0, image_height as i32 - 1);
    let x_max = ((left + width).ceil() as i32).clamp(0, image_width as i32 - 1);
    let y_max = ((top + height).ceil() as i32).clamp(0, image_height as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for thickness in 0..BORDER_THICKNESS {
      let rect_width = x_max - x_min - 2 * thickness;
      let rect_height = y_max - y_min - 2 * thickness;
      if rect_width <= 0 || rect_height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + thickness, y_min + thickness)
        .of_size(rect_width as u32, rect_height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }

  /// 按单元激活强度在指定像素区域上叠加红色热力图
  fn blend_heatmap(&self, image: &mut RgbImage, scores: &GridScores, region: &PixelBox) {
    let size = scores.size();
    let cell_width = region.width() / size as f32;
    let cell_height = region.height() / size as f32;

    let (image_width, image_height) = (image.width() as i32, image.height() as i32);

    for grid_y in 0..size {
      for grid_x in 0..size {
        let opacity = (scores.get(grid_x, grid_y) * HEATMAP_MAX_OPACITY).clamp(0.0, 1.0);
        if opacity <= 0.0 {
          continue;
        }

        let left = (region.left + grid_x as f32 * cell_width).round() as i32;
        let top = (region.top + grid_y as f32 * cell_height).round() as i32;
        let right = (region.left + (grid_x + 1) as f32 * cell_width).round() as i32;
        let bottom = (region.top + (grid_y + 1) as f32 * cell_height).round() as i32;

        for y in top.max(0)..bottom.min(image_height) {
          for x in left.max(0)..right.min(image_width) {
            let pixel = image.get_pixel_mut(x as u32, y as u32);
            for channel in 0..3 {
              let base = pixel[channel] as f32;
              let overlay = HEATMAP_COLOR[channel] as f32;
              pixel[channel] = (base * (1.0 - opacity) + overlay * opacity) as u8;
            }
          }
        }
      }
    }
  }

  /// 绘制一次预测：热力图、真值框、粗框、细化框
  pub fn draw_prediction(
    &self,
    image: &mut RgbImage,
    prediction: &Prediction,
  ) -> Result<(), BoxError> {
    let (image_width, image_height) = (image.width() as f32, image.height() as f32);

    if self.heatmap {
      // 两阶段时热力图属于裁剪区域，单阶段时覆盖整幅图像
      let region = if prediction.refined.is_some() {
        let scale_x = image_width / prediction.input_size;
        let scale_y = image_height / prediction.input_size;
        PixelBox {
          left: prediction.coarse.left * scale_x,
          top: prediction.coarse.top * scale_y,
          right: prediction.coarse.right * scale_x,
          bottom: prediction.coarse.bottom * scale_y,
        }
      } else {
        PixelBox {
          left: 0.0,
          top: 0.0,
          right: image_width,
          bottom: image_height,
        }
      };
      self.blend_heatmap(image, &prediction.scores, &region);
    }

    if let Some(expected) = prediction.expected {
      self.draw_normalized_box(image, &expected, EXPECTED_COLOR);
    }

    let coarse = prediction
      .coarse
      .to_normalized(prediction.input_size, prediction.input_size)?;
    self.draw_normalized_box(image, &coarse, COARSE_COLOR);

    if let Some(refined) = prediction.refined {
      self.draw_normalized_box(image, &refined, REFINED_COLOR);
    }

    Ok(())
  }
}

/// 把预测框写成文本记录: `名称, x, y, width, height`，归一化坐标
pub struct Record;

impl Record {
  pub fn record(
    &self,
    prediction: &Prediction,
    path: &std::path::Path,
  ) -> Result<(), RecordError> {
    let mut records = Vec::new();

    let coarse = prediction
      .coarse
      .to_normalized(prediction.input_size, prediction.input_size)?;
    records.push(format_record("coarse", &coarse));

    if let Some(refined) = prediction.refined {
      records.push(format_record("refined", &refined));
    }
    if let Some(expected) = prediction.expected {
      records.push(format_record("expected", &expected));
    }

    std::fs::write(path.with_extension("txt"), records.join("\n"))?;
    Ok(())
  }
}

fn format_record(name: &str, bbox: &NormalizedBox) -> String {
  format!(
    "{}, {:.4}, {:.4}, {:.4}, {:.4}",
    name, bbox.x, bbox.y, bbox.width, bbox.height
  )
}

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("边界框错误: {0}")]
  BoxError(#[from] BoxError),
}
