// 该文件是 Wangge （网格） 项目的一部分。
// src/output/mod.rs - 输出模块
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

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "save_image_file")]
pub mod draw;
#[cfg(feature = "save_image_file")]
mod save_image_file;

#[cfg(feature = "directory_record")]
pub use directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};
#[cfg(feature = "save_image_file")]
pub use save_image_file::{SaveImageFileError, SaveImageFileOutput};

use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(feature = "save_image_file")]
use crate::FromUrlWithScheme;

pub trait Render<F, D>: Sized {
  type Error;
  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("不支持的输出方案: {0}")]
  UnsupportedScheme(String),
  #[cfg(feature = "save_image_file")]
  #[error("图像文件输出错误: {0}")]
  SaveImageFile(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecord(#[from] DirectoryRecordOutputError),
}

/// 按 URL 方案分发的输出包装
pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFile(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecord(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let scheme = url.scheme();

    #[cfg(feature = "save_image_file")]
    if scheme == SaveImageFileOutput::SCHEME {
      return Ok(OutputWrapper::SaveImageFile(SaveImageFileOutput::from_url(
        url,
      )?));
    }

    #[cfg(feature = "directory_record")]
    if scheme == DirectoryRecordOutput::SCHEME {
      return Ok(OutputWrapper::DirectoryRecord(
        DirectoryRecordOutput::from_url(url)?,
      ));
    }

    Err(OutputError::UnsupportedScheme(scheme.to_string()))
  }
}

#[cfg(feature = "save_image_file")]
impl Render<image::RgbImage, crate::task::Prediction> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &image::RgbImage,
    result: &crate::task::Prediction,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFile(output) => output.render_result(frame, result)?,
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => output.render_result(frame, result)?,
    }
    Ok(())
  }
}
