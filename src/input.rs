// 该文件是 Idscan （识卡） 项目的一部分。
// src/input.rs - 张量输入
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

use crate::{FromUrl, FromUrlWithScheme, tensor::OutputTensor};

mod json_tensor_file;
pub use self::json_tensor_file::{JsonTensorFileError, JsonTensorFileInput};

mod raw_tensor_file;
pub use self::raw_tensor_file::{RawTensorFileError, RawTensorFileFrames, RawTensorFileInput};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("原始张量文件输入错误: {0}")]
  RawTensorFileError(#[from] RawTensorFileError),
  #[error("JSON 张量文件输入错误: {0}")]
  JsonTensorFileError(#[from] JsonTensorFileError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  RawTensorFile(RawTensorFileInput),
  JsonTensorFile(JsonTensorFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      RawTensorFileInput::SCHEME => Ok(InputWrapper::RawTensorFile(
        RawTensorFileInput::from_url(url)?,
      )),
      JsonTensorFileInput::SCHEME => Ok(InputWrapper::JsonTensorFile(
        JsonTensorFileInput::from_url(url)?,
      )),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl InputWrapper {
  pub fn into_tensors(self) -> InputWrapperIter {
    match self {
      InputWrapper::RawTensorFile(input) => InputWrapperIter::RawTensorFile(input.into_tensors()),
      InputWrapper::JsonTensorFile(input) => {
        InputWrapperIter::JsonTensorFile(input.into_tensors())
      }
    }
  }
}

pub enum InputWrapperIter {
  RawTensorFile(RawTensorFileFrames),
  JsonTensorFile(std::vec::IntoIter<OutputTensor>),
}

impl Iterator for InputWrapperIter {
  type Item = OutputTensor;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapperIter::RawTensorFile(input) => input.next(),
      InputWrapperIter::JsonTensorFile(input) => input.next(),
    }
  }
}
