// 该文件是 Haiyan （海眼） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod frame;
pub mod geo;
pub mod input;
pub mod model;
pub mod nms;
pub mod output;
pub mod task;
pub mod tiled;
pub mod tiling;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 读取 URL 中的文件路径，并做百分号解码
///
/// 卫星产品名中常带空格与逗号，`url` 会把它们编码进 path。
pub fn url_file_path(url: &url::Url) -> String {
  match urlencoding::decode(url.path()) {
    Ok(path) => path.into_owned(),
    Err(_) => url.path().to_string(),
  }
}

/// 在 URL 查询参数中查找指定键
pub fn url_query(url: &url::Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_percent_encoded_paths() {
    let url = url::Url::parse("image:///data/S2C%20scene,RGB.png").unwrap();
    assert_eq!(url_file_path(&url), "/data/S2C scene,RGB.png");
  }

  #[test]
  fn finds_query_values() {
    let url = url::Url::parse("bright:///?threshold=200&label=vessel").unwrap();
    assert_eq!(url_query(&url, "threshold").as_deref(), Some("200"));
    assert_eq!(url_query(&url, "label").as_deref(), Some("vessel"));
    assert_eq!(url_query(&url, "min_area"), None);
  }
}
