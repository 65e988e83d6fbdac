// 该文件是 Haiyan （海眼） 项目的一部分。
// src/nms.rs - 全局非极大值抑制
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

use tracing::debug;

use crate::model::DetectItem;

/// 边界框面积，退化框（宽或高不为正）面积为 0
pub fn area(bbox: &[f32; 4]) -> f32 {
  (bbox[2] - bbox[0]).max(0.0) * (bbox[3] - bbox[1]).max(0.0)
}

/// 计算两个边界框的 IoU
///
/// 并集为 0 时返回 0，因此退化框与任何框的 IoU 都是 0。
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = area(a) + area(b) - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 贪心非极大值抑制，跨类别、跨瓦片全局执行
///
/// 按置信度降序（稳定排序，同分保持输入顺序）依次保留检测框，
/// 并丢弃与已保留框 IoU 大于 `overlap_threshold` 的其余检测框。
/// 输出按置信度降序排列。
pub fn suppress(detections: Vec<DetectItem>, overlap_threshold: f32) -> Vec<DetectItem> {
  if detections.is_empty() {
    return detections;
  }

  let total = detections.len();
  let mut order: Vec<usize> = (0..total).collect();
  order.sort_by(|&a, &b| detections[b].score.total_cmp(&detections[a].score));

  let mut suppressed = vec![false; total];
  let mut kept = Vec::new();
  for (rank, &i) in order.iter().enumerate() {
    if suppressed[i] {
      continue;
    }
    kept.push(i);
    for &j in &order[rank + 1..] {
      if !suppressed[j] && iou(&detections[i].bbox, &detections[j].bbox) > overlap_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!("NMS: {} -> {}", total, kept.len());

  let mut slots: Vec<Option<DetectItem>> = detections.into_iter().map(Some).collect();
  kept.into_iter().filter_map(|i| slots[i].take()).collect()
}
