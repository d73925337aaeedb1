//! # 命令层
//!
//! 命令层仅做入参接收与结果整形，不承载业务逻辑。
//! 所有实际处理交由 `ImageCopyService`，输出统一为可序列化的 `CopyCommandResult`。

use serde::Serialize;

use super::{CopyOutcome, CopyReport, CopyStage, ImageCopyService};

/// 复制命令的对外结果。
#[derive(Debug, Clone, Serialize)]
pub struct CopyCommandResult {
    /// `copied` / `superseded` / `failed`
    pub status: &'static str,
    pub code: Option<&'static str>,
    pub stage: Option<CopyStage>,
    pub message: String,
    pub report: Option<CopyReport>,
}

impl CopyCommandResult {
    pub fn is_failure(&self) -> bool {
        self.status == "failed"
    }
}

impl From<CopyOutcome> for CopyCommandResult {
    fn from(outcome: CopyOutcome) -> Self {
        match outcome {
            CopyOutcome::Copied(report) => Self {
                status: "copied",
                code: None,
                stage: Some(CopyStage::Succeeded),
                message: "图片已复制到剪贴板".to_string(),
                report: Some(report),
            },
            CopyOutcome::Superseded { generation } => Self {
                status: "superseded",
                code: None,
                stage: None,
                message: format!("请求 #{} 已被更新的复制请求取代", generation),
                report: None,
            },
            CopyOutcome::Failed(error) => Self {
                status: "failed",
                code: Some(error.code()),
                stage: Some(error.stage()),
                message: error.to_string(),
                report: None,
            },
        }
    }
}

/// 下载图片并复制到系统剪贴板。
pub async fn copy_image(
    service: &ImageCopyService,
    request_id: &str,
    declared_name: &str,
    url: &str,
) -> CopyCommandResult {
    service.copy(request_id, declared_name, url).await.into()
}

/// 取消进行中的复制请求。
pub fn cancel_copy(service: &ImageCopyService, request_id: &str) -> CopyCommandResult {
    if service.cancel(request_id) {
        CopyCommandResult {
            status: "cancelled",
            code: None,
            stage: None,
            message: format!("已取消请求 {}", request_id),
            report: None,
        }
    } else {
        CopyCommandResult {
            status: "not_found",
            code: None,
            stage: None,
            message: format!("未找到进行中的请求 {}", request_id),
            report: None,
        }
    }
}
