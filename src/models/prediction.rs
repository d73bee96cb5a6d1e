use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{plot_prediction_entity, question_entity, question_option_entity};
use crate::models::{PlotResponse, ShowResponse};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionInput {
    pub question_id: i64,
    pub option_id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePredictionRequest {
    pub plot_id: i64,
    /// 美分，必须落在节目的 [minimumAmount, maximumAmount] 区间
    pub predicted_amount: i64,
    /// 每个未暂停问题恰好一条选择
    pub selections: Vec<SelectionInput>,
}

/// 单题选择明细 (公布结果后附带 correctOptionId)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub question_id: i64,
    pub question_text: String,
    pub question_order: i32,
    pub option_id: i64,
    pub option_text: String,
    pub correct_option_id: Option<i64>,
}

impl SelectionResponse {
    pub fn from_parts(
        question: &question_entity::Model,
        option: &question_option_entity::Model,
    ) -> Self {
        SelectionResponse {
            question_id: question.id,
            question_text: question.question_text.clone(),
            question_order: question.order,
            option_id: option.id,
            option_text: option.option_text.clone(),
            correct_option_id: question.correct_option_id,
        }
    }
}

/// 用户预测聚合：金额 + 按问题顺序排列的选择
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub id: i64,
    pub plot_id: i64,
    pub predicted_amount: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub selections: Vec<SelectionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot: Option<PlotResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<ShowResponse>,
}

impl PredictionResponse {
    pub fn from_parts(
        prediction: plot_prediction_entity::Model,
        mut selections: Vec<SelectionResponse>,
        plot: Option<PlotResponse>,
        show: Option<ShowResponse>,
    ) -> Self {
        selections.sort_by_key(|s| s.question_order);
        PredictionResponse {
            id: prediction.id,
            plot_id: prediction.plot_id,
            predicted_amount: prediction.predicted_amount,
            created_at: prediction.created_at,
            selections,
            plot,
            show,
        }
    }
}

/// 「我参与过的 plot」列表项：plot 聚合 + 本人预测
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPlotResponse {
    #[serde(flatten)]
    pub plot: crate::models::PlotDetailResponse,
    pub user_prediction: Option<PredictionResponse>,
}

/// 预测列表分页响应
pub type PredictionPageResponse = crate::models::PaginatedResponse<PredictionResponse>;

/// 「我参与过的 plot」分页响应
pub type UserPlotPageResponse = crate::models::PaginatedResponse<UserPlotResponse>;
