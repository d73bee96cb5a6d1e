use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{plot_entity, question_entity, question_option_entity};
use crate::models::{PredictionResponse, ShowResponse};

/// Plot 状态机: DRAFT -> ACTIVE/CLOSED -> RESULTS_ANNOUNCED (终态)
#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlotStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
    #[sea_orm(string_value = "RESULTS_ANNOUNCED")]
    ResultsAnnounced,
}

impl std::fmt::Display for PlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlotStatus::Draft => write!(f, "DRAFT"),
            PlotStatus::Active => write!(f, "ACTIVE"),
            PlotStatus::Closed => write!(f, "CLOSED"),
            PlotStatus::ResultsAnnounced => write!(f, "RESULTS_ANNOUNCED"),
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlotType {
    #[sea_orm(string_value = "STANDARD")]
    Standard,
    #[sea_orm(string_value = "FINALE")]
    Finale,
}

impl std::fmt::Display for PlotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlotType::Standard => write!(f, "STANDARD"),
            PlotType::Finale => write!(f, "FINALE"),
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    #[sea_orm(string_value = "YES_NO")]
    YesNo,
    #[sea_orm(string_value = "MULTIPLE_CHOICE")]
    MultipleChoice,
}

impl QuestionType {
    /// 每种题型固定的选项数量
    pub fn required_option_count(&self) -> usize {
        match self {
            QuestionType::YesNo => 2,
            QuestionType::MultipleChoice => 4,
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionType::YesNo => write!(f, "YES_NO"),
            QuestionType::MultipleChoice => write!(f, "MULTIPLE_CHOICE"),
        }
    }
}

/// Plot 列表查询参数
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PlotListQuery {
    /// 页码 (默认 1)
    pub page: Option<u32>,
    /// 每页数量 (默认 20)
    pub limit: Option<u32>,
    /// 按状态过滤
    pub status: Option<PlotStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOptionResponse {
    pub id: i64,
    pub option_text: String,
    pub order: i32,
}

impl From<question_option_entity::Model> for QuestionOptionResponse {
    fn from(m: question_option_entity::Model) -> Self {
        QuestionOptionResponse {
            id: m.id,
            option_text: m.option_text,
            order: m.order,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub id: i64,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub order: i32,
    pub is_paused: bool,
    /// 公布结果前为 null
    pub correct_option_id: Option<i64>,
    pub options: Vec<QuestionOptionResponse>,
}

impl QuestionResponse {
    pub fn from_parts(
        question: question_entity::Model,
        options: Vec<question_option_entity::Model>,
    ) -> Self {
        QuestionResponse {
            id: question.id,
            question_text: question.question_text,
            question_type: question.question_type,
            order: question.order,
            is_paused: question.is_paused,
            correct_option_id: question.correct_option_id,
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlotResponse {
    pub id: i64,
    pub show_id: i64,
    pub episode_number: i32,
    #[serde(rename = "type")]
    pub plot_type: PlotType,
    pub number_of_questions: i32,
    pub active_start_date: DateTime<Utc>,
    pub active_start_time: String,
    pub close_end_date: DateTime<Utc>,
    pub close_end_time: String,
    pub status: PlotStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<plot_entity::Model> for PlotResponse {
    fn from(m: plot_entity::Model) -> Self {
        PlotResponse {
            id: m.id,
            show_id: m.show_id,
            episode_number: m.episode_number,
            plot_type: m.plot_type,
            number_of_questions: m.number_of_questions,
            active_start_date: m.active_start_date,
            active_start_time: m.active_start_time,
            close_end_date: m.close_end_date,
            close_end_time: m.close_end_time,
            status: m.status,
            created_at: m.created_at,
        }
    }
}

/// Plot 聚合 (含节目与按 order 升序的问题列表)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlotDetailResponse {
    pub id: i64,
    pub show_id: i64,
    pub episode_number: i32,
    #[serde(rename = "type")]
    pub plot_type: PlotType,
    pub number_of_questions: i32,
    pub active_start_date: DateTime<Utc>,
    pub active_start_time: String,
    pub close_end_date: DateTime<Utc>,
    pub close_end_time: String,
    pub status: PlotStatus,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<ShowResponse>,
    pub questions: Vec<QuestionResponse>,
}

impl PlotDetailResponse {
    pub fn from_parts(
        plot: plot_entity::Model,
        show: Option<ShowResponse>,
        questions: Vec<QuestionResponse>,
    ) -> Self {
        PlotDetailResponse {
            id: plot.id,
            show_id: plot.show_id,
            episode_number: plot.episode_number,
            plot_type: plot.plot_type,
            number_of_questions: plot.number_of_questions,
            active_start_date: plot.active_start_date,
            active_start_time: plot.active_start_time,
            close_end_date: plot.close_end_date,
            close_end_time: plot.close_end_time,
            status: plot.status,
            created_at: plot.created_at,
            show,
            questions,
        }
    }
}

/// 用户视角的 plot 详情：附带预测资格与本人预测
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlotUserDetailResponse {
    #[serde(flatten)]
    pub plot: PlotDetailResponse,
    pub is_active: bool,
    pub can_predict: bool,
    pub user_prediction: Option<PredictionResponse>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlotStatusRequest {
    pub status: PlotStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResultInput {
    pub question_id: i64,
    pub correct_option_id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceResultsRequest {
    pub plot_id: i64,
    pub results: Vec<QuestionResultInput>,
}

/// Plot 列表分页响应
pub type PlotPageResponse = crate::models::PaginatedResponse<PlotDetailResponse>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_wire_format() {
        let json = serde_json::to_string(&PlotStatus::ResultsAnnounced).unwrap();
        assert_eq!(json, "\"RESULTS_ANNOUNCED\"");

        let parsed: PlotStatus = serde_json::from_str("\"DRAFT\"").unwrap();
        assert_eq!(parsed, PlotStatus::Draft);
    }

    #[test]
    fn test_question_type_option_counts() {
        assert_eq!(QuestionType::YesNo.required_option_count(), 2);
        assert_eq!(QuestionType::MultipleChoice.required_option_count(), 4);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(serde_json::from_str::<PlotStatus>("\"OPEN\"").is_err());
    }
}
