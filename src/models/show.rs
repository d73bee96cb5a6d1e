use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{plot_entity, show_entity};
use crate::models::{PlotDetailResponse, PlotStatus, PlotType, QuestionType};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOptionInput {
    #[schema(example = "Yes")]
    pub option_text: String,
    #[schema(example = 1)]
    pub order: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[schema(example = "Does the couple stay together?")]
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[schema(example = 1)]
    pub order: i32,
    pub options: Vec<QuestionOptionInput>,
}

/// 创建「节目 + 单集 + 问题」打包请求 (multipart 表单解析后的结构)
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShowEpisodeRequest {
    pub thumbnail_url: Option<String>,
    #[schema(example = "Finale")]
    pub title: String,
    #[schema(example = 1)]
    pub season_number: i32,
    #[schema(example = 1)]
    pub episode: i32,
    pub description: Option<String>,
    /// 美分
    #[schema(example = 1000)]
    pub minimum_amount: i64,
    /// 美分
    #[schema(example = 10000)]
    pub maximum_amount: i64,
    /// 美分
    #[schema(example = 50000)]
    pub payout_amount: i64,
    /// 百分比 0-100
    #[schema(example = 5.0)]
    pub plotpicks_vig: f64,
    pub bonus_kicker: bool,
    pub bonus_amount: Option<i64>,
    #[serde(rename = "type")]
    pub plot_type: PlotType,
    pub number_of_questions: i32,
    /// YYYY-MM-DD 或 RFC3339
    #[schema(example = "2025-08-01")]
    pub active_start_date: String,
    /// HH:MM
    #[schema(example = "18:00")]
    pub active_start_time: String,
    #[schema(example = "2025-08-08")]
    pub close_end_date: String,
    #[schema(example = "20:00")]
    pub close_end_time: String,
    pub questions: Vec<QuestionInput>,
}

/// 创建或更新单集的请求：plot 不存在时必须带齐创建所需字段
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShowEpisodeRequest {
    pub thumbnail_url: Option<String>,
    pub title: Option<String>,
    pub season_number: Option<i32>,
    pub description: Option<String>,
    pub minimum_amount: Option<i64>,
    pub maximum_amount: Option<i64>,
    pub payout_amount: Option<i64>,
    pub plotpicks_vig: Option<f64>,
    pub bonus_kicker: Option<bool>,
    pub bonus_amount: Option<i64>,
    #[serde(rename = "type")]
    pub plot_type: Option<PlotType>,
    pub number_of_questions: Option<i32>,
    pub active_start_date: Option<String>,
    pub active_start_time: Option<String>,
    pub close_end_date: Option<String>,
    pub close_end_time: Option<String>,
    pub questions: Option<Vec<QuestionInput>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShowResponse {
    pub id: i64,
    pub thumbnail_url: Option<String>,
    pub title: String,
    pub season_number: i32,
    pub description: Option<String>,
    pub minimum_amount: i64,
    pub maximum_amount: i64,
    pub payout_amount: i64,
    pub plotpicks_vig: f64,
    pub bonus_kicker: bool,
    pub bonus_amount: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<show_entity::Model> for ShowResponse {
    fn from(m: show_entity::Model) -> Self {
        ShowResponse {
            id: m.id,
            thumbnail_url: m.thumbnail_url,
            title: m.title,
            season_number: m.season_number,
            description: m.description,
            minimum_amount: m.minimum_amount,
            maximum_amount: m.maximum_amount,
            payout_amount: m.payout_amount,
            plotpicks_vig: m.plotpicks_vig,
            bonus_kicker: m.bonus_kicker,
            bonus_amount: m.bonus_amount,
            created_at: m.created_at,
        }
    }
}

/// 节目列表里每集只展示的摘要字段
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummaryResponse {
    pub id: i64,
    pub episode_number: i32,
    #[serde(rename = "type")]
    pub plot_type: PlotType,
    pub status: PlotStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<plot_entity::Model> for EpisodeSummaryResponse {
    fn from(m: plot_entity::Model) -> Self {
        EpisodeSummaryResponse {
            id: m.id,
            episode_number: m.episode_number,
            plot_type: m.plot_type,
            status: m.status,
            created_at: m.created_at,
        }
    }
}

/// 节目 + 按集数升序的摘要列表 (管理端列表页)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShowSummaryResponse {
    #[serde(flatten)]
    pub show: ShowResponse,
    pub plots: Vec<EpisodeSummaryResponse>,
}

/// 节目 + 按集数升序的完整单集聚合 (详情页与创建/更新返回值)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShowDetailResponse {
    #[serde(flatten)]
    pub show: ShowResponse,
    pub plots: Vec<PlotDetailResponse>,
}

/// 节目列表分页响应
pub type ShowPageResponse = crate::models::PaginatedResponse<ShowSummaryResponse>;
