use crate::models::{PlotStatus, PlotType};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "plots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub show_id: i64,
    pub episode_number: i32,
    pub plot_type: PlotType,
    pub number_of_questions: i32,
    pub active_start_date: DateTime<Utc>,
    pub active_start_time: String,
    pub close_end_date: DateTime<Utc>,
    pub close_end_time: String,
    pub status: PlotStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
