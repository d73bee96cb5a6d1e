use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shows")]
pub struct Model {
    #[sea_orm(primary_key)]
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
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
