use std::collections::HashMap;
use std::sync::OnceLock;

use crate::entities::{plot_entity, plot_prediction_entity, question_entity, question_option_entity, show_entity};
use crate::error::{AppError, AppResult, conflict_on_unique};
use crate::external::StorageService;
use crate::models::{
    CreateShowEpisodeRequest, EpisodeSummaryResponse, PaginatedResponse, PaginationParams,
    PlotDetailResponse, PlotStatus, QuestionInput, ShowDetailResponse, ShowPageResponse,
    ShowSummaryResponse, UpdateShowEpisodeRequest,
};
use crate::services::plot_service::load_questions_for_plots;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};

/// 校验问题集合：数量与声明一致，每种题型选项数固定
pub fn validate_question_inputs(
    questions: &[QuestionInput],
    number_of_questions: i32,
) -> AppResult<()> {
    if questions.len() as i32 != number_of_questions {
        return Err(AppError::ValidationError(
            "Number of questions does not match numberOfQuestions field".to_string(),
        ));
    }

    for question in questions {
        let required = question.question_type.required_option_count();
        if question.options.len() != required {
            return Err(AppError::ValidationError(format!(
                "{} questions must have exactly {} options",
                question.question_type, required
            )));
        }
    }

    Ok(())
}

/// 解析日期字段：接受 RFC3339 或 YYYY-MM-DD (按 UTC 零点)
pub fn parse_date_field(value: &str, field: &str) -> AppResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(AppError::ValidationError(format!(
        "Invalid date for {field}: {value}"
    )))
}

/// HH:MM 格式校验 (时间串只存储展示，不参与窗口比较)
pub fn validate_time_field(value: &str, field: &str) -> AppResult<()> {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    let re = TIME_RE.get_or_init(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap());
    if re.is_match(value) {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!(
            "Invalid time for {field}: {value}, expected HH:MM"
        )))
    }
}

fn validate_amount_fields(minimum: i64, maximum: i64, vig: f64) -> AppResult<()> {
    if maximum < minimum {
        return Err(AppError::ValidationError(
            "maximumAmount must not be less than minimumAmount".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&vig) {
        return Err(AppError::ValidationError(
            "plotpicksVig must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ShowService {
    pool: DatabaseConnection,
    storage: StorageService,
}

impl ShowService {
    pub fn new(pool: DatabaseConnection, storage: StorageService) -> Self {
        Self { pool, storage }
    }

    /// 创建「节目 + 单集 + 问题」。
    /// (title, seasonNumber) 已存在时复用该节目并合并节目级字段；
    /// 集数已存在则拒绝，整个写入在一个事务内。
    pub async fn create_show_with_episode(
        &self,
        data: CreateShowEpisodeRequest,
    ) -> AppResult<ShowDetailResponse> {
        validate_question_inputs(&data.questions, data.number_of_questions)?;
        validate_amount_fields(data.minimum_amount, data.maximum_amount, data.plotpicks_vig)?;
        let active_start_date = parse_date_field(&data.active_start_date, "activeStartDate")?;
        let close_end_date = parse_date_field(&data.close_end_date, "closeEndDate")?;
        validate_time_field(&data.active_start_time, "activeStartTime")?;
        validate_time_field(&data.close_end_time, "closeEndTime")?;
        if close_end_date < active_start_date {
            return Err(AppError::ValidationError(
                "closeEndDate must not be before activeStartDate".to_string(),
            ));
        }

        let existing = show_entity::Entity::find()
            .filter(show_entity::Column::Title.eq(data.title.clone()))
            .filter(show_entity::Column::SeasonNumber.eq(data.season_number))
            .one(&self.pool)
            .await?;

        let txn = self.pool.begin().await?;

        let mut replaced_thumbnail: Option<String> = None;

        let show = if let Some(show) = existing {
            // 节目已存在：合并节目级字段，同名同季不再新建
            let old_thumbnail = show.thumbnail_url.clone();
            let mut am = show.clone().into_active_model();
            if let Some(url) = data.thumbnail_url.as_deref().filter(|u| !u.is_empty()) {
                am.thumbnail_url = Set(Some(url.to_string()));
                if old_thumbnail.as_deref() != Some(url) {
                    replaced_thumbnail = old_thumbnail;
                }
            }
            if let Some(description) = &data.description {
                am.description = Set(Some(description.clone()));
            }
            am.minimum_amount = Set(data.minimum_amount);
            am.maximum_amount = Set(data.maximum_amount);
            am.payout_amount = Set(data.payout_amount);
            am.plotpicks_vig = Set(data.plotpicks_vig);
            am.bonus_kicker = Set(data.bonus_kicker);
            am.bonus_amount = Set(data.bonus_amount);
            am.updated_at = Set(Some(Utc::now()));
            let show = am.update(&txn).await?;

            let duplicate = plot_entity::Entity::find()
                .filter(plot_entity::Column::ShowId.eq(show.id))
                .filter(plot_entity::Column::EpisodeNumber.eq(data.episode))
                .one(&txn)
                .await?;
            if duplicate.is_some() {
                return Err(AppError::Conflict(format!(
                    "Episode {} already exists for this show. Use the update API to modify it.",
                    data.episode
                )));
            }

            show
        } else {
            show_entity::ActiveModel {
                thumbnail_url: Set(data
                    .thumbnail_url
                    .clone()
                    .filter(|u| !u.is_empty())),
                title: Set(data.title.clone()),
                season_number: Set(data.season_number),
                description: Set(data.description.clone()),
                minimum_amount: Set(data.minimum_amount),
                maximum_amount: Set(data.maximum_amount),
                payout_amount: Set(data.payout_amount),
                plotpicks_vig: Set(data.plotpicks_vig),
                bonus_kicker: Set(data.bonus_kicker),
                bonus_amount: Set(data.bonus_amount),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                conflict_on_unique(e, "A show with this title and season already exists")
            })?
        };

        let plot = plot_entity::ActiveModel {
            show_id: Set(show.id),
            episode_number: Set(data.episode),
            plot_type: Set(data.plot_type.clone()),
            number_of_questions: Set(data.number_of_questions),
            active_start_date: Set(active_start_date),
            active_start_time: Set(data.active_start_time.clone()),
            close_end_date: Set(close_end_date),
            close_end_time: Set(data.close_end_time.clone()),
            status: Set(PlotStatus::Draft),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            conflict_on_unique(
                e,
                &format!(
                    "Episode {} already exists for this show. Use the update API to modify it.",
                    data.episode
                ),
            )
        })?;

        insert_questions(&txn, plot.id, &data.questions).await?;

        txn.commit().await?;

        if let Some(old_url) = replaced_thumbnail {
            self.delete_thumbnail_best_effort(&old_url).await;
        }

        log::info!(
            "Created episode {} for show {} ({} questions)",
            data.episode,
            show.id,
            data.number_of_questions
        );

        self.get_show_by_id(show.id).await
    }

    /// 创建或更新指定集：plot 不存在时要求带齐创建所需字段。
    /// 节目字段合并、plot 字段更新与问题整组替换在同一事务内。
    pub async fn update_show_with_episode(
        &self,
        show_id: i64,
        episode_number: i32,
        data: UpdateShowEpisodeRequest,
    ) -> AppResult<ShowDetailResponse> {
        let show = show_entity::Entity::find_by_id(show_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Show not found".to_string()))?;

        let existing_plot = plot_entity::Entity::find()
            .filter(plot_entity::Column::ShowId.eq(show_id))
            .filter(plot_entity::Column::EpisodeNumber.eq(episode_number))
            .one(&self.pool)
            .await?;

        // 先在事务外做纯校验，避免无谓的写入
        let active_start_date = data
            .active_start_date
            .as_deref()
            .map(|v| parse_date_field(v, "activeStartDate"))
            .transpose()?;
        let close_end_date = data
            .close_end_date
            .as_deref()
            .map(|v| parse_date_field(v, "closeEndDate"))
            .transpose()?;
        if let Some(time) = data.active_start_time.as_deref() {
            validate_time_field(time, "activeStartTime")?;
        }
        if let Some(time) = data.close_end_time.as_deref() {
            validate_time_field(time, "closeEndTime")?;
        }

        let txn = self.pool.begin().await?;

        let old_thumbnail = show.thumbnail_url.clone();
        let mut replaced_thumbnail: Option<String> = None;

        let mut show_am = show.into_active_model();
        if let Some(url) = data.thumbnail_url.as_deref().filter(|u| !u.is_empty()) {
            show_am.thumbnail_url = Set(Some(url.to_string()));
            if old_thumbnail.as_deref() != Some(url) {
                replaced_thumbnail = old_thumbnail;
            }
        }
        if let Some(title) = &data.title {
            show_am.title = Set(title.clone());
        }
        if let Some(season_number) = data.season_number {
            show_am.season_number = Set(season_number);
        }
        if let Some(description) = &data.description {
            show_am.description = Set(Some(description.clone()));
        }
        if let Some(minimum_amount) = data.minimum_amount {
            show_am.minimum_amount = Set(minimum_amount);
        }
        if let Some(maximum_amount) = data.maximum_amount {
            show_am.maximum_amount = Set(maximum_amount);
        }
        if let Some(payout_amount) = data.payout_amount {
            show_am.payout_amount = Set(payout_amount);
        }
        if let Some(plotpicks_vig) = data.plotpicks_vig {
            show_am.plotpicks_vig = Set(plotpicks_vig);
        }
        if let Some(bonus_kicker) = data.bonus_kicker {
            show_am.bonus_kicker = Set(bonus_kicker);
        }
        if let Some(bonus_amount) = data.bonus_amount {
            show_am.bonus_amount = Set(Some(bonus_amount));
        }
        show_am.updated_at = Set(Some(Utc::now()));
        let updated_show = show_am.update(&txn).await?;

        validate_amount_fields(
            updated_show.minimum_amount,
            updated_show.maximum_amount,
            updated_show.plotpicks_vig,
        )?;

        match existing_plot {
            Some(plot) => {
                if plot.status == PlotStatus::ResultsAnnounced {
                    return Err(AppError::ValidationError(
                        "Cannot update plot after results are announced".to_string(),
                    ));
                }

                if let Some(questions) = &data.questions {
                    // 问题整组替换只允许在没有任何预测时进行
                    let prediction_count = plot_prediction_entity::Entity::find()
                        .filter(plot_prediction_entity::Column::PlotId.eq(plot.id))
                        .count(&txn)
                        .await?;
                    if prediction_count > 0 {
                        return Err(AppError::ValidationError(
                            "Cannot update questions that have predictions".to_string(),
                        ));
                    }

                    let expected = data
                        .number_of_questions
                        .unwrap_or(questions.len() as i32);
                    validate_question_inputs(questions, expected)?;

                    replace_questions(&txn, plot.id, questions).await?;
                } else if let Some(number_of_questions) = data.number_of_questions {
                    // 只改计数不改问题时，计数必须与现有问题数一致
                    let question_count = question_entity::Entity::find()
                        .filter(question_entity::Column::PlotId.eq(plot.id))
                        .count(&txn)
                        .await?;
                    if number_of_questions as u64 != question_count {
                        return Err(AppError::ValidationError(
                            "Number of questions does not match the plot's question count"
                                .to_string(),
                        ));
                    }
                }

                let mut plot_am = plot.into_active_model();
                if let Some(plot_type) = &data.plot_type {
                    plot_am.plot_type = Set(plot_type.clone());
                }
                if let Some(number_of_questions) = data.number_of_questions {
                    plot_am.number_of_questions = Set(number_of_questions);
                }
                if let Some(date) = active_start_date {
                    plot_am.active_start_date = Set(date);
                }
                if let Some(time) = &data.active_start_time {
                    plot_am.active_start_time = Set(time.clone());
                }
                if let Some(date) = close_end_date {
                    plot_am.close_end_date = Set(date);
                }
                if let Some(time) = &data.close_end_time {
                    plot_am.close_end_time = Set(time.clone());
                }
                plot_am.updated_at = Set(Some(Utc::now()));
                plot_am.update(&txn).await?;
            }
            None => {
                // 该集不存在：转为创建，必须带齐全部字段
                let (
                    Some(questions),
                    Some(plot_type),
                    Some(number_of_questions),
                    Some(active_start_date),
                    Some(active_start_time),
                    Some(close_end_date),
                    Some(close_end_time),
                ) = (
                    data.questions.as_ref(),
                    data.plot_type.as_ref(),
                    data.number_of_questions,
                    active_start_date,
                    data.active_start_time.as_ref(),
                    close_end_date,
                    data.close_end_time.as_ref(),
                )
                else {
                    return Err(AppError::ValidationError(
                        "questions, type, numberOfQuestions, activeStartDate, activeStartTime, \
                         closeEndDate and closeEndTime are required when creating a new episode"
                            .to_string(),
                    ));
                };

                validate_question_inputs(questions, number_of_questions)?;

                let plot = plot_entity::ActiveModel {
                    show_id: Set(show_id),
                    episode_number: Set(episode_number),
                    plot_type: Set(plot_type.clone()),
                    number_of_questions: Set(number_of_questions),
                    active_start_date: Set(active_start_date),
                    active_start_time: Set(active_start_time.clone()),
                    close_end_date: Set(close_end_date),
                    close_end_time: Set(close_end_time.clone()),
                    status: Set(PlotStatus::Draft),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;

                insert_questions(&txn, plot.id, questions).await?;
            }
        }

        txn.commit().await?;

        if let Some(old_url) = replaced_thumbnail {
            self.delete_thumbnail_best_effort(&old_url).await;
        }

        self.get_show_by_id(show_id).await
    }

    /// 管理端节目列表：节目倒序，每个节目附按集数升序的单集摘要
    pub async fn get_all_shows(&self, params: &PaginationParams) -> AppResult<ShowPageResponse> {
        let total = show_entity::Entity::find().count(&self.pool).await? as i64;

        let shows = show_entity::Entity::find()
            .order_by(show_entity::Column::CreatedAt, Order::Desc)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        let show_ids: Vec<i64> = shows.iter().map(|s| s.id).collect();
        let mut episodes_by_show: HashMap<i64, Vec<EpisodeSummaryResponse>> = HashMap::new();
        if !show_ids.is_empty() {
            let plots = plot_entity::Entity::find()
                .filter(plot_entity::Column::ShowId.is_in(show_ids))
                .order_by_asc(plot_entity::Column::EpisodeNumber)
                .all(&self.pool)
                .await?;
            for plot in plots {
                episodes_by_show
                    .entry(plot.show_id)
                    .or_default()
                    .push(plot.into());
            }
        }

        let items: Vec<ShowSummaryResponse> = shows
            .into_iter()
            .map(|show| {
                let plots = episodes_by_show.remove(&show.id).unwrap_or_default();
                ShowSummaryResponse {
                    show: show.into(),
                    plots,
                }
            })
            .collect();

        Ok(PaginatedResponse::new(items, params, total))
    }

    /// 节目详情：全部单集 (按集数升序)，含问题与选项
    pub async fn get_show_by_id(&self, show_id: i64) -> AppResult<ShowDetailResponse> {
        let show = show_entity::Entity::find_by_id(show_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Show not found".to_string()))?;

        let plots = plot_entity::Entity::find()
            .filter(plot_entity::Column::ShowId.eq(show_id))
            .order_by_asc(plot_entity::Column::EpisodeNumber)
            .all(&self.pool)
            .await?;

        let plot_ids: Vec<i64> = plots.iter().map(|p| p.id).collect();
        let mut questions_by_plot = load_questions_for_plots(&self.pool, &plot_ids, true).await?;

        let plots = plots
            .into_iter()
            .map(|plot| {
                let questions = questions_by_plot.remove(&plot.id).unwrap_or_default();
                PlotDetailResponse::from_parts(plot, None, questions)
            })
            .collect();

        Ok(ShowDetailResponse {
            show: show.into(),
            plots,
        })
    }

    /// 删除节目 (任一单集已有预测则拒绝)；缩略图删除为 best-effort
    pub async fn delete_show(&self, show_id: i64) -> AppResult<()> {
        let show = show_entity::Entity::find_by_id(show_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Show not found".to_string()))?;

        let plot_ids: Vec<i64> = plot_entity::Entity::find()
            .filter(plot_entity::Column::ShowId.eq(show_id))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        if !plot_ids.is_empty() {
            let prediction_count = plot_prediction_entity::Entity::find()
                .filter(plot_prediction_entity::Column::PlotId.is_in(plot_ids))
                .count(&self.pool)
                .await?;
            if prediction_count > 0 {
                return Err(AppError::Forbidden(
                    "Cannot delete a show with existing predictions".to_string(),
                ));
            }
        }

        // plot/问题/选项经外键级联删除
        show_entity::Entity::delete_by_id(show_id)
            .exec(&self.pool)
            .await?;

        if let Some(url) = &show.thumbnail_url {
            self.delete_thumbnail_best_effort(url).await;
        }

        log::info!("Deleted show {}", show_id);

        Ok(())
    }

    /// 删除单集 (已有预测或已公布结果则拒绝)
    pub async fn delete_episode(&self, show_id: i64, episode_number: i32) -> AppResult<()> {
        let plot = plot_entity::Entity::find()
            .filter(plot_entity::Column::ShowId.eq(show_id))
            .filter(plot_entity::Column::EpisodeNumber.eq(episode_number))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Episode not found".to_string()))?;

        if plot.status == PlotStatus::ResultsAnnounced {
            return Err(AppError::Forbidden(
                "Cannot delete an episode after results are announced".to_string(),
            ));
        }

        let prediction_count = plot_prediction_entity::Entity::find()
            .filter(plot_prediction_entity::Column::PlotId.eq(plot.id))
            .count(&self.pool)
            .await?;
        if prediction_count > 0 {
            return Err(AppError::Forbidden(
                "Cannot delete an episode with existing predictions".to_string(),
            ));
        }

        plot_entity::Entity::delete_by_id(plot.id)
            .exec(&self.pool)
            .await?;

        log::info!("Deleted episode {} of show {}", episode_number, show_id);

        Ok(())
    }

    async fn delete_thumbnail_best_effort(&self, url: &str) {
        match self.storage.extract_key_from_url(url) {
            Ok(key) => {
                if let Err(e) = self.storage.delete(&key).await {
                    log::error!("Failed to delete thumbnail {key}: {e:?}");
                }
            }
            Err(e) => {
                log::warn!("Skipping thumbnail cleanup for {url}: {e:?}");
            }
        }
    }
}

/// 按输入顺序插入问题与选项
async fn insert_questions<C: ConnectionTrait>(
    conn: &C,
    plot_id: i64,
    questions: &[QuestionInput],
) -> AppResult<()> {
    for question_data in questions {
        let question = question_entity::ActiveModel {
            plot_id: Set(plot_id),
            question_text: Set(question_data.question_text.clone()),
            question_type: Set(question_data.question_type.clone()),
            order: Set(question_data.order),
            is_paused: Set(false),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        for option_data in &question_data.options {
            question_option_entity::ActiveModel {
                question_id: Set(question.id),
                option_text: Set(option_data.option_text.clone()),
                order: Set(option_data.order),
                ..Default::default()
            }
            .insert(conn)
            .await?;
        }
    }

    Ok(())
}

/// 整组替换：先删旧选项和问题，再插入新集合。
/// 仅在确认没有任何预测时调用，不会留下悬挂的选择记录。
async fn replace_questions<C: ConnectionTrait>(
    conn: &C,
    plot_id: i64,
    questions: &[QuestionInput],
) -> AppResult<()> {
    let old_question_ids: Vec<i64> = question_entity::Entity::find()
        .filter(question_entity::Column::PlotId.eq(plot_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|q| q.id)
        .collect();

    if !old_question_ids.is_empty() {
        question_option_entity::Entity::delete_many()
            .filter(question_option_entity::Column::QuestionId.is_in(old_question_ids))
            .exec(conn)
            .await?;
        question_entity::Entity::delete_many()
            .filter(question_entity::Column::PlotId.eq(plot_id))
            .exec(conn)
            .await?;
    }

    insert_questions(conn, plot_id, questions).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionOptionInput, QuestionType};

    fn question(question_type: QuestionType, option_count: usize) -> QuestionInput {
        QuestionInput {
            question_text: "q".to_string(),
            question_type,
            order: 1,
            options: (0..option_count)
                .map(|i| QuestionOptionInput {
                    option_text: format!("option {i}"),
                    order: i as i32 + 1,
                })
                .collect(),
        }
    }

    #[test]
    fn test_question_inputs_valid() {
        let questions = vec![
            question(QuestionType::YesNo, 2),
            question(QuestionType::MultipleChoice, 4),
        ];
        assert!(validate_question_inputs(&questions, 2).is_ok());
    }

    #[test]
    fn test_question_count_mismatch() {
        let questions = vec![question(QuestionType::YesNo, 2)];
        assert!(validate_question_inputs(&questions, 3).is_err());
    }

    #[test]
    fn test_yes_no_requires_two_options() {
        let questions = vec![question(QuestionType::YesNo, 3)];
        assert!(validate_question_inputs(&questions, 1).is_err());
    }

    #[test]
    fn test_multiple_choice_requires_four_options() {
        let questions = vec![question(QuestionType::MultipleChoice, 2)];
        assert!(validate_question_inputs(&questions, 1).is_err());
    }

    #[test]
    fn test_parse_date_field() {
        assert!(parse_date_field("2025-08-01", "activeStartDate").is_ok());
        assert!(parse_date_field("2025-08-01T18:00:00Z", "activeStartDate").is_ok());
        assert!(parse_date_field("08/01/2025", "activeStartDate").is_err());
        assert!(parse_date_field("not-a-date", "activeStartDate").is_err());
    }

    #[test]
    fn test_validate_time_field() {
        assert!(validate_time_field("00:00", "activeStartTime").is_ok());
        assert!(validate_time_field("23:59", "closeEndTime").is_ok());
        assert!(validate_time_field("24:00", "closeEndTime").is_err());
        assert!(validate_time_field("7:30", "closeEndTime").is_err());
        assert!(validate_time_field("18h00", "closeEndTime").is_err());
    }

    #[test]
    fn test_amount_fields() {
        assert!(validate_amount_fields(1000, 10000, 5.0).is_ok());
        assert!(validate_amount_fields(10000, 1000, 5.0).is_err());
        assert!(validate_amount_fields(1000, 10000, 120.0).is_err());
    }
}
