use std::collections::{HashMap, HashSet};

use crate::entities::{plot_entity, question_entity, question_option_entity, show_entity};
use crate::error::{AppError, AppResult};
use crate::models::{
    AnnounceResultsRequest, PaginatedResponse, PaginationParams, PlotDetailResponse, PlotListQuery,
    PlotPageResponse, PlotStatus, PlotUserDetailResponse, QuestionResponse,
};
use crate::services::PredictionService;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};

/// 判断 plot 当前是否接受预测。
/// 状态必须为 ACTIVE 且当前时间落在 [activeStartDate, closeEndDate]。
// TODO: 确认产品侧窗口语义后把 active_start_time/close_end_time 组合进比较，
// 目前与线上行为一致，只按日期字段判断。
pub fn is_predictable(plot: &plot_entity::Model, now: DateTime<Utc>) -> bool {
    plot.status == PlotStatus::Active
        && plot.active_start_date <= now
        && plot.close_end_date >= now
}

/// 状态流转约束：RESULTS_ANNOUNCED 为终态，且只能经由公布结果进入
pub fn ensure_status_transition(current: &PlotStatus, target: &PlotStatus) -> AppResult<()> {
    if *current == PlotStatus::ResultsAnnounced {
        return Err(AppError::ValidationError(
            "Cannot change status after results are announced".to_string(),
        ));
    }
    if *target == PlotStatus::ResultsAnnounced {
        return Err(AppError::ValidationError(
            "Results can only be announced via the announce-results endpoint".to_string(),
        ));
    }
    Ok(())
}

/// 校验公布结果的提交集合：每个问题恰好一条结果，且选项属于对应问题
pub fn validate_announce_results(
    options_by_question: &HashMap<i64, HashSet<i64>>,
    results: &[crate::models::QuestionResultInput],
) -> AppResult<()> {
    if results.len() != options_by_question.len() {
        return Err(AppError::ValidationError(
            "Results must be provided for all questions".to_string(),
        ));
    }

    let mut seen: HashSet<i64> = HashSet::new();
    for result in results {
        let options = options_by_question.get(&result.question_id).ok_or_else(|| {
            AppError::ValidationError(format!(
                "Question {} not found in plot",
                result.question_id
            ))
        })?;

        if !seen.insert(result.question_id) {
            return Err(AppError::ValidationError(format!(
                "Duplicate result for question {}",
                result.question_id
            )));
        }

        if !options.contains(&result.correct_option_id) {
            return Err(AppError::ValidationError(format!(
                "Option {} not found for question {}",
                result.correct_option_id, result.question_id
            )));
        }
    }

    Ok(())
}

/// 加载若干 plot 的问题聚合 (选项按 order 升序)，按 plot_id 分组
pub(crate) async fn load_questions_for_plots<C: ConnectionTrait>(
    conn: &C,
    plot_ids: &[i64],
    include_paused: bool,
) -> AppResult<HashMap<i64, Vec<QuestionResponse>>> {
    if plot_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query = question_entity::Entity::find()
        .filter(question_entity::Column::PlotId.is_in(plot_ids.to_vec()));
    if !include_paused {
        query = query.filter(question_entity::Column::IsPaused.eq(false));
    }
    let questions = query
        .order_by_asc(question_entity::Column::Order)
        .all(conn)
        .await?;

    let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    let mut options_by_question: HashMap<i64, Vec<question_option_entity::Model>> = HashMap::new();
    if !question_ids.is_empty() {
        let options = question_option_entity::Entity::find()
            .filter(question_option_entity::Column::QuestionId.is_in(question_ids))
            .order_by_asc(question_option_entity::Column::Order)
            .all(conn)
            .await?;
        for option in options {
            options_by_question
                .entry(option.question_id)
                .or_default()
                .push(option);
        }
    }

    let mut grouped: HashMap<i64, Vec<QuestionResponse>> = HashMap::new();
    for question in questions {
        let options = options_by_question.remove(&question.id).unwrap_or_default();
        grouped
            .entry(question.plot_id)
            .or_default()
            .push(QuestionResponse::from_parts(question, options));
    }

    Ok(grouped)
}

#[derive(Clone)]
pub struct PlotService {
    pool: DatabaseConnection,
    prediction_service: PredictionService,
}

impl PlotService {
    pub fn new(pool: DatabaseConnection, prediction_service: PredictionService) -> Self {
        Self {
            pool,
            prediction_service,
        }
    }

    /// 管理端状态流转 (DRAFT/ACTIVE/CLOSED 之间)
    pub async fn update_status(
        &self,
        plot_id: i64,
        target: PlotStatus,
    ) -> AppResult<PlotDetailResponse> {
        let plot = plot_entity::Entity::find_by_id(plot_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Plot not found".to_string()))?;

        ensure_status_transition(&plot.status, &target)?;

        let mut am = plot.into_active_model();
        am.status = Set(target.clone());
        am.updated_at = Set(Some(Utc::now()));
        let updated = am.update(&self.pool).await?;

        log::info!("Plot {} status changed to {}", plot_id, target);

        self.load_detail(updated, true).await
    }

    /// 暂停单个问题：不影响 plot 状态，只阻止新的选择引用它
    pub async fn pause_question(&self, question_id: i64) -> AppResult<()> {
        self.set_question_paused(question_id, true).await
    }

    pub async fn unpause_question(&self, question_id: i64) -> AppResult<()> {
        self.set_question_paused(question_id, false).await
    }

    async fn set_question_paused(&self, question_id: i64, paused: bool) -> AppResult<()> {
        let question = question_entity::Entity::find_by_id(question_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

        let mut am = question.into_active_model();
        am.is_paused = Set(paused);
        am.updated_at = Set(Some(Utc::now()));
        am.update(&self.pool).await?;

        Ok(())
    }

    /// 公布结果：写入每题正确选项并把 plot 冻结为 RESULTS_ANNOUNCED。
    /// 写入与状态变更在同一事务内，要么全部生效要么都不生效。
    pub async fn announce_results(
        &self,
        data: AnnounceResultsRequest,
    ) -> AppResult<PlotDetailResponse> {
        let plot = plot_entity::Entity::find_by_id(data.plot_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Plot not found".to_string()))?;

        if plot.status == PlotStatus::ResultsAnnounced {
            return Err(AppError::Conflict(
                "Results already announced for this plot".to_string(),
            ));
        }

        // 公布结果覆盖全部问题，包括已暂停的
        let questions = question_entity::Entity::find()
            .filter(question_entity::Column::PlotId.eq(plot.id))
            .all(&self.pool)
            .await?;

        let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let mut options_by_question: HashMap<i64, HashSet<i64>> =
            question_ids.iter().map(|id| (*id, HashSet::new())).collect();
        if !question_ids.is_empty() {
            let options = question_option_entity::Entity::find()
                .filter(question_option_entity::Column::QuestionId.is_in(question_ids))
                .all(&self.pool)
                .await?;
            for option in options {
                options_by_question
                    .entry(option.question_id)
                    .or_default()
                    .insert(option.id);
            }
        }

        validate_announce_results(&options_by_question, &data.results)?;

        let txn = self.pool.begin().await?;

        for result in &data.results {
            let question = questions
                .iter()
                .find(|q| q.id == result.question_id)
                .cloned()
                .ok_or_else(|| {
                    AppError::ValidationError(format!(
                        "Question {} not found in plot",
                        result.question_id
                    ))
                })?;
            let mut am = question.into_active_model();
            am.correct_option_id = Set(Some(result.correct_option_id));
            am.updated_at = Set(Some(Utc::now()));
            am.update(&txn).await?;
        }

        let mut plot_am = plot.into_active_model();
        plot_am.status = Set(PlotStatus::ResultsAnnounced);
        plot_am.updated_at = Set(Some(Utc::now()));
        let updated = plot_am.update(&txn).await?;

        txn.commit().await?;

        log::info!("Results announced for plot {}", data.plot_id);

        self.load_detail(updated, true).await
    }

    /// 管理端 plot 列表 (可按状态过滤，含暂停问题与正确选项)
    pub async fn get_all_plots(&self, query: &PlotListQuery) -> AppResult<PlotPageResponse> {
        let mut base = plot_entity::Entity::find();
        if let Some(status) = &query.status {
            base = base.filter(plot_entity::Column::Status.eq(status.clone()));
        }
        self.paginate_plots(base, &PaginationParams::new(query.page, query.limit), true)
            .await
    }

    /// 管理端 plot 详情 (含正确选项)
    pub async fn get_plot_by_id(&self, plot_id: i64) -> AppResult<PlotDetailResponse> {
        let plot = plot_entity::Entity::find_by_id(plot_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Plot not found".to_string()))?;

        self.load_detail(plot, true).await
    }

    /// 用户端 plot 列表：默认隐藏 DRAFT，只返回未暂停的问题
    pub async fn get_active_plots(&self, query: &PlotListQuery) -> AppResult<PlotPageResponse> {
        let mut base = plot_entity::Entity::find();
        if let Some(status) = &query.status {
            base = base.filter(plot_entity::Column::Status.eq(status.clone()));
        } else {
            base = base.filter(plot_entity::Column::Status.ne(PlotStatus::Draft));
        }
        self.paginate_plots(base, &PaginationParams::new(query.page, query.limit), false)
            .await
    }

    /// 用户端 plot 详情：附带预测资格与本人已提交的预测
    pub async fn get_plot_details_for_user(
        &self,
        plot_id: i64,
        user_id: i64,
    ) -> AppResult<PlotUserDetailResponse> {
        let plot = plot_entity::Entity::find_by_id(plot_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Plot not found".to_string()))?;

        let is_active = is_predictable(&plot, Utc::now());
        let user_prediction = self
            .prediction_service
            .find_user_prediction(plot_id, user_id)
            .await?;
        let can_predict = is_active && user_prediction.is_none();

        let detail = self.load_detail(plot, false).await?;

        Ok(PlotUserDetailResponse {
            plot: detail,
            is_active,
            can_predict,
            user_prediction,
        })
    }

    async fn paginate_plots(
        &self,
        base: sea_orm::Select<plot_entity::Entity>,
        params: &PaginationParams,
        include_paused: bool,
    ) -> AppResult<PlotPageResponse> {
        let total = base.clone().count(&self.pool).await? as i64;

        let plots = base
            .order_by(plot_entity::Column::CreatedAt, Order::Desc)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        let plot_ids: Vec<i64> = plots.iter().map(|p| p.id).collect();
        let mut questions_by_plot =
            load_questions_for_plots(&self.pool, &plot_ids, include_paused).await?;

        let show_ids: Vec<i64> = plots.iter().map(|p| p.show_id).collect();
        let shows: HashMap<i64, show_entity::Model> = if show_ids.is_empty() {
            HashMap::new()
        } else {
            show_entity::Entity::find()
                .filter(show_entity::Column::Id.is_in(show_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|s| (s.id, s))
                .collect()
        };

        let items: Vec<PlotDetailResponse> = plots
            .into_iter()
            .map(|plot| {
                let questions = questions_by_plot.remove(&plot.id).unwrap_or_default();
                let show = shows.get(&plot.show_id).cloned().map(Into::into);
                PlotDetailResponse::from_parts(plot, show, questions)
            })
            .collect();

        Ok(PaginatedResponse::new(items, params, total))
    }

    async fn load_detail(
        &self,
        plot: plot_entity::Model,
        include_paused: bool,
    ) -> AppResult<PlotDetailResponse> {
        let show = show_entity::Entity::find_by_id(plot.show_id)
            .one(&self.pool)
            .await?
            .map(Into::into);

        let mut questions_by_plot =
            load_questions_for_plots(&self.pool, &[plot.id], include_paused).await?;
        let questions = questions_by_plot.remove(&plot.id).unwrap_or_default();

        Ok(PlotDetailResponse::from_parts(plot, show, questions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlotType, QuestionResultInput};
    use chrono::Duration;

    fn test_plot(status: PlotStatus, starts_in_days: i64, closes_in_days: i64) -> plot_entity::Model {
        let now = Utc::now();
        plot_entity::Model {
            id: 1,
            show_id: 1,
            episode_number: 1,
            plot_type: PlotType::Standard,
            number_of_questions: 1,
            active_start_date: now + Duration::days(starts_in_days),
            active_start_time: "18:00".to_string(),
            close_end_date: now + Duration::days(closes_in_days),
            close_end_time: "20:00".to_string(),
            status,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    #[test]
    fn test_predictable_inside_window() {
        let plot = test_plot(PlotStatus::Active, -1, 1);
        assert!(is_predictable(&plot, Utc::now()));
    }

    #[test]
    fn test_not_predictable_when_draft() {
        let plot = test_plot(PlotStatus::Draft, -1, 1);
        assert!(!is_predictable(&plot, Utc::now()));
    }

    #[test]
    fn test_not_predictable_outside_window() {
        let not_started = test_plot(PlotStatus::Active, 1, 2);
        assert!(!is_predictable(&not_started, Utc::now()));

        let closed = test_plot(PlotStatus::Active, -3, -1);
        assert!(!is_predictable(&closed, Utc::now()));
    }

    #[test]
    fn test_status_transition_rules() {
        assert!(ensure_status_transition(&PlotStatus::Draft, &PlotStatus::Active).is_ok());
        assert!(ensure_status_transition(&PlotStatus::Active, &PlotStatus::Closed).is_ok());
        assert!(ensure_status_transition(&PlotStatus::Closed, &PlotStatus::Active).is_ok());

        // 终态之后一律拒绝
        assert!(
            ensure_status_transition(&PlotStatus::ResultsAnnounced, &PlotStatus::Active).is_err()
        );
        // 公布结果不走状态接口
        assert!(
            ensure_status_transition(&PlotStatus::Active, &PlotStatus::ResultsAnnounced).is_err()
        );
    }

    fn options_map() -> HashMap<i64, HashSet<i64>> {
        let mut map = HashMap::new();
        map.insert(1, HashSet::from([10, 11]));
        map.insert(2, HashSet::from([20, 21, 22, 23]));
        map
    }

    #[test]
    fn test_announce_results_accepts_complete_set() {
        let results = vec![
            QuestionResultInput {
                question_id: 1,
                correct_option_id: 11,
            },
            QuestionResultInput {
                question_id: 2,
                correct_option_id: 20,
            },
        ];
        assert!(validate_announce_results(&options_map(), &results).is_ok());
    }

    #[test]
    fn test_announce_results_rejects_count_mismatch() {
        let results = vec![QuestionResultInput {
            question_id: 1,
            correct_option_id: 11,
        }];
        assert!(validate_announce_results(&options_map(), &results).is_err());
    }

    #[test]
    fn test_announce_results_rejects_foreign_question() {
        let results = vec![
            QuestionResultInput {
                question_id: 1,
                correct_option_id: 11,
            },
            QuestionResultInput {
                question_id: 99,
                correct_option_id: 20,
            },
        ];
        assert!(validate_announce_results(&options_map(), &results).is_err());
    }

    #[test]
    fn test_announce_results_rejects_foreign_option() {
        let results = vec![
            QuestionResultInput {
                question_id: 1,
                correct_option_id: 20, // 属于问题2
            },
            QuestionResultInput {
                question_id: 2,
                correct_option_id: 21,
            },
        ];
        assert!(validate_announce_results(&options_map(), &results).is_err());
    }

    #[test]
    fn test_announce_results_rejects_duplicate_question() {
        let results = vec![
            QuestionResultInput {
                question_id: 1,
                correct_option_id: 10,
            },
            QuestionResultInput {
                question_id: 1,
                correct_option_id: 11,
            },
        ];
        assert!(validate_announce_results(&options_map(), &results).is_err());
    }
}
