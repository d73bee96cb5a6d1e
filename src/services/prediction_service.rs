use std::collections::{HashMap, HashSet};

use crate::entities::{
    plot_entity, plot_prediction_entity, question_entity, question_option_entity,
    question_prediction_entity, show_entity,
};
use crate::error::{AppError, AppResult, conflict_on_unique};
use crate::models::{
    CreatePredictionRequest, PaginatedResponse, PaginationParams, PlotDetailResponse,
    PredictionPageResponse, PredictionResponse, SelectionInput, SelectionResponse,
    UserPlotPageResponse, UserPlotResponse,
};
use crate::services::plot_service::{is_predictable, load_questions_for_plots};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// 校验预测的选择集合必须与未暂停问题一一对应：
/// 不缺、不重、不引用外部问题/选项、不引用已暂停问题
pub fn validate_selections(
    open_question_ids: &HashSet<i64>,
    paused_question_ids: &HashSet<i64>,
    options_by_question: &HashMap<i64, HashSet<i64>>,
    selections: &[SelectionInput],
) -> AppResult<()> {
    if selections.len() != open_question_ids.len() {
        return Err(AppError::ValidationError(format!(
            "You must provide selections for all {} questions",
            open_question_ids.len()
        )));
    }

    let mut seen: HashSet<i64> = HashSet::new();
    for selection in selections {
        if paused_question_ids.contains(&selection.question_id) {
            return Err(AppError::ValidationError(format!(
                "Question {} is paused",
                selection.question_id
            )));
        }

        if !open_question_ids.contains(&selection.question_id) {
            return Err(AppError::ValidationError(format!(
                "Question {} does not belong to this plot",
                selection.question_id
            )));
        }

        if !seen.insert(selection.question_id) {
            return Err(AppError::ValidationError(
                "Duplicate question selections are not allowed".to_string(),
            ));
        }

        let valid_options = options_by_question
            .get(&selection.question_id)
            .ok_or_else(|| {
                AppError::ValidationError(format!(
                    "Question {} does not belong to this plot",
                    selection.question_id
                ))
            })?;

        if !valid_options.contains(&selection.option_id) {
            return Err(AppError::ValidationError(format!(
                "Option {} does not belong to question {}",
                selection.option_id, selection.question_id
            )));
        }
    }

    Ok(())
}

#[derive(Clone)]
pub struct PredictionService {
    pool: DatabaseConnection,
}

impl PredictionService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 提交预测 (每用户每 plot 仅一次)。
    ///
    /// 1. plot 必须存在且处于可预测窗口
    /// 2. 金额必须在节目的 [minimum, maximum] 区间内
    /// 3. 选择集合与未暂停问题一一对应
    /// 4. 主记录与每题选择在同一事务内写入
    /// 并发重复提交由 (user_id, plot_id) 唯一索引兜底，失败方收到 Conflict。
    pub async fn create_prediction(
        &self,
        user_id: i64,
        data: CreatePredictionRequest,
    ) -> AppResult<PredictionResponse> {
        let plot = plot_entity::Entity::find_by_id(data.plot_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Plot not found".to_string()))?;

        if !is_predictable(&plot, Utc::now()) {
            return Err(AppError::ValidationError(
                "Plot is not active or outside prediction window".to_string(),
            ));
        }

        let show = show_entity::Entity::find_by_id(plot.show_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Show not found".to_string()))?;

        if data.predicted_amount < show.minimum_amount
            || data.predicted_amount > show.maximum_amount
        {
            return Err(AppError::ValidationError(format!(
                "Predicted amount must be between {} and {}",
                show.minimum_amount, show.maximum_amount
            )));
        }

        // 先给出友好错误；并发竞争交给唯一索引
        let existing = plot_prediction_entity::Entity::find()
            .filter(plot_prediction_entity::Column::UserId.eq(user_id))
            .filter(plot_prediction_entity::Column::PlotId.eq(data.plot_id))
            .one(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(
                "You have already predicted on this plot".to_string(),
            ));
        }

        let questions = question_entity::Entity::find()
            .filter(question_entity::Column::PlotId.eq(plot.id))
            .all(&self.pool)
            .await?;

        let open_ids: HashSet<i64> = questions
            .iter()
            .filter(|q| !q.is_paused)
            .map(|q| q.id)
            .collect();
        let paused_ids: HashSet<i64> = questions
            .iter()
            .filter(|q| q.is_paused)
            .map(|q| q.id)
            .collect();

        let mut options_by_question: HashMap<i64, HashSet<i64>> =
            open_ids.iter().map(|id| (*id, HashSet::new())).collect();
        if !open_ids.is_empty() {
            let options = question_option_entity::Entity::find()
                .filter(
                    question_option_entity::Column::QuestionId
                        .is_in(open_ids.iter().copied().collect::<Vec<i64>>()),
                )
                .all(&self.pool)
                .await?;
            for option in options {
                options_by_question
                    .entry(option.question_id)
                    .or_default()
                    .insert(option.id);
            }
        }

        validate_selections(&open_ids, &paused_ids, &options_by_question, &data.selections)?;

        let txn = self.pool.begin().await?;

        let prediction = plot_prediction_entity::ActiveModel {
            user_id: Set(user_id),
            plot_id: Set(data.plot_id),
            predicted_amount: Set(data.predicted_amount),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| conflict_on_unique(e, "You have already predicted on this plot"))?;

        for selection in &data.selections {
            question_prediction_entity::ActiveModel {
                plot_prediction_id: Set(prediction.id),
                question_id: Set(selection.question_id),
                option_id: Set(selection.option_id),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        let mut selections_by_prediction =
            load_selections(&self.pool, &[prediction.id]).await?;
        let selections = selections_by_prediction.remove(&prediction.id).unwrap_or_default();

        Ok(PredictionResponse::from_parts(
            prediction,
            selections,
            Some(plot.into()),
            Some(show.into()),
        ))
    }

    /// 查询某用户对某 plot 的预测聚合 (plot 详情页内嵌使用)
    pub async fn find_user_prediction(
        &self,
        plot_id: i64,
        user_id: i64,
    ) -> AppResult<Option<PredictionResponse>> {
        let prediction = plot_prediction_entity::Entity::find()
            .filter(plot_prediction_entity::Column::PlotId.eq(plot_id))
            .filter(plot_prediction_entity::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?;

        let Some(prediction) = prediction else {
            return Ok(None);
        };

        let mut selections_by_prediction =
            load_selections(&self.pool, &[prediction.id]).await?;
        let selections = selections_by_prediction.remove(&prediction.id).unwrap_or_default();

        Ok(Some(PredictionResponse::from_parts(
            prediction, selections, None, None,
        )))
    }

    /// 我的预测列表 (倒序，含 plot 与节目信息)
    pub async fn get_user_predictions(
        &self,
        user_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PredictionPageResponse> {
        let base = plot_prediction_entity::Entity::find()
            .filter(plot_prediction_entity::Column::UserId.eq(user_id));

        let total = base.clone().count(&self.pool).await? as i64;

        let predictions = base
            .order_by(plot_prediction_entity::Column::CreatedAt, Order::Desc)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        let prediction_ids: Vec<i64> = predictions.iter().map(|p| p.id).collect();
        let mut selections_by_prediction =
            load_selections(&self.pool, &prediction_ids).await?;

        let plot_ids: Vec<i64> = predictions.iter().map(|p| p.plot_id).collect();
        let plots: HashMap<i64, plot_entity::Model> = if plot_ids.is_empty() {
            HashMap::new()
        } else {
            plot_entity::Entity::find()
                .filter(plot_entity::Column::Id.is_in(plot_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let show_ids: Vec<i64> = plots.values().map(|p| p.show_id).collect();
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

        let items: Vec<PredictionResponse> = predictions
            .into_iter()
            .map(|prediction| {
                let selections = selections_by_prediction
                    .remove(&prediction.id)
                    .unwrap_or_default();
                let plot = plots.get(&prediction.plot_id).cloned();
                let show = plot
                    .as_ref()
                    .and_then(|p| shows.get(&p.show_id).cloned())
                    .map(Into::into);
                PredictionResponse::from_parts(prediction, selections, plot.map(Into::into), show)
            })
            .collect();

        Ok(PaginatedResponse::new(items, params, total))
    }

    /// 我参与过的 plot 列表 (含本人预测与全部问题/正确选项)
    pub async fn get_user_plots(
        &self,
        user_id: i64,
        params: &PaginationParams,
    ) -> AppResult<UserPlotPageResponse> {
        let predictions = plot_prediction_entity::Entity::find()
            .filter(plot_prediction_entity::Column::UserId.eq(user_id))
            .all(&self.pool)
            .await?;

        if predictions.is_empty() {
            return Ok(PaginatedResponse::new(vec![], params, 0));
        }

        let predictions_by_plot: HashMap<i64, plot_prediction_entity::Model> = predictions
            .into_iter()
            .map(|p| (p.plot_id, p))
            .collect();
        let plot_ids: Vec<i64> = predictions_by_plot.keys().copied().collect();
        let total = plot_ids.len() as i64;

        let plots = plot_entity::Entity::find()
            .filter(plot_entity::Column::Id.is_in(plot_ids.clone()))
            .order_by(plot_entity::Column::CreatedAt, Order::Desc)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        let page_plot_ids: Vec<i64> = plots.iter().map(|p| p.id).collect();
        let mut questions_by_plot =
            load_questions_for_plots(&self.pool, &page_plot_ids, true).await?;

        let show_ids: Vec<i64> = plots.iter().map(|p| p.show_id).collect();
        let shows: HashMap<i64, show_entity::Model> = show_entity::Entity::find()
            .filter(show_entity::Column::Id.is_in(show_ids))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let prediction_ids: Vec<i64> = plots
            .iter()
            .filter_map(|p| predictions_by_plot.get(&p.id).map(|pred| pred.id))
            .collect();
        let mut selections_by_prediction =
            load_selections(&self.pool, &prediction_ids).await?;

        let items: Vec<UserPlotResponse> = plots
            .into_iter()
            .map(|plot| {
                let questions = questions_by_plot.remove(&plot.id).unwrap_or_default();
                let show = shows.get(&plot.show_id).cloned().map(Into::into);
                let user_prediction = predictions_by_plot.get(&plot.id).map(|prediction| {
                    let selections = selections_by_prediction
                        .remove(&prediction.id)
                        .unwrap_or_default();
                    PredictionResponse::from_parts(prediction.clone(), selections, None, None)
                });
                UserPlotResponse {
                    plot: PlotDetailResponse::from_parts(plot, show, questions),
                    user_prediction,
                }
            })
            .collect();

        Ok(PaginatedResponse::new(items, params, total))
    }
}

/// 加载若干预测的每题选择明细，按预测 id 分组
async fn load_selections<C: ConnectionTrait>(
    conn: &C,
    prediction_ids: &[i64],
) -> AppResult<HashMap<i64, Vec<SelectionResponse>>> {
    if prediction_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let question_predictions = question_prediction_entity::Entity::find()
        .filter(
            question_prediction_entity::Column::PlotPredictionId
                .is_in(prediction_ids.to_vec()),
        )
        .all(conn)
        .await?;

    let question_ids: Vec<i64> = question_predictions.iter().map(|qp| qp.question_id).collect();
    let option_ids: Vec<i64> = question_predictions.iter().map(|qp| qp.option_id).collect();

    let questions: HashMap<i64, question_entity::Model> = if question_ids.is_empty() {
        HashMap::new()
    } else {
        question_entity::Entity::find()
            .filter(question_entity::Column::Id.is_in(question_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect()
    };

    let options: HashMap<i64, question_option_entity::Model> = if option_ids.is_empty() {
        HashMap::new()
    } else {
        question_option_entity::Entity::find()
            .filter(question_option_entity::Column::Id.is_in(option_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect()
    };

    let mut grouped: HashMap<i64, Vec<SelectionResponse>> = HashMap::new();
    for qp in question_predictions {
        let (Some(question), Some(option)) =
            (questions.get(&qp.question_id), options.get(&qp.option_id))
        else {
            // 选择引用的问题/选项已不存在，只可能是历史数据被手工清理过
            log::warn!(
                "Dangling question prediction {} (question {}, option {})",
                qp.id,
                qp.question_id,
                qp.option_id
            );
            continue;
        };
        grouped
            .entry(qp.plot_prediction_id)
            .or_default()
            .push(SelectionResponse::from_parts(question, option));
    }

    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (HashSet<i64>, HashSet<i64>, HashMap<i64, HashSet<i64>>) {
        let open: HashSet<i64> = HashSet::from([1, 2]);
        let paused: HashSet<i64> = HashSet::from([3]);
        let mut options = HashMap::new();
        options.insert(1, HashSet::from([10, 11]));
        options.insert(2, HashSet::from([20, 21, 22, 23]));
        (open, paused, options)
    }

    #[test]
    fn test_selections_accept_exact_cover() {
        let (open, paused, options) = fixture();
        let selections = vec![
            SelectionInput {
                question_id: 1,
                option_id: 10,
            },
            SelectionInput {
                question_id: 2,
                option_id: 23,
            },
        ];
        assert!(validate_selections(&open, &paused, &options, &selections).is_ok());
    }

    #[test]
    fn test_selections_reject_missing_question() {
        let (open, paused, options) = fixture();
        let selections = vec![SelectionInput {
            question_id: 1,
            option_id: 10,
        }];
        assert!(validate_selections(&open, &paused, &options, &selections).is_err());
    }

    #[test]
    fn test_selections_reject_duplicates() {
        let (open, paused, options) = fixture();
        let selections = vec![
            SelectionInput {
                question_id: 1,
                option_id: 10,
            },
            SelectionInput {
                question_id: 1,
                option_id: 11,
            },
        ];
        assert!(validate_selections(&open, &paused, &options, &selections).is_err());
    }

    #[test]
    fn test_selections_reject_foreign_question() {
        let (open, paused, options) = fixture();
        let selections = vec![
            SelectionInput {
                question_id: 1,
                option_id: 10,
            },
            SelectionInput {
                question_id: 99,
                option_id: 20,
            },
        ];
        assert!(validate_selections(&open, &paused, &options, &selections).is_err());
    }

    #[test]
    fn test_selections_reject_foreign_option() {
        let (open, paused, options) = fixture();
        let selections = vec![
            SelectionInput {
                question_id: 1,
                option_id: 20, // 选项属于问题2
            },
            SelectionInput {
                question_id: 2,
                option_id: 21,
            },
        ];
        assert!(validate_selections(&open, &paused, &options, &selections).is_err());
    }

    #[test]
    fn test_selections_reject_paused_question() {
        let (open, paused, options) = fixture();
        // 引用已暂停的问题3
        let selections = vec![
            SelectionInput {
                question_id: 1,
                option_id: 10,
            },
            SelectionInput {
                question_id: 3,
                option_id: 30,
            },
        ];
        let err = validate_selections(&open, &paused, &options, &selections).unwrap_err();
        assert!(err.to_string().contains("paused"));
    }

    #[test]
    fn test_selections_reject_reduced_set_still_referencing_paused() {
        // 问题1被暂停后，提交只需覆盖问题2；但引用问题1依然拒绝
        let open: HashSet<i64> = HashSet::from([2]);
        let paused: HashSet<i64> = HashSet::from([1]);
        let mut options = HashMap::new();
        options.insert(2, HashSet::from([20, 21]));

        let ok = vec![SelectionInput {
            question_id: 2,
            option_id: 20,
        }];
        assert!(validate_selections(&open, &paused, &options, &ok).is_ok());

        let stale = vec![SelectionInput {
            question_id: 1,
            option_id: 10,
        }];
        assert!(validate_selections(&open, &paused, &options, &stale).is_err());
    }
}
