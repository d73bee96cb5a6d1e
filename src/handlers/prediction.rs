use actix_web::{HttpRequest, HttpResponse, Result, web};
use serde_json::json;

use crate::handlers::{auth_context, error_response};
use crate::models::{CreatePredictionRequest, PaginationParams, PredictionPageResponse, PredictionResponse};
use crate::services::PredictionService;

#[utoipa::path(
    post,
    path = "/plot/predictions",
    tag = "prediction",
    request_body = CreatePredictionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "预测提交成功", body = PredictionResponse),
        (status = 400, description = "不在预测窗口 / 金额越界 / 选择集合与未暂停问题不一致"),
        (status = 404, description = "plot 不存在"),
        (status = 409, description = "该用户已对此 plot 提交过预测"),
        (status = 401, description = "未授权")
    )
)]
/// 提交预测：金额 + 每个未暂停问题一条选择，整体原子写入
pub async fn create_prediction(
    service: web::Data<PredictionService>,
    req: HttpRequest,
    body: web::Json<CreatePredictionRequest>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(error_response(&req, &e)),
    };

    match service.create_prediction(ctx.id, body.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    get,
    path = "/plot/predictions/my",
    tag = "prediction",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("limit" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我的预测分页列表 (倒序)", body = PredictionPageResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_my_predictions(
    service: web::Data<PredictionService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(error_response(&req, &e)),
    };

    match service
        .get_user_predictions(ctx.id, &query.into_inner())
        .await
    {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    get,
    path = "/plot/my/plots",
    tag = "prediction",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("limit" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我参与过的 plot 分页列表"),
        (status = 401, description = "未授权")
    )
)]
/// 我参与过的 plot (含本人预测与公布后的正确选项)
pub async fn get_my_plots(
    service: web::Data<PredictionService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(error_response(&req, &e)),
    };

    match service.get_user_plots(ctx.id, &query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

/// 路由配置 (用户端预测)
pub fn prediction_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/plot")
            .route("/predictions", web::post().to(create_prediction))
            .route("/predictions/my", web::get().to(get_my_predictions))
            .route("/my/plots", web::get().to(get_my_plots)),
    );
}
