use actix_web::{HttpRequest, HttpResponse, Result, web};
use serde_json::json;

use crate::handlers::{auth_context, error_response, require_admin};
use crate::models::{
    AnnounceResultsRequest, PlotDetailResponse, PlotListQuery, PlotPageResponse,
    PlotUserDetailResponse, UpdatePlotStatusRequest,
};
use crate::services::PlotService;

#[utoipa::path(
    get,
    path = "/admin/plots",
    tag = "admin_plots",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("limit" = Option<u32>, Query, description = "每页数量 (默认20)"),
        ("status" = Option<String>, Query, description = "状态过滤 (DRAFT/ACTIVE/CLOSED/RESULTS_ANNOUNCED)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "plot 分页列表 (含暂停问题与正确选项)", body = PlotPageResponse),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn get_all_plots(
    service: web::Data<PlotService>,
    req: HttpRequest,
    query: web::Query<PlotListQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.get_all_plots(&query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    get,
    path = "/admin/plots/{plotId}",
    tag = "admin_plots",
    params(
        ("plotId" = i64, Path, description = "plot ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "plot 详情 (含正确选项)", body = PlotDetailResponse),
        (status = 404, description = "plot 不存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn get_plot_by_id(
    service: web::Data<PlotService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.get_plot_by_id(path.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/plots/{plotId}/status",
    tag = "admin_plots",
    params(
        ("plotId" = i64, Path, description = "plot ID")
    ),
    request_body = UpdatePlotStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "状态更新成功", body = PlotDetailResponse),
        (status = 400, description = "已公布结果后不可变更；RESULTS_ANNOUNCED 只能经公布结果进入"),
        (status = 404, description = "plot 不存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
/// DRAFT/ACTIVE/CLOSED 之间的状态流转
pub async fn update_plot_status(
    service: web::Data<PlotService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdatePlotStatusRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service
        .update_status(path.into_inner(), body.into_inner().status)
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/questions/{questionId}/pause",
    tag = "admin_plots",
    params(
        ("questionId" = i64, Path, description = "问题ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "问题已暂停"),
        (status = 404, description = "问题不存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
/// 暂停单个问题：冻结该题的答案收集，不影响 plot 状态
pub async fn pause_question(
    service: web::Data<PlotService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.pause_question(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok()
            .json(json!({ "success": true, "message": "Question paused successfully" }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/questions/{questionId}/unpause",
    tag = "admin_plots",
    params(
        ("questionId" = i64, Path, description = "问题ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "问题已恢复"),
        (status = 404, description = "问题不存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn unpause_question(
    service: web::Data<PlotService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.unpause_question(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok()
            .json(json!({ "success": true, "message": "Question unpaused successfully" }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/plots/announce-results",
    tag = "admin_plots",
    request_body = AnnounceResultsRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "结果公布成功，plot 冻结", body = PlotDetailResponse),
        (status = 400, description = "结果集不完整或引用了不属于该 plot 的问题/选项"),
        (status = 409, description = "结果已公布"),
        (status = 404, description = "plot 不存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
/// 公布结果：写入每题正确选项并把 plot 置为 RESULTS_ANNOUNCED (不可逆)
pub async fn announce_results(
    service: web::Data<PlotService>,
    req: HttpRequest,
    body: web::Json<AnnounceResultsRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.announce_results(body.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    get,
    path = "/plot/active",
    tag = "plot",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("limit" = Option<u32>, Query, description = "每页数量 (默认20)"),
        ("status" = Option<String>, Query, description = "状态过滤；缺省时排除 DRAFT")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "用户可见的 plot 列表 (不含暂停问题)", body = PlotPageResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_active_plots(
    service: web::Data<PlotService>,
    req: HttpRequest,
    query: web::Query<PlotListQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = auth_context(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.get_active_plots(&query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    get,
    path = "/plot/{plotId}",
    tag = "plot",
    params(
        ("plotId" = i64, Path, description = "plot ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "plot 详情 + 预测资格 + 本人预测", body = PlotUserDetailResponse),
        (status = 404, description = "plot 不存在"),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_plot_details(
    service: web::Data<PlotService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(error_response(&req, &e)),
    };

    match service
        .get_plot_details_for_user(path.into_inner(), ctx.id)
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

/// 路由配置 (管理端 plot/问题)
pub fn plot_admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/plots")
            .route("/announce-results", web::post().to(announce_results))
            .route("", web::get().to(get_all_plots))
            .route("/{plot_id}", web::get().to(get_plot_by_id))
            .route("/{plot_id}/status", web::patch().to(update_plot_status)),
    )
    .service(
        web::scope("/admin/questions")
            .route("/{question_id}/pause", web::post().to(pause_question))
            .route("/{question_id}/unpause", web::post().to(unpause_question)),
    );
}

/// 路由配置 (用户端 plot 查看)。
/// /{plot_id} 仅匹配数字段，避免吞掉 /plot/predictions 等路径
pub fn plot_user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/plot")
            .route("/active", web::get().to(get_active_plots))
            .route("/{plot_id:\\d+}", web::get().to(get_plot_details)),
    );
}
