use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use futures_util::TryStreamExt;
use serde_json::{Value, json};

use crate::error::{AppError, AppResult};
use crate::external::StorageService;
use crate::handlers::{error_response, require_admin};
use crate::models::{
    CreateShowEpisodeRequest, PaginationParams, ShowDetailResponse, ShowPageResponse,
    UpdateShowEpisodeRequest,
};
use crate::services::ShowService;

const MAX_THUMBNAIL_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_IMAGE_TYPES: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

struct ThumbnailFile {
    bytes: Vec<u8>,
    content_type: String,
    filename: String,
}

struct ParsedShowForm {
    fields: serde_json::Map<String, Value>,
    thumbnail: Option<ThumbnailFile>,
}

/// multipart 表单字段到 JSON 的类型还原：
/// questions 是内嵌 JSON，数字/布尔字段以文本提交
fn text_field_to_json(name: &str, value: String) -> AppResult<Value> {
    match name {
        "questions" => serde_json::from_str(&value).map_err(|_| {
            AppError::ValidationError("Invalid JSON format for questions field".to_string())
        }),
        "seasonNumber" | "episode" | "numberOfQuestions" | "minimumAmount" | "maximumAmount"
        | "payoutAmount" | "bonusAmount" => value
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| AppError::ValidationError(format!("Invalid numeric value for {name}"))),
        "plotpicksVig" => value
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| AppError::ValidationError(format!("Invalid numeric value for {name}"))),
        "bonusKicker" => Ok(Value::Bool(value.trim() == "true")),
        _ => Ok(Value::String(value)),
    }
}

fn validate_image_content_type(content_type: &str) -> AppResult<()> {
    let subtype = content_type.rsplit('/').next().unwrap_or_default();
    if ALLOWED_IMAGE_TYPES.contains(&subtype) {
        Ok(())
    } else {
        Err(AppError::ValidationError(
            "Thumbnail must be a jpg, jpeg, png, gif or webp image".to_string(),
        ))
    }
}

async fn parse_show_form(mut payload: Multipart) -> AppResult<ParsedShowForm> {
    let mut fields = serde_json::Map::new();
    let mut thumbnail: Option<ThumbnailFile> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::ValidationError(format!("Invalid multipart payload: {e}")))?
    {
        let name = field.name().to_string();

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::ValidationError(format!("Invalid multipart payload: {e}")))?
        {
            bytes.extend_from_slice(&chunk);
            if name == "thumbnail" && bytes.len() > MAX_THUMBNAIL_BYTES {
                return Err(AppError::ValidationError(
                    "Thumbnail exceeds the 5MB size limit".to_string(),
                ));
            }
        }

        if name == "thumbnail" {
            if bytes.is_empty() {
                continue;
            }
            let content_type = field
                .content_type()
                .map(|m| m.to_string())
                .unwrap_or_default();
            validate_image_content_type(&content_type)?;
            let filename = field
                .content_disposition()
                .get_filename()
                .unwrap_or("thumbnail")
                .to_string();
            thumbnail = Some(ThumbnailFile {
                bytes,
                content_type,
                filename,
            });
        } else {
            let text = String::from_utf8(bytes).map_err(|_| {
                AppError::ValidationError(format!("Field {name} is not valid UTF-8"))
            })?;
            fields.insert(name.clone(), text_field_to_json(&name, text)?);
        }
    }

    Ok(ParsedShowForm { fields, thumbnail })
}

async fn upload_thumbnail(
    storage: &StorageService,
    file: ThumbnailFile,
) -> AppResult<String> {
    let key = storage.generate_key("admin/shows", "show", &file.filename, "show");
    storage.upload(file.bytes, &key, &file.content_type).await
}

#[utoipa::path(
    post,
    path = "/admin/shows",
    tag = "admin_shows",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建节目+单集+问题成功", body = ShowDetailResponse),
        (status = 400, description = "问题数量/选项数量/窗口字段非法"),
        (status = 409, description = "该节目下集数已存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
/// 创建「节目 + 单集 + 问题」打包 (multipart，缩略图可选)。
/// 同名同季节目已存在时合并节目级字段并追加新一集。
pub async fn create_show(
    service: web::Data<ShowService>,
    storage: web::Data<StorageService>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    let parsed = match parse_show_form(payload).await {
        Ok(parsed) => parsed,
        Err(e) => return Ok(error_response(&req, &e)),
    };

    let mut fields = parsed.fields;
    if let Some(file) = parsed.thumbnail {
        match upload_thumbnail(storage.get_ref(), file).await {
            Ok(url) => {
                fields.insert("thumbnailUrl".to_string(), Value::String(url));
            }
            Err(e) => return Ok(error_response(&req, &e)),
        }
    } else {
        // 未上传文件时不允许覆盖缩略图
        fields.remove("thumbnailUrl");
    }

    let body: CreateShowEpisodeRequest = match serde_json::from_value(Value::Object(fields)) {
        Ok(body) => body,
        Err(e) => {
            let err = AppError::ValidationError(format!("Invalid request body: {e}"));
            return Ok(error_response(&req, &err));
        }
    };

    match service.create_show_with_episode(body).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/shows/{showId}/episodes/{episodeNumber}",
    tag = "admin_shows",
    params(
        ("showId" = i64, Path, description = "节目ID"),
        ("episodeNumber" = i32, Path, description = "集数 (>=1)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新或创建单集成功", body = ShowDetailResponse),
        (status = 400, description = "已公布结果 / 已有预测时改题 / 字段非法"),
        (status = 404, description = "节目不存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
/// 创建或更新指定集 (multipart)。plot 不存在时必须带齐创建所需字段；
/// 问题整组替换仅在该集没有任何预测时允许。
pub async fn update_show_episode(
    service: web::Data<ShowService>,
    storage: web::Data<StorageService>,
    req: HttpRequest,
    path: web::Path<(i64, i32)>,
    payload: Multipart,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    let (show_id, episode_number) = path.into_inner();
    if episode_number < 1 {
        let err = AppError::ValidationError("Invalid episode number".to_string());
        return Ok(error_response(&req, &err));
    }

    let parsed = match parse_show_form(payload).await {
        Ok(parsed) => parsed,
        Err(e) => return Ok(error_response(&req, &e)),
    };

    let mut fields = parsed.fields;
    if let Some(file) = parsed.thumbnail {
        match upload_thumbnail(storage.get_ref(), file).await {
            Ok(url) => {
                fields.insert("thumbnailUrl".to_string(), Value::String(url));
            }
            Err(e) => return Ok(error_response(&req, &e)),
        }
    } else {
        fields.remove("thumbnailUrl");
    }

    let body: UpdateShowEpisodeRequest = match serde_json::from_value(Value::Object(fields)) {
        Ok(body) => body,
        Err(e) => {
            let err = AppError::ValidationError(format!("Invalid request body: {e}"));
            return Ok(error_response(&req, &err));
        }
    };

    match service
        .update_show_with_episode(show_id, episode_number, body)
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    get,
    path = "/admin/shows",
    tag = "admin_shows",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("limit" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "节目分页列表", body = ShowPageResponse),
        (status = 403, description = "需要管理员权限")
    )
)]
/// 管理端节目分页列表 (每个节目附按集数升序的单集摘要)
pub async fn get_all_shows(
    service: web::Data<ShowService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.get_all_shows(&query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    get,
    path = "/admin/shows/{showId}",
    tag = "admin_shows",
    params(
        ("showId" = i64, Path, description = "节目ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "节目详情 (全部单集与问题)", body = ShowDetailResponse),
        (status = 404, description = "节目不存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn get_show_by_id(
    service: web::Data<ShowService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.get_show_by_id(path.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/shows/{showId}",
    tag = "admin_shows",
    params(
        ("showId" = i64, Path, description = "节目ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 403, description = "任一单集已有预测时拒绝"),
        (status = 404, description = "节目不存在")
    )
)]
/// 级联删除节目；缩略图清理为 best-effort
pub async fn delete_show(
    service: web::Data<ShowService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    match service.delete_show(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok()
            .json(json!({ "success": true, "message": "Show deleted successfully" }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/shows/{showId}/episodes/{episodeNumber}",
    tag = "admin_shows",
    params(
        ("showId" = i64, Path, description = "节目ID"),
        ("episodeNumber" = i32, Path, description = "集数")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 403, description = "已有预测或已公布结果时拒绝"),
        (status = 404, description = "单集不存在")
    )
)]
pub async fn delete_episode(
    service: web::Data<ShowService>,
    req: HttpRequest,
    path: web::Path<(i64, i32)>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(error_response(&req, &e));
    }

    let (show_id, episode_number) = path.into_inner();
    match service.delete_episode(show_id, episode_number).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": format!("Episode {episode_number} deleted successfully")
        }))),
        Err(e) => Ok(error_response(&req, &e)),
    }
}

/// 路由配置 (管理端节目)
pub fn show_admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/shows")
            .route("", web::post().to(create_show))
            .route("", web::get().to(get_all_shows))
            .route("/{show_id}", web::get().to(get_show_by_id))
            .route("/{show_id}", web::delete().to(delete_show))
            .route(
                "/{show_id}/episodes/{episode_number}",
                web::patch().to(update_show_episode),
            )
            .route(
                "/{show_id}/episodes/{episode_number}",
                web::delete().to(delete_episode),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_field_coercion() {
        assert_eq!(
            text_field_to_json("seasonNumber", "3".to_string()).unwrap(),
            Value::from(3)
        );
        assert_eq!(
            text_field_to_json("plotpicksVig", "7.5".to_string()).unwrap(),
            Value::from(7.5)
        );
        assert_eq!(
            text_field_to_json("bonusKicker", "true".to_string()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            text_field_to_json("title", "Finale".to_string()).unwrap(),
            Value::String("Finale".to_string())
        );
    }

    #[test]
    fn test_questions_field_must_be_json() {
        assert!(text_field_to_json("questions", "[{\"questionText\":\"q\"}]".to_string()).is_ok());
        assert!(text_field_to_json("questions", "not json".to_string()).is_err());
    }

    #[test]
    fn test_invalid_numeric_field_rejected() {
        assert!(text_field_to_json("episode", "one".to_string()).is_err());
    }

    #[test]
    fn test_image_content_types() {
        assert!(validate_image_content_type("image/png").is_ok());
        assert!(validate_image_content_type("image/webp").is_ok());
        assert!(validate_image_content_type("application/pdf").is_err());
        assert!(validate_image_content_type("image/svg+xml").is_err());
    }
}
