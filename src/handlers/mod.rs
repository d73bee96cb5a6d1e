pub mod health;
pub mod plot;
pub mod prediction;
pub mod show;

pub use health::health_config;
pub use plot::{plot_admin_config, plot_user_config};
pub use prediction::prediction_config;
pub use show::show_admin_config;

use crate::error::{AppError, AppResult};
use crate::middlewares::AuthContext;
use crate::utils::Role;
use actix_web::{HttpMessage, HttpRequest, HttpResponse};

/// 从请求扩展中获取已认证身份（中间件在鉴权后注入）
pub(crate) fn auth_context(req: &HttpRequest) -> AppResult<AuthContext> {
    req.extensions()
        .get::<AuthContext>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing authenticated principal".to_string()))
}

/// 管理端能力检查：核心操作只在调用层做角色判断
pub(crate) fn require_admin(req: &HttpRequest) -> AppResult<AuthContext> {
    let ctx = auth_context(req)?;
    if ctx.role != Role::Admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(ctx)
}

/// 带 path/method/timestamp 的结构化错误响应
pub(crate) fn error_response(req: &HttpRequest, e: &AppError) -> HttpResponse {
    e.to_response(req.path(), req.method().as_str())
}
