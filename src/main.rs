use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use plotpicks_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::StorageService,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::{PlotService, PredictionService, ShowService},
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // JWT 校验 (token 由身份服务签发，双方共享密钥)
    let jwt_service = JwtService::new(&config.jwt.secret);

    // 对象存储网关
    let storage_service = StorageService::new(config.storage.clone());

    // 创建服务
    let show_service = ShowService::new(pool.clone(), storage_service.clone());
    let prediction_service = PredictionService::new(pool.clone());
    let plot_service = PlotService::new(pool.clone(), prediction_service.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(show_service.clone()))
            .app_data(web::Data::new(plot_service.clone()))
            .app_data(web::Data::new(prediction_service.clone()))
            .app_data(web::Data::new(storage_service.clone()))
            .configure(swagger_config)
            .configure(handlers::health_config)
            .configure(handlers::show_admin_config)
            .configure(handlers::plot_admin_config)
            .configure(handlers::prediction_config)
            .configure(handlers::plot_user_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
