use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local;
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use voterbowl_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{AgcodClient, SendgridMailer},
    handlers,
    middlewares::create_cors,
    services::*,
    swagger::swagger_config,
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

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // External collaborators: the gift card vendor and the mailer.
    let agcod = AgcodClient::from_config(&config.agcod).expect("Invalid AGCOD configuration");
    let mailer = Arc::new(SendgridMailer::new(config.email.clone()));

    let school_service = SchoolService::new(pool.clone());
    let contest_service = ContestService::new(pool.clone());
    let student_service = StudentService::new(pool.clone());
    let entry_service = EntryService::new(
        pool.clone(),
        agcod,
        mailer.clone(),
        config.email.gift_card_template_id.clone(),
    );
    let validation_service = ValidationService::new(
        pool.clone(),
        mailer,
        config.server.public_base_url.clone(),
        config.email.validation_template_id.clone(),
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .app_data(web::Data::new(school_service.clone()))
            .app_data(web::Data::new(contest_service.clone()))
            .app_data(web::Data::new(student_service.clone()))
            .app_data(web::Data::new(entry_service.clone()))
            .app_data(web::Data::new(validation_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::school_config)
                    .configure(handlers::check_config)
                    .configure(handlers::validate_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
