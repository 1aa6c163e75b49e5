use std::time::Duration;

use actix_web::{middleware, App, HttpServer};
use anyhow::Result;

use pivo_bot::server;
use pivo_bot::settings::Settings;
use pivo_bot::startup;

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load("Config")?;
    let components = startup::init(&settings)?;

    // idle sessions are dropped in the background
    let idle = Duration::from_secs(settings.logic.session_idle_secs);
    let conversations = components.conversations.clone();
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(idle.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let pruned = conversations.sessions().prune_idle(idle);
            if pruned > 0 {
                log::info!("Dropped {} idle sessions", pruned);
            }
        }
    });

    let image_dir = settings.data.image_dir.clone();
    let (host, port) = (settings.server.host.clone(), settings.server.port);
    log::info!("Starting server at http://{}:{}", host, port);
    HttpServer::new(move || {
        let mut app = App::new()
            .wrap(middleware::Logger::default())
            .configure(server::configure(
                components.conversations.clone(),
                components.matcher.clone(),
            ));
        if let Some(dir) = &image_dir {
            app = app.service(actix_files::Files::new("/images", dir));
        }
        app
    })
    .bind((host, port))?
    .run()
    .await?;
    Ok(())
}
