//! HTTP transport: turns JSON requests into conversation turns.

use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::conversation::{ChatId, Conversations, Reply, State};
use crate::matcher::Matcher;

#[derive(Deserialize)]
struct MessageRequest {
    chat_id: ChatId,
    text: String,
}

#[derive(Serialize)]
struct MessageResponse {
    replies: Vec<Reply>,
    state: State,
}

#[derive(Deserialize)]
struct SuggestRequest {
    query: String,
    k: Option<usize>,
}

#[post("/message")]
async fn message(
    req: web::Json<MessageRequest>,
    conversations: web::Data<Conversations>,
) -> impl Responder {
    let MessageRequest { chat_id, text } = req.into_inner();
    let turn = conversations.handle(chat_id, &text).await;
    HttpResponse::Ok().json(MessageResponse {
        replies: turn.replies,
        state: turn.next,
    })
}

#[post("/suggest")]
async fn suggest(req: web::Json<SuggestRequest>, matcher: web::Data<Matcher>) -> impl Responder {
    let k = req.k.unwrap_or(Matcher::DEFAULT_K);
    HttpResponse::Ok().json(matcher.suggest(&req.query, k))
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

/// Shared state and routes, for `App::configure`.
pub fn configure(
    conversations: Arc<Conversations>,
    matcher: Arc<Matcher>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::from(conversations))
            .app_data(web::Data::from(matcher))
            .service(message)
            .service(suggest)
            .service(health);
    }
}
