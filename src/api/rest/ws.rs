use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use futures::stream::{SplitSink, SplitStream};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;
use crate::sync::deliveries::DeliveryFeed;
use crate::sync::orders::OrderFeed;
use crate::sync::scope::{DeliveryScope, OrderScope};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewRole {
    Customer,
    Restaurant,
    Driver,
}

#[derive(Deserialize)]
pub struct ViewQuery {
    pub role: ViewRole,
    pub id: Uuid,
    #[serde(default)]
    pub include_available: bool,
}

/// Streams a role-scoped live view to the client. The feed (snapshot plus
/// change-feed subscription) lives exactly as long as the socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, query: ViewQuery) {
    let (sender, receiver) = socket.split();

    info!(role = ?query.role, id = %query.id, "view client connected");

    match query.role {
        ViewRole::Customer => {
            let feed = OrderFeed::spawn(
                state.backend.clone(),
                OrderScope::Customer(query.id),
                state.metrics.clone(),
            );
            forward_view(sender, receiver, WatchStream::new(feed.subscribe())).await;
        }
        ViewRole::Restaurant => {
            let feed = OrderFeed::spawn(
                state.backend.clone(),
                OrderScope::Restaurant(query.id),
                state.metrics.clone(),
            );
            forward_view(sender, receiver, WatchStream::new(feed.subscribe())).await;
        }
        ViewRole::Driver => {
            let feed = DeliveryFeed::spawn(
                state.backend.clone(),
                DeliveryScope {
                    driver_id: query.id,
                    include_available: query.include_available,
                },
                state.metrics.clone(),
            );
            forward_view(sender, receiver, WatchStream::new(feed.subscribe())).await;
        }
    }

    info!(role = ?query.role, id = %query.id, "view client disconnected");
}

async fn forward_view<T>(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut views: WatchStream<T>,
) where
    T: Serialize + Clone + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            view = views.next() => {
                let Some(view) = view else { break };
                let json = match serde_json::to_string(&view) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize view for ws");
                        continue;
                    }
                };

                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                if !matches!(msg, Some(Ok(_))) {
                    break;
                }
            }
        }
    }
}
