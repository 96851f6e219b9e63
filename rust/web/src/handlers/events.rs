use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::reply::{self, Response};
use warp::Reply;

use crate::events::{EventRecord, Notifier};

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

#[derive(Debug, Serialize)]
struct EventsBody {
    events: Vec<EventRecord>,
    latest_seq: u64,
}

/// `GET /events?since=` - the UI's polling feed.
pub async fn poll_events(notifier: Arc<Notifier>, query: EventsQuery) -> Response {
    let body = EventsBody {
        events: notifier.since(query.since),
        latest_seq: notifier.latest_seq(),
    };
    reply::json(&body).into_response()
}
