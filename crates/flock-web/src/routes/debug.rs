use axum::extract::State;
use flock_timeline::FanOutStats;
use serde::Serialize;

use super::AppJson;
use crate::SharedState;

#[derive(Serialize)]
pub struct FanOutDebug {
    #[serde(flatten)]
    stats: FanOutStats,
    subscribed_users: usize,
}

pub async fn get_fanout(State(state): State<SharedState>) -> AppJson<FanOutDebug> {
    AppJson(FanOutDebug {
        stats: state.timeline.fanout_stats(),
        subscribed_users: state.timeline.registry().user_count(),
    })
}
