pub mod events;
pub mod health;
pub mod session;

pub use events::{poll_events, EventsQuery};
pub use health::health;
pub use session::{
    dispatch_get, dispatch_post, get_session_info, get_tournament_session, start_session,
    StartSessionRequest,
};
