use std::time::Duration;

pub enum Action {
    Fetch {
        json: bool,
        watch: Option<Duration>,
    },
    Status,
}
