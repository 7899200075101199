pub mod alert;
pub mod job_state;
pub mod player;
pub mod snapshot;
pub mod universe;

pub mod prelude {
    pub use super::{
        alert::Entity as Alert,
        job_state::Entity as JobState,
        player::Entity as Player,
        snapshot::Entity as Snapshot,
        universe::Entity as Universe,
    };
}
