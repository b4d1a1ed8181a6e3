use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct TerminateAllResponse {
    pub terminated: u64,
}
