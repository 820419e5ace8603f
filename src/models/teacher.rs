use serde::{Deserialize, Serialize};

use super::reference::Identified;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub nrk: String,
    pub no_telp: String,
}

impl Identified for Teacher {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherInput {
    pub full_name: String,
    pub email: String,
    pub nrk: String,
    pub no_telp: String,
}
