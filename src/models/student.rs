use serde::{Deserialize, Serialize};

use super::reference::Identified;

pub const KELAS_LIST: [&str; 9] = [
    "VII-A", "VII-B", "VII-C", "VIII-A", "VIII-B", "VIII-C", "IX-A", "IX-B", "IX-C",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub nis: String,
    pub kelas: String,
    pub no_telp: String,
}

impl Identified for Student {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub full_name: String,
    pub email: String,
    pub nis: String,
    pub kelas: String,
    pub no_telp: String,
}

impl StudentInput {
    pub fn has_known_kelas(&self) -> bool {
        KELAS_LIST.contains(&self.kelas.as_str())
    }
}
